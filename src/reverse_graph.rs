//! Reverse cell graph: coarse tile → list of parent tiles whose image
//! can land in it, plus a per-tile `tovisit` worklist flag.
//!
//! Built in two passes over every coarse tile T' (mirroring the
//! original's `construct_static_reverse_cellgraph`): the first pass
//! counts, per destination tile T, how many source tiles T' cover it;
//! the second reserves a single flat parent buffer against an [`Arena`]
//! sized exactly by that total and fills it in, each tile keeping only
//! an `(offset, len)` slice into it. The whole buffer — and the arena
//! reservation backing it — is released as a unit via
//! [`RevCellGraph::release_parents`] once propagation finishes, making
//! room for the periodicity phase's own working storage.

use crate::arena::Arena;
use crate::error::EngineResult;
use crate::fixed_point::Number;
use crate::geometry::Geometry;
use crate::polynomial::Polynomial;

/// Coarse-tile granularity: B = 2^b, chosen so N/B ≤ 2^15.
pub fn choose_revcg_bits(requested_b: u32, n: i32) -> u32 {
    let mut b = requested_b.max(4);
    while (n >> b) > (1 << 15) {
        b += 1;
    }
    b
}

#[derive(Clone, Copy)]
struct TileSlot {
    offset: u32,
    len: u32,
    tovisit: bool,
}

/// The reverse cell graph plus its worklist flags. Parent lists live in
/// one flat, arena-backed buffer (`parent_buf`) rather than a `Vec` per
/// tile; [`release_parents`](RevCellGraph::release_parents) drops that
/// buffer and resets the arena in one step.
pub struct RevCellGraph {
    pub b_bits: u32,
    pub tile_width: i32,
    pub m: i32,
    slots: Vec<TileSlot>,
    parent_buf: Vec<(i32, i32)>,
    parent_arena: Arena,
}

impl RevCellGraph {
    pub fn tile_count(&self) -> usize {
        self.slots.len()
    }

    pub fn parents_of(&self, bx: i32, by: i32) -> &[(i32, i32)] {
        let slot = &self.slots[(by * self.m + bx) as usize];
        &self.parent_buf[slot.offset as usize..(slot.offset + slot.len) as usize]
    }

    pub fn tovisit(&self, bx: i32, by: i32) -> bool {
        self.slots[(by * self.m + bx) as usize].tovisit
    }

    pub fn set_tovisit(&mut self, bx: i32, by: i32, value: bool) {
        self.slots[(by * self.m + bx) as usize].tovisit = value;
    }

    pub fn mark_all_tovisit(&mut self) {
        for slot in &mut self.slots {
            slot.tovisit = true;
        }
    }

    /// Mark every parent of tile (bx, by) for revisiting — called after a
    /// cell in (bx, by) changes color, so the sweep can reconsider
    /// whatever might map into it.
    pub fn propagate_tovisit_to_parents(&mut self, bx: i32, by: i32) {
        let parents: Vec<(i32, i32)> = self.parents_of(bx, by).to_vec();
        for (px, py) in parents {
            self.set_tovisit(px, py, true);
        }
    }

    /// Release the parent buffer and its backing arena reservation.
    /// After this call `parents_of` on any tile returns an empty slice —
    /// only valid once propagation has finished and nothing will call
    /// `propagate_tovisit_to_parents` again.
    pub fn release_parents(&mut self) {
        self.parent_buf = Vec::new();
        self.parent_arena.reset();
        for slot in &mut self.slots {
            slot.offset = 0;
            slot.len = 0;
        }
    }

    /// Two-pass construction: count parent-list sizes, reserve the flat
    /// buffer against the arena, then fill it in.
    pub fn build<T: Number>(
        geometry: &Geometry<T>,
        polynomial: &Polynomial<T>,
        b_bits: u32,
    ) -> EngineResult<Self> {
        let tile_width = 1i32 << b_bits;
        let m = geometry.n / tile_width;
        let mut counts = vec![0u32; (m * m) as usize];

        // Pass 1: count how many source tiles cover each destination tile.
        for ty in 0..m {
            let source_y = ty * tile_width;
            for tx in 0..m {
                let source_x = tx * tile_width;
                let a = geometry.rect_for_cells(source_x, source_y, tile_width)?;
                if a.lies_in_special_exterior(geometry.r0, geometry.r1) {
                    continue;
                }
                let fa = polynomial.bbox(&a)?;
                if fa.lies_in_special_exterior(geometry.r0, geometry.r1) {
                    continue;
                }
                let scr_x0 = geometry.scrcoord_as_lowerleft(fa.x0)? >> b_bits;
                let scr_x1 = geometry.scrcoord_as_lowerleft(fa.x1)? >> b_bits;
                let scr_y0 = geometry.scrcoord_as_lowerleft(fa.y0)? >> b_bits;
                let scr_y1 = geometry.scrcoord_as_lowerleft(fa.y1)? >> b_bits;
                for by in scr_y0..=scr_y1 {
                    for bx in scr_x0..=scr_x1 {
                        counts[(by * m + bx) as usize] += 1;
                    }
                }
            }
        }

        // Assign each tile its exact offset into the flat parent buffer
        // and reserve that total, in one shot, against the arena.
        let mut slots: Vec<TileSlot> = Vec::with_capacity(counts.len());
        let mut running = 0u32;
        for &c in &counts {
            slots.push(TileSlot {
                offset: running,
                len: 0,
                tovisit: true,
            });
            running += c;
        }
        let total_parents = running as usize;
        let mut parent_arena = Arena::new("reverse_graph_parents", crate::arena::DEFAULT_ARENA_CAPACITY);
        parent_arena.reserve(total_parents * std::mem::size_of::<(i32, i32)>())?;
        let mut parent_buf: Vec<(i32, i32)> = vec![(0, 0); total_parents];

        // Pass 2: fill each tile's slice, tracking how many entries have
        // been written into it so far via `len`.
        for ty in 0..m {
            let source_y = ty * tile_width;
            for tx in 0..m {
                let source_x = tx * tile_width;
                let a = geometry.rect_for_cells(source_x, source_y, tile_width)?;
                if a.lies_in_special_exterior(geometry.r0, geometry.r1) {
                    continue;
                }
                let fa = polynomial.bbox(&a)?;
                if fa.lies_in_special_exterior(geometry.r0, geometry.r1) {
                    continue;
                }
                let scr_x0 = geometry.scrcoord_as_lowerleft(fa.x0)? >> b_bits;
                let scr_x1 = geometry.scrcoord_as_lowerleft(fa.x1)? >> b_bits;
                let scr_y0 = geometry.scrcoord_as_lowerleft(fa.y0)? >> b_bits;
                let scr_y1 = geometry.scrcoord_as_lowerleft(fa.y1)? >> b_bits;
                for by in scr_y0..=scr_y1 {
                    for bx in scr_x0..=scr_x1 {
                        let slot = &mut slots[(by * m + bx) as usize];
                        parent_buf[(slot.offset + slot.len) as usize] = (tx, ty);
                        slot.len += 1;
                    }
                }
            }
        }

        Ok(RevCellGraph {
            b_bits,
            tile_width,
            m,
            slots,
            parent_buf,
            parent_arena,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::PlaneRect;
    use crate::polynomial::CParam;

    #[test]
    fn choose_revcg_bits_respects_cap() {
        assert_eq!(choose_revcg_bits(4, 1 << 20), 5);
        assert_eq!(choose_revcg_bits(10, 1 << 12), 10);
    }

    #[test]
    fn coverage_property_every_overlapping_parent_is_recorded() {
        let geometry: Geometry<f64> = Geometry::new(256, 1);
        let poly = Polynomial::Z2C {
            c: CParam::point(-1.0_f64, 0.0),
        };
        let graph = RevCellGraph::build(&geometry, &poly, 4).unwrap();
        // Spot check: every tile's listed parents truly map into it.
        for ty in 0..graph.m {
            for tx in 0..graph.m {
                for &(px, py) in graph.parents_of(tx, ty) {
                    let source_x = px * graph.tile_width;
                    let source_y = py * graph.tile_width;
                    let a: PlaneRect<f64> = geometry
                        .rect_for_cells(source_x, source_y, graph.tile_width)
                        .unwrap();
                    let fa = poly.bbox(&a).unwrap();
                    let target = geometry
                        .rect_for_cells(tx * graph.tile_width, ty * graph.tile_width, graph.tile_width)
                        .unwrap();
                    assert!(!fa.is_disjoint_from(&target) || fa.lies_in_special_exterior(geometry.r0, geometry.r1));
                }
            }
        }
    }
}
