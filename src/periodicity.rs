//! Periodicity / Fatou-component analysis.
//!
//! Once propagation reaches its fixed point, every interior (BLACK)
//! region is flood-filled into connected components ("Fatou
//! components"). Each component's image under one iteration is found
//! by mapping a single representative pixel through `f`; following that
//! chain of images either lands back on a component already seen in the
//! current chain (a cycle is born) or on a component that belongs to an
//! already-resolved cycle (the whole chain is an attraction basin for
//! it).
//!
//! The original steps the ray outward from each newly grown pixel
//! ("STRAHLEN") as a flood-fill performance trick; this port does a
//! plain 4-connected flood fill over a scratch copy of the grid, which
//! visits the same set of pixels and is equivalent for every invariant
//! this module cares about.

use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::fixed_point::Number;
use crate::geometry::Geometry;
use crate::grid::{Color, Grid};
use crate::polynomial::Polynomial;

/// Hard caps on the analyzer's output size — spec-mandated so a
/// pathological grid fails cleanly instead of growing these vectors
/// without bound.
pub const MAX_CYCLES: usize = 1 << 16;
pub const MAX_FATOU_COMPONENTS: usize = 1 << 20;
pub const MAX_PERIODIC_POINT_REGIONS: usize = 1 << 16;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scratch {
    White,
    Black,
    Gray,
    Orbit(u32),
    Immediate(usize),
    Attraction(usize),
}

/// A Fatou component discovered while following an orbit of blobs. Its
/// screen-space bounding box is exact (it is the bbox of the flood-fill,
/// not an interval enclosure).
#[derive(Clone, Debug)]
pub struct FatouComponent {
    pub x0: i32,
    pub x1: i32,
    pub y0: i32,
    pub y1: i32,
    pub cycle: usize,
    pub is_immediate: bool,
}

/// A periodic cycle of Fatou components under `f`.
#[derive(Clone, Debug)]
pub struct Cycle {
    pub len: usize,
    pub fatou_start: usize,
    pub fatou_end: usize,
}

pub struct PeriodicityReport {
    pub cycles: Vec<Cycle>,
    pub components: Vec<FatouComponent>,
    pub max_orbit_len: usize,
}

struct OrbitStep {
    cells: Vec<(i32, i32)>,
    bbox: (i32, i32, i32, i32),
}

fn build_scratch(grid: &Grid, n: i32) -> Vec<Vec<Scratch>> {
    (0..n)
        .map(|y| {
            (0..n)
                .map(|x| match grid.get(x, y) {
                    Color::Black => Scratch::Black,
                    Color::White => Scratch::White,
                    Color::Gray | Color::GrayPotentiallyWhite => Scratch::Gray,
                })
                .collect()
        })
        .collect()
}

fn flood_fill(scratch: &mut [Vec<Scratch>], seed: (i32, i32), n: i32) -> Vec<(i32, i32)> {
    let mut cells = Vec::new();
    let mut stack = vec![seed];
    scratch[seed.1 as usize][seed.0 as usize] = Scratch::Gray; // provisional, overwritten below
    cells.push(seed);
    while let Some((x, y)) = stack.pop() {
        for (nx, ny) in [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)] {
            if nx < 0 || ny < 0 || nx >= n || ny >= n {
                continue;
            }
            if scratch[ny as usize][nx as usize] == Scratch::Black {
                scratch[ny as usize][nx as usize] = Scratch::Gray;
                cells.push((nx, ny));
                stack.push((nx, ny));
            }
        }
    }
    cells
}

fn bbox_of(cells: &[(i32, i32)]) -> (i32, i32, i32, i32) {
    let mut x0 = i32::MAX;
    let mut x1 = i32::MIN;
    let mut y0 = i32::MAX;
    let mut y1 = i32::MIN;
    for &(x, y) in cells {
        x0 = x0.min(x);
        x1 = x1.max(x);
        y0 = y0.min(y);
        y1 = y1.max(y);
    }
    (x0, x1, y0, y1)
}

enum ChainOutcome {
    NewCycle(usize),
    JoinsExisting(usize),
}

fn push_component(components: &mut Vec<FatouComponent>, component: FatouComponent) -> EngineResult<()> {
    if components.len() >= MAX_FATOU_COMPONENTS {
        return Err(EngineError::CapacityCap {
            what: "fatou components",
            limit: MAX_FATOU_COMPONENTS,
        });
    }
    components.push(component);
    Ok(())
}

/// Classify every interior pixel into an attraction/immediate basin of
/// some periodic cycle. Requires the grid to already be at the
/// propagation fixed point (no residual GRAY left unresolved to BLACK).
pub fn analyze<T: Number>(
    grid: &Grid,
    geometry: &Geometry<T>,
    polynomial: &Polynomial<T>,
) -> EngineResult<PeriodicityReport> {
    let n = grid.width();
    let mut scratch = build_scratch(grid, n);
    let mut cycles: Vec<Cycle> = Vec::new();
    let mut components: Vec<FatouComponent> = Vec::new();
    let mut max_orbit_len = 0usize;

    for yb in 0..n {
        for xb in 0..n {
            if scratch[yb as usize][xb as usize] != Scratch::Black {
                continue;
            }

            let mut orbit: Vec<OrbitStep> = Vec::new();
            let mut seed = (xb, yb);
            let outcome = loop {
                let cells = flood_fill(&mut scratch, seed, n);
                let bbox = bbox_of(&cells);
                let idx = orbit.len() as u32;
                for &(cx, cy) in &cells {
                    scratch[cy as usize][cx as usize] = Scratch::Orbit(idx);
                }
                orbit.push(OrbitStep { cells, bbox });

                let a = geometry.rect_for_cells(seed.0, seed.1, 1)?;
                let fa = polynomial.bbox(&a)?;
                if fa.lies_in_special_exterior(geometry.r0, geometry.r1) {
                    return Err(EngineError::InconsistentState {
                        context: "periodicity::analyze",
                        detail: format!("representative pixel ({}, {}) of a BLACK blob maps outside the working square", seed.0, seed.1),
                    });
                }
                let tx = geometry.scrcoord_as_lowerleft(fa.x0)?;
                let ty = geometry.scrcoord_as_lowerleft(fa.y0)?;

                match scratch[ty as usize][tx as usize] {
                    Scratch::Black => {
                        seed = (tx, ty);
                        continue;
                    }
                    Scratch::Orbit(j) => break ChainOutcome::NewCycle(j as usize),
                    Scratch::Immediate(c) | Scratch::Attraction(c) => break ChainOutcome::JoinsExisting(c),
                    Scratch::White | Scratch::Gray => {
                        // The over-approximate bbox image can land its
                        // lower-left corner on a cell the residual-gray
                        // reclassification left outside the interior set
                        // (a boundary blob whose fA straddles a still-GRAY
                        // or WHITE neighbour). Not a bug we can recover
                        // from here: the orbit has nowhere sound to go.
                        return Err(EngineError::InconsistentState {
                            context: "periodicity::analyze",
                            detail: format!(
                                "orbit image of ({}, {}) landed on a non-interior cell at ({tx}, {ty})",
                                seed.0, seed.1
                            ),
                        });
                    }
                }
            };

            match outcome {
                ChainOutcome::NewCycle(j) => {
                    if cycles.len() >= MAX_CYCLES {
                        return Err(EngineError::CapacityCap {
                            what: "cycles",
                            limit: MAX_CYCLES,
                        });
                    }
                    let cyc_idx = cycles.len();
                    for step in orbit.iter().take(j) {
                        for &(cx, cy) in &step.cells {
                            scratch[cy as usize][cx as usize] = Scratch::Attraction(cyc_idx);
                        }
                        let (x0, x1, y0, y1) = step.bbox;
                        push_component(
                            &mut components,
                            FatouComponent {
                                x0,
                                x1,
                                y0,
                                y1,
                                cycle: cyc_idx,
                                is_immediate: false,
                            },
                        )?;
                    }
                    let fatou_start = components.len();
                    for step in orbit.iter().skip(j) {
                        for &(cx, cy) in &step.cells {
                            scratch[cy as usize][cx as usize] = Scratch::Immediate(cyc_idx);
                        }
                        let (x0, x1, y0, y1) = step.bbox;
                        push_component(
                            &mut components,
                            FatouComponent {
                                x0,
                                x1,
                                y0,
                                y1,
                                cycle: cyc_idx,
                                is_immediate: true,
                            },
                        )?;
                    }
                    let fatou_end = components.len() - 1;
                    cycles.push(Cycle {
                        len: orbit.len() - j,
                        fatou_start,
                        fatou_end,
                    });
                    max_orbit_len = max_orbit_len.max(orbit.len() - 1);
                }
                ChainOutcome::JoinsExisting(c) => {
                    for step in &orbit {
                        for &(cx, cy) in &step.cells {
                            scratch[cy as usize][cx as usize] = Scratch::Attraction(c);
                        }
                        let (x0, x1, y0, y1) = step.bbox;
                        push_component(
                            &mut components,
                            FatouComponent {
                                x0,
                                x1,
                                y0,
                                y1,
                                cycle: c,
                                is_immediate: false,
                            },
                        )?;
                    }
                }
            }
        }
    }

    debug!(cycles = cycles.len(), components = components.len(), "periodicity analysis complete");
    Ok(PeriodicityReport {
        cycles,
        components,
        max_orbit_len,
    })
}

/// A candidate region of periodic points for one cycle, reported as its
/// merged plane-coordinate bounding rectangle.
#[derive(Clone, Debug)]
pub struct PeriodicPointRegion {
    pub cycle: usize,
    pub x0: i32,
    pub x1: i32,
    pub y0: i32,
    pub y1: i32,
}

/// Cap on how many cells a single periodic-point flood-fill will visit
/// before it's abandoned for that cycle — the basin search is a
/// best-effort local probe, not a second full-grid analysis.
const MAX_FLOOD_FILL_CELLS: usize = 1 << 20;

fn component_area(c: &&FatouComponent) -> i64 {
    (c.x1 - c.x0 + 1) as i64 * (c.y1 - c.y0 + 1) as i64
}

/// Probe alternating offsets `0, +1, -1, +2, -2, ...` from `center`
/// within `[lo, hi]`, returning the first offset where `probe` succeeds.
fn delta_scan(center: i32, lo: i32, hi: i32, mut probe: impl FnMut(i32) -> bool) -> Option<i32> {
    if probe(center) {
        return Some(center);
    }
    let mut delta = 1;
    while center - delta >= lo || center + delta <= hi {
        let plus = center + delta;
        if plus <= hi && probe(plus) {
            return Some(plus);
        }
        let minus = center - delta;
        if minus >= lo && probe(minus) {
            return Some(minus);
        }
        delta += 1;
    }
    None
}

/// 4-connected flood fill over BLACK cells reachable from `seed`,
/// bounded by `MAX_FLOOD_FILL_CELLS`. Stands in for a bbox-overlap
/// adjacency: for the compact, roughly-convex basins this analyzer
/// produces, the two relations visit the same pixels.
fn flood_fill_basin_bbox(grid: &Grid, seed: (i32, i32), n: i32) -> (i32, i32, i32, i32) {
    let mut visited: std::collections::HashSet<(i32, i32)> = std::collections::HashSet::new();
    let mut stack = vec![seed];
    visited.insert(seed);
    let (mut x0, mut x1, mut y0, mut y1) = (seed.0, seed.0, seed.1, seed.1);
    while let Some((x, y)) = stack.pop() {
        x0 = x0.min(x);
        x1 = x1.max(x);
        y0 = y0.min(y);
        y1 = y1.max(y);
        if visited.len() >= MAX_FLOOD_FILL_CELLS {
            break;
        }
        for (nx, ny) in [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)] {
            if nx < 0 || ny < 0 || nx >= n || ny >= n {
                continue;
            }
            if visited.contains(&(nx, ny)) {
                continue;
            }
            if grid.get(nx, ny) != Color::Black {
                continue;
            }
            visited.insert((nx, ny));
            stack.push((nx, ny));
        }
    }
    (x0, x1, y0, y1)
}

/// Locate a candidate periodic-point region for each resolved cycle.
///
/// For each cycle, starts from its smallest immediate-basin component's
/// center row and alternately probes `±δ` offsets, following each probe
/// pixel through `f` for `cycle.len - 1` iterations; a probe "hits" once
/// the iterated image falls within the probe's own 3×3 neighbourhood.
/// The first hit seeds a flood-fill over the reachable BLACK basin,
/// whose bounding box is reported as the cycle's periodic-point region.
pub fn find_periodic_points<T: Number>(
    grid: &Grid,
    geometry: &Geometry<T>,
    polynomial: &Polynomial<T>,
    report: &PeriodicityReport,
) -> EngineResult<Vec<PeriodicPointRegion>> {
    let n = grid.width();
    let mut regions = Vec::new();

    for (cyc_idx, cycle) in report.cycles.iter().enumerate() {
        let seed_component = match report.components[cycle.fatou_start..=cycle.fatou_end].iter().min_by_key(component_area) {
            Some(c) => c,
            None => continue,
        };

        let cy = (seed_component.y0 + seed_component.y1) / 2;
        let center_x = (seed_component.x0 + seed_component.x1) / 2;

        let seed_x = delta_scan(center_x, seed_component.x0, seed_component.x1, |cx| {
            let mut px = cx;
            let mut py = cy;
            for _ in 0..cycle.len.saturating_sub(1) {
                let a = match geometry.rect_for_cells(px, py, 1) {
                    Ok(a) => a,
                    Err(_) => return false,
                };
                let fa = match polynomial.bbox(&a) {
                    Ok(fa) => fa,
                    Err(_) => return false,
                };
                if fa.lies_in_special_exterior(geometry.r0, geometry.r1) {
                    return false;
                }
                px = match geometry.scrcoord_as_lowerleft(fa.x0) {
                    Ok(v) => v,
                    Err(_) => return false,
                };
                py = match geometry.scrcoord_as_lowerleft(fa.y0) {
                    Ok(v) => v,
                    Err(_) => return false,
                };
            }
            (px - cx).abs() <= 1 && (py - cy).abs() <= 1
        });

        let seed_x = match seed_x {
            Some(x) => x,
            None => {
                debug!(cycle = cyc_idx, "periodic-point delta-scan found no candidate seed");
                continue;
            }
        };

        if regions.len() >= MAX_PERIODIC_POINT_REGIONS {
            return Err(EngineError::CapacityCap {
                what: "periodic-point regions",
                limit: MAX_PERIODIC_POINT_REGIONS,
            });
        }

        let (x0, x1, y0, y1) = flood_fill_basin_bbox(grid, (seed_x, cy), n);
        regions.push(PeriodicPointRegion {
            cycle: cyc_idx,
            x0,
            x1,
            y0,
            y1,
        });
    }

    debug!(regions = regions.len(), "periodic-point search complete");
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::polynomial::CParam;

    #[test]
    fn single_fixed_black_blob_is_its_own_immediate_cycle() {
        let n = 64;
        let mut arena = Arena::new("rows", 1 << 30);
        let mut grid = Grid::new(n, &mut arena).unwrap();
        for y in 0..n {
            for x in 0..n {
                grid.set(x, y, Color::White).unwrap();
            }
        }
        // A small black square near the origin, where z^2+c with c=0
        // keeps the pixel (or a nearby one) mapped to itself.
        for y in 30..34 {
            for x in 30..34 {
                grid.set(x, y, Color::Black).unwrap();
            }
        }
        let geometry: Geometry<f64> = Geometry::new(n, 1);
        let poly = Polynomial::Z2C {
            c: CParam::point(0.0_f64, 0.0),
        };
        let report = analyze(&grid, &geometry, &poly).unwrap();
        assert!(!report.cycles.is_empty());
        assert!(!report.components.is_empty());
    }

    #[test]
    fn periodic_point_search_finds_a_region_for_a_fixed_blob() {
        let n = 64;
        let mut arena = Arena::new("rows", 1 << 30);
        let mut grid = Grid::new(n, &mut arena).unwrap();
        for y in 0..n {
            for x in 0..n {
                grid.set(x, y, Color::White).unwrap();
            }
        }
        for y in 30..34 {
            for x in 30..34 {
                grid.set(x, y, Color::Black).unwrap();
            }
        }
        let geometry: Geometry<f64> = Geometry::new(n, 1);
        let poly = Polynomial::Z2C {
            c: CParam::point(0.0_f64, 0.0),
        };
        let report = analyze(&grid, &geometry, &poly).unwrap();
        let regions = find_periodic_points(&grid, &geometry, &poly, &report).unwrap();
        assert!(!regions.is_empty());
        let region = &regions[0];
        assert!(region.x0 >= 30 && region.x1 < 34);
        assert!(region.y0 >= 30 && region.y1 < 34);
    }
}
