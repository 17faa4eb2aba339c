//! Two-phase monotone propagation: definite colors to a fixed point,
//! then potentially-white markers to a fixed point, both driven by the
//! reverse cell graph as a worklist.

use tracing::{debug, info};

use crate::error::EngineResult;
use crate::fixed_point::Number;
use crate::geometry::Geometry;
use crate::grid::{uniform_color, Color, Grid, CELLS_PER_WORD};
use crate::interval::PlaneRect;
use crate::polynomial::Polynomial;
use crate::reverse_graph::RevCellGraph;

/// The union of all rows' gray-enclosing bands, as a plane rectangle,
/// used for a cheap whole-bbox disjointness test before the more
/// expensive per-cell sampling.
fn gray_enclosure<T: Number>(grid: &Grid, geometry: &Geometry<T>) -> EngineResult<Option<PlaneRect<T>>> {
    let mut cells: Option<(i32, i32, i32, i32)> = None; // (x0,y0,x1,y1) inclusive cell coords
    for y in 0..grid.width() {
        let row = grid.row(y);
        if row.g1 < row.g0 {
            continue;
        }
        cells = Some(match cells {
            None => (row.g0, y, row.g1, y),
            Some((x0, y0, x1, y1)) => (x0.min(row.g0), y0.min(y), x1.max(row.g1), y1.max(y)),
        });
    }
    match cells {
        None => Ok(None),
        Some((x0, y0, x1, y1)) => Ok(Some(PlaneRect {
            x0: geometry.plane_coord(x0)?,
            x1: geometry.plane_coord(x1 + 1)?,
            y0: geometry.plane_coord(y0)?,
            y1: geometry.plane_coord(y1 + 1)?,
        })),
    }
}

/// `hits_white` / `hits_black` over every cell fA's screen footprint
/// touches; any GRAY or GRAY-POTENTIALLY-WHITE cell counts as hitting
/// both, per the original's "default: hits_black=hits_white=1".
fn sample_coverage<T: Number>(
    grid: &Grid,
    geometry: &Geometry<T>,
    fa: &PlaneRect<T>,
) -> EngineResult<(bool, bool)> {
    let scr_x0 = geometry.scrcoord_as_lowerleft(fa.x0)?;
    let scr_x1 = geometry.scrcoord_as_lowerleft(fa.x1)?;
    let scr_y0 = geometry.scrcoord_as_lowerleft(fa.y0)?;
    let scr_y1 = geometry.scrcoord_as_lowerleft(fa.y1)?;
    let mut hits_white = false;
    let mut hits_black = false;
    'outer: for ty in scr_y0..=scr_y1 {
        for tx in scr_x0..=scr_x1 {
            match grid.get(tx, ty) {
                Color::Black => hits_black = true,
                Color::White => hits_white = true,
                _ => {
                    hits_black = true;
                    hits_white = true;
                }
            }
            if hits_white && hits_black {
                break 'outer;
            }
        }
    }
    Ok((hits_white, hits_black))
}

fn process_tile_definite<T: Number>(
    grid: &mut Grid,
    geometry: &Geometry<T>,
    polynomial: &Polynomial<T>,
    enclosure: &Option<PlaneRect<T>>,
    tile_x0: i32,
    tile_y0: i32,
    tile_width: i32,
) -> EngineResult<bool> {
    let mut any_changed = false;
    for y in tile_y0..(tile_y0 + tile_width) {
        let row = grid.row(y);
        if row.g1 < row.g0 {
            continue;
        }
        if tile_x0 > row.g1 || (tile_x0 + tile_width) < row.g0 {
            continue;
        }
        let mut x = tile_x0;
        while x < tile_x0 + tile_width {
            let word_index = x / CELLS_PER_WORD;
            let word = grid.get_word(word_index, y);
            if uniform_color(word) == Some(Color::White) || uniform_color(word) == Some(Color::Black) {
                x += CELLS_PER_WORD;
                continue;
            }
            let mut word_changed = false;
            let mut new_word = word;
            for bit in 0..CELLS_PER_WORD {
                let cell_x = x + bit;
                if grid.get(cell_x, y) != Color::Gray {
                    continue;
                }
                let a = geometry.rect_for_cells(cell_x, y, 1)?;
                let fa = polynomial.bbox(&a)?;

                let disjoint_from_enclosure = match enclosure {
                    Some(rect) => fa.is_disjoint_from(rect),
                    None => true,
                };
                let new_color = if disjoint_from_enclosure {
                    Some(Color::White)
                } else {
                    let (hits_white, hits_black) = sample_coverage(grid, geometry, &fa)?;
                    if hits_white && !hits_black {
                        Some(Color::White)
                    } else if hits_black && !hits_white {
                        Some(Color::Black)
                    } else {
                        None
                    }
                };
                if let Some(color) = new_color {
                    let shift = bit * 2;
                    let mask = !(0b11u32 << shift);
                    new_word = (new_word & mask) | ((color as u32) << shift);
                    word_changed = true;
                }
            }
            if word_changed {
                grid.set_word(word_index, y, new_word)?;
                any_changed = true;
            }
            x += CELLS_PER_WORD;
        }
    }
    Ok(any_changed)
}

/// Propagate definite colors (WHITE/BLACK) to a fixed point. `on_sweep`
/// is called once per outer sweep (after every tile in the worklist has
/// been visited), so a caller can checkpoint state at a wall-clock
/// cadence without this loop knowing anything about files or clocks.
pub fn propagate_definite<T: Number>(
    grid: &mut Grid,
    graph: &mut RevCellGraph,
    geometry: &Geometry<T>,
    polynomial: &Polynomial<T>,
    mut on_sweep: impl FnMut(&mut Grid, &RevCellGraph) -> EngineResult<()>,
) -> EngineResult<()> {
    loop {
        let mut changed = false;
        let enclosure = gray_enclosure(grid, geometry)?;
        info!("propagating definite color");
        for ty in 0..graph.m {
            for tx in 0..graph.m {
                if !graph.tovisit(tx, ty) {
                    continue;
                }
                graph.set_tovisit(tx, ty, false);
                let tile_changed =
                    process_tile_definite(grid, geometry, polynomial, &enclosure, tx * graph.tile_width, ty * graph.tile_width, graph.tile_width)?;
                if tile_changed {
                    graph.propagate_tovisit_to_parents(tx, ty);
                    changed = true;
                }
            }
        }
        on_sweep(grid, graph)?;
        if !changed {
            break;
        }
    }
    Ok(())
}

fn process_tile_potw<T: Number>(
    grid: &mut Grid,
    geometry: &Geometry<T>,
    polynomial: &Polynomial<T>,
    enclosure: &Option<PlaneRect<T>>,
    tile_x0: i32,
    tile_y0: i32,
    tile_width: i32,
) -> EngineResult<bool> {
    let mut any_changed = false;
    for y in tile_y0..(tile_y0 + tile_width) {
        let row = grid.row(y);
        if row.g1 < row.g0 {
            continue;
        }
        if tile_x0 > row.g1 || (tile_x0 + tile_width) < row.g0 {
            continue;
        }
        let mut x = tile_x0;
        while x < tile_x0 + tile_width {
            let word_index = x / CELLS_PER_WORD;
            let word = grid.get_word(word_index, y);
            if uniform_color(word) == Some(Color::White) || uniform_color(word) == Some(Color::Black) {
                x += CELLS_PER_WORD;
                continue;
            }
            let mut word_changed = false;
            let mut new_word = word;
            for bit in 0..CELLS_PER_WORD {
                let cell_x = x + bit;
                if grid.get(cell_x, y) != Color::Gray {
                    continue;
                }
                let a = geometry.rect_for_cells(cell_x, y, 1)?;
                let fa = polynomial.bbox(&a)?;

                let disjoint_from_enclosure = match enclosure {
                    Some(rect) => fa.is_disjoint_from(rect),
                    None => true,
                };
                let new_color = if disjoint_from_enclosure {
                    Some(Color::White)
                } else {
                    let scr_x0 = geometry.scrcoord_as_lowerleft(fa.x0)?;
                    let scr_x1 = geometry.scrcoord_as_lowerleft(fa.x1)?;
                    let scr_y0 = geometry.scrcoord_as_lowerleft(fa.y0)?;
                    let scr_y1 = geometry.scrcoord_as_lowerleft(fa.y1)?;
                    let mut hits_graypotw = false;
                    let mut hits_white = false;
                    let mut hits_other = false;
                    'inner: for ty2 in scr_y0..=scr_y1 {
                        for tx2 in scr_x0..=scr_x1 {
                            match grid.get(tx2, ty2) {
                                Color::GrayPotentiallyWhite => {
                                    hits_graypotw = true;
                                    break 'inner;
                                }
                                Color::White => hits_white = true,
                                Color::Black | Color::Gray => hits_other = true,
                            }
                        }
                    }
                    // preserve this disjunction exactly: either a direct
                    // GRAY-POTW hit, or a mix of WHITE and (BLACK ∪ GRAY).
                    if hits_graypotw || (hits_white && hits_other) {
                        Some(Color::GrayPotentiallyWhite)
                    } else {
                        None
                    }
                };
                if let Some(color) = new_color {
                    let shift = bit * 2;
                    let mask = !(0b11u32 << shift);
                    new_word = (new_word & mask) | ((color as u32) << shift);
                    word_changed = true;
                }
            }
            if word_changed {
                grid.set_word(word_index, y, new_word)?;
                any_changed = true;
            }
            x += CELLS_PER_WORD;
        }
    }
    Ok(any_changed)
}

/// Propagate GRAY-POTENTIALLY-WHITE markers through the residual gray
/// set to a fixed point. Monotone: GRAY-POTENTIALLY-WHITE replaces GRAY
/// only, and never reverts.
pub fn propagate_potw<T: Number>(
    grid: &mut Grid,
    graph: &mut RevCellGraph,
    geometry: &Geometry<T>,
    polynomial: &Polynomial<T>,
    mut on_sweep: impl FnMut(&mut Grid, &RevCellGraph) -> EngineResult<()>,
) -> EngineResult<()> {
    graph.mark_all_tovisit();
    loop {
        let mut changed = false;
        let enclosure = gray_enclosure(grid, geometry)?;
        debug!("propagating potentially-white markers");
        for ty in 0..graph.m {
            for tx in 0..graph.m {
                if !graph.tovisit(tx, ty) {
                    continue;
                }
                graph.set_tovisit(tx, ty, false);
                let tile_changed =
                    process_tile_potw(grid, geometry, polynomial, &enclosure, tx * graph.tile_width, ty * graph.tile_width, graph.tile_width)?;
                if tile_changed {
                    graph.propagate_tovisit_to_parents(tx, ty);
                    changed = true;
                }
            }
        }
        on_sweep(grid, graph)?;
        if !changed {
            break;
        }
    }
    Ok(())
}

/// Reclassify any cell still uniformly GRAY (never touched by POTW) to
/// BLACK — the residual-gray-to-interior step after both passes. Returns
/// true if at least one cell became BLACK (the interior-present flag).
pub fn reclassify_residual_gray(grid: &mut Grid) -> EngineResult<bool> {
    let mut any_black = false;
    for y in 0..grid.width() {
        let row = grid.row(y).clone();
        if row.g1 < row.g0 {
            continue;
        }
        let mut word_index = row.mem0;
        while word_index <= row.mem1 {
            let word = grid.get_word(word_index, y);
            if word == crate::grid::GRAY_16 {
                grid.set_word(word_index, y, crate::grid::BLACK_16)?;
                any_black = true;
            } else if uniform_color(word).is_none() {
                for bit in 0..CELLS_PER_WORD {
                    let cell_x = word_index * CELLS_PER_WORD + bit;
                    if grid.get(cell_x, y) == Color::Gray {
                        grid.set(cell_x, y, Color::Black)?;
                        any_black = true;
                    }
                }
            }
            word_index += 1;
        }
    }
    Ok(any_black)
}
