//! Raw grid snapshots and the `tovisit` worklist sidecar.
//!
//! `save_raw`/`load_raw` persist the computed grid between runs so a
//! computation can resume, or be blown up 2× into the next refinement
//! level (one saved cell becomes a 2×2 block; GRAY-POTENTIALLY-WHITE
//! cannot be blown up meaningfully and collapses back to GRAY). The
//! `tovisit` sidecar persists the reverse-graph worklist so a resumed
//! run doesn't have to revisit every tile from scratch.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::warn;

use crate::error::{EngineError, EngineResult};
use crate::grid::{Color, Grid, RowBand, WHITE_16};
use crate::reverse_graph::RevCellGraph;

fn io_err(path: &Path, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn read_i32(r: &mut impl Read, path: &Path) -> EngineResult<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|e| io_err(path, e))?;
    Ok(i32::from_le_bytes(buf))
}

fn write_i32(w: &mut impl Write, path: &Path, v: i32) -> EngineResult<()> {
    w.write_all(&v.to_le_bytes()).map_err(|e| io_err(path, e))
}

/// Write the grid's non-white words, per row, as `(start_word, len,
/// words...)`; an empty row is `(0, 0)`.
pub fn save_raw(grid: &Grid, path: &Path) -> EngineResult<()> {
    let file = File::create(path).map_err(|e| io_err(path, e))?;
    let mut w = BufWriter::new(file);
    write_i32(&mut w, path, grid.width())?;

    for y in 0..grid.width() {
        let row = grid.row(y);
        if row.g1 < row.g0 {
            write_i32(&mut w, path, 0)?;
            write_i32(&mut w, path, 0)?;
            continue;
        }
        let mut m0 = grid.width() / crate::grid::CELLS_PER_WORD;
        let mut m1 = 0i32;
        for mem in row.mem0..=row.mem1 {
            if grid.get_word(mem, y) != WHITE_16 {
                m0 = m0.min(mem);
                m1 = m1.max(mem);
            }
        }
        let len = m1 - m0 + 1;
        if len <= 0 {
            write_i32(&mut w, path, 0)?;
            write_i32(&mut w, path, 0)?;
            continue;
        }
        write_i32(&mut w, path, m0)?;
        write_i32(&mut w, path, len)?;
        for mem in m0..=m1 {
            w.write_all(&grid.get_word(mem, y).to_le_bytes()).map_err(|e| io_err(path, e))?;
        }
    }
    Ok(())
}

/// Collapse GRAY-POTENTIALLY-WHITE to GRAY and duplicate each cell into
/// a 2×2 block, matching `copy_pixel_to_2x2grid`.
fn blow_up_word_pair(word: u32) -> [u32; 2] {
    let mut out = [0u32; 2];
    let mut eidx = 0usize;
    let mut zbit = 0u32;
    for qbit in (0..32).step_by(2) {
        let mut cell = (word >> qbit) & 0b11;
        if cell == Color::GrayPotentiallyWhite as u32 {
            cell = Color::Gray as u32;
        }
        out[eidx] |= cell << zbit;
        zbit += 2;
        out[eidx] |= cell << zbit;
        zbit += 2;
        if zbit >= 32 {
            zbit = 0;
            eidx = 1;
        }
    }
    out
}

/// Load a previously saved grid, either at its native resolution or
/// blown up 2× from a half-resolution save (the refinement workflow).
/// Returns `Ok(None)` if no file exists or its resolution doesn't match
/// either case.
pub fn load_raw(path: &Path, n: i32) -> EngineResult<Option<Grid>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return Ok(None),
    };
    let mut r = BufReader::new(file);
    let saved_n = read_i32(&mut r, path)?;

    if saved_n == n {
        let mut rows = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let start = read_i32(&mut r, path)?;
            let len = read_i32(&mut r, path)?;
            if len <= 0 {
                rows.push(RowBand::empty(n));
                continue;
            }
            let mut words = Vec::with_capacity(len as usize);
            for _ in 0..len {
                let mut buf = [0u8; 4];
                r.read_exact(&mut buf).map_err(|e| io_err(path, e))?;
                words.push(u32::from_le_bytes(buf));
            }
            rows.push(RowBand::from_parts(start, words));
        }
        return Ok(Some(Grid::from_rows(n, rows)));
    }

    if saved_n == n / 2 {
        let mut rows: Vec<Option<RowBand>> = (0..n).map(|_| None).collect();
        let mut yread = 0;
        while yread < n - 1 {
            let start = read_i32(&mut r, path)?;
            let read_len = read_i32(&mut r, path)?;
            if read_len <= 0 {
                rows[yread as usize] = Some(RowBand::empty(n));
                rows[(yread + 1) as usize] = Some(RowBand::empty(n));
                yread += 2;
                continue;
            }
            let mut source_words = Vec::with_capacity(read_len as usize);
            for _ in 0..read_len {
                let mut buf = [0u8; 4];
                r.read_exact(&mut buf).map_err(|e| io_err(path, e))?;
                source_words.push(u32::from_le_bytes(buf));
            }
            let mut blown = Vec::with_capacity(source_words.len() * 2);
            for w in &source_words {
                let [lo, hi] = blow_up_word_pair(*w);
                blown.push(lo);
                blown.push(hi);
            }
            rows[yread as usize] = Some(RowBand::from_parts(start * 2, blown.clone()));
            rows[(yread + 1) as usize] = Some(RowBand::from_parts(start * 2, blown));
            yread += 2;
        }
        let rows: Vec<RowBand> = rows.into_iter().map(|r| r.unwrap_or_else(|| RowBand::empty(n))).collect();
        return Ok(Some(Grid::from_rows(n, rows)));
    }

    let reason = EngineError::MalformedFile {
        path: path.to_path_buf(),
        reason: format!("saved width {saved_n} matches neither the requested width {n} nor its half"),
    };
    warn!(%reason, "ignoring raw snapshot");
    Ok(None)
}

/// Merge a legacy per-row-file raw family (`_in.raw_header` plus
/// `_in.raw_0001`, `_in.raw_0002`, ... each holding a run of
/// full-width, uncompressed rows) into the current single-stream
/// banded format. `CMD=CONVERT`'s offline path; does not construct an
/// `Engine`.
pub fn convert_legacy(dir: &Path, out_path: &Path) -> EngineResult<()> {
    let header_path = dir.join("_in.raw_header");
    let mut header_file = BufReader::new(File::open(&header_path).map_err(|e| io_err(&header_path, e))?);
    let n = read_i32(&mut header_file, &header_path)?;
    let memwidth = n / crate::grid::CELLS_PER_WORD;

    let out_file = File::create(out_path).map_err(|e| io_err(out_path, e))?;
    let mut out = BufWriter::new(out_file);
    write_i32(&mut out, out_path, n)?;

    let mut part = 1u32;
    loop {
        let part_path = dir.join(format!("_in.raw_{part:04}"));
        let file = match File::open(&part_path) {
            Ok(f) => f,
            Err(_) => break,
        };
        let mut r = BufReader::new(file);
        let rows_in_part = read_i32(&mut r, &part_path)?;

        for _ in 0..rows_in_part {
            let mut row = Vec::with_capacity(memwidth as usize);
            for _ in 0..memwidth {
                let mut buf = [0u8; 4];
                r.read_exact(&mut buf).map_err(|e| io_err(&part_path, e))?;
                row.push(u32::from_le_bytes(buf));
            }
            let mut m0 = memwidth;
            let mut m1 = -1i32;
            for (idx, &word) in row.iter().enumerate() {
                if word != WHITE_16 {
                    let idx = idx as i32;
                    m0 = m0.min(idx);
                    m1 = m1.max(idx);
                }
            }
            let len = m1 - m0 + 1;
            if len <= 0 {
                write_i32(&mut out, out_path, 0)?;
                write_i32(&mut out, out_path, 0)?;
                continue;
            }
            write_i32(&mut out, out_path, m0)?;
            write_i32(&mut out, out_path, len)?;
            for &word in &row[m0 as usize..=m1 as usize] {
                out.write_all(&word.to_le_bytes()).map_err(|e| io_err(out_path, e))?;
            }
        }
        part += 1;
    }

    Ok(())
}

/// Persist the reverse-graph `tovisit` worklist.
pub fn save_tovisit(graph: &RevCellGraph, path: &Path) -> EngineResult<()> {
    let file = File::create(path).map_err(|e| io_err(path, e))?;
    let mut w = BufWriter::new(file);
    let count = graph.tile_count() as i32;
    write_i32(&mut w, path, count)?;
    for by in 0..graph.m {
        for bx in 0..graph.m {
            w.write_all(&[graph.tovisit(bx, by) as u8]).map_err(|e| io_err(path, e))?;
        }
    }
    Ok(())
}

/// Load a previously saved `tovisit` worklist. Returns `Ok(false)`
/// without mutating `graph` if the file is absent or its tile count
/// doesn't match — the caller should fall back to marking everything
/// `tovisit`. The original read this header with `fwrite` instead of
/// `fread`, silently comparing whatever was on the stack; this reads it
/// properly.
pub fn load_tovisit(graph: &mut RevCellGraph, path: &Path) -> EngineResult<bool> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return Ok(false),
    };
    let mut r = BufReader::new(file);
    let count = read_i32(&mut r, path)?;
    if count != graph.tile_count() as i32 {
        let reason = EngineError::MalformedFile {
            path: path.to_path_buf(),
            reason: format!("saved tile count {count} does not match the graph's {}", graph.tile_count()),
        };
        warn!(%reason, "ignoring tovisit sidecar");
        return Ok(false);
    }
    for by in 0..graph.m {
        for bx in 0..graph.m {
            let mut buf = [0u8; 1];
            r.read_exact(&mut buf).map_err(|e| io_err(path, e))?;
            graph.set_tovisit(bx, by, buf[0] != 0);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::geometry::Geometry;
    use crate::grid::BLACK_16;
    use crate::polynomial::{CParam, Polynomial};

    #[test]
    fn save_then_load_round_trips_at_same_resolution() {
        let n = 64;
        let mut arena = Arena::new("rows", 1 << 30);
        let mut grid = Grid::new(n, &mut arena).unwrap();
        for y in 0..n {
            for x in 0..n {
                grid.set(x, y, Color::White).unwrap();
            }
        }
        grid.set(10, 10, Color::Black).unwrap();
        grid.set(11, 10, Color::Gray).unwrap();

        let dir = std::env::temp_dir();
        let path = dir.join(format!("juliatsa_test_raw_{}.raw", std::process::id()));
        save_raw(&grid, &path).unwrap();
        let loaded = load_raw(&path, n).unwrap().unwrap();
        assert_eq!(loaded.get(10, 10), Color::Black);
        assert_eq!(loaded.get(11, 10), Color::Gray);
        assert_eq!(loaded.get(0, 0), Color::White);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn blow_up_doubles_resolution_and_collapses_potw() {
        let n = 32;
        let mut arena = Arena::new("rows", 1 << 30);
        let mut half = Grid::new(n / 2, &mut arena).unwrap();
        for y in 0..n / 2 {
            for x in 0..n / 2 {
                half.set(x, y, Color::White).unwrap();
            }
        }
        half.set(3, 3, Color::GrayPotentiallyWhite).unwrap();

        let dir = std::env::temp_dir();
        let path = dir.join(format!("juliatsa_test_blowup_{}.raw", std::process::id()));
        save_raw(&half, &path).unwrap();
        let loaded = load_raw(&path, n).unwrap().unwrap();
        assert_eq!(loaded.get(6, 6), Color::Gray);
        assert_eq!(loaded.get(7, 6), Color::Gray);
        assert_eq!(loaded.get(6, 7), Color::Gray);
        assert_eq!(loaded.get(7, 7), Color::Gray);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn tovisit_round_trips() {
        let geometry: Geometry<f64> = Geometry::new(256, 1);
        let poly = Polynomial::Z2C {
            c: CParam::point(-1.0_f64, 0.0),
        };
        let mut graph = RevCellGraph::build(&geometry, &poly, 4).unwrap();
        graph.set_tovisit(0, 0, false);
        graph.set_tovisit(1, 1, false);

        let dir = std::env::temp_dir();
        let path = dir.join(format!("juliatsa_test_tovisit_{}.bin", std::process::id()));
        save_tovisit(&graph, &path).unwrap();

        let mut reloaded = RevCellGraph::build(&geometry, &poly, 4).unwrap();
        let ok = load_tovisit(&mut reloaded, &path).unwrap();
        assert!(ok);
        assert!(!reloaded.tovisit(0, 0));
        assert!(!reloaded.tovisit(1, 1));
        assert!(reloaded.tovisit(2, 2));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn convert_legacy_merges_per_row_files_into_one_stream() {
        let n = 32;
        let memwidth = n / crate::grid::CELLS_PER_WORD;
        let dir = std::env::temp_dir().join(format!("juliatsa_test_convert_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let header_path = dir.join("_in.raw_header");
        std::fs::write(&header_path, n.to_le_bytes()).unwrap();

        let part_path = dir.join("_in.raw_0001");
        let mut part = Vec::new();
        part.extend_from_slice(&n.to_le_bytes()); // rows_in_part = n, reusing n for a small test
        for y in 0..n {
            for x in 0..memwidth {
                let word = if y == 5 && x == 0 { BLACK_16 } else { WHITE_16 };
                part.extend_from_slice(&word.to_le_bytes());
            }
        }
        std::fs::write(&part_path, &part).unwrap();

        let out_path = dir.join("_2d.raw");
        convert_legacy(&dir, &out_path).unwrap();
        let loaded = load_raw(&out_path, n).unwrap().unwrap();
        assert_eq!(loaded.get(0, 5), Color::Black);
        assert_eq!(loaded.get(20, 5), Color::White);
        assert_eq!(loaded.get(0, 0), Color::White);

        std::fs::remove_dir_all(&dir).ok();
    }
}
