//! BMP output: a 4-bit tiled palette image for N ≤ 65536, an 8-bit
//! trustworthily-downsampled image for N > 65536, and an 8-bit
//! periodicity heat map over resolved Fatou components.
//!
//! "Trustworthy" downsampling means a block of `2^k × 2^k` source cells
//! collapses to GRAY unless every cell in the block agrees exactly (and
//! none of them is GRAY-POTENTIALLY-WHITE, which cannot be summarized
//! honestly) — never averaged, never interpolated.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};
use crate::grid::{Color, Grid};
use crate::periodicity::{PeriodicPointRegion, PeriodicityReport};

const MAX_BITMAP_BYTES: i64 = 1i64 << 31;

fn io_err(path: &Path, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn write_bmp_header(
    w: &mut impl Write,
    path: &Path,
    width: u32,
    height: u32,
    bitcount: u16,
    palette: &[[u8; 3]],
) -> EngineResult<()> {
    let palette_bytes = (palette.len() * 4) as u32;
    let off = 14 + 40 + palette_bytes;
    let row_bytes = match bitcount {
        4 => {
            let raw = (width + 1) / 2;
            raw.div_ceil(4) * 4
        }
        8 => width.div_ceil(4) * 4,
        _ => unreachable!("only 4-bit and 8-bit palette bitmaps are produced"),
    };
    let filelen = off + row_bytes * height;

    let mut write_bytes = |bytes: &[u8]| -> EngineResult<()> { w.write_all(bytes).map_err(|e| io_err(path, e)) };

    write_bytes(b"BM")?;
    write_bytes(&filelen.to_le_bytes())?;
    write_bytes(&[0u8; 4])?;
    write_bytes(&off.to_le_bytes())?;
    write_bytes(&40u32.to_le_bytes())?;
    write_bytes(&width.to_le_bytes())?;
    write_bytes(&height.to_le_bytes())?;
    write_bytes(&1u16.to_le_bytes())?;
    write_bytes(&bitcount.to_le_bytes())?;
    write_bytes(&0u32.to_le_bytes())?; // compression
    write_bytes(&0u32.to_le_bytes())?; // image size (unspecified, as original)
    write_bytes(&2835u32.to_le_bytes())?; // x ppm
    write_bytes(&2835u32.to_le_bytes())?; // y ppm
    write_bytes(&(palette.len() as u32).to_le_bytes())?;
    write_bytes(&0u32.to_le_bytes())?; // colors important

    for &[r, g, b] in palette {
        write_bytes(&[b, g, r, 0])?;
    }
    Ok(())
}

fn base_palette16() -> [[u8; 3]; 16] {
    let mut pal = [[0u8; 3]; 16];
    pal[Color::Gray as usize] = [127, 127, 127];
    pal[Color::Black as usize] = [0, 0, 0];
    pal[Color::White as usize] = [255, 255, 255];
    pal
}

/// The code written into the nibble/byte for one cell: GRAY-POTENTIALLY-
/// WHITE collapses into GRAY, since a bare image format has no way to
/// flag "gray but provably cannot deepen to black".
fn render_code(color: Color) -> u8 {
    match color {
        Color::GrayPotentiallyWhite => Color::Gray as u8,
        other => other as u8,
    }
}

/// Choose the largest tile width (a power of two ≤ N) whose bitmap stays
/// under the 2 GiB cap at 4 bits per pixel.
fn choose_tile_width(n: i32) -> i32 {
    let mut width = n;
    while width > 16 {
        let bytes_per_row = (width / 2) as i64;
        if bytes_per_row * width as i64 > MAX_BITMAP_BYTES {
            width /= 2;
        } else {
            break;
        }
    }
    width
}

/// Save the grid as one or more 4-bit BMP tiles under `prefix`, returning
/// the paths written.
pub fn save_bitmap4(grid: &Grid, prefix: &Path) -> EngineResult<Vec<PathBuf>> {
    let n = grid.width();
    let tile_width = choose_tile_width(n);
    let palette = base_palette16();
    let bytes_per_row = {
        let raw = (tile_width as u32 + 1) / 2;
        raw.div_ceil(4) * 4
    } as usize;

    let mut written = Vec::new();
    let mut cy = 0;
    let mut fy = 0;
    while fy < n {
        let mut cx = 0;
        let mut fx = 0;
        while fx < n {
            let path = prefix.with_extension("").with_file_name(format!(
                "{}_Y{:02}X{:02}.bmp",
                prefix.file_stem().and_then(|s| s.to_str()).unwrap_or("juliatsa"),
                cy,
                cx
            ));
            let file = File::create(&path).map_err(|e| io_err(&path, e))?;
            let mut w = BufWriter::new(file);
            write_bmp_header(&mut w, &path, tile_width as u32, tile_width as u32, 4, &palette)?;

            let mut row = vec![0u8; bytes_per_row];
            for y in fy..(fy + tile_width) {
                row.iter_mut().for_each(|b| *b = 0);
                let mut xpos = 0usize;
                let mut x = fx;
                while x < fx + tile_width {
                    let hi = render_code(grid.get(x, y));
                    let lo = if x + 1 < fx + tile_width {
                        render_code(grid.get(x + 1, y))
                    } else {
                        0
                    };
                    row[xpos] = (hi << 4) | lo;
                    xpos += 1;
                    x += 2;
                }
                w.write_all(&row).map_err(|e| io_err(&path, e))?;
            }
            written.push(path);
            cx += 1;
            fx += tile_width;
        }
        cy += 1;
        fy += tile_width;
    }
    Ok(written)
}

/// Save a trustworthily-downsampled 8-bit BMP: a `2^exponent`-wide block
/// of source cells collapses to a single output pixel only if every cell
/// in the block agrees and none is GRAY-POTENTIALLY-WHITE; otherwise the
/// output pixel is GRAY.
pub fn save_bitmap4_twd(grid: &Grid, prefix: &Path, exponent: u32) -> EngineResult<PathBuf> {
    let n = grid.width();
    let step = 1i32 << exponent;
    let out_width = n / step;
    let mut palette = [[0u8; 3]; 256];
    palette[Color::Gray as usize] = [127, 127, 127];
    palette[Color::Black as usize] = [0, 0, 0];
    palette[Color::White as usize] = [255, 255, 255];

    let path = prefix.with_file_name(format!(
        "{}_2_{}-fold.bmp",
        prefix.file_stem().and_then(|s| s.to_str()).unwrap_or("juliatsa"),
        exponent
    ));
    let file = File::create(&path).map_err(|e| io_err(&path, e))?;
    let mut w = BufWriter::new(file);
    write_bmp_header(&mut w, &path, out_width as u32, out_width as u32, 8, &palette)?;

    let row_bytes = (out_width as u32).div_ceil(4) as usize * 4;
    let mut row = vec![0u8; row_bytes];
    let mut y = 0;
    while y < n {
        row.iter_mut().for_each(|b| *b = 0);
        let mut xpos = 0usize;
        let mut x = 0;
        while x < n {
            let mut agreed: Option<Color> = None;
            let mut gray = false;
            'block: for dy in 0..step {
                for dx in 0..step {
                    let c = grid.get(x + dx, y + dy);
                    if c == Color::GrayPotentiallyWhite {
                        gray = true;
                        break 'block;
                    }
                    match agreed {
                        None => agreed = Some(c),
                        Some(prev) if prev != c => {
                            gray = true;
                            break 'block;
                        }
                        _ => {}
                    }
                }
            }
            row[xpos] = if gray { Color::Gray as u8 } else { agreed.map(|c| c as u8).unwrap_or(Color::Gray as u8) };
            xpos += 1;
            x += step;
        }
        w.write_all(&row).map_err(|e| io_err(&path, e))?;
        y += step;
    }
    Ok(path)
}

/// Whether the grid needs the downsampled 8-bit path (N > 65536).
pub fn needs_downsampling(n: i32) -> Option<u32> {
    let mut exponent = 0u32;
    let mut width = n as i64;
    while width > 65536 {
        exponent += 1;
        width >>= 1;
    }
    if exponent > 0 {
        Some(exponent)
    } else {
        None
    }
}

/// A shuffled hue rotation used to assign visually distinct colors to
/// successive periodic cycles — a heat map, not a perceptually uniform
/// palette.
fn heat_color(d: f64) -> [u8; 3] {
    let h = d * 6.0;
    let i = h.floor() as i32 % 6;
    let f = h - h.floor();
    let q = 1.0 - f;
    let (r, g, b) = match i {
        0 => (1.0, f, 0.0),
        1 => (q, 1.0, 0.0),
        2 => (0.0, 1.0, f),
        3 => (0.0, q, 1.0),
        4 => (f, 0.0, 1.0),
        _ => (1.0, 0.0, q),
    };
    [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]
}

/// Build the periodicity palette: fixed entries for the terminal colors,
/// then two rotating heat-map entries (full brightness for the immediate
/// basin, two-thirds brightness for the attraction basin) per cycle.
fn periodicity_palette(cycle_count: usize) -> [[u8; 3]; 256] {
    let mut pal = [[0u8; 3]; 256];
    pal[Color::Black as usize] = [0, 0, 0];
    pal[Color::White as usize] = [255, 255, 255];
    pal[Color::Gray as usize] = [127, 127, 127];
    pal[Color::GrayPotentiallyWhite as usize] = [255, 0, 0];

    const OFFSET: usize = 4;
    let mut d = 0.0;
    let dst = 0.19;
    for i in 0..cycle_count.min((256 - OFFSET) / 2) {
        let [r, g, b] = heat_color(d);
        pal[OFFSET + 2 * i] = [r, g, b];
        pal[OFFSET + 2 * i + 1] = [(r as f64 * 0.67) as u8, (g as f64 * 0.67) as u8, (b as f64 * 0.67) as u8];
        d += dst;
        while d >= 1.0 {
            d -= 1.0;
        }
    }
    pal
}

/// Render the periodicity report: every BLACK cell is colored by which
/// cycle's immediate or attraction basin it belongs to.
pub fn save_bitmap_periodicity(grid: &Grid, report: &PeriodicityReport, prefix: &Path) -> EngineResult<PathBuf> {
    let n = grid.width();
    let palette = periodicity_palette(report.cycles.len());

    // cell -> palette index, built once from the resolved components.
    let mut color_index = vec![vec![render_code(Color::White); n as usize]; n as usize];
    for y in 0..n {
        for x in 0..n {
            color_index[y as usize][x as usize] = render_code(grid.get(x, y));
        }
    }
    for component in &report.components {
        let idx = (4 + 2 * component.cycle + if component.is_immediate { 0 } else { 1 }).min(255);
        for y in component.y0..=component.y1 {
            for x in component.x0..=component.x1 {
                color_index[y as usize][x as usize] = idx as u8;
            }
        }
    }

    let path = prefix.with_file_name(format!(
        "{}_period.bmp",
        prefix.file_stem().and_then(|s| s.to_str()).unwrap_or("juliatsa")
    ));
    let file = File::create(&path).map_err(|e| io_err(&path, e))?;
    let mut w = BufWriter::new(file);
    write_bmp_header(&mut w, &path, n as u32, n as u32, 8, &palette)?;

    let row_bytes = (n as u32).div_ceil(4) as usize * 4;
    let mut row = vec![0u8; row_bytes];
    for y in 0..n {
        row.iter_mut().for_each(|b| *b = 0);
        for x in 0..n {
            row[x as usize] = color_index[y as usize][x as usize];
        }
        w.write_all(&row).map_err(|e| io_err(&path, e))?;
    }
    Ok(path)
}

/// Render the periodic-point search result: the same terminal-color
/// base image as [`save_bitmap_periodicity`], with each reported
/// region's rectangle overlaid in its cycle's immediate-basin color.
pub fn save_bitmap_periodic_points(grid: &Grid, cycle_count: usize, regions: &[PeriodicPointRegion], prefix: &Path) -> EngineResult<PathBuf> {
    let n = grid.width();
    let palette = periodicity_palette(cycle_count);

    let mut color_index = vec![vec![render_code(Color::White); n as usize]; n as usize];
    for y in 0..n {
        for x in 0..n {
            color_index[y as usize][x as usize] = render_code(grid.get(x, y));
        }
    }
    for region in regions {
        let idx = (4 + 2 * region.cycle).min(255);
        for y in region.y0..=region.y1 {
            for x in region.x0..=region.x1 {
                color_index[y as usize][x as usize] = idx as u8;
            }
        }
    }

    let path = prefix.with_file_name(format!(
        "{}_periodic_points.bmp",
        prefix.file_stem().and_then(|s| s.to_str()).unwrap_or("juliatsa")
    ));
    let file = File::create(&path).map_err(|e| io_err(&path, e))?;
    let mut w = BufWriter::new(file);
    write_bmp_header(&mut w, &path, n as u32, n as u32, 8, &palette)?;

    let row_bytes = (n as u32).div_ceil(4) as usize * 4;
    let mut row = vec![0u8; row_bytes];
    for y in 0..n {
        row.iter_mut().for_each(|b| *b = 0);
        for x in 0..n {
            row[x as usize] = color_index[y as usize][x as usize];
        }
        w.write_all(&row).map_err(|e| io_err(&path, e))?;
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;

    #[test]
    fn tiled_bitmap_writes_one_file_for_small_grids() {
        let n = 32;
        let mut arena = Arena::new("rows", 1 << 30);
        let mut grid = Grid::new(n, &mut arena).unwrap();
        for y in 0..n {
            for x in 0..n {
                grid.set(x, y, Color::White).unwrap();
            }
        }
        let dir = std::env::temp_dir().join(format!("juliatsa_bmp_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let prefix = dir.join("out");
        let paths = save_bitmap4(&grid, &prefix).unwrap();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn downsample_needed_only_above_65536() {
        assert!(needs_downsampling(1024).is_none());
        assert_eq!(needs_downsampling(1 << 17), Some(1));
    }

    #[test]
    fn choose_tile_width_stays_under_2gib() {
        let w = choose_tile_width(1 << 20);
        assert!((w as i64 / 2) * w as i64 <= MAX_BITMAP_BYTES);
    }
}
