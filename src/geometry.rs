//! The affine map between grid cell indices and plane coordinates.
//!
//! `xPlane = i·s + R0` where `s = (R1−R0)/N` is a power of two, so
//! dividing by `s` to go back to screen coordinates is an exact multiply
//! by its reciprocal (also a power of two) — never a lossy division.

use crate::error::EngineResult;
use crate::fixed_point::Number;
use crate::interval::PlaneRect;

#[derive(Clone, Copy, Debug)]
pub struct Geometry<T> {
    pub n: i32,
    pub r0: T,
    pub r1: T,
    pub scale: T,
    pub inv_scale: T,
}

impl<T: Number> Geometry<T> {
    pub fn new(n: i32, r1_pow2: u32) -> Self {
        let r1 = T::from_f64((1u64 << r1_pow2) as f64);
        let r0 = T::from_f64(-((1u64 << r1_pow2) as f64));
        let scale = T::from_f64(2.0 * (1u64 << r1_pow2) as f64 / n as f64);
        let inv_scale = T::from_f64(n as f64 / (2.0 * (1u64 << r1_pow2) as f64));
        Geometry {
            n,
            r0,
            r1,
            scale,
            inv_scale,
        }
    }

    /// Plane coordinate of the lower edge of cell index `i`.
    pub fn plane_coord(&self, i: i32) -> EngineResult<T> {
        self.r0.add(T::from_f64(i as f64).mul(self.scale)?)
    }

    /// The plane rectangle spanned by grid cells [x0_cell, x0_cell+width)
    /// × [y0_cell, y0_cell+width).
    pub fn rect_for_cells(&self, x0_cell: i32, y0_cell: i32, width: i32) -> EngineResult<PlaneRect<T>> {
        Ok(PlaneRect {
            x0: self.plane_coord(x0_cell)?,
            x1: self.plane_coord(x0_cell + width)?,
            y0: self.plane_coord(y0_cell)?,
            y1: self.plane_coord(y0_cell + width)?,
        })
    }

    /// Floor a plane coordinate to its lower-left screen (cell) index,
    /// clamped to the grid.
    pub fn scrcoord_as_lowerleft(&self, x: T) -> EngineResult<i32> {
        let offset = x.sub(self.r0)?;
        let idx = offset.mul(self.inv_scale)?.floor_to_i64();
        Ok(idx.clamp(0, (self.n - 1) as i64) as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_coord_round_trips_through_screen_coords() {
        let geom: Geometry<f64> = Geometry::new(1024, 1);
        for i in [0, 1, 512, 1023] {
            let x = geom.plane_coord(i).unwrap();
            let back = geom.scrcoord_as_lowerleft(x).unwrap();
            assert_eq!(back, i);
        }
    }
}
