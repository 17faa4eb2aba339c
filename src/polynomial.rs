//! Bounding-box functions for the supported polynomials.
//!
//! Every rectangle `A` passed to `bbox` is either a single grid cell or a
//! union of grid cells aligned to the power-of-two subdivision of the
//! working square; consequently `A`'s x- and y-ranges never straddle
//! zero (they may touch it at one endpoint). That lets the even-power
//! terms below use the endpoint-only `min(x0^n, x1^n)` / `max(x0^n, x1^n)`
//! form safely — each half of the grid is monotonic in every power of x
//! (and of y) individually.

use crate::error::EngineResult;
use crate::fixed_point::Number;
use crate::interval::{max2, max4, min2, min4, PlaneRect};

/// Parameter c, a point or an interval box (for parameter-space scans).
#[derive(Clone, Copy, Debug)]
pub struct CParam<T> {
    pub re0: T,
    pub re1: T,
    pub im0: T,
    pub im1: T,
}

impl<T: Number> CParam<T> {
    pub fn point(re: T, im: T) -> Self {
        CParam {
            re0: re,
            re1: re,
            im0: im,
            im1: im,
        }
    }
}

/// Parameter A, always a single point (never an interval in this system).
#[derive(Clone, Copy, Debug)]
pub struct AParam<T> {
    pub re: T,
    pub im: T,
}

/// The six supported iterations, tagged by degree. The bounding-box
/// function is a method on this enum rather than a stored function
/// pointer, per the engine's "no process-wide function-pointer slot"
/// design rule.
#[derive(Clone, Copy, Debug)]
pub enum Polynomial<T> {
    Z2C { c: CParam<T> },
    Z2AzC { a: AParam<T>, c: CParam<T> },
    Z3AzC { a: AParam<T>, c: CParam<T> },
    Z4AzC { a: AParam<T>, c: CParam<T> },
    Z5AzC { a: AParam<T>, c: CParam<T> },
    Z6AzC { a: AParam<T>, c: CParam<T> },
}

impl<T: Number> Polynomial<T> {
    pub fn name(&self) -> &'static str {
        match self {
            Polynomial::Z2C { .. } => "Z2C",
            Polynomial::Z2AzC { .. } => "Z2AZC",
            Polynomial::Z3AzC { .. } => "Z3AZC",
            Polynomial::Z4AzC { .. } => "Z4AZC",
            Polynomial::Z5AzC { .. } => "Z5AZC",
            Polynomial::Z6AzC { .. } => "Z6AZC",
        }
    }

    pub fn degree(&self) -> u32 {
        match self {
            Polynomial::Z2C { .. } | Polynomial::Z2AzC { .. } => 2,
            Polynomial::Z3AzC { .. } => 3,
            Polynomial::Z4AzC { .. } => 4,
            Polynomial::Z5AzC { .. } => 5,
            Polynomial::Z6AzC { .. } => 6,
        }
    }

    /// Compute fA such that f(A) ⊆ fA under real interval arithmetic.
    pub fn bbox(&self, a: &PlaneRect<T>) -> EngineResult<PlaneRect<T>> {
        match self {
            Polynomial::Z2C { c } => bbox_z2c(a, c),
            Polynomial::Z2AzC { a: az, c } => bbox_z2azc(a, az, c),
            Polynomial::Z3AzC { a: az, c } => bbox_z3azc(a, az, c),
            Polynomial::Z4AzC { a: az, c } => bbox_z4azc(a, az, c),
            Polynomial::Z5AzC { a: az, c } => bbox_z5azc(a, az, c),
            Polynomial::Z6AzC { a: az, c } => bbox_z6azc(a, az, c),
        }
    }
}

/// Endpoint-only interval of x^n over [lo, hi], valid because the range
/// never straddles zero (see module doc comment).
fn pow_interval<T: Number>(lo: T, hi: T, n: u32) -> EngineResult<(T, T)> {
    let mut lo_pow = lo;
    let mut hi_pow = hi;
    for _ in 1..n {
        lo_pow = lo_pow.mul(lo)?;
        hi_pow = hi_pow.mul(hi)?;
    }
    Ok((min2(lo_pow, hi_pow), max2(lo_pow, hi_pow)))
}

/// Interval product of two independent intervals via all four corners —
/// the general, sign-agnostic form (not simplified, because unlike a
/// scalar-times-interval term, neither factor here is known-monotone
/// against the other).
fn interval_mul<T: Number>(a_lo: T, a_hi: T, b_lo: T, b_hi: T) -> EngineResult<(T, T)> {
    let p00 = a_lo.mul(b_lo)?;
    let p01 = a_lo.mul(b_hi)?;
    let p10 = a_hi.mul(b_lo)?;
    let p11 = a_hi.mul(b_hi)?;
    Ok((min4(p00, p01, p10, p11), max4(p00, p01, p10, p11)))
}

/// Interval of `k * t` for a scalar k over interval [t_lo, t_hi] — linear,
/// so only the two endpoints are needed regardless of k's sign.
fn scalar_mul_interval<T: Number>(k: T, t_lo: T, t_hi: T) -> EngineResult<(T, T)> {
    let p0 = k.mul(t_lo)?;
    let p1 = k.mul(t_hi)?;
    Ok((min2(p0, p1), max2(p0, p1)))
}

fn bbox_z2c<T: Number>(a: &PlaneRect<T>, c: &CParam<T>) -> EngineResult<PlaneRect<T>> {
    let (x2_min, x2_max) = pow_interval(a.x0, a.x1, 2)?;
    let (y2_min, y2_max) = pow_interval(a.y0, a.y1, 2)?;
    let (xy_min, xy_max) = interval_mul(a.x0, a.x1, a.y0, a.y1)?;

    let two = T::from_f64(2.0);
    Ok(PlaneRect {
        x0: x2_min.sub(y2_max)?.add(c.re0)?,
        x1: x2_max.sub(y2_min)?.add(c.re1)?,
        y0: two.mul(xy_min)?.add(c.im0)?,
        y1: two.mul(xy_max)?.add(c.im1)?,
    })
}

fn bbox_z2azc<T: Number>(
    a: &PlaneRect<T>,
    az: &AParam<T>,
    c: &CParam<T>,
) -> EngineResult<PlaneRect<T>> {
    let (x2_min, x2_max) = pow_interval(a.x0, a.x1, 2)?;
    let (y2_min, y2_max) = pow_interval(a.y0, a.y1, 2)?;
    let (xy_min, xy_max) = interval_mul(a.x0, a.x1, a.y0, a.y1)?;
    let (arx_min, arx_max) = scalar_mul_interval(az.re, a.x0, a.x1)?;
    let (aiy_min, aiy_max) = scalar_mul_interval(az.im, a.y0, a.y1)?;
    let (ary_min, ary_max) = scalar_mul_interval(az.re, a.y0, a.y1)?;
    let (aix_min, aix_max) = scalar_mul_interval(az.im, a.x0, a.x1)?;

    let two = T::from_f64(2.0);
    Ok(PlaneRect {
        x0: arx_min.add(x2_min)?.sub(aiy_max)?.sub(y2_max)?.add(c.re0)?,
        x1: arx_max.add(x2_max)?.sub(aiy_min)?.sub(y2_min)?.add(c.re1)?,
        y0: aix_min.add(ary_min)?.add(two.mul(xy_min)?)?.add(c.im0)?,
        y1: aix_max.add(ary_max)?.add(two.mul(xy_max)?)?.add(c.im1)?,
    })
}

fn bbox_z3azc<T: Number>(
    a: &PlaneRect<T>,
    az: &AParam<T>,
    c: &CParam<T>,
) -> EngineResult<PlaneRect<T>> {
    let (x3_min, x3_max) = pow_interval(a.x0, a.x1, 3)?;
    let (y3_min, y3_max) = pow_interval(a.y0, a.y1, 3)?;
    let (y2_min, y2_max) = pow_interval(a.y0, a.y1, 2)?;
    let (x2_min, x2_max) = pow_interval(a.x0, a.x1, 2)?;
    let (arx_min, arx_max) = scalar_mul_interval(az.re, a.x0, a.x1)?;
    let (aiy_min, aiy_max) = scalar_mul_interval(az.im, a.y0, a.y1)?;
    let (ary_min, ary_max) = scalar_mul_interval(az.re, a.y0, a.y1)?;
    let (aix_min, aix_max) = scalar_mul_interval(az.im, a.x0, a.x1)?;
    // cross term x * y^2
    let (xy2_min, xy2_max) = interval_mul(a.x0, a.x1, y2_min, y2_max)?;
    // cross term x^2 * y
    let (x2y_min, x2y_max) = interval_mul(x2_min, x2_max, a.y0, a.y1)?;

    let three = T::from_f64(3.0);
    Ok(PlaneRect {
        x0: arx_min
            .sub(aiy_max)?
            .add(x3_min)?
            .sub(three.mul(xy2_max)?)?
            .add(c.re0)?,
        x1: arx_max
            .sub(aiy_min)?
            .add(x3_max)?
            .sub(three.mul(xy2_min)?)?
            .add(c.re1)?,
        y0: ary_min
            .add(aix_min)?
            .add(three.mul(x2y_min)?)?
            .sub(y3_max)?
            .add(c.im0)?,
        y1: ary_max
            .add(aix_max)?
            .add(three.mul(x2y_max)?)?
            .sub(y3_min)?
            .add(c.im1)?,
    })
}

fn bbox_z4azc<T: Number>(
    a: &PlaneRect<T>,
    az: &AParam<T>,
    c: &CParam<T>,
) -> EngineResult<PlaneRect<T>> {
    let (x2_min, x2_max) = pow_interval(a.x0, a.x1, 2)?;
    let (y2_min, y2_max) = pow_interval(a.y0, a.y1, 2)?;
    let (x3_min, x3_max) = pow_interval(a.x0, a.x1, 3)?;
    let (y3_min, y3_max) = pow_interval(a.y0, a.y1, 3)?;
    let (x4_min, x4_max) = pow_interval(a.x0, a.x1, 4)?;
    let (y4_min, y4_max) = pow_interval(a.y0, a.y1, 4)?;
    let (arx_min, arx_max) = scalar_mul_interval(az.re, a.x0, a.x1)?;
    let (aiy_min, aiy_max) = scalar_mul_interval(az.im, a.y0, a.y1)?;
    let (ary_min, ary_max) = scalar_mul_interval(az.re, a.y0, a.y1)?;
    let (aix_min, aix_max) = scalar_mul_interval(az.im, a.x0, a.x1)?;
    let (x2y2_min, x2y2_max) = interval_mul(x2_min, x2_max, y2_min, y2_max)?;
    let (x3y_min, x3y_max) = interval_mul(x3_min, x3_max, a.y0, a.y1)?;
    let (xy3_min, xy3_max) = interval_mul(a.x0, a.x1, y3_min, y3_max)?;

    let six = T::from_f64(6.0);
    let four = T::from_f64(4.0);
    Ok(PlaneRect {
        x0: arx_min
            .sub(aiy_max)?
            .add(x4_min)?
            .sub(six.mul(x2y2_max)?)?
            .add(y4_min)?
            .add(c.re0)?,
        x1: arx_max
            .sub(aiy_min)?
            .add(x4_max)?
            .sub(six.mul(x2y2_min)?)?
            .add(y4_max)?
            .add(c.re1)?,
        y0: ary_min
            .add(aix_min)?
            .add(four.mul(x3y_min)?)?
            .sub(four.mul(xy3_max)?)?
            .add(c.im0)?,
        y1: ary_max
            .add(aix_max)?
            .add(four.mul(x3y_max)?)?
            .sub(four.mul(xy3_min)?)?
            .add(c.im1)?,
    })
}

fn bbox_z5azc<T: Number>(
    a: &PlaneRect<T>,
    az: &AParam<T>,
    c: &CParam<T>,
) -> EngineResult<PlaneRect<T>> {
    let (x2_min, x2_max) = pow_interval(a.x0, a.x1, 2)?;
    let (x3_min, x3_max) = pow_interval(a.x0, a.x1, 3)?;
    let (y2_min, y2_max) = pow_interval(a.y0, a.y1, 2)?;
    let (y3_min, y3_max) = pow_interval(a.y0, a.y1, 3)?;
    let (y4_min, y4_max) = pow_interval(a.y0, a.y1, 4)?;
    let (x4_min, x4_max) = pow_interval(a.x0, a.x1, 4)?;
    let (x5_min, x5_max) = pow_interval(a.x0, a.x1, 5)?;
    let (y5_min, y5_max) = pow_interval(a.y0, a.y1, 5)?;
    let (arx_min, arx_max) = scalar_mul_interval(az.re, a.x0, a.x1)?;
    let (aiy_min, aiy_max) = scalar_mul_interval(az.im, a.y0, a.y1)?;
    let (ary_min, ary_max) = scalar_mul_interval(az.re, a.y0, a.y1)?;
    let (aix_min, aix_max) = scalar_mul_interval(az.im, a.x0, a.x1)?;
    let (x3y2_min, x3y2_max) = interval_mul(x3_min, x3_max, y2_min, y2_max)?;
    let (xy4_min, xy4_max) = interval_mul(a.x0, a.x1, y4_min, y4_max)?;
    let (x4y_min, x4y_max) = interval_mul(x4_min, x4_max, a.y0, a.y1)?;
    let (x2y3_min, x2y3_max) = interval_mul(x2_min, x2_max, y3_min, y3_max)?;

    let ten = T::from_f64(10.0);
    let five = T::from_f64(5.0);
    Ok(PlaneRect {
        x0: arx_min
            .sub(aiy_max)?
            .add(x5_min)?
            .sub(ten.mul(x3y2_max)?)?
            .add(five.mul(xy4_min)?)?
            .add(c.re0)?,
        x1: arx_max
            .sub(aiy_min)?
            .add(x5_max)?
            .sub(ten.mul(x3y2_min)?)?
            .add(five.mul(xy4_max)?)?
            .add(c.re1)?,
        y0: ary_min
            .add(aix_min)?
            .add(five.mul(x4y_min)?)?
            .sub(ten.mul(x2y3_max)?)?
            .add(y5_min)?
            .add(c.im0)?,
        y1: ary_max
            .add(aix_max)?
            .add(five.mul(x4y_max)?)?
            .sub(ten.mul(x2y3_min)?)?
            .add(y5_max)?
            .add(c.im1)?,
    })
}

fn bbox_z6azc<T: Number>(
    a: &PlaneRect<T>,
    az: &AParam<T>,
    c: &CParam<T>,
) -> EngineResult<PlaneRect<T>> {
    let (x2_min, x2_max) = pow_interval(a.x0, a.x1, 2)?;
    let (y2_min, y2_max) = pow_interval(a.y0, a.y1, 2)?;
    let (x4_min, x4_max) = pow_interval(a.x0, a.x1, 4)?;
    let (y4_min, y4_max) = pow_interval(a.y0, a.y1, 4)?;
    let (x5_min, x5_max) = pow_interval(a.x0, a.x1, 5)?;
    let (y5_min, y5_max) = pow_interval(a.y0, a.y1, 5)?;
    let (x6_min, x6_max) = pow_interval(a.x0, a.x1, 6)?;
    let (y6_min, y6_max) = pow_interval(a.y0, a.y1, 6)?;
    let (x3_min, x3_max) = pow_interval(a.x0, a.x1, 3)?;
    let (y3_min, y3_max) = pow_interval(a.y0, a.y1, 3)?;
    let (arx_min, arx_max) = scalar_mul_interval(az.re, a.x0, a.x1)?;
    let (aiy_min, aiy_max) = scalar_mul_interval(az.im, a.y0, a.y1)?;
    let (ary_min, ary_max) = scalar_mul_interval(az.re, a.y0, a.y1)?;
    let (aix_min, aix_max) = scalar_mul_interval(az.im, a.x0, a.x1)?;
    let (x4y2_min, x4y2_max) = interval_mul(x4_min, x4_max, y2_min, y2_max)?;
    let (x2y4_min, x2y4_max) = interval_mul(x2_min, x2_max, y4_min, y4_max)?;
    let (x5y_min, x5y_max) = interval_mul(x5_min, x5_max, a.y0, a.y1)?;
    let (xy5_min, xy5_max) = interval_mul(a.x0, a.x1, y5_min, y5_max)?;
    let (x3y3_min, x3y3_max) = interval_mul(x3_min, x3_max, y3_min, y3_max)?;

    let fifteen = T::from_f64(15.0);
    let six = T::from_f64(6.0);
    let twenty = T::from_f64(20.0);
    Ok(PlaneRect {
        x0: arx_min
            .sub(aiy_max)?
            .add(x6_min)?
            .sub(fifteen.mul(x4y2_max)?)?
            .add(fifteen.mul(x2y4_min)?)?
            .sub(y6_max)?
            .add(c.re0)?,
        x1: arx_max
            .sub(aiy_min)?
            .add(x6_max)?
            .sub(fifteen.mul(x4y2_min)?)?
            .add(fifteen.mul(x2y4_max)?)?
            .sub(y6_min)?
            .add(c.re1)?,
        y0: ary_min
            .add(aix_min)?
            .add(six.mul(x5y_min)?)?
            .sub(twenty.mul(x3y3_max)?)?
            .add(six.mul(xy5_min)?)?
            .add(c.im0)?,
        y1: ary_max
            .add(aix_max)?
            .add(six.mul(x5y_max)?)?
            .sub(twenty.mul(x3y3_min)?)?
            .add(six.mul(xy5_max)?)?
            .add(c.im1)?,
    })
}

/// Whether the number type can represent intermediate products at the
/// requested precision for a given (degree, range exponent, refinement
/// level). Grounded in the
/// original's `bitsSufficient`/`setfunc_and_bitprecision` table: a Q32.96
/// fixed-point value has headroom for `32 - range_log2` bits of integer
/// growth before the highest-degree monomial (x^degree, scaled by the
/// range) can overflow the 32-bit integer limb.
pub fn feasibility_warning(degree: u32, range_log2: u32, refinement_log2: u32) -> Option<String> {
    let growth_bits = degree.saturating_mul(range_log2);
    if growth_bits > 28 || refinement_log2 > 31 {
        Some(format!(
            "degree {degree} at range 2^{range_log2} may exhaust the 96-bit fractional precision \
             at refinement level {refinement_log2}; proceeding with more residual gray expected"
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn z2c_degenerate_rectangle_is_tight() {
        let a = PlaneRect {
            x0: 0.5_f64,
            x1: 0.5,
            y0: 0.25,
            y1: 0.25,
        };
        let c = CParam::point(-1.0_f64, 0.0);
        let fa = bbox_z2c(&a, &c).unwrap();
        // f(0.5+0.25i) = (0.5+0.25i)^2 - 1 = (0.25-0.0625) + 2*0.5*0.25 i - 1
        let expected_re = 0.25 - 0.0625 - 1.0;
        let expected_im = 2.0 * 0.5 * 0.25;
        assert!((fa.x0 - expected_re).abs() < 1e-9);
        assert!((fa.x1 - expected_re).abs() < 1e-9);
        assert!((fa.y0 - expected_im).abs() < 1e-9);
        assert!((fa.y1 - expected_im).abs() < 1e-9);
    }

    #[test]
    fn z2c_bbox_contains_sampled_images() {
        let a = PlaneRect {
            x0: -0.5_f64,
            x1: 1.0,
            y0: 0.25,
            y1: 1.5,
        };
        let c = CParam::point(-0.75_f64, 0.1);
        let fa = bbox_z2c(&a, &c).unwrap();
        for i in 0..=8 {
            for j in 0..=8 {
                let x = a.x0 + (a.x1 - a.x0) * (i as f64 / 8.0);
                let y = a.y0 + (a.y1 - a.y0) * (j as f64 / 8.0);
                let re = x * x - y * y + c.re0;
                let im = 2.0 * x * y + c.im0;
                assert!(re >= fa.x0 - 1e-9 && re <= fa.x1 + 1e-9);
                assert!(im >= fa.y0 - 1e-9 && im <= fa.y1 + 1e-9);
            }
        }
    }

    #[test]
    fn z3azc_reduces_to_z3_when_a_is_zero() {
        let a = PlaneRect {
            x0: 0.2_f64,
            x1: 0.3,
            y0: -0.1,
            y1: 0.1,
        };
        let az = AParam { re: 0.0, im: 0.0 };
        let c = CParam::point(0.0_f64, 0.0);
        let fa = bbox_z3azc(&a, &az, &c).unwrap();
        // Re(z^3) at the upper-right corner.
        let x = a.x1;
        let y = a.y1;
        let re = x * x * x - 3.0 * x * y * y;
        assert!(re <= fa.x1 + 1e-9);
    }

    #[test]
    fn feasibility_warns_for_deep_refinement_high_degree() {
        assert!(feasibility_warning(6, 5, 30).is_some());
        assert!(feasibility_warning(2, 1, 10).is_none());
    }
}
