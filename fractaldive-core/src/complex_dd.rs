use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::complex::Complex;
use crate::double_double::DoubleDouble;

/// A complex number with double-double components.
///
/// Holds view centers and reference points, whose coordinates need more
/// than 53 bits once the view is deeper than ~1e13×.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ComplexDD {
    pub re: DoubleDouble,
    pub im: DoubleDouble,
}

impl ComplexDD {
    pub const ZERO: Self = Self {
        re: DoubleDouble::ZERO,
        im: DoubleDouble::ZERO,
    };

    #[inline]
    pub fn new(re: DoubleDouble, im: DoubleDouble) -> Self {
        Self { re, im }
    }

    #[inline]
    pub fn from_f64(re: f64, im: f64) -> Self {
        Self {
            re: DoubleDouble::from(re),
            im: DoubleDouble::from(im),
        }
    }

    #[inline]
    pub fn norm_sq(self) -> DoubleDouble {
        self.re.sqr() + self.im.sqr()
    }

    #[inline]
    pub fn sqr(self) -> Self {
        Self {
            re: self.re.sqr() - self.im.sqr(),
            im: (self.re * self.im).mul_f64(2.0),
        }
    }

    #[inline]
    pub fn conj(self) -> Self {
        Self {
            re: self.re,
            im: -self.im,
        }
    }

    #[inline]
    pub fn abs_components(self) -> Self {
        Self {
            re: self.re.abs(),
            im: self.im.abs(),
        }
    }

    /// Downcast to an `f64` complex.
    #[inline]
    pub fn to_complex(self) -> Complex {
        Complex::new(self.re.to_f64(), self.im.to_f64())
    }

    /// `self + delta`, with the delta in plain `f64`.
    #[inline]
    pub fn offset(self, delta: Complex) -> Self {
        Self {
            re: self.re.add_f64(delta.re),
            im: self.im.add_f64(delta.im),
        }
    }

    /// `self - other` collapsed to `f64`; exact enough whenever the two
    /// points are close, which is the only place it's used.
    #[inline]
    pub fn delta_from(self, other: Self) -> Complex {
        (self - other).to_complex()
    }
}

impl From<Complex> for ComplexDD {
    #[inline]
    fn from(c: Complex) -> Self {
        Self::from_f64(c.re, c.im)
    }
}

impl Add for ComplexDD {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            re: self.re + rhs.re,
            im: self.im + rhs.im,
        }
    }
}

impl Sub for ComplexDD {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self {
            re: self.re - rhs.re,
            im: self.im - rhs.im,
        }
    }
}

impl Mul for ComplexDD {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self {
            re: self.re * rhs.re - self.im * rhs.im,
            im: self.re * rhs.im + self.im * rhs.re,
        }
    }
}

impl Mul<f64> for ComplexDD {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f64) -> Self {
        Self {
            re: self.re.mul_f64(rhs),
            im: self.im.mul_f64(rhs),
        }
    }
}

impl Neg for ComplexDD {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self {
            re: -self.re,
            im: -self.im,
        }
    }
}

impl std::fmt::Display for ComplexDD {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} + {}·i", self.re, self.im)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cdd(re: f64, im: f64) -> ComplexDD {
        ComplexDD::from_f64(re, im)
    }

    #[test]
    fn multiplication_matches_f64() {
        let c = cdd(1.0, 2.0) * cdd(3.0, 4.0);
        assert_eq!(c.to_complex(), Complex::new(-5.0, 10.0));
    }

    #[test]
    fn sqr_matches_mul() {
        let z = cdd(0.5, -0.25);
        assert_eq!(z.sqr().to_complex(), (z * z).to_complex());
    }

    #[test]
    fn offset_and_delta_round_trip() {
        let center = ComplexDD::new(
            DoubleDouble::new(-0.75, 1e-20),
            DoubleDouble::new(0.1, -3e-21),
        );
        let delta = Complex::new(1e-25, -2e-25);
        let moved = center.offset(delta);
        let back = moved.delta_from(center);
        assert!((back.re - delta.re).abs() < 1e-40);
        assert!((back.im - delta.im).abs() < 1e-40);
    }

    #[test]
    fn offsets_below_f64_resolution_are_distinct() {
        let center = cdd(-1.25, 0.0);
        let a = center.offset(Complex::new(1e-20, 0.0));
        let b = center.offset(Complex::new(2e-20, 0.0));
        assert_eq!(a.to_complex(), b.to_complex());
        assert!(b.re > a.re, "double-double must tell the two points apart");
    }
}
