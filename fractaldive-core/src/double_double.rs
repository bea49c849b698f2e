use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// A double-double number: the unevaluated sum `hi + lo` of two `f64`s.
///
/// After every operation the pair is renormalized with [`quick_two_sum`] so
/// that `|lo| ≤ ½ ulp(hi)`. This roughly doubles the significant digits of
/// a plain `f64` (~31 decimal digits) without any allocation.
///
/// There are no failure modes: pathological scalar magnitudes (overflow in
/// `hi`, subnormal `lo`) only degrade precision. Usable precision runs out
/// somewhere past 1e28× magnification.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DoubleDouble {
    pub hi: f64,
    pub lo: f64,
}

// ---------------------------------------------------------------------------
// Error-free transformations
// ---------------------------------------------------------------------------

/// Knuth's TwoSum: `s + e == a + b` exactly, for any magnitudes.
#[inline]
pub fn two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    let v = s - a;
    let e = (a - (s - v)) + (b - v);
    (s, e)
}

/// Dekker's FastTwoSum. Exact only when `|a| >= |b|`; the caller guarantees it.
#[inline]
pub fn quick_two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    let e = b - (s - a);
    (s, e)
}

/// FMA-based TwoProd: `p + e == a * b` exactly.
#[inline]
fn two_prod(a: f64, b: f64) -> (f64, f64) {
    let p = a * b;
    let e = a.mul_add(b, -p);
    (p, e)
}

impl DoubleDouble {
    pub const ZERO: Self = Self { hi: 0.0, lo: 0.0 };
    pub const ONE: Self = Self { hi: 1.0, lo: 0.0 };

    /// Build from two words, renormalizing so the invariant holds.
    #[inline]
    pub fn new(hi: f64, lo: f64) -> Self {
        let (hi, lo) = two_sum(hi, lo);
        Self { hi, lo }
    }

    /// Collapse to a single `f64`. Only use where coarse precision suffices.
    #[inline]
    pub fn to_f64(self) -> f64 {
        self.hi + self.lo
    }

    /// `self + s` for a plain scalar.
    #[inline]
    pub fn add_f64(self, s: f64) -> Self {
        let (s1, s2) = two_sum(self.hi, s);
        let s2 = s2 + self.lo;
        let (hi, lo) = quick_two_sum(s1, s2);
        Self { hi, lo }
    }

    /// `self * s` for a plain scalar.
    #[inline]
    pub fn mul_f64(self, s: f64) -> Self {
        let (p1, p2) = two_prod(self.hi, s);
        let p2 = p2 + self.lo * s;
        let (hi, lo) = quick_two_sum(p1, p2);
        Self { hi, lo }
    }

    #[inline]
    pub fn sqr(self) -> Self {
        let (p1, p2) = two_prod(self.hi, self.hi);
        let p2 = p2 + 2.0 * self.hi * self.lo;
        let (hi, lo) = quick_two_sum(p1, p2);
        Self { hi, lo }
    }

    #[inline]
    pub fn abs(self) -> Self {
        if self.is_negative() {
            -self
        } else {
            self
        }
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self.hi < 0.0 || (self.hi == 0.0 && self.lo < 0.0)
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.hi.is_finite() && self.lo.is_finite()
    }
}

impl From<f64> for DoubleDouble {
    #[inline]
    fn from(val: f64) -> Self {
        Self { hi: val, lo: 0.0 }
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

impl Add for DoubleDouble {
    type Output = Self;

    /// Accurate (IEEE-style) double-double addition.
    #[inline]
    fn add(self, rhs: Self) -> Self {
        let (s1, s2) = two_sum(self.hi, rhs.hi);
        let (t1, t2) = two_sum(self.lo, rhs.lo);
        let (s1, s2) = quick_two_sum(s1, s2 + t1);
        let (hi, lo) = quick_two_sum(s1, s2 + t2);
        Self { hi, lo }
    }
}

impl Add<f64> for DoubleDouble {
    type Output = Self;

    #[inline]
    fn add(self, rhs: f64) -> Self {
        self.add_f64(rhs)
    }
}

impl AddAssign for DoubleDouble {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for DoubleDouble {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl SubAssign for DoubleDouble {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Mul for DoubleDouble {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let (p1, p2) = two_prod(self.hi, rhs.hi);
        let p2 = p2 + (self.hi * rhs.lo + self.lo * rhs.hi);
        let (hi, lo) = quick_two_sum(p1, p2);
        Self { hi, lo }
    }
}

impl Mul<f64> for DoubleDouble {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f64) -> Self {
        self.mul_f64(rhs)
    }
}

impl MulAssign for DoubleDouble {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl Neg for DoubleDouble {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self {
            hi: -self.hi,
            lo: -self.lo,
        }
    }
}

impl PartialEq for DoubleDouble {
    fn eq(&self, other: &Self) -> bool {
        self.hi == other.hi && self.lo == other.lo
    }
}

impl PartialOrd for DoubleDouble {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.hi.partial_cmp(&other.hi) {
            Some(Ordering::Equal) => self.lo.partial_cmp(&other.lo),
            ord => ord,
        }
    }
}

impl fmt::Display for DoubleDouble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:+.17e} {:+.17e})", self.hi, self.lo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dd(val: f64) -> DoubleDouble {
        DoubleDouble::from(val)
    }

    #[test]
    fn two_sum_is_exact() {
        let (s, e) = two_sum(1.0, 1e-20);
        assert_eq!(s, 1.0);
        assert_eq!(e, 1e-20);
        // Order of magnitudes does not matter.
        let (s, e) = two_sum(1e-20, 1.0);
        assert_eq!(s, 1.0);
        assert_eq!(e, 1e-20);
    }

    #[test]
    fn quick_two_sum_when_ordered() {
        let (s, e) = quick_two_sum(1.0, 1e-20);
        assert_eq!((s, e), (1.0, 1e-20));
    }

    #[test]
    fn new_renormalizes() {
        let d = DoubleDouble::new(1e-20, 1.0);
        assert_eq!(d.hi, 1.0);
        assert_eq!(d.lo, 1e-20);
    }

    #[test]
    fn small_addend_survives() {
        // In f64, 1.0 + 1e-17 == 1.0.
        let sum = dd(1.0) + dd(1e-17);
        let diff = (sum - dd(1.0)).to_f64();
        assert!((diff - 1e-17).abs() < 1e-32, "got {diff}");
    }

    #[test]
    fn add_scalar_matches_add() {
        let a = DoubleDouble::new(3.0, 1e-18);
        assert_eq!(a.add_f64(2.5), a + dd(2.5));
        assert_eq!(a + 2.5, a + dd(2.5));
    }

    #[test]
    fn scalar_multiplication_keeps_low_word() {
        let a = DoubleDouble::new(1.0, 1e-20);
        let b = a.mul_f64(3.0);
        assert_eq!(b.hi, 3.0);
        assert!((b.lo - 3e-20).abs() < 1e-35);
    }

    #[test]
    fn catastrophic_cancellation() {
        let a = DoubleDouble::new(1.0, 1e-20);
        let val = (a - dd(1.0)).to_f64();
        assert!((val - 1e-20).abs() < 1e-35, "got {val}");
    }

    #[test]
    fn multiplication_retains_cross_term() {
        // (1 + 1e-16)² = 1 + 2e-16 + 1e-32
        let x = DoubleDouble::new(1.0, 1e-16);
        let sq = x * x;
        let expected = DoubleDouble::new(1.0, 2e-16) + dd(1e-32);
        assert!((sq - expected).abs().hi < 1e-31, "{sq} vs {expected}");
        assert_eq!(x.sqr(), sq);
    }

    #[test]
    fn ordering_uses_low_word() {
        assert!(DoubleDouble::new(1.0, 1e-17) > dd(1.0));
        assert!(dd(-1.0) < dd(1.0));
        assert!(dd(-2.0).is_negative());
        assert_eq!(dd(-2.0).abs(), dd(2.0));
    }

    #[test]
    fn chained_addition_drifts_less_than_f64() {
        const N: usize = 100_000;
        let step = 0.1;

        let mut naive = 0.0f64;
        let mut acc = DoubleDouble::ZERO;
        for _ in 0..N {
            naive += step;
            acc = acc.add_f64(step);
        }

        let exact = dd(step).mul_f64(N as f64);
        let naive_err = (dd(naive) - exact).abs().to_f64();
        let dd_err = (acc - exact).abs().to_f64();
        assert!(naive_err > 0.0);
        assert!(
            dd_err * 1e3 < naive_err,
            "double-double drift {dd_err} should be far below f64 drift {naive_err}"
        );
    }

    proptest! {
        #[test]
        fn add_round_trips_to_f64_sum(a in -1e300f64..1e300, b in -1e300f64..1e300) {
            prop_assert_eq!((dd(a) + dd(b)).to_f64(), a + b);
        }

        #[test]
        fn subtract_then_add_restores(a in -1e12f64..1e12, b in -1e12f64..1e12) {
            let r = (dd(a) - dd(b)) + dd(b);
            prop_assert_eq!(r.to_f64(), a);
        }
    }
}
