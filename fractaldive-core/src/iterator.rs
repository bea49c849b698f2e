//! Direct escape-time iteration for every [`FractalSet`] family.
//!
//! One generic loop serves both `f64` ([`Complex`]) and double-double
//! ([`ComplexDD`]) orbits. The family is matched once per call and turned
//! into a monomorphized step closure, so the inner loop never branches on
//! the discriminant.

use std::ops::Add;

use crate::complex::Complex;
use crate::complex_dd::ComplexDD;
use crate::fractal::{FractalSet, IterationParams, PixelResult};

/// Iterations between periodicity checkpoints.
const PERIOD_CHECK_INTERVAL: u32 = 20;

/// Arithmetic an orbit value must provide for the shared loop.
trait OrbitValue: Copy + PartialEq + Add<Output = Self> {
    fn sqr(self) -> Self;
    fn conj(self) -> Self;
    fn abs_components(self) -> Self;
    fn powf(self, power: f64) -> Self;
    /// Coarse magnitude for the bailout comparison.
    fn norm_sq_f64(self) -> f64;
    fn to_complex(self) -> Complex;
}

impl OrbitValue for Complex {
    #[inline]
    fn sqr(self) -> Self {
        Complex::sqr(self)
    }
    #[inline]
    fn conj(self) -> Self {
        Complex::conj(self)
    }
    #[inline]
    fn abs_components(self) -> Self {
        Complex::abs_components(self)
    }
    #[inline]
    fn powf(self, power: f64) -> Self {
        Complex::powf(self, power)
    }
    #[inline]
    fn norm_sq_f64(self) -> f64 {
        self.norm_sq()
    }
    #[inline]
    fn to_complex(self) -> Complex {
        self
    }
}

impl OrbitValue for ComplexDD {
    #[inline]
    fn sqr(self) -> Self {
        ComplexDD::sqr(self)
    }
    #[inline]
    fn conj(self) -> Self {
        ComplexDD::conj(self)
    }
    #[inline]
    fn abs_components(self) -> Self {
        ComplexDD::abs_components(self)
    }
    /// Transcendentals run on the `f64` downcast; non-integer multibrot
    /// powers are limited to double precision.
    #[inline]
    fn powf(self, power: f64) -> Self {
        ComplexDD::from(self.to_complex().powf(power))
    }
    #[inline]
    fn norm_sq_f64(self) -> f64 {
        self.norm_sq().to_f64()
    }
    #[inline]
    fn to_complex(self) -> Complex {
        ComplexDD::to_complex(self)
    }
}

/// Returns `true` if `c` lies inside the main cardioid.
#[inline]
pub fn in_main_cardioid(c: Complex) -> bool {
    let y2 = c.im * c.im;
    let q = (c.re - 0.25) * (c.re - 0.25) + y2;
    q * (q + (c.re - 0.25)) <= 0.25 * y2
}

/// Returns `true` if `c` lies inside the period-2 bulb.
#[inline]
pub fn in_period2_bulb(c: Complex) -> bool {
    (c.re + 1.0) * (c.re + 1.0) + c.im * c.im <= 0.0625
}

/// Iterate `z` from iteration `start` until it escapes or the budget runs out.
///
/// The escape test runs before each step, so `iterations == n` means `z_n`
/// was the first iterate outside the bailout circle.
#[inline]
fn run<Z: OrbitValue>(
    mut z: Z,
    start: u32,
    params: &IterationParams,
    periodicity: bool,
    step: impl Fn(Z) -> Z,
) -> PixelResult {
    let max_iter = params.max_iterations;
    let bailout_sq = params.bailout_sq();

    let mut checkpoint = z;
    let mut since_checkpoint = 0;

    for n in start..max_iter {
        if z.norm_sq_f64() > bailout_sq {
            return PixelResult::escaped(n, z.to_complex());
        }
        z = step(z);

        if periodicity {
            // An exact repeat means the orbit is cyclic and can never escape.
            if z == checkpoint {
                return PixelResult::bounded(max_iter, z.to_complex());
            }
            since_checkpoint += 1;
            if since_checkpoint == PERIOD_CHECK_INTERVAL {
                checkpoint = z;
                since_checkpoint = 0;
            }
        }
    }

    PixelResult::bounded(max_iter, z.to_complex())
}

#[inline]
fn dispatch<Z: OrbitValue>(
    z: Z,
    c: Z,
    start: u32,
    set: &FractalSet,
    params: &IterationParams,
    periodicity: bool,
) -> PixelResult {
    match *set {
        FractalSet::Mandelbrot | FractalSet::Julia { .. } => {
            run(z, start, params, periodicity, |z| z.sqr() + c)
        }
        FractalSet::BurningShip => {
            run(z, start, params, periodicity, |z| z.abs_components().sqr() + c)
        }
        FractalSet::Tricorn => run(z, start, params, periodicity, |z| z.conj().sqr() + c),
        FractalSet::Multibrot { power } => {
            run(z, start, params, periodicity, move |z| z.powf(power) + c)
        }
    }
}

/// `true` when the plain-Mandelbrot shortcuts may be applied.
#[inline]
fn mandelbrot_from_origin(set: &FractalSet, z0: Complex) -> bool {
    matches!(set, FractalSet::Mandelbrot) && z0 == Complex::ZERO
}

/// Iterate `(z₀, c)` under `set` in `f64`.
///
/// For the plain Mandelbrot family starting at the origin, points inside
/// the main cardioid or period-2 bulb are reported bounded without
/// iterating, and exact orbit repeats end the loop early. Neither shortcut
/// changes the count reported for an escaping point.
pub fn iterate(z0: Complex, c: Complex, set: &FractalSet, params: &IterationParams) -> PixelResult {
    let shortcuts = mandelbrot_from_origin(set, z0);
    if shortcuts && (in_main_cardioid(c) || in_period2_bulb(c)) {
        return PixelResult::bounded(params.max_iterations, z0);
    }
    dispatch(z0, c, 0, set, params, shortcuts)
}

/// Iterate a view-plane point: the set decides whether it is `z₀` or `c`.
#[inline]
pub fn iterate_point(point: Complex, set: &FractalSet, params: &IterationParams) -> PixelResult {
    let (z0, c) = set.seed(point);
    iterate(z0, c, set, params)
}

/// Continue an orbit already at iteration `start` (no shortcuts).
pub fn iterate_from(
    z: Complex,
    c: Complex,
    start: u32,
    set: &FractalSet,
    params: &IterationParams,
) -> PixelResult {
    dispatch(z, c, start, set, params, false)
}

/// Double-double counterpart of [`iterate`].
pub fn iterate_dd(
    z0: ComplexDD,
    c: ComplexDD,
    set: &FractalSet,
    params: &IterationParams,
) -> PixelResult {
    let shortcuts = matches!(set, FractalSet::Mandelbrot) && z0 == ComplexDD::ZERO;
    if shortcuts {
        let coarse = c.to_complex();
        if in_main_cardioid(coarse) || in_period2_bulb(coarse) {
            return PixelResult::bounded(params.max_iterations, Complex::ZERO);
        }
    }
    dispatch(z0, c, 0, set, params, shortcuts)
}

/// Double-double view-plane point, see [`iterate_point`].
pub fn iterate_point_dd(point: ComplexDD, set: &FractalSet, params: &IterationParams) -> PixelResult {
    match *set {
        FractalSet::Julia { c } => iterate_dd(point, ComplexDD::from(c), set, params),
        _ => iterate_dd(ComplexDD::ZERO, point, set, params),
    }
}

/// Double-double counterpart of [`iterate_from`].
pub fn iterate_dd_from(
    z: ComplexDD,
    c: ComplexDD,
    start: u32,
    set: &FractalSet,
    params: &IterationParams,
) -> PixelResult {
    dispatch(z, c, start, set, params, false)
}
