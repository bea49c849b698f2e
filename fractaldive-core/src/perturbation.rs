//! Per-pixel perturbation against a shared reference orbit.
//!
//! Each pixel iterates only its small deviation `dz` from the reference
//! orbit `Z`, in `f64`:
//!
//! ```text
//! dz ← 2·Z_i·dz + dz² + dc
//! ```
//!
//! When `dz` grows past [`GLITCH_THRESHOLD`] the linearisation is no longer
//! trusted and the pixel finishes with double-double direct iteration.

use crate::complex::Complex;
use crate::complex_dd::ComplexDD;
use crate::fractal::{FractalSet, IterationParams, PixelResult};
use crate::iterator::iterate_dd_from;
use crate::reference::ReferenceOrbit;

/// `|dz|²` above which a pixel is declared glitched.
pub const GLITCH_THRESHOLD: f64 = 1e6;

/// Fraction of glitched pixels in a frame above which the reference
/// should be re-selected.
pub const GLITCH_INVALIDATE_RATIO: f64 = 0.25;

/// Outcome of one perturbed pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Perturbation {
    pub result: PixelResult,
    /// The delta outgrew the reference and the pixel was finished directly.
    pub glitched: bool,
}

/// Evaluate one pixel against `orbit`.
///
/// `pixel_delta` and `reference_delta` are offsets from the same view
/// centre, so their difference is the pixel's offset from the reference
/// point. For mandelbrot that offset is `dc`; for julia it seeds `dz` and
/// `dc` is zero.
pub fn evaluate_pixel(
    pixel_delta: Complex,
    orbit: &ReferenceOrbit,
    reference_delta: Complex,
    params: &IterationParams,
) -> Perturbation {
    let offset = pixel_delta - reference_delta;
    let set = orbit.set();
    let (mut dz, dc) = match set {
        FractalSet::Julia { .. } => (offset, Complex::ZERO),
        _ => (Complex::ZERO, offset),
    };

    let max_iter = params.max_iterations;
    let bailout_sq = params.bailout_sq();
    if orbit.samples().is_empty() {
        let z0 = match set {
            FractalSet::Julia { .. } => orbit.point().offset(offset).to_complex(),
            _ => Complex::ZERO,
        };
        return Perturbation {
            result: finish_direct(z0, 0, offset, orbit, set, params),
            glitched: false,
        };
    }
    let limit = max_iter.min(orbit.escape_iteration());
    let samples = orbit.samples();
    // A bounded orbit computed for a smaller cap runs out before `max_iter`.
    let runs_out = !orbit.escaped() && limit < max_iter;

    for i in 0..limit {
        let zi = samples[i as usize];
        let z = zi + dz;
        if z.norm_sq() > bailout_sq {
            return Perturbation {
                result: PixelResult::escaped(i, z),
                glitched: false,
            };
        }
        if dz.norm_sq() > GLITCH_THRESHOLD {
            return Perturbation {
                result: finish_direct(z, i, offset, orbit, set, params),
                glitched: true,
            };
        }
        if runs_out && i + 1 == limit {
            // Out of samples: finish this pixel from its current iterate.
            return Perturbation {
                result: finish_direct(z, i, offset, orbit, set, params),
                glitched: false,
            };
        }
        dz = zi * dz * 2.0 + dz.sqr() + dc;
    }

    if limit >= max_iter {
        return Perturbation {
            result: PixelResult::bounded(max_iter, samples[(limit - 1) as usize] + dz),
            glitched: false,
        };
    }

    // The reference escaped first: continue this pixel on its own.
    let z = samples[limit as usize] + dz;
    Perturbation {
        result: finish_direct(z, limit, offset, orbit, set, params),
        glitched: false,
    }
}

/// Continue from iteration `start` with double-double direct iteration,
/// seeded with the pixel's current `z` and its true `c`.
fn finish_direct(
    z: Complex,
    start: u32,
    offset: Complex,
    orbit: &ReferenceOrbit,
    set: &FractalSet,
    params: &IterationParams,
) -> PixelResult {
    let c = match *set {
        FractalSet::Julia { c } => ComplexDD::from(c),
        _ => orbit.point().offset(offset),
    };
    iterate_dd_from(ComplexDD::from(z), c, start, set, params)
}
