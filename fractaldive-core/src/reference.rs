//! Reference-point selection and full-precision reference orbits.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace};

use crate::complex::Complex;
use crate::complex_dd::ComplexDD;
use crate::fractal::{FractalSet, IterationParams};
use crate::iterator::iterate_point_dd;
use crate::viewport::Viewport;

/// A candidate escaping at or after this fraction of the budget is deep enough.
const DEEP_FRACTION: f64 = 0.8;

/// The reference may drift this far (as a fraction of the half extents)
/// from the view centre before the orbit is replaced.
pub const REUSE_OFFSET_FRACTION: f64 = 0.4;

/// Largest zoom ratio, either way, across which an orbit is reused.
pub const REUSE_ZOOM_RATIO: f64 = 1.5;

/// Candidate reference offsets, as fractions of the half width / height.
const CANDIDATE_OFFSETS: [(f64, f64); 13] = [
    (0.0, 0.0),
    (0.25, 0.0),
    (-0.25, 0.0),
    (0.0, 0.25),
    (0.0, -0.25),
    (0.25, 0.25),
    (-0.25, 0.25),
    (0.25, -0.25),
    (-0.25, -0.25),
    (0.5, 0.0),
    (-0.5, 0.0),
    (0.1, 0.1),
    (-0.1, -0.1),
];

/// The orbit of one reference point, iterated in double-double and stored
/// as `f64` samples.
///
/// `samples.len() == max_iterations`. Past `escape_iteration` the slots
/// repeat the escape value.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceOrbit {
    point: ComplexDD,
    set: FractalSet,
    samples: Vec<Complex>,
    escape_iteration: u32,
    scale: f64,
}

impl ReferenceOrbit {
    /// The reference's view-plane point (`c` for mandelbrot, `z₀` for julia).
    pub fn point(&self) -> ComplexDD {
        self.point
    }

    pub fn set(&self) -> &FractalSet {
        &self.set
    }

    pub fn samples(&self) -> &[Complex] {
        &self.samples
    }

    #[inline]
    pub fn sample(&self, i: u32) -> Complex {
        self.samples[i as usize]
    }

    /// Iterations this orbit was computed for.
    pub fn max_iterations(&self) -> u32 {
        self.samples.len() as u32
    }

    /// First index whose sample exceeds the reference bailout, or
    /// `max_iterations` if none does.
    pub fn escape_iteration(&self) -> u32 {
        self.escape_iteration
    }

    pub fn escaped(&self) -> bool {
        self.escape_iteration < self.max_iterations()
    }

    /// Pixel scale of the view the orbit was computed for.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Whether this orbit still serves `viewport` for `set` up to
    /// `max_iterations`.
    pub fn is_valid_for(&self, viewport: &Viewport, set: &FractalSet, max_iterations: u32) -> bool {
        if self.set != *set || self.max_iterations() < max_iterations {
            return false;
        }
        let offset = self.point.delta_from(viewport.center);
        if offset.re.abs() > REUSE_OFFSET_FRACTION * viewport.half_width()
            || offset.im.abs() > REUSE_OFFSET_FRACTION * viewport.half_height()
        {
            return false;
        }
        let ratio = self.scale / viewport.scale;
        ratio.max(1.0 / ratio) <= REUSE_ZOOM_RATIO
    }
}

/// Pick a reference point for `viewport`.
///
/// The centre wins outright if it survives [`DEEP_FRACTION`] of the
/// budget. Otherwise the deepest of a fixed candidate pattern is taken,
/// stopping at the first candidate that never escapes.
pub fn select_reference(viewport: &Viewport, set: &FractalSet, max_iterations: u32) -> ComplexDD {
    let params = IterationParams::default().with_max_iterations(max_iterations);
    let center = viewport.center;
    let depth = |point: ComplexDD| {
        let r = iterate_point_dd(point, set, &params);
        if r.escaped {
            r.iterations
        } else {
            max_iterations
        }
    };

    let center_depth = depth(center);
    if center_depth as f64 >= DEEP_FRACTION * max_iterations as f64 {
        trace!(depth = center_depth, "view centre accepted as reference");
        return center;
    }

    let (hw, hh) = (viewport.half_width(), viewport.half_height());
    let mut best = (center, center_depth);
    for &(fx, fy) in &CANDIDATE_OFFSETS[1..] {
        let candidate = center.offset(Complex::new(fx * hw, fy * hh));
        let d = depth(candidate);
        if d > best.1 {
            best = (candidate, d);
        }
        if d >= max_iterations {
            break;
        }
    }
    trace!(depth = best.1, "reference chosen from candidates");
    best.0
}

/// Iterate `point` under the quadratic rule of `set` in double-double,
/// recording every iterate.
///
/// Uses the extended [`IterationParams::REFERENCE_BAILOUT`]. Only the
/// mandelbrot and julia families have a quadratic recurrence; any other
/// family is iterated as mandelbrot.
pub fn compute_orbit(point: ComplexDD, set: &FractalSet, max_iterations: u32, scale: f64) -> ReferenceOrbit {
    let started = Instant::now();
    let bailout_sq = IterationParams::REFERENCE_BAILOUT * IterationParams::REFERENCE_BAILOUT;
    let (mut z, c) = match *set {
        FractalSet::Julia { c } => (point, ComplexDD::from(c)),
        _ => (ComplexDD::ZERO, point),
    };

    let len = max_iterations as usize;
    let mut samples = Vec::with_capacity(len);
    let mut escape_iteration = max_iterations;

    for i in 0..max_iterations {
        let zf = z.to_complex();
        samples.push(zf);
        if zf.norm_sq() > bailout_sq {
            escape_iteration = i;
            samples.resize(len, zf);
            break;
        }
        z = z.sqr() + c;
    }

    debug!(
        re = point.re.to_f64(),
        im = point.im.to_f64(),
        escape_iteration,
        max_iterations,
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "reference orbit computed"
    );

    ReferenceOrbit {
        point,
        set: *set,
        samples,
        escape_iteration,
        scale,
    }
}

/// Owns the current reference orbit and decides when to replace it.
///
/// Orbits are handed out as `Arc`s and never mutated: replacing one builds
/// a fresh orbit, so in-flight consumers keep the one they started with.
#[derive(Debug, Default)]
pub struct ReferenceOrbitService {
    current: Option<Arc<ReferenceOrbit>>,
    computed: u64,
}

impl ReferenceOrbitService {
    pub fn new() -> Self {
        Self::default()
    }

    /// The orbit to use for `viewport`, computing a new one if needed.
    ///
    /// Returns `None` for families without a perturbation recurrence. With
    /// `allow_refresh == false` (view animating or dragged) an existing
    /// orbit for the same set is returned even if it is out of range.
    pub fn orbit_for(
        &mut self,
        viewport: &Viewport,
        set: &FractalSet,
        max_iterations: u32,
        allow_refresh: bool,
    ) -> Option<Arc<ReferenceOrbit>> {
        if !set.supports_perturbation() {
            return None;
        }

        if let Some(orbit) = &self.current {
            if orbit.is_valid_for(viewport, set, max_iterations) {
                trace!("reusing reference orbit");
                return Some(Arc::clone(orbit));
            }
            if !allow_refresh && orbit.set() == set {
                debug!("reference refresh deferred during interaction");
                return Some(Arc::clone(orbit));
            }
        }

        let point = select_reference(viewport, set, max_iterations);
        let orbit = Arc::new(compute_orbit(point, set, max_iterations, viewport.scale));
        self.current = Some(Arc::clone(&orbit));
        self.computed += 1;
        Some(orbit)
    }

    /// Drop the current orbit so the next request re-selects a reference.
    pub fn invalidate(&mut self) {
        if self.current.take().is_some() {
            debug!("reference orbit invalidated");
        }
    }

    pub fn current(&self) -> Option<&Arc<ReferenceOrbit>> {
        self.current.as_ref()
    }

    /// Number of orbits computed so far.
    pub fn computed(&self) -> u64 {
        self.computed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::iterate_point;

    fn viewport(x: f64, y: f64, zoom: f64) -> Viewport {
        Viewport::from_view(ComplexDD::from_f64(x, y), zoom, 200, 150).unwrap()
    }

    #[test]
    fn orbit_matches_direct_iteration() {
        let c = Complex::new(-0.75, 0.1);
        let orbit = compute_orbit(ComplexDD::from(c), &FractalSet::Mandelbrot, 100, 0.01);
        assert_eq!(orbit.samples().len(), 100);
        let mut z = Complex::ZERO;
        for i in 0..10 {
            let s = orbit.sample(i);
            assert!((s.re - z.re).abs() < 1e-12 && (s.im - z.im).abs() < 1e-12);
            z = z.sqr() + c;
        }
    }

    #[test]
    fn escaped_orbit_is_padded() {
        let orbit = compute_orbit(ComplexDD::from_f64(1.0, 1.0), &FractalSet::Mandelbrot, 50, 0.01);
        assert!(orbit.escaped());
        let k = orbit.escape_iteration();
        assert!(orbit.sample(k).norm_sq() > 256.0);
        assert!(orbit.sample(k - 1).norm_sq() <= 256.0);
        assert!(orbit.samples()[k as usize..].iter().all(|&s| s == orbit.sample(k)));
        assert_eq!(orbit.samples().len(), 50);
    }

    #[test]
    fn bounded_orbit_reports_cap() {
        let orbit = compute_orbit(ComplexDD::from_f64(-0.1, 0.1), &FractalSet::Mandelbrot, 500, 0.01);
        assert!(!orbit.escaped());
        assert_eq!(orbit.escape_iteration(), 500);
    }

    #[test]
    fn julia_orbit_starts_at_point() {
        let set = FractalSet::julia(-0.123, 0.745);
        let orbit = compute_orbit(ComplexDD::from_f64(0.1, 0.2), &set, 20, 0.01);
        assert_eq!(orbit.sample(0), Complex::new(0.1, 0.2));
        let expected = Complex::new(0.1, 0.2).sqr() + Complex::new(-0.123, 0.745);
        assert!((orbit.sample(1).re - expected.re).abs() < 1e-15);
    }

    #[test]
    fn deep_centre_is_accepted() {
        let vp = viewport(-0.1, 0.1, 1e6);
        let r = select_reference(&vp, &FractalSet::Mandelbrot, 300);
        assert_eq!(r, vp.center);
    }

    #[test]
    fn shallow_centre_is_replaced_by_deeper_candidate() {
        // Centre just outside the cardioid cusp; the left candidate lands inside.
        let vp = viewport(0.3, 0.0, 1.0);
        let max = 200;
        let params = IterationParams::default().with_max_iterations(max);
        let centre_depth = iterate_point(Complex::new(0.3, 0.0), &FractalSet::Mandelbrot, &params);
        assert!(centre_depth.escaped);

        let r = select_reference(&vp, &FractalSet::Mandelbrot, max);
        assert_ne!(r, vp.center);
        let chosen = iterate_point(r.to_complex(), &FractalSet::Mandelbrot, &params);
        assert!(!chosen.escaped || chosen.iterations > centre_depth.iterations);
    }

    #[test]
    fn reuse_policy() {
        let mut service = ReferenceOrbitService::new();
        let set = FractalSet::Mandelbrot;
        // Interior centre, so the reference is the centre itself.
        let vp = viewport(-0.1, 0.1, 1e3);
        let first = service.orbit_for(&vp, &set, 200, true).unwrap();
        assert_eq!(first.point(), vp.center);
        assert_eq!(service.computed(), 1);

        // Small pan, small zoom change: reused.
        let nudged = viewport(-0.1 + vp.half_width() * 0.1, 0.1, 1.2e3);
        let again = service.orbit_for(&nudged, &set, 200, true).unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        // Zoom doubled: replaced, and the old Arc is untouched.
        let zoomed = viewport(-0.1, 0.1, 2e3);
        let fresh = service.orbit_for(&zoomed, &set, 200, true).unwrap();
        assert!(!Arc::ptr_eq(&first, &fresh));
        assert_eq!(first.scale(), vp.scale);
        assert_eq!(service.computed(), 2);

        // Larger iteration budget than the orbit covers: replaced.
        let more = service.orbit_for(&zoomed, &set, 400, true).unwrap();
        assert_eq!(more.max_iterations(), 400);
    }

    #[test]
    fn refresh_deferred_while_interacting() {
        let mut service = ReferenceOrbitService::new();
        let set = FractalSet::Mandelbrot;
        let first = service.orbit_for(&viewport(-0.1, 0.1, 1e3), &set, 200, true).unwrap();
        let far = viewport(-0.1, 0.1, 1e5);
        let held = service.orbit_for(&far, &set, 200, false).unwrap();
        assert!(Arc::ptr_eq(&first, &held));
        let settled = service.orbit_for(&far, &set, 200, true).unwrap();
        assert!(!Arc::ptr_eq(&first, &settled));
    }

    #[test]
    fn set_change_forces_new_orbit() {
        let mut service = ReferenceOrbitService::new();
        let vp = viewport(0.0, 0.0, 1e3);
        let m = service.orbit_for(&vp, &FractalSet::Mandelbrot, 100, false).unwrap();
        let j = service.orbit_for(&vp, &FractalSet::julia(0.0, 1.0), 100, false).unwrap();
        assert_ne!(m.set(), j.set());
        assert!(service.orbit_for(&vp, &FractalSet::Tricorn, 100, true).is_none());
    }

    #[test]
    fn invalidate_drops_orbit() {
        let mut service = ReferenceOrbitService::new();
        let vp = viewport(-0.75, 0.1, 1e3);
        service.orbit_for(&vp, &FractalSet::Mandelbrot, 100, true);
        assert!(service.current().is_some());
        service.invalidate();
        assert!(service.current().is_none());
        service.orbit_for(&vp, &FractalSet::Mandelbrot, 100, true);
        assert_eq!(service.computed(), 2);
    }
}
