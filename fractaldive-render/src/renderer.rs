use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use fractaldive_core::perturbation::{evaluate_pixel, GLITCH_INVALIDATE_RATIO};
use fractaldive_core::{
    iterate_point, iterate_point_dd, PixelResult, ReferenceOrbit, ReferenceOrbitService, Strategy,
};

use crate::iteration_buffer::IterationBuffer;
use crate::protocol::{FrameSpec, TaskRequest, TaskResponse};
use crate::tile::partition_rows;

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Tracks the current render generation for cancellation and progress.
///
/// Incrementing the generation signals all in-flight bands to stop early.
/// The progress counters let a caller display a progress bar.
#[derive(Debug)]
pub struct RenderCancel {
    generation: AtomicU64,
    progress_done: AtomicUsize,
    progress_total: AtomicUsize,
}

impl RenderCancel {
    pub fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            progress_done: AtomicUsize::new(0),
            progress_total: AtomicUsize::new(0),
        }
    }

    /// Cancel the current render by advancing the generation.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Read the current generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Reset progress for a new phase with `total` work units.
    pub fn reset_progress(&self, total: usize) {
        self.progress_total.store(total, Ordering::Relaxed);
        self.progress_done.store(0, Ordering::Relaxed);
    }

    /// Increment completed work units by one.
    pub fn inc_progress(&self) {
        self.progress_done.fetch_add(1, Ordering::Relaxed);
    }

    /// Read the current progress as `(done, total)`.
    pub fn progress(&self) -> (usize, usize) {
        (
            self.progress_done.load(Ordering::Relaxed),
            self.progress_total.load(Ordering::Relaxed),
        )
    }
}

impl Default for RenderCancel {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Per-band compute
// ---------------------------------------------------------------------------

/// Evaluate every pixel of one band.
///
/// The precision strategy follows the frame's pixel scale. A perturbation
/// frame without a usable orbit (none given, one for another set, or one
/// computed for fewer iterations) is evaluated directly in double-double
/// instead.
pub fn compute_band(request: &TaskRequest, orbit: Option<&ReferenceOrbit>) -> crate::Result<TaskResponse> {
    let viewport = request.viewport()?;
    let params = request.params()?;
    let set = request.set;
    let tile = request.tile();
    let orbit = orbit.filter(|o| *o.set() == set && o.max_iterations() >= params.max_iterations);

    let strategy = match (viewport.strategy(&set), orbit) {
        (Strategy::Perturbation, None) => Strategy::DirectExtended,
        (s, _) => s,
    };
    let reference_delta = orbit.map(|o| o.point().delta_from(viewport.center));

    let count = tile.pixel_count(request.width);
    let mut iterations = Vec::with_capacity(count);
    let mut final_z = Vec::with_capacity(count);
    let mut perturbed = 0;
    let mut glitched = 0;

    for py in tile.start_row..tile.end_row.min(request.height) {
        for px in 0..request.width {
            let result: PixelResult = match (strategy, orbit, reference_delta) {
                (Strategy::Perturbation, Some(orbit), Some(reference_delta)) => {
                    let p = evaluate_pixel(viewport.pixel_to_delta(px, py), orbit, reference_delta, &params);
                    perturbed += 1;
                    if p.glitched {
                        glitched += 1;
                    }
                    p.result
                }
                (Strategy::DirectExtended, ..) | (Strategy::Perturbation, ..) => {
                    iterate_point_dd(viewport.pixel_to_complex(px, py), &set, &params)
                }
                (Strategy::Direct, ..) => {
                    iterate_point(viewport.pixel_to_complex(px, py).to_complex(), &set, &params)
                }
            };
            iterations.push(result.iterations);
            final_z.push(result.final_z);
        }
    }

    Ok(TaskResponse {
        iterations,
        final_z,
        start_row: tile.start_row,
        end_row: tile.end_row,
        task_id: tile.task_id,
        perturbed,
        glitched,
    })
}

/// `true` when a frame glitched badly enough to re-select its reference.
pub fn glitch_ratio_exceeded(perturbed: u64, glitched: u64) -> bool {
    perturbed > 0 && glitched as f64 > GLITCH_INVALIDATE_RATIO * perturbed as f64
}

// ---------------------------------------------------------------------------
// Full-frame render
// ---------------------------------------------------------------------------

/// The result of a full-frame render.
///
/// Contains raw iteration data (no coloring); the caller applies a palette
/// to produce displayable pixels.
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub iterations: IterationBuffer,
    pub elapsed: Duration,
    pub cancelled: bool,
    pub bands_rendered: usize,
    pub perturbed: u64,
    pub glitched: u64,
}

/// Bands per rayon thread; more bands balance uneven rows better.
const BANDS_PER_THREAD: usize = 4;

/// Render a full frame on the rayon pool.
///
/// Deterministic for a given `spec`: the same inputs always produce the
/// same buffer. The reference orbit (if the depth needs one) is fetched
/// from `service` before any band starts. The `cancel` handle can be used
/// from another thread to abort the render.
pub fn render_frame(
    spec: &FrameSpec,
    service: &mut ReferenceOrbitService,
    cancel: &RenderCancel,
) -> crate::Result<RenderResult> {
    spec.validate()?;
    let start = Instant::now();
    let gen = cancel.generation();

    let viewport = spec.viewport();
    let orbit = match viewport.strategy(&spec.set) {
        Strategy::Perturbation => service.orbit_for(&viewport, &spec.set, spec.max_iterations, true),
        _ => None,
    };

    let band_count = (rayon::current_num_threads() * BANDS_PER_THREAD) as u32;
    let tiles = partition_rows(spec.height, band_count, 0);
    debug!(
        band_count = tiles.len(),
        width = spec.width,
        height = spec.height,
        "Starting frame render"
    );
    cancel.reset_progress(tiles.len());

    let responses: Vec<Option<crate::Result<TaskResponse>>> = tiles
        .par_iter()
        .map(|tile| {
            if cancel.generation() != gen {
                return None;
            }
            let response = compute_band(&spec.band_request(tile), orbit.as_deref());
            cancel.inc_progress();
            Some(response)
        })
        .collect();

    let mut iterations = IterationBuffer::new(spec.width, spec.height, spec.max_iterations);
    let mut bands_rendered = 0;
    let mut perturbed = 0u64;
    let mut glitched = 0u64;
    for response in responses.into_iter().flatten() {
        let response = response?;
        perturbed += response.perturbed as u64;
        glitched += response.glitched as u64;
        iterations.merge(&response);
        bands_rendered += 1;
    }

    if glitch_ratio_exceeded(perturbed, glitched) {
        warn!(perturbed, glitched, "glitch ratio too high; reference will be re-selected");
        service.invalidate();
    }

    let cancelled = cancel.generation() != gen;
    let elapsed = start.elapsed();
    info!(
        elapsed_ms = elapsed.as_millis(),
        bands_rendered, glitched, cancelled, "Render complete"
    );

    Ok(RenderResult {
        iterations,
        elapsed,
        cancelled,
        bands_rendered,
        perturbed,
        glitched,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fractaldive_core::{ComplexDD, FractalSet, ViewState};

    fn spec(x: f64, y: f64, zoom: f64, w: u32, h: u32, max: u32) -> FrameSpec {
        FrameSpec::new(ViewState::new(x, y, zoom).unwrap(), FractalSet::Mandelbrot, w, h, max)
    }

    #[test]
    fn basic_render_produces_iteration_data() {
        let spec = spec(-0.5, 0.0, 1.0, 128, 96, 256);
        let result = render_frame(&spec, &mut ReferenceOrbitService::new(), &RenderCancel::new()).unwrap();

        assert!(!result.cancelled);
        assert_eq!(result.iterations.data.len(), 128 * 96);
        assert!(result.bands_rendered > 0);
        assert_eq!(result.perturbed, 0, "shallow frames iterate directly");
    }

    #[test]
    fn band_matches_direct_iteration() {
        let spec = spec(-0.5, 0.0, 1.0, 40, 30, 100);
        let tiles = partition_rows(30, 3, 5);
        let resp = compute_band(&spec.band_request(&tiles[1]), None).unwrap();
        assert_eq!(resp.task_id, 5);
        assert_eq!(resp.iterations.len(), 40 * 10);

        let vp = spec.viewport();
        let want = iterate_point(vp.pixel_to_complex(7, 12).to_complex(), &FractalSet::Mandelbrot, &Default::default());
        let want = want.iterations.min(100);
        assert_eq!(resp.iterations[(12 - 10) * 40 + 7], want);
    }

    #[test]
    fn deep_frame_uses_perturbation() {
        let spec = spec(-0.743643887037151, 0.131825904205330, 1e14, 16, 12, 4000);
        let mut service = ReferenceOrbitService::new();
        let result = render_frame(&spec, &mut service, &RenderCancel::new()).unwrap();
        assert_eq!(result.perturbed, 16 * 12);
        assert!(result.iterations.escaped_count() > 100);
        assert_eq!(service.computed(), 1);
    }

    #[test]
    fn deep_frame_without_orbit_falls_back_to_double_double() {
        let spec = spec(-0.743643887037151, 0.131825904205330, 1e14, 8, 6, 4000);
        let tiles = partition_rows(6, 1, 1);
        let resp = compute_band(&spec.band_request(&tiles[0]), None).unwrap();
        assert_eq!(resp.perturbed, 0);
        assert!(resp.iterations.iter().any(|&n| n < 4000));
    }

    #[test]
    fn orbit_for_other_set_is_ignored() {
        let spec = spec(-0.743643887037151, 0.131825904205330, 1e14, 4, 4, 500);
        let orbit = fractaldive_core::reference::compute_orbit(
            ComplexDD::ZERO,
            &FractalSet::julia(0.0, 1.0),
            500,
            1e-14,
        );
        let resp = compute_band(&spec.band_request(&partition_rows(4, 1, 1)[0]), Some(&orbit)).unwrap();
        assert_eq!(resp.perturbed, 0);
    }

    #[test]
    fn short_orbit_is_ignored() {
        let spec = spec(-0.743643887037151, 0.131825904205330, 1e14, 6, 4, 4000);
        let orbit = fractaldive_core::reference::compute_orbit(
            spec.viewport().center,
            &FractalSet::Mandelbrot,
            500,
            1e-14,
        );
        let resp = compute_band(&spec.band_request(&partition_rows(4, 1, 1)[0]), Some(&orbit)).unwrap();
        assert_eq!(resp.perturbed, 0);
        assert_eq!(resp.iterations.len(), 24);
    }

    #[test]
    fn render_is_deterministic() {
        let spec = spec(-0.75, 0.1, 40.0, 64, 48, 300);
        let a = render_frame(&spec, &mut ReferenceOrbitService::new(), &RenderCancel::new()).unwrap();
        let b = render_frame(&spec, &mut ReferenceOrbitService::new(), &RenderCancel::new()).unwrap();
        assert_eq!(a.iterations, b.iterations);
    }

    #[test]
    fn glitch_ratio_threshold() {
        assert!(!glitch_ratio_exceeded(0, 0));
        assert!(!glitch_ratio_exceeded(100, 25));
        assert!(glitch_ratio_exceeded(100, 26));
    }

    #[test]
    fn invalid_frame_is_an_error() {
        let spec = spec(-0.5, 0.0, 1.0, 0, 10, 100);
        assert!(render_frame(&spec, &mut ReferenceOrbitService::new(), &RenderCancel::new()).is_err());
    }

    #[test]
    fn cancellation_stops_render() {
        let spec = spec(-0.5, 0.0, 1.0, 512, 512, 20_000);
        let cancel = std::sync::Arc::new(RenderCancel::new());

        let cancel_clone = std::sync::Arc::clone(&cancel);
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(5));
            cancel_clone.cancel();
        });

        let result = render_frame(&spec, &mut ReferenceOrbitService::new(), &cancel).unwrap();
        if result.cancelled {
            let (_, total) = cancel.progress();
            assert!(
                result.bands_rendered <= total,
                "cancelled renders never exceed the planned band count"
            );
        }
    }
}
