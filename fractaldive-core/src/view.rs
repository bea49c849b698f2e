//! Camera state and the interaction model that mutates it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::complex::Complex;
use crate::complex_dd::ComplexDD;
use crate::error::CoreError;
use crate::fractal::FractalSet;
use crate::viewport::{scale_for, Viewport};

/// Duration of a click zoom transition.
pub const ZOOM_DURATION: Duration = Duration::from_millis(300);

/// Duration of the transition back to a set's default view.
pub const RESET_DURATION: Duration = Duration::from_millis(500);

/// Zoom multiplier of one click.
pub const CLICK_ZOOM_FACTOR: f64 = 2.0;

/// Cubic ease-out (fast start, slow end).
#[inline]
pub fn ease_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

/// Where the camera looks: a centre point and a magnification.
///
/// `zoom > 0` always holds; the only ways to build one are validated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ViewStateRepr")]
pub struct ViewState {
    center: ComplexDD,
    zoom: f64,
}

#[derive(Deserialize)]
struct ViewStateRepr {
    center: ComplexDD,
    zoom: f64,
}

impl TryFrom<ViewStateRepr> for ViewState {
    type Error = CoreError;

    fn try_from(raw: ViewStateRepr) -> Result<Self, Self::Error> {
        Self::from_center(raw.center, raw.zoom)
    }
}

impl ViewState {
    pub fn new(center_x: f64, center_y: f64, zoom: f64) -> crate::Result<Self> {
        Self::from_center(ComplexDD::from_f64(center_x, center_y), zoom)
    }

    pub fn from_center(center: ComplexDD, zoom: f64) -> crate::Result<Self> {
        if zoom <= 0.0 || !zoom.is_finite() {
            return Err(CoreError::InvalidZoom(zoom));
        }
        Ok(Self { center, zoom })
    }

    /// The canonical zoom-1 view of `set`.
    pub fn default_for(set: &FractalSet) -> Self {
        Self {
            center: ComplexDD::from(set.default_center()),
            zoom: 1.0,
        }
    }

    #[inline]
    pub fn center(&self) -> ComplexDD {
        self.center
    }

    #[inline]
    pub fn center_x(&self) -> f64 {
        self.center.re.to_f64()
    }

    #[inline]
    pub fn center_y(&self) -> f64 {
        self.center.im.to_f64()
    }

    #[inline]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// The pixel mapping of this view on a `width × height` screen.
    pub fn viewport(&self, width: u32, height: u32) -> Viewport {
        let height = height.max(1);
        Viewport {
            center: self.center,
            scale: scale_for(self.zoom, height),
            width: width.max(1),
            height,
        }
    }

    /// Linear centre, geometric zoom.
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        Self {
            center: self.center + (to.center - self.center) * t,
            zoom: self.zoom * (to.zoom / self.zoom).powf(t),
        }
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::default_for(&FractalSet::Mandelbrot)
    }
}

/// Whether a transition is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Settled,
    Animating,
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    from: ViewState,
    to: ViewState,
    elapsed: Duration,
    duration: Duration,
}

impl Transition {
    fn progress(&self) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }
}

/// Owns the camera and every operation that moves it.
///
/// The displayed view is [`current`](Self::current); while a transition
/// runs, [`target`](Self::target) is where it will settle. Transitions are
/// advanced by the caller through [`tick`](Self::tick), once per frame.
#[derive(Debug, Clone)]
pub struct ViewModel {
    set: FractalSet,
    width: u32,
    height: u32,
    state: ViewState,
    transition: Option<Transition>,
    dragging: bool,
}

impl ViewModel {
    pub fn new(set: FractalSet, width: u32, height: u32) -> crate::Result<Self> {
        Self::with_state(set, ViewState::default_for(&set), width, height)
    }

    pub fn with_state(
        set: FractalSet,
        state: ViewState,
        width: u32,
        height: u32,
    ) -> crate::Result<Self> {
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidViewport {
                reason: format!("dimensions must be > 0, got {width}×{height}"),
            });
        }
        Ok(Self {
            set,
            width,
            height,
            state,
            transition: None,
            dragging: false,
        })
    }

    pub fn set(&self) -> &FractalSet {
        &self.set
    }

    /// Switch families. The view is kept; call [`reset`](Self::reset) to
    /// move to the new family's default.
    pub fn set_fractal(&mut self, set: FractalSet) {
        self.set = set;
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    /// The view being displayed right now.
    pub fn current(&self) -> ViewState {
        self.state
    }

    /// Where the view will settle once the running transition ends.
    pub fn target(&self) -> ViewState {
        self.transition.map_or(self.state, |t| t.to)
    }

    pub fn mode(&self) -> Mode {
        if self.transition.is_some() {
            Mode::Animating
        } else {
            Mode::Settled
        }
    }

    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Bracket a pan gesture.
    pub fn set_dragging(&mut self, dragging: bool) {
        self.dragging = dragging;
    }

    /// `false` while animating or dragging: reference orbits should be
    /// reused rather than recomputed.
    pub fn allows_reference_refresh(&self) -> bool {
        !self.dragging && self.transition.is_none()
    }

    /// Pixel mapping of the displayed view.
    pub fn viewport(&self) -> Viewport {
        self.state.viewport(self.width, self.height)
    }

    /// Screen position to complex-plane point under the displayed view.
    pub fn screen_to_complex(&self, sx: f64, sy: f64) -> ComplexDD {
        self.viewport().screen_to_complex(sx, sy)
    }

    /// Zoom by `factor` keeping the point under `(sx, sy)` fixed.
    fn zoomed(&self, sx: f64, sy: f64, factor: f64) -> ViewState {
        let delta = self.viewport().screen_to_delta(sx, sy);
        let shift = 1.0 - 1.0 / factor;
        ViewState {
            center: self.state.center.offset(delta * shift),
            zoom: self.state.zoom * factor,
        }
    }

    /// Animated 2× zoom in (or out) around a screen position.
    pub fn zoom_at(&mut self, sx: f64, sy: f64, zoom_in: bool) {
        let factor = if zoom_in {
            CLICK_ZOOM_FACTOR
        } else {
            1.0 / CLICK_ZOOM_FACTOR
        };
        let to = self.zoomed(sx, sy, factor);
        self.animate_to(to, ZOOM_DURATION);
    }

    /// Immediate zoom by a continuous factor, compounding across calls.
    ///
    /// Non-positive or non-finite factors are ignored. Returns whether the
    /// view changed.
    pub fn zoom_at_instant(&mut self, sx: f64, sy: f64, factor: f64) -> bool {
        if factor <= 0.0 || !factor.is_finite() {
            return false;
        }
        let to = self.zoomed(sx, sy, factor);
        if !to.zoom.is_finite() || to.zoom <= 0.0 {
            return false;
        }
        self.transition = None;
        self.state = to;
        true
    }

    /// Drag the image by a screen-pixel delta, zoom unchanged.
    ///
    /// Content follows the pointer, so the centre moves the opposite way.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        let scale = self.viewport().scale;
        self.transition = None;
        self.state.center = self.state.center.offset(Complex::new(-dx * scale, dy * scale));
    }

    /// Animate back to the active family's default view.
    pub fn reset(&mut self) {
        self.animate_to(ViewState::default_for(&self.set), RESET_DURATION);
    }

    /// Jump to an explicit view without animation.
    pub fn navigate_to(&mut self, center_x: f64, center_y: f64, zoom: f64) -> crate::Result<()> {
        let to = ViewState::new(center_x, center_y, zoom)?;
        self.jump_to(to);
        Ok(())
    }

    /// Jump to an explicit view without animation.
    pub fn jump_to(&mut self, state: ViewState) {
        self.transition = None;
        self.state = state;
    }

    fn animate_to(&mut self, to: ViewState, duration: Duration) {
        self.transition = Some(Transition {
            from: self.state,
            to,
            elapsed: Duration::ZERO,
            duration,
        });
    }

    /// Advance the running transition by `dt`.
    ///
    /// Returns `true` if the displayed view changed.
    pub fn tick(&mut self, dt: Duration) -> bool {
        let Some(mut transition) = self.transition else {
            return false;
        };
        transition.elapsed = transition.elapsed.saturating_add(dt);
        let t = transition.progress();
        if t >= 1.0 {
            self.state = transition.to;
            self.transition = None;
        } else {
            self.state = transition.from.interpolate(&transition.to, ease_out_cubic(t));
            self.transition = Some(transition);
        }
        true
    }

    /// Run the transition to its end.
    pub fn finish(&mut self) {
        if let Some(transition) = self.transition.take() {
            self.state = transition.to;
        }
    }
}
