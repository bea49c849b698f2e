use crate::complex::Complex;
use crate::complex_dd::ComplexDD;
use crate::error::CoreError;
use crate::fractal::FractalSet;

/// Height of the visible complex-plane window at zoom 1.
pub const BASE_SPAN: f64 = 3.0;

/// Pixel spacing below which `f64` coordinates stop resolving neighbours.
pub const DIRECT_SCALE_LIMIT: f64 = 1e-13;

/// Defines the visible region of the complex plane.
///
/// The viewport is centred on `center`, with `scale` defining how many
/// complex-plane units each pixel spans. The centre is double-double so
/// that pixel offsets stay meaningful past the `f64` limit; the offsets
/// themselves are plain `f64` deltas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Centre of the viewport in the complex plane.
    pub center: ComplexDD,

    /// Complex-plane units per pixel.
    pub scale: f64,

    /// Viewport width in pixels.
    pub width: u32,

    /// Viewport height in pixels.
    pub height: u32,
}

impl Viewport {
    /// Create a viewport with explicit parameters.
    pub fn new(center: ComplexDD, scale: f64, width: u32, height: u32) -> crate::Result<Self> {
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidViewport {
                reason: format!("dimensions must be > 0, got {width}×{height}"),
            });
        }
        if scale <= 0.0 || !scale.is_finite() {
            return Err(CoreError::InvalidViewport {
                reason: format!("scale must be positive and finite, got {scale}"),
            });
        }
        Ok(Self {
            center,
            scale,
            width,
            height,
        })
    }

    /// Viewport for a view centre and zoom factor.
    ///
    /// At zoom 1 the window is [`BASE_SPAN`] units tall; width follows the
    /// aspect ratio.
    pub fn from_view(center: ComplexDD, zoom: f64, width: u32, height: u32) -> crate::Result<Self> {
        if zoom <= 0.0 || !zoom.is_finite() {
            return Err(CoreError::InvalidZoom(zoom));
        }
        Self::new(center, scale_for(zoom, height.max(1)), width, height)
    }

    /// Offset of a fractional screen position from the centre, in
    /// complex-plane units.
    ///
    /// `(0, 0)` is the top-left corner. The y-axis is flipped so that
    /// increasing screen-y moves downward (decreasing imaginary part).
    #[inline]
    pub fn screen_to_delta(&self, sx: f64, sy: f64) -> Complex {
        let half_w = self.width as f64 / 2.0;
        let half_h = self.height as f64 / 2.0;
        Complex::new((sx - half_w) * self.scale, -(sy - half_h) * self.scale)
    }

    /// Offset of a pixel from the centre.
    #[inline]
    pub fn pixel_to_delta(&self, px: u32, py: u32) -> Complex {
        self.screen_to_delta(px as f64, py as f64)
    }

    /// Map a pixel coordinate to a point on the complex plane.
    #[inline]
    pub fn pixel_to_complex(&self, px: u32, py: u32) -> ComplexDD {
        self.center.offset(self.pixel_to_delta(px, py))
    }

    /// Map a fractional screen position to a point on the complex plane.
    #[inline]
    pub fn screen_to_complex(&self, sx: f64, sy: f64) -> ComplexDD {
        self.center.offset(self.screen_to_delta(sx, sy))
    }

    /// Inverse of [`screen_to_complex`](Self::screen_to_complex).
    pub fn complex_to_screen(&self, point: ComplexDD) -> (f64, f64) {
        let d = point.delta_from(self.center);
        (
            d.re / self.scale + self.width as f64 / 2.0,
            -d.im / self.scale + self.height as f64 / 2.0,
        )
    }

    /// The aspect ratio of the viewport (width / height).
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// The total extent of the viewport in complex-plane units.
    pub fn complex_width(&self) -> f64 {
        self.width as f64 * self.scale
    }

    /// The total extent of the viewport in complex-plane units.
    pub fn complex_height(&self) -> f64 {
        self.height as f64 * self.scale
    }

    pub fn half_width(&self) -> f64 {
        self.complex_width() / 2.0
    }

    pub fn half_height(&self) -> f64 {
        self.complex_height() / 2.0
    }

    /// The precision strategy this viewport needs for `set`.
    pub fn strategy(&self, set: &FractalSet) -> Strategy {
        Strategy::select(set, self.scale)
    }
}

/// Complex-plane units per pixel for `zoom` at `height` pixels.
#[inline]
pub fn scale_for(zoom: f64, height: u32) -> f64 {
    BASE_SPAN / (zoom * height as f64)
}

/// How pixels of a frame are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Plain `f64` iteration of each pixel.
    Direct,
    /// `f64` deltas against a double-double reference orbit.
    Perturbation,
    /// Double-double iteration of each pixel.
    DirectExtended,
}

impl Strategy {
    pub fn select(set: &FractalSet, pixel_scale: f64) -> Self {
        if pixel_scale >= DIRECT_SCALE_LIMIT {
            Self::Direct
        } else if set.supports_perturbation() {
            Self::Perturbation
        } else {
            Self::DirectExtended
        }
    }
}
