use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use fractaldive_core::PixelResult;

use crate::buffer::RenderBuffer;
use crate::iteration_buffer::IterationBuffer;

/// Stops per theme.
pub const THEME_LEN: usize = 8;

/// Stops advanced per unit of `t`, so `t = 1` lands half way round a theme.
pub const CYCLE_FACTOR: f64 = 4.0;

/// An RGB triple with components in `[0, 1]`.
pub type Rgb = [f32; 3];

const BLACK: [u8; 4] = [0, 0, 0, 255];

// ---------------------------------------------------------------------------
// Themes
// ---------------------------------------------------------------------------

/// A cyclic 8-stop color theme.
///
/// Themes are immutable catalog entries; [`rotated`](Self::rotated)
/// returns a reordered copy.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorTheme {
    pub name: &'static str,
    stops: [Rgb; THEME_LEN],
}

impl ColorTheme {
    pub fn new(name: &'static str, stops: [Rgb; THEME_LEN]) -> Self {
        Self { name, stops }
    }

    pub fn stops(&self) -> &[Rgb; THEME_LEN] {
        &self.stops
    }

    /// Copy with the stops cyclically rotated left by `offset`.
    pub fn rotated(&self, offset: usize) -> Self {
        let mut stops = self.stops;
        stops.rotate_left(offset % THEME_LEN);
        Self {
            name: self.name,
            stops,
        }
    }

    /// Cosine-eased lookup at a position in stop units.
    fn sample(&self, scaled_t: f64) -> Rgb {
        let index = scaled_t.floor().rem_euclid(THEME_LEN as f64) as usize;
        let next = (index + 1) % THEME_LEN;
        let factor = scaled_t - scaled_t.floor();
        let blend = ((1.0 - (factor * PI).cos()) / 2.0) as f32;
        let (a, b) = (self.stops[index], self.stops[next]);
        [
            a[0] + (b[0] - a[0]) * blend,
            a[1] + (b[1] - a[1]) * blend,
            a[2] + (b[2] - a[2]) * blend,
        ]
    }
}

impl Default for ColorTheme {
    fn default() -> Self {
        classic()
    }
}

// ---------------------------------------------------------------------------
// Scale
// ---------------------------------------------------------------------------

/// How an escape count is spread over the palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScale {
    /// Smoothed (log-log corrected) count over the iteration cap.
    #[default]
    Log,
    /// Raw count on a linear axis.
    Linear,
}

impl fmt::Display for ColorScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Log => "log",
            Self::Linear => "linear",
        })
    }
}

impl FromStr for ColorScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "linear" => Ok(Self::Linear),
            other => Err(format!("unknown color scale {other:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// Continuous escape count `n + 1 − log₂(log₂|z|²)`.
///
/// The correction is dropped when `|z|² < 1` or its inner log is not
/// positive.
pub fn smooth_iteration(result: &PixelResult) -> f64 {
    let norm_sq = result.final_z.norm_sq();
    let mut correction = 0.0;
    if norm_sq >= 1.0 {
        let inner = norm_sq.log2();
        if inner > 0.0 {
            correction = inner.log2();
        }
    }
    result.iterations as f64 + 1.0 - correction
}

/// Palette position in `[0, 1]` for an escaped result.
fn palette_t(result: &PixelResult, max_iterations: u32, scale: ColorScale) -> f64 {
    let max = max_iterations.max(1) as f64;
    match scale {
        ColorScale::Linear => result.iterations as f64 / max,
        ColorScale::Log => smooth_iteration(result) / max,
    }
}

/// Map one result to a color.
///
/// Bounded points (not escaped, or at the iteration cap) are black.
pub fn color_for(result: &PixelResult, max_iterations: u32, theme: &ColorTheme, scale: ColorScale) -> Rgb {
    if !result.escaped || result.iterations >= max_iterations {
        return [0.0; 3];
    }
    let t = palette_t(result, max_iterations, scale);
    theme.sample(t * CYCLE_FACTOR)
}

fn to_rgba8(c: Rgb) -> [u8; 4] {
    let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    [q(c[0]), q(c[1]), q(c[2]), 255]
}

/// User-facing color settings: theme, scale and rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorSettings {
    pub theme: ColorTheme,
    pub scale: ColorScale,
    pub offset: usize,
}

impl Default for ColorSettings {
    fn default() -> Self {
        Self {
            theme: classic(),
            scale: ColorScale::Log,
            offset: 0,
        }
    }
}

/// A ready-to-use mapper: the rotated theme plus its scale.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    theme: ColorTheme,
    scale: ColorScale,
}

impl Palette {
    pub fn new(settings: &ColorSettings) -> Self {
        Self {
            theme: settings.theme.rotated(settings.offset),
            scale: settings.scale,
        }
    }

    pub fn name(&self) -> &'static str {
        self.theme.name
    }

    pub fn scale(&self) -> ColorScale {
        self.scale
    }

    /// Map a single result to an RGBA color.
    pub fn color(&self, result: &PixelResult, max_iterations: u32) -> [u8; 4] {
        if !result.escaped || result.iterations >= max_iterations {
            return BLACK;
        }
        to_rgba8(color_for(result, max_iterations, &self.theme, self.scale))
    }

    /// Colorize an entire iteration buffer into an RGBA pixel buffer.
    pub fn colorize(&self, iter_buf: &IterationBuffer) -> RenderBuffer {
        let mut out = RenderBuffer::new(iter_buf.width, iter_buf.height);
        self.colorize_into(iter_buf, &mut out);
        out
    }

    /// Colorize into an existing buffer, resizing it if needed.
    pub fn colorize_into(&self, iter_buf: &IterationBuffer, out: &mut RenderBuffer) {
        out.ensure_size(iter_buf.width, iter_buf.height);
        let max = iter_buf.max_iterations;
        out.pixels
            .par_chunks_mut(4)
            .zip(iter_buf.data.par_iter())
            .for_each(|(pixel, result)| {
                pixel.copy_from_slice(&self.color(result, max));
            });
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(&ColorSettings::default())
    }
}

// ---------------------------------------------------------------------------
// Builtin themes
// ---------------------------------------------------------------------------

pub fn builtin_themes() -> Vec<ColorTheme> {
    vec![classic(), fire(), ocean(), neon(), grayscale(), sunset()]
}

/// Case-insensitive catalog lookup; unknown names give `classic`.
pub fn theme_by_name(name: &str) -> ColorTheme {
    builtin_themes()
        .into_iter()
        .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
        .unwrap_or_else(classic)
}

fn rgb(r: u8, g: u8, b: u8) -> Rgb {
    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
}

fn classic() -> ColorTheme {
    ColorTheme::new(
        "classic",
        [
            rgb(0, 7, 100),
            rgb(32, 107, 203),
            rgb(237, 255, 255),
            rgb(255, 170, 0),
            rgb(200, 82, 0),
            rgb(0, 2, 0),
            rgb(12, 12, 60),
            rgb(0, 30, 140),
        ],
    )
}

fn fire() -> ColorTheme {
    ColorTheme::new(
        "fire",
        [
            rgb(0, 0, 0),
            rgb(80, 0, 0),
            rgb(160, 20, 0),
            rgb(255, 80, 0),
            rgb(255, 160, 0),
            rgb(255, 230, 60),
            rgb(255, 255, 200),
            rgb(120, 30, 0),
        ],
    )
}

fn ocean() -> ColorTheme {
    ColorTheme::new(
        "ocean",
        [
            rgb(0, 0, 30),
            rgb(0, 30, 80),
            rgb(0, 50, 120),
            rgb(0, 100, 170),
            rgb(0, 150, 200),
            rgb(100, 220, 255),
            rgb(240, 255, 255),
            rgb(20, 70, 110),
        ],
    )
}

fn neon() -> ColorTheme {
    ColorTheme::new(
        "neon",
        [
            rgb(10, 0, 20),
            rgb(80, 0, 150),
            rgb(200, 0, 200),
            rgb(255, 40, 120),
            rgb(0, 200, 255),
            rgb(0, 255, 100),
            rgb(230, 255, 0),
            rgb(40, 0, 60),
        ],
    )
}

fn grayscale() -> ColorTheme {
    ColorTheme::new(
        "grayscale",
        [
            rgb(0, 0, 0),
            rgb(36, 36, 36),
            rgb(73, 73, 73),
            rgb(109, 109, 109),
            rgb(146, 146, 146),
            rgb(182, 182, 182),
            rgb(219, 219, 219),
            rgb(255, 255, 255),
        ],
    )
}

fn sunset() -> ColorTheme {
    ColorTheme::new(
        "sunset",
        [
            rgb(25, 10, 60),
            rgb(90, 20, 100),
            rgb(170, 40, 110),
            rgb(240, 80, 90),
            rgb(255, 140, 70),
            rgb(255, 200, 90),
            rgb(255, 240, 180),
            rgb(60, 20, 80),
        ],
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
