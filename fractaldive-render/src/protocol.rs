//! Messages exchanged between the scheduler and its workers.

use serde::{Deserialize, Serialize};

use fractaldive_core::{
    Complex, ComplexDD, DoubleDouble, FractalSet, IterationParams, PixelResult, ViewState, Viewport,
};

use crate::error::RenderError;
use crate::tile::Tile;

/// Everything needed to render one frame, independent of any UI state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameSpec {
    pub view: ViewState,
    pub set: FractalSet,
    pub width: u32,
    pub height: u32,
    pub max_iterations: u32,
}

impl FrameSpec {
    pub fn new(view: ViewState, set: FractalSet, width: u32, height: u32, max_iterations: u32) -> Self {
        Self {
            view,
            set,
            width,
            height,
            max_iterations,
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        IterationParams::new(self.max_iterations, IterationParams::DEFAULT_BAILOUT)?;
        Ok(())
    }

    pub fn viewport(&self) -> Viewport {
        self.view.viewport(self.width, self.height)
    }

    /// The request for one band of this frame.
    pub fn band_request(&self, tile: &Tile) -> TaskRequest {
        let center = self.view.center();
        TaskRequest {
            width: self.width,
            height: self.height,
            center_x: center.re.hi,
            center_y: center.im.hi,
            center_x_lo: center.re.lo,
            center_y_lo: center.im.lo,
            zoom: self.view.zoom(),
            max_iterations: self.max_iterations,
            start_row: tile.start_row,
            end_row: tile.end_row,
            task_id: tile.task_id,
            set: self.set,
        }
    }
}

/// Compute request for rows `[start_row, end_row)` of a frame.
///
/// The centre travels as double-double words so deep views survive the
/// trip; `*_lo` default to zero for plain `f64` producers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub width: u32,
    pub height: u32,
    pub center_x: f64,
    pub center_y: f64,
    #[serde(default)]
    pub center_x_lo: f64,
    #[serde(default)]
    pub center_y_lo: f64,
    pub zoom: f64,
    pub max_iterations: u32,
    pub start_row: u32,
    pub end_row: u32,
    pub task_id: u64,
    #[serde(default)]
    pub set: FractalSet,
}

impl TaskRequest {
    pub fn center(&self) -> ComplexDD {
        ComplexDD::new(
            DoubleDouble::new(self.center_x, self.center_x_lo),
            DoubleDouble::new(self.center_y, self.center_y_lo),
        )
    }

    pub fn viewport(&self) -> crate::Result<Viewport> {
        Ok(Viewport::from_view(self.center(), self.zoom, self.width, self.height)?)
    }

    pub fn params(&self) -> crate::Result<IterationParams> {
        Ok(IterationParams::new(self.max_iterations, IterationParams::DEFAULT_BAILOUT)?)
    }

    pub fn tile(&self) -> Tile {
        Tile {
            start_row: self.start_row,
            end_row: self.end_row,
            task_id: self.task_id,
        }
    }
}

/// Result of one band: one entry per pixel, row-major.
///
/// A pixel is bounded exactly when its count equals `max_iterations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub iterations: Vec<u32>,
    pub final_z: Vec<Complex>,
    pub start_row: u32,
    pub end_row: u32,
    pub task_id: u64,
    /// Pixels evaluated by perturbation.
    #[serde(default)]
    pub perturbed: u32,
    /// Of those, pixels that glitched and were finished directly.
    #[serde(default)]
    pub glitched: u32,
}

impl TaskResponse {
    /// Rebuild per-pixel results for a frame iterated up to `max_iterations`.
    pub fn pixels(&self, max_iterations: u32) -> impl Iterator<Item = PixelResult> + '_ {
        self.iterations
            .iter()
            .zip(&self.final_z)
            .map(move |(&n, &z)| {
                if n >= max_iterations {
                    PixelResult::bounded(max_iterations, z)
                } else {
                    PixelResult::escaped(n, z)
                }
            })
    }
}
