use fractaldive_core::{Complex, PixelResult};

use crate::protocol::TaskResponse;

/// Stores per-pixel [`PixelResult`] data for a full frame.
///
/// This is the raw output of the renderer before coloring. Keeping iteration
/// data separate from colored pixels enables instant palette switching without
/// re-computing iterations.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationBuffer {
    pub width: u32,
    pub height: u32,
    pub max_iterations: u32,
    pub data: Vec<PixelResult>,
}

impl IterationBuffer {
    pub fn new(width: u32, height: u32, max_iterations: u32) -> Self {
        let size = width as usize * height as usize;
        Self {
            width,
            height,
            max_iterations,
            data: vec![PixelResult::bounded(max_iterations, Complex::ZERO); size],
        }
    }

    pub fn get(&self, x: u32, y: u32) -> PixelResult {
        self.data[(y * self.width + x) as usize]
    }

    /// Copy a row-major run of results starting at `start_row`.
    ///
    /// Rows past the bottom of the buffer are dropped.
    pub fn blit_rows(&mut self, start_row: u32, rows: &[PixelResult]) {
        let offset = (start_row * self.width) as usize;
        if offset >= self.data.len() {
            return;
        }
        let len = rows.len().min(self.data.len() - offset);
        self.data[offset..offset + len].copy_from_slice(&rows[..len]);
    }

    /// Merge one band's response.
    pub fn merge(&mut self, response: &TaskResponse) {
        let rows: Vec<PixelResult> = response.pixels(self.max_iterations).collect();
        self.blit_rows(response.start_row, &rows);
    }

    pub fn escaped_count(&self) -> usize {
        self.data.iter().filter(|r| r.escaped).count()
    }
}
