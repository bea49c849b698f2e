//! Frame rendering for fractaldive: band partitioning, the worker pool,
//! coloring, and PNG export.

pub mod buffer;
pub mod error;
pub mod export;
pub mod iteration_buffer;
pub mod palette;
pub mod protocol;
pub mod renderer;
pub mod scheduler;
pub mod tile;

pub use buffer::RenderBuffer;
pub use error::RenderError;
pub use export::{export_png, render_zoom_sequence, ExportMetadata, ZoomSequence};
pub use iteration_buffer::IterationBuffer;
pub use palette::{builtin_themes, theme_by_name, ColorScale, ColorSettings, ColorTheme, Palette};
pub use protocol::{FrameSpec, TaskRequest, TaskResponse};
pub use renderer::{compute_band, render_frame, RenderCancel, RenderResult};
pub use scheduler::{CompletedFrame, TileScheduler};
pub use tile::{partition_rows, Tile};

/// Convenience result type for the render crate.
pub type Result<T> = std::result::Result<T, RenderError>;
