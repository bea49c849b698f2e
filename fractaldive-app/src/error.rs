use thiserror::Error;

use fractaldive_render::RenderError;

/// Errors surfaced by the command-line driver.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Usage(String),

    #[error("script line {line}: {message}")]
    Script { line: usize, message: String },

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Core(#[from] fractaldive_core::CoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
