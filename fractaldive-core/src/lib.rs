//! Deep-zoom escape-time fractal engine.
//!
//! The numerics (`f64` and double-double), the per-family iteration rules,
//! reference-orbit perturbation, and the camera model. Rendering and
//! scheduling live in `fractaldive-render`.

pub mod complex;
pub mod complex_dd;
pub mod double_double;
pub mod error;
pub mod fractal;
pub mod iterator;
pub mod perturbation;
pub mod persistence;
pub mod reference;
pub mod view;
pub mod viewport;

// Re-export primary types for convenience.
pub use complex::Complex;
pub use complex_dd::ComplexDD;
pub use double_double::DoubleDouble;
pub use error::CoreError;
pub use fractal::{FractalSet, IterationParams, PixelResult};
pub use iterator::{iterate, iterate_dd, iterate_point, iterate_point_dd};
pub use perturbation::{evaluate_pixel, Perturbation};
pub use persistence::ViewRecord;
pub use reference::{ReferenceOrbit, ReferenceOrbitService};
pub use view::{Mode, ViewModel, ViewState};
pub use viewport::{Strategy, Viewport};

/// Convenience result type for the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
