use thiserror::Error;

/// Errors originating from the core fractal engine.
///
/// Numerical degradation (precision exhaustion, perturbation glitches) is
/// never reported here; only invalid construction parameters are.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid max iterations: {0} (must be >= 1)")]
    InvalidMaxIterations(u32),

    #[error("invalid bailout radius: {0} (must be > 0.0 and finite)")]
    InvalidBailout(f64),

    #[error("invalid zoom: {0} (must be > 0.0 and finite)")]
    InvalidZoom(f64),

    #[error("invalid viewport: {reason}")]
    InvalidViewport { reason: String },

    #[error("cannot parse fractal set from {input:?}: {reason}")]
    ParseFractalSet { input: String, reason: String },
}
