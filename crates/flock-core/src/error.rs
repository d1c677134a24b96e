//! Error taxonomy for the autoscaler.

use thiserror::Error;

/// Result type alias for scaling operations.
pub type ScaleResult<T> = Result<T, ScaleError>;

/// Errors surfaced by the scaling engine and its client adapters.
///
/// Read failures abort a reconcile cycle and are retried on the next tick.
/// Write failures abort the cycle after the decision without mutating
/// engine state. Protection failures are absorbed by the engine.
#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("job service read failed: {0}")]
    JobServiceRead(String),

    #[error("runtime read failed: {0}")]
    RuntimeRead(String),

    #[error("runtime write failed: {0}")]
    RuntimeWrite(String),

    #[error("task protection update failed: {0}")]
    Protection(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
