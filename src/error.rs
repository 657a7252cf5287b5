// Error taxonomy for the discovery pipeline surface

use thiserror::Error;

/// Errors that can reach the caller. Everything else (calibration
/// failures, degenerate cells, saturated channels) is recovered locally
/// and at most logged.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Structurally malformed input, detected before any work starts.
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// Cooperative cancellation; partial results may accompany it.
    #[error("run cancelled before completion")]
    Cancelled,

    /// I/O or parse failure in one of the narrow input adapters.
    #[error("data load failed: {0}")]
    DataLoad(String),
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::DataLoad(err.to_string())
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        EngineError::DataLoad(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::DataLoad(err.to_string())
    }
}
