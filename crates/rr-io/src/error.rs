//! Error types for rr-io.

use thiserror::Error;

use rr_engine::EngineError;
use rr_graph::GraphError;

/// Errors raised while loading scenarios or writing run reports.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid scenario: {0}")]
    Invalid(String),

    #[error("invalid scenario graph: {0}")]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Alias for `Result<T, IoError>`.
pub type IoResult<T> = Result<T, IoError>;
