//! Base error type.
//!
//! Sub-crates define their own error enums and convert `CoreError` into them
//! via `From` impls, so lookups and configuration checks in `rr-core` can be
//! propagated with `?` anywhere in the workspace.

use thiserror::Error;

use crate::{EdgeId, NodeId, RequestId, VehicleId};

/// The top-level error type for `rr-core` and a common base for sub-crates.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    #[error("edge {0} not found")]
    EdgeNotFound(EdgeId),

    #[error("vehicle {0} not found")]
    VehicleNotFound(VehicleId),

    #[error("request {0} not found")]
    RequestNotFound(RequestId),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Shorthand result type for `rr-core`.
pub type CoreResult<T> = Result<T, CoreError>;
