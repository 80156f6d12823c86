//! Graph-subsystem error type.

use thiserror::Error;

use rr_core::{EdgeId, NodeId};

/// Errors produced by `rr-graph`.
///
/// Ingestion errors reject the whole graph; nothing is partially built.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("no path from {from} to {to}")]
    NoPathFound { from: NodeId, to: NodeId },

    #[error("node {0} not found in graph")]
    NodeNotFound(NodeId),

    #[error("invalid state for edge {edge}: {reason}")]
    InvalidEdgeState { edge: EdgeId, reason: String },

    #[error("duplicate node id {0}")]
    DuplicateNode(NodeId),

    #[error("duplicate edge id {0}")]
    DuplicateEdge(EdgeId),

    #[error("edge {edge} references unknown node {node}")]
    DanglingEdge { edge: EdgeId, node: NodeId },

    #[error("edge {edge} reliability {value} is outside [0, 1]")]
    ReliabilityOutOfRange { edge: EdgeId, value: f64 },

    #[error("edge {edge} travel time {value} must be finite and > 0")]
    InvalidTravelTime { edge: EdgeId, value: f64 },

    #[error("node {node} {field} {value} must be finite and >= 0")]
    InvalidNodeAttribute { node: NodeId, field: &'static str, value: f64 },

    #[error("node {0} has non-finite coordinates")]
    InvalidCoordinates(NodeId),
}

pub type GraphResult<T> = Result<T, GraphError>;
