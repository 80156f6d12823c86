use thiserror::Error;

use rr_core::{CoreError, NodeId};
use rr_fleet::FleetError;
use rr_graph::GraphError;
use rr_priority::PriorityError;
use rr_replan::ReplanError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine configuration error: {0}")]
    Config(String),

    #[error("no graph loaded")]
    EmptyGraph,

    #[error("request for node {node} has zero quantity")]
    ZeroQuantity { node: NodeId },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Priority(#[from] PriorityError),

    #[error(transparent)]
    Fleet(#[from] FleetError),

    #[error(transparent)]
    Replan(#[from] ReplanError),
}

pub type EngineResult<T> = Result<T, EngineError>;
