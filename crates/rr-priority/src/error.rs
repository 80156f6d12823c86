use thiserror::Error;

use rr_core::{NodeId, RequestId};
use rr_graph::GraphError;

#[derive(Debug, Error)]
pub enum PriorityError {
    #[error("request {request} targets node {node}, which is not in the graph")]
    UnknownNode { request: RequestId, node: NodeId },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

pub type PriorityResult<T> = Result<T, PriorityError>;
