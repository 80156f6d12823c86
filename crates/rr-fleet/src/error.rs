use thiserror::Error;

use rr_core::{NodeId, VehicleId};
use rr_graph::GraphError;

#[derive(Debug, Error)]
pub enum FleetError {
    /// Assignments are rejected, never clipped.
    #[error("vehicle {vehicle} cannot take {requested} units, only {remaining} remaining")]
    CapacityExceeded { vehicle: VehicleId, requested: u32, remaining: u32 },

    #[error("vehicle {0} not found")]
    VehicleNotFound(VehicleId),

    #[error("vehicle {vehicle} is retired")]
    Inactive { vehicle: VehicleId },

    #[error("leg for vehicle {vehicle} starts at {got}, expected {expected}")]
    LegOriginMismatch { vehicle: VehicleId, expected: NodeId, got: NodeId },

    #[error("vehicle {vehicle} has {legs} legs but {edits} edits were given")]
    EditCountMismatch { vehicle: VehicleId, legs: usize, edits: usize },

    #[error("routing failed: {0}")]
    Routing(#[from] GraphError),
}

pub type FleetResult<T> = Result<T, FleetError>;
