use thiserror::Error;

use rr_core::VehicleId;
use rr_fleet::FleetError;

#[derive(Debug, Error)]
pub enum ReplanError {
    /// A newer recomputation was scheduled for this vehicle.
    #[error("replan for vehicle {vehicle} is stale (generation {generation}, current {current})")]
    StaleComputation { vehicle: VehicleId, generation: u64, current: u64 },

    /// The graph changed after the result was computed.
    #[error("replan for vehicle {vehicle} was computed on graph version {computed}, now {current}")]
    GraphChanged { vehicle: VehicleId, computed: u64, current: u64 },

    #[error("vehicle {0} not found")]
    VehicleNotFound(VehicleId),

    #[error("edge event queue is closed")]
    QueueClosed,

    #[error(transparent)]
    Fleet(#[from] FleetError),
}

impl ReplanError {
    /// Superseded results are discarded silently by the engine.
    pub fn is_stale(&self) -> bool {
        matches!(self, ReplanError::StaleComputation { .. } | ReplanError::GraphChanged { .. })
    }
}

pub type ReplanResult<T> = Result<T, ReplanError>;
