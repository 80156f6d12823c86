//! Plan snapshots and unserved-request reports handed to callers.

use rr_core::{NodeId, RequestId, UnservedReason, VehicleId};

use crate::RouteState;

/// One stop in a [`DeliveryPlan`].
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlannedStop {
    pub request:  RequestId,
    pub node:     NodeId,
    pub quantity: u32,
    /// Absolute simulation time of arrival, seconds.
    pub eta:      f64,
}

/// The remaining committed route of one vehicle.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeliveryPlan {
    pub vehicle:     VehicleId,
    pub state:       RouteState,
    pub stops:       Vec<PlannedStop>,
    /// Product of the reliabilities of every edge still to be traversed.
    pub reliability: f64,
    /// Cost of the remaining path under the current graph state.
    pub cost:        f64,
    /// Remaining node path, starting at the vehicle's current node.
    pub path:        Vec<NodeId>,
}

impl DeliveryPlan {
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn total_quantity(&self) -> u32 {
        self.stops.iter().map(|s| s.quantity).sum()
    }
}

/// Demand the fleet cannot currently serve.  A reported outcome, not an error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Unserved {
    pub request:  RequestId,
    pub node:     NodeId,
    pub quantity: u32,
    pub reason:   UnservedReason,
}
