//! Delivery requests and their lifecycle.

use std::fmt;

use crate::{NodeId, RequestId, VehicleId};

/// Why a request could not be served.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnservedReason {
    /// No active vehicle has enough remaining capacity for the quantity.
    CapacityExceeded,
    /// Every vehicle that could carry the quantity is cut off from the node.
    NoPathFound,
}

impl UnservedReason {
    pub fn as_str(self) -> &'static str {
        match self {
            UnservedReason::CapacityExceeded => "capacity_exceeded",
            UnservedReason::NoPathFound      => "no_path_found",
        }
    }
}

impl fmt::Display for UnservedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a [`Request`].
///
/// `Pending → Assigned → Delivered` is the happy path.  An assigned request
/// whose stop becomes unreachable goes back to `Pending` for reassignment.
/// `Unserved` is reported to callers; `NoPathFound` requests may return to
/// `Pending` when a road recovers.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RequestStatus {
    #[default]
    Pending,
    Assigned { vehicle: VehicleId },
    Delivered { vehicle: VehicleId },
    Unserved { reason: UnservedReason },
}

impl RequestStatus {
    /// `true` for requests that still count as outstanding demand.
    #[inline]
    pub fn is_outstanding(self) -> bool {
        matches!(self, RequestStatus::Pending | RequestStatus::Assigned { .. })
    }

    /// `true` once the request can no longer change without outside help.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Delivered { .. } | RequestStatus::Unserved { .. })
    }
}

/// A demand for `quantity` units of supplies at `node`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Request {
    pub id:       RequestId,
    pub node:     NodeId,
    /// Always > 0; enforced at submission.
    pub quantity: u32,
    /// Normalised urgency in [0, 1], refreshed by the priority model.
    pub urgency:  f64,
    pub status:   RequestStatus,
}

impl Request {
    pub fn new(id: RequestId, node: NodeId, quantity: u32) -> Self {
        Self {
            id,
            node,
            quantity,
            urgency: 0.0,
            status:  RequestStatus::Pending,
        }
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}
