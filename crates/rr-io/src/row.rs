//! Plain data row types written by report backends.

use rr_core::Step;
use rr_fleet::{Delivery, Unserved};
use rr_engine::StepSummary;

/// One served stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeliveryRow {
    /// Step after which the delivering `advance` ran.
    pub step:     u64,
    /// Absolute simulated time of the delivery.
    pub time:     f64,
    pub vehicle:  u32,
    pub request:  u64,
    pub node:     u32,
    pub quantity: u32,
}

impl DeliveryRow {
    pub fn new(step: Step, delivery: &Delivery, time: f64) -> Self {
        Self {
            step:     step.0,
            time,
            vehicle:  delivery.vehicle.0,
            request:  delivery.request.0,
            node:     delivery.node.0,
            quantity: delivery.quantity,
        }
    }
}

/// Counters for one engine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepSummaryRow {
    pub step:        u64,
    pub events:      u64,
    pub changes:     u64,
    pub retried:     u64,
    pub replanned:   u64,
    pub stale:       u64,
    pub handed_back: u64,
    pub reclaimed:   u64,
    pub assigned:    u64,
    pub unserved:    u64,
    pub reordered:   u64,
    pub homing:      u64,
}

impl From<&StepSummary> for StepSummaryRow {
    fn from(s: &StepSummary) -> Self {
        Self {
            step:        s.step.0,
            events:      s.events as u64,
            changes:     s.changes as u64,
            retried:     s.retried as u64,
            replanned:   s.replanned as u64,
            stale:       s.stale as u64,
            handed_back: s.handed_back as u64,
            reclaimed:   s.reclaimed as u64,
            assigned:    s.assigned as u64,
            unserved:    s.unserved.len() as u64,
            reordered:   s.reordered as u64,
            homing:      s.homing as u64,
        }
    }
}

/// A request the fleet gave up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnservedRow {
    pub step:     u64,
    pub request:  u64,
    pub node:     u32,
    pub quantity: u32,
    pub reason:   &'static str,
}

impl UnservedRow {
    pub fn new(step: Step, unserved: &Unserved) -> Self {
        Self {
            step:     step.0,
            request:  unserved.request.0,
            node:     unserved.node.0,
            quantity: unserved.quantity,
            reason:   unserved.reason.as_str(),
        }
    }
}
