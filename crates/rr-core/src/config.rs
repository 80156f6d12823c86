//! Engine configuration.
//!
//! Route cost weights, urgency weights and the stop-ordering policy all live
//! here.  Harnesses typically load an [`EngineConfig`] from JSON (with the `serde`
//! feature) and pass it to `rr_engine::EngineBuilder`.

use crate::{CoreError, CoreResult};

/// Penalty multiplier applied to a Degraded edge when the report names no level.
pub const DEFAULT_DEGRADED_PENALTY: f64 = 2.0;

// ── Cost weights ──────────────────────────────────────────────────────────────

/// Per-edge cost: `time·travel_time + reliability·(1 − edge_reliability)`,
/// multiplied by the edge's degraded penalty when it is Degraded.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CostWeights {
    pub time:             f64,
    pub reliability:      f64,
    /// Default penalty for `Degraded` reports that carry no level.  ≥ 1.
    pub degraded_penalty: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            time:             1.0,
            reliability:      10.0,
            degraded_penalty: DEFAULT_DEGRADED_PENALTY,
        }
    }
}

// ── Urgency weights ───────────────────────────────────────────────────────────

/// Raw urgency is `severity·s + population_density·p`, normalised across the
/// active demand set.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UrgencyWeights {
    pub severity:   f64,
    pub population: f64,
}

impl Default for UrgencyWeights {
    fn default() -> Self {
        Self { severity: 1.0, population: 0.01 }
    }
}

// ── Refinement policy ─────────────────────────────────────────────────────────

/// Which per-vehicle stop-reordering algorithm runs after greedy assignment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RefineStrategy {
    /// Leave the greedy order untouched.
    Off,
    /// Held-Karp DP; skipped for vehicles with more than `dp_max_stops` stops.
    ExactDp,
    /// Repeated pairwise swaps until no swap improves the objective.
    PairwiseExchange,
    /// `ExactDp` when small enough, `PairwiseExchange` otherwise.
    #[default]
    Auto,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RefinePolicy {
    pub strategy:            RefineStrategy,
    /// DP is O(2ⁿ·n²); keep this small.
    pub dp_max_stops:        usize,
    pub max_exchange_rounds: usize,
    /// Weight of Σ urgency·arrival_time relative to travel cost.
    pub idle_weight:         f64,
}

impl Default for RefinePolicy {
    fn default() -> Self {
        Self {
            strategy:            RefineStrategy::Auto,
            dp_max_stops:        8,
            max_exchange_rounds: 50,
            idle_weight:         0.1,
        }
    }
}

// ── EngineConfig ──────────────────────────────────────────────────────────────

/// Top-level engine configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    pub cost:    CostWeights,
    pub urgency: UrgencyWeights,
    pub refine:  RefinePolicy,

    /// A Degraded transition triggers replanning only when its penalty is at
    /// least this value.  Down always triggers.
    pub replan_penalty_threshold: f64,

    /// Capacity of the bounded edge-event queue.
    pub event_queue_capacity: usize,

    /// Send vehicles with no remaining stops back to the nearest depot.
    pub return_to_depot: bool,

    /// Put `NoPathFound` requests back to `Pending` when a road recovers.
    pub retry_unreachable_on_recovery: bool,

    /// Seed for collaborators that need randomness (scenario generation).
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cost:                          CostWeights::default(),
            urgency:                       UrgencyWeights::default(),
            refine:                        RefinePolicy::default(),
            replan_penalty_threshold:      1.5,
            event_queue_capacity:          256,
            return_to_depot:               true,
            retry_unreachable_on_recovery: true,
            seed:                          42,
        }
    }
}

impl EngineConfig {
    /// Reject weights that would make edge costs negative or undefined.
    pub fn validate(&self) -> CoreResult<()> {
        let non_negative = [
            ("cost.time", self.cost.time),
            ("cost.reliability", self.cost.reliability),
            ("urgency.severity", self.urgency.severity),
            ("urgency.population", self.urgency.population),
            ("refine.idle_weight", self.refine.idle_weight),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(CoreError::Config(format!("{name} must be finite and >= 0, got {value}")));
            }
        }
        if self.cost.time == 0.0 && self.cost.reliability == 0.0 {
            return Err(CoreError::Config("cost.time and cost.reliability cannot both be 0".into()));
        }
        if !self.cost.degraded_penalty.is_finite() || self.cost.degraded_penalty < 1.0 {
            return Err(CoreError::Config(format!(
                "cost.degraded_penalty must be >= 1, got {}",
                self.cost.degraded_penalty
            )));
        }
        if !self.replan_penalty_threshold.is_finite() || self.replan_penalty_threshold < 1.0 {
            return Err(CoreError::Config(format!(
                "replan_penalty_threshold must be >= 1, got {}",
                self.replan_penalty_threshold
            )));
        }
        if self.event_queue_capacity == 0 {
            return Err(CoreError::Config("event_queue_capacity must be > 0".into()));
        }
        Ok(())
    }
}
