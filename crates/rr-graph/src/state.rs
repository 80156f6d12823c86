//! Edge availability state and the change events emitted on transitions.

use std::fmt;
use std::str::FromStr;

use rr_core::{DEFAULT_DEGRADED_PENALTY, EdgeId};

use crate::GraphError;

/// Current availability of a road segment.
///
/// Transitions are externally driven and may go in any direction.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EdgeState {
    #[default]
    Up,
    /// Passable at a multiplied cost.  `penalty >= 1`.
    Degraded { penalty: f64 },
    /// Impassable; excluded from every search.
    Down,
}

impl EdgeState {
    /// `Degraded` with the default penalty.
    pub fn degraded() -> Self {
        EdgeState::Degraded { penalty: DEFAULT_DEGRADED_PENALTY }
    }

    #[inline]
    pub fn is_passable(self) -> bool {
        !matches!(self, EdgeState::Down)
    }

    /// Cost multiplier for this state (`1.0` when Up, infinite when Down).
    #[inline]
    pub fn penalty(self) -> f64 {
        match self {
            EdgeState::Up                    => 1.0,
            EdgeState::Degraded { penalty }  => penalty,
            EdgeState::Down                  => f64::INFINITY,
        }
    }

    /// Up/Down transitions must never be dropped by a bounded queue;
    /// Degraded-level updates may be coalesced to the newest per edge.
    #[inline]
    pub fn is_critical(self) -> bool {
        !matches!(self, EdgeState::Degraded { .. })
    }

    /// Check that a Degraded penalty is usable as a cost multiplier.
    pub fn validate(self, edge: EdgeId) -> Result<(), GraphError> {
        if let EdgeState::Degraded { penalty } = self {
            if !penalty.is_finite() || penalty < 1.0 {
                return Err(GraphError::InvalidEdgeState {
                    edge,
                    reason: format!("degraded penalty {penalty} must be finite and >= 1"),
                });
            }
        }
        Ok(())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EdgeState::Up               => "up",
            EdgeState::Degraded { .. }  => "degraded",
            EdgeState::Down             => "down",
        }
    }
}

impl fmt::Display for EdgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeState::Degraded { penalty } => write!(f, "degraded:{penalty}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Error returned by [`EdgeState::from_str`].  The engine re-wraps it as
/// [`GraphError::InvalidEdgeState`] once the edge id is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEdgeStateError(pub String);

impl fmt::Display for ParseEdgeStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal edge state {:?}", self.0)
    }
}

impl std::error::Error for ParseEdgeStateError {}

impl FromStr for EdgeState {
    type Err = ParseEdgeStateError;

    /// Accepts `up`, `down`, `degraded` and `degraded:<penalty>`
    /// (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "up"       => return Ok(EdgeState::Up),
            "down"     => return Ok(EdgeState::Down),
            "degraded" => return Ok(EdgeState::degraded()),
            _ => {}
        }
        let penalty = lower
            .strip_prefix("degraded:")
            .and_then(|p| p.parse::<f64>().ok())
            .ok_or_else(|| ParseEdgeStateError(s.to_string()))?;
        if !penalty.is_finite() || penalty < 1.0 {
            return Err(ParseEdgeStateError(s.to_string()));
        }
        Ok(EdgeState::Degraded { penalty })
    }
}

/// Emitted by [`Graph::set_edge_state`][crate::Graph::set_edge_state] for
/// every effective transition.  `version` is the graph version *after* the
/// change.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EdgeStateChange {
    pub edge:    EdgeId,
    pub from:    EdgeState,
    pub to:      EdgeState,
    pub version: u64,
}

impl EdgeStateChange {
    /// The edge went from impassable to passable.
    #[inline]
    pub fn is_recovery(&self) -> bool {
        !self.from.is_passable() && self.to.is_passable()
    }

    /// The edge should be routed around: it went Down, or its degraded
    /// penalty crossed `threshold` from below.
    pub fn requires_replan(&self, threshold: f64) -> bool {
        match self.to {
            EdgeState::Down => self.from.is_passable(),
            EdgeState::Degraded { penalty } => {
                penalty >= threshold && self.from.penalty() < threshold
            }
            EdgeState::Up => false,
        }
    }
}
