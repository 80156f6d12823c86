//! Seeded road damage and repair.

use rustc_hash::FxHashSet;

use rr_core::{EdgeId, SimRng, Step};
use rr_engine::EngineObserver;
use rr_graph::EdgeState;
use rr_replan::EdgeEventSender;

/// One toggle issued by [`RandomDisruptions`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Disruption {
    pub step:  Step,
    pub edge:  EdgeId,
    pub state: EdgeState,
}

/// An [`EngineObserver`] that damages or repairs one random road every
/// `every` steps.
///
/// A chosen road that is currently up goes Down; one that is down comes back
/// Up.  Events are sent at the start of the step, so that same step applies
/// them.  Step 0 is never disrupted.
pub struct RandomDisruptions {
    sender: EdgeEventSender,
    edges:  Vec<EdgeId>,
    down:   FxHashSet<EdgeId>,
    every:  u64,
    rng:    SimRng,
    log:    Vec<Disruption>,
}

impl RandomDisruptions {
    /// `edges` is the pool to draw from, typically `graph.edge_ids()`.
    /// `every == 0` disables disruptions.
    pub fn new(sender: EdgeEventSender, edges: Vec<EdgeId>, every: u64, seed: u64) -> Self {
        Self {
            sender,
            edges,
            down: FxHashSet::default(),
            every,
            rng: SimRng::new(seed),
            log: Vec::new(),
        }
    }

    /// Every toggle sent so far, in order.
    pub fn log(&self) -> &[Disruption] {
        &self.log
    }

    /// Roads this driver currently holds Down.
    pub fn down_count(&self) -> usize {
        self.down.len()
    }
}

impl EngineObserver for RandomDisruptions {
    fn on_step_start(&mut self, step: Step) {
        if self.every == 0 || step.0 == 0 || step.0 % self.every != 0 || self.edges.is_empty() {
            return;
        }
        let edge = self.edges[self.rng.gen_range(0..self.edges.len())];
        let state = if self.down.contains(&edge) { EdgeState::Up } else { EdgeState::Down };

        match self.sender.send(edge, state) {
            Ok(_) => {
                if state == EdgeState::Down {
                    self.down.insert(edge);
                    tracing::info!(%step, %edge, "road damaged");
                } else {
                    self.down.remove(&edge);
                    tracing::info!(%step, %edge, "road repaired");
                }
                self.log.push(Disruption { step, edge, state });
            }
            Err(e) => tracing::warn!(%step, %edge, error = %e, "disruption not delivered"),
        }
    }
}
