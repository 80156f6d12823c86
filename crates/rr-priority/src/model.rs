//! Urgency scoring.
//!
//! Raw urgency for a node is a weighted sum of its severity and population
//! density.  Scores are normalised by the largest raw value over the nodes
//! that currently have outstanding demand, so the active set always spans
//! `[0, 1]`.  Nodes without outstanding demand score 0.

use std::cmp::Ordering;

use rustc_hash::FxHashMap;

use rr_core::{NodeId, Request, RequestId, UrgencyWeights};
use rr_graph::Graph;

use crate::{PriorityError, PriorityResult};

/// Derives per-node urgency and the allocation order of pending requests.
///
/// Recomputation is lazy: callers mark the model dirty when a severity
/// report or a new request arrives, and [`refresh`](Self::refresh) only does
/// work when the flag is set.
#[derive(Clone, Debug)]
pub struct UrgencyModel {
    weights: UrgencyWeights,
    dirty:   bool,
}

impl UrgencyModel {
    pub fn new(weights: UrgencyWeights) -> Self {
        Self { weights, dirty: true }
    }

    pub fn weights(&self) -> &UrgencyWeights {
        &self.weights
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// `severity·w_s + population·w_p` before normalisation.
    #[inline]
    pub fn raw_score(&self, severity: f64, population: f64) -> f64 {
        severity * self.weights.severity + population * self.weights.population
    }

    /// Apply a severity report to `node` and mark the model dirty.
    pub fn report(&mut self, graph: &mut Graph, node: NodeId, severity: f64, population: f64) -> PriorityResult<()> {
        graph.set_priority_inputs(node, severity, population)?;
        self.dirty = true;
        Ok(())
    }

    /// Recompute only if something changed since the last run.
    ///
    /// Returns `true` if a recomputation happened.
    pub fn refresh(&mut self, graph: &mut Graph, requests: &mut [Request]) -> PriorityResult<bool> {
        if !self.dirty {
            return Ok(false);
        }
        self.recompute(graph, requests)?;
        Ok(true)
    }

    /// Unconditionally recompute urgency for every node and every
    /// outstanding request.
    pub fn recompute(&mut self, graph: &mut Graph, requests: &mut [Request]) -> PriorityResult<()> {
        // Raw score per node with outstanding demand.
        let mut raw: FxHashMap<NodeId, f64> = FxHashMap::default();
        for req in requests.iter().filter(|r| r.status.is_outstanding()) {
            if raw.contains_key(&req.node) {
                continue;
            }
            let (Some(sev), Some(pop)) = (graph.severity(req.node), graph.population(req.node)) else {
                return Err(PriorityError::UnknownNode { request: req.id, node: req.node });
            };
            raw.insert(req.node, self.raw_score(sev, pop));
        }

        let max = raw.values().copied().fold(0.0_f64, f64::max);
        let norm = |score: f64| if max > 0.0 { score / max } else { 0.0 };

        let nodes: Vec<NodeId> = graph.node_ids().collect();
        for node in nodes {
            let u = raw.get(&node).map_or(0.0, |&s| norm(s));
            graph.set_urgency(node, u)?;
        }
        for req in requests.iter_mut().filter(|r| r.status.is_outstanding()) {
            req.urgency = raw.get(&req.node).map_or(0.0, |&s| norm(s));
        }

        tracing::debug!(active_nodes = raw.len(), max_raw = max, "urgency recomputed");
        self.dirty = false;
        Ok(())
    }
}

impl Default for UrgencyModel {
    fn default() -> Self {
        Self::new(UrgencyWeights::default())
    }
}

/// Allocation order: urgency descending, then earliest request first.
#[inline]
pub fn priority_cmp(a: &Request, b: &Request) -> Ordering {
    b.urgency
        .total_cmp(&a.urgency)
        .then_with(|| a.id.cmp(&b.id))
}

/// Ids of all `Pending` requests in allocation order.
pub fn ordered_pending(requests: &[Request]) -> Vec<RequestId> {
    let mut pending: Vec<&Request> = requests.iter().filter(|r| r.is_pending()).collect();
    pending.sort_by(|a, b| priority_cmp(a, b));
    pending.into_iter().map(|r| r.id).collect()
}
