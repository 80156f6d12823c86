//! Routing trait, edge cost model, and the Dijkstra/A* implementations.
//!
//! # Pluggability
//!
//! The fleet allocator and the replanner call routing via the [`Router`]
//! trait, so harnesses can swap in their own search without touching the
//! engine.  [`AStarRouter`] is the engine default; it falls back to plain
//! Dijkstra whenever the graph lacks coordinates.
//!
//! # Cost
//!
//! Per-edge cost depends on the [`RouteMode`]:
//!
//! | Mode           | Cost per edge                                          |
//! |----------------|--------------------------------------------------------|
//! | `Balanced`     | `(w_time·t + w_rel·(1 − r)) · penalty`                 |
//! | `Fastest`      | `t · penalty`                                          |
//! | `MostReliable` | `−ln(r) · penalty` (maximises the reliability product) |
//!
//! `penalty` is 1 for Up edges and the degraded multiplier for Degraded ones.
//! Down edges never enter the search.
//!
//! # Tie-breaking
//!
//! Labels compare on cost, then higher aggregate reliability, then fewer
//! hops, then lower node index.  Every queue pop and every relaxation uses
//! this order, so a route is fully determined by the graph state.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rr_core::{CostWeights, EdgeId, NodeId};

use crate::network::{EdgeView, Graph};
use crate::{GraphError, GraphResult};

// ── RouteMode ─────────────────────────────────────────────────────────────────

/// Objective used by a route search.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RouteMode {
    /// Weighted time + unreliability, per [`CostWeights`].
    #[default]
    Balanced,
    /// Travel time only.
    Fastest,
    /// Highest product of edge reliabilities.
    MostReliable,
}

// ── CostModel ─────────────────────────────────────────────────────────────────

/// Turns edge attributes and state into a scalar search cost.
#[derive(Clone, Debug, PartialEq)]
pub struct CostModel {
    weights: CostWeights,
}

impl CostModel {
    pub fn new(weights: CostWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &CostWeights {
        &self.weights
    }

    /// Cost of traversing `edge` in its current state.  Infinite when the
    /// edge is Down (or, in `MostReliable` mode, has reliability 0).
    pub fn edge_cost(&self, edge: &EdgeView, mode: RouteMode) -> f64 {
        self.raw_cost(edge.travel_time, edge.reliability, mode) * edge.state.penalty()
    }

    /// Sum of [`edge_cost`](Self::edge_cost) over `edges`, or `None` if an
    /// edge is unknown or currently impassable.
    pub fn path_cost(&self, graph: &Graph, edges: &[EdgeId], mode: RouteMode) -> Option<f64> {
        let mut total = 0.0;
        for &e in edges {
            let view = graph.edge(e)?;
            if !view.state.is_passable() {
                return None;
            }
            total += self.edge_cost(&view, mode);
        }
        Some(total)
    }

    #[inline]
    fn raw_cost(&self, travel_time: f64, reliability: f64, mode: RouteMode) -> f64 {
        match mode {
            RouteMode::Balanced => {
                self.weights.time * travel_time + self.weights.reliability * (1.0 - reliability)
            }
            RouteMode::Fastest => travel_time,
            RouteMode::MostReliable => {
                if reliability > 0.0 { -reliability.ln() } else { f64::INFINITY }
            }
        }
    }

    #[inline]
    fn cost_at(&self, graph: &Graph, e: u32, mode: RouteMode) -> f64 {
        self.raw_cost(graph.travel_time_at(e), graph.reliability_at(e), mode)
            * graph.state_at(e).penalty()
    }

    /// Admissible cost-per-metre factor for A*, or `None` when the mode or
    /// graph has no usable lower bound.
    fn heuristic_scale(&self, graph: &Graph, mode: RouteMode) -> Option<f64> {
        let per_metre = graph.time_per_metre()?;
        let scale = match mode {
            RouteMode::Balanced     => self.weights.time * per_metre,
            RouteMode::Fastest      => per_metre,
            RouteMode::MostReliable => return None,
        };
        (scale > 0.0).then_some(scale)
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self::new(CostWeights::default())
    }
}

// ── Route ─────────────────────────────────────────────────────────────────────

/// The result of a routing query.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Route {
    /// Nodes visited in order, including both endpoints.
    pub nodes:       Vec<NodeId>,
    /// Edges traversed in order; `nodes.len() == edges.len() + 1`.
    pub edges:       Vec<EdgeId>,
    /// Total search cost under the mode used.
    pub cost:        f64,
    /// Total travel time, including degraded slow-downs.
    pub travel_time: f64,
    /// Product of traversed edge reliabilities.
    pub reliability: f64,
}

impl Route {
    /// Zero-length route that stays on `node`.
    pub fn trivial(node: NodeId) -> Self {
        Self {
            nodes:       vec![node],
            edges:       Vec::new(),
            cost:        0.0,
            travel_time: 0.0,
            reliability: 1.0,
        }
    }

    /// `true` if the source and destination are the same node.
    pub fn is_trivial(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn hops(&self) -> usize {
        self.edges.len()
    }

    pub fn origin(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    pub fn destination(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }
}

// ── Router trait ──────────────────────────────────────────────────────────────

/// Pluggable routing engine.
///
/// # Thread safety
///
/// Implementations must be `Send + Sync` so they can be shared across Rayon
/// workers during parallel candidate scoring and replanning.
pub trait Router: Send + Sync {
    /// Compute a route from `from` to `to` against the current graph state.
    ///
    /// `from == to` yields a trivial route.  Fails with
    /// [`GraphError::NoPathFound`] when every path crosses a Down edge.
    fn route(&self, graph: &Graph, from: NodeId, to: NodeId, mode: RouteMode) -> GraphResult<Route>;

    /// The cost model used to price edges.
    fn cost_model(&self) -> &CostModel;
}

// ── DijkstraRouter ────────────────────────────────────────────────────────────

/// Label-setting Dijkstra over the CSR incidence lists.
#[derive(Clone, Debug, Default)]
pub struct DijkstraRouter {
    model: CostModel,
}

impl DijkstraRouter {
    pub fn new(weights: CostWeights) -> Self {
        Self { model: CostModel::new(weights) }
    }
}

impl Router for DijkstraRouter {
    fn route(&self, graph: &Graph, from: NodeId, to: NodeId, mode: RouteMode) -> GraphResult<Route> {
        search(graph, &self.model, from, to, mode, None)
    }

    fn cost_model(&self) -> &CostModel {
        &self.model
    }
}

// ── AStarRouter ───────────────────────────────────────────────────────────────

/// Dijkstra guided by a straight-line lower bound.
///
/// The bound is `distance · time_per_metre · w_time`, where `time_per_metre`
/// is the smallest ratio observed over all edges at ingestion.  State changes
/// only raise costs, so the bound stays admissible for the life of the graph.
#[derive(Clone, Debug, Default)]
pub struct AStarRouter {
    model: CostModel,
}

impl AStarRouter {
    pub fn new(weights: CostWeights) -> Self {
        Self { model: CostModel::new(weights) }
    }
}

impl Router for AStarRouter {
    fn route(&self, graph: &Graph, from: NodeId, to: NodeId, mode: RouteMode) -> GraphResult<Route> {
        let heuristic = self.model.heuristic_scale(graph, mode);
        search(graph, &self.model, from, to, mode, heuristic)
    }

    fn cost_model(&self) -> &CostModel {
        &self.model
    }
}

// ── Search internals ──────────────────────────────────────────────────────────

/// Best known way to reach a node.
#[derive(Copy, Clone, Debug)]
struct Label {
    cost:        f64,
    reliability: f64,
    hops:        u32,
}

impl Label {
    const UNREACHED: Label = Label { cost: f64::INFINITY, reliability: 0.0, hops: u32::MAX };

    /// Lexicographic: lower cost, higher reliability, fewer hops.
    fn cmp_quality(&self, other: &Label) -> Ordering {
        self.cost
            .total_cmp(&other.cost)
            .then_with(|| other.reliability.total_cmp(&self.reliability))
            .then_with(|| self.hops.cmp(&other.hops))
    }
}

/// Heap entry.  `Ord` is reversed so `BinaryHeap` pops the best entry first.
#[derive(Copy, Clone, Debug)]
struct Entry {
    priority: f64,
    label:    Label,
    node:     u32,
}

impl Entry {
    fn key_cmp(&self, other: &Entry) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| self.label.cmp_quality(&other.label))
            .then_with(|| self.node.cmp(&other.node))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.key_cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key_cmp(self)
    }
}

fn search(
    graph: &Graph,
    model: &CostModel,
    from: NodeId,
    to: NodeId,
    mode: RouteMode,
    heuristic: Option<f64>,
) -> GraphResult<Route> {
    let src = graph.node_ix(from).ok_or(GraphError::NodeNotFound(from))?;
    let dst = graph.node_ix(to).ok_or(GraphError::NodeNotFound(to))?;
    if src == dst {
        return Ok(Route::trivial(from));
    }

    let target_pos = graph.pos_at(dst);
    let h = |ix: u32| -> f64 {
        match (heuristic, graph.pos_at(ix), target_pos) {
            (Some(scale), Some(p), Some(t)) => p.distance_m(t) * scale,
            _ => 0.0,
        }
    };

    let n = graph.node_count();
    let mut best      = vec![Label::UNREACHED; n];
    // (edge_ix, prev_node_ix) that reached each node; u32::MAX when unreached.
    let mut prev      = vec![(u32::MAX, u32::MAX); n];
    let mut settled   = vec![false; n];

    let start = Label { cost: 0.0, reliability: 1.0, hops: 0 };
    best[src as usize] = start;
    let mut heap = BinaryHeap::new();
    heap.push(Entry { priority: h(src), label: start, node: src });

    while let Some(Entry { label, node, .. }) = heap.pop() {
        if settled[node as usize] {
            continue;
        }
        settled[node as usize] = true;
        if node == dst {
            return Ok(reconstruct(graph, &prev, src, dst, label));
        }

        for (e, other) in graph.passable_incident(node) {
            if settled[other as usize] {
                continue;
            }
            let step = model.cost_at(graph, e, mode);
            if !step.is_finite() {
                continue;
            }
            let cand = Label {
                cost:        label.cost + step,
                reliability: label.reliability * graph.reliability_at(e),
                hops:        label.hops + 1,
            };
            let current = &best[other as usize];
            let better = match cand.cmp_quality(current) {
                Ordering::Less    => true,
                // Full tie: keep the lower-indexed predecessor.
                Ordering::Equal   => node < prev[other as usize].1,
                Ordering::Greater => false,
            };
            if better {
                best[other as usize] = cand;
                prev[other as usize] = (e, node);
                heap.push(Entry { priority: cand.cost + h(other), label: cand, node: other });
            }
        }
    }

    Err(GraphError::NoPathFound { from, to })
}

fn reconstruct(graph: &Graph, prev: &[(u32, u32)], src: u32, dst: u32, label: Label) -> Route {
    let mut edges = Vec::with_capacity(label.hops as usize);
    let mut nodes = Vec::with_capacity(label.hops as usize + 1);
    let mut travel_time = 0.0;
    let mut cur = dst;
    nodes.push(graph.node_id_at(cur));
    while cur != src {
        let (e, p) = prev[cur as usize];
        edges.push(graph.edge_id_at(e));
        travel_time += graph.travel_time_at(e) * graph.state_at(e).penalty();
        cur = p;
        nodes.push(graph.node_id_at(cur));
    }
    edges.reverse();
    nodes.reverse();
    Route {
        nodes,
        edges,
        cost: label.cost,
        travel_time,
        reliability: label.reliability,
    }
}
