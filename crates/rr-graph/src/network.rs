//! Road graph representation and validating builder.
//!
//! # Data layout
//!
//! Nodes and edges are stored Structure-of-Arrays, indexed by a dense
//! internal index assigned at build time.  External [`NodeId`]/[`EdgeId`]
//! values map to those indices through `FxHashMap`s, so every state mutation
//! is an O(1) hash lookup plus an array write.
//!
//! Edges are undirected.  Adjacency is a **Compressed Sparse Row (CSR)**
//! incidence list: every edge appears once in the slice of each endpoint,
//! paired with the index of the opposite endpoint:
//!
//! ```text
//! adj_edge [ adj_start[n] .. adj_start[n+1] ]   edge indices incident to n
//! adj_other[ adj_start[n] .. adj_start[n+1] ]   the other endpoint of each
//! ```
//!
//! Topology is frozen after [`GraphBuilder::build`]; only edge states and
//! node priority attributes change afterwards.
//!
//! # Spatial index
//!
//! An R-tree (via `rstar`) maps `(lat, lon)` to the nearest node.  Used to
//! place field reports that only carry coordinates.

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use rustc_hash::FxHashMap;

use rr_core::{EdgeId, GeoPoint, NodeId};

use crate::{EdgeState, EdgeStateChange, GraphError, GraphResult};

/// Fraction shaved off the heuristic ratio so float rounding can never make
/// the A* heuristic overestimate.
const HEURISTIC_SLACK: f64 = 1.0 - 1e-9;

// ── R-tree node entry ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct NodeEntry {
    point: [f64; 2], // [lat, lon]
    id: NodeId,
}

impl RTreeObject for NodeEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for NodeEntry {
    /// Squared Euclidean distance in lat/lon space.  Good enough for
    /// nearest-node queries inside one disaster zone.
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.point[0] - point[0];
        let dlon = self.point[1] - point[1];
        dlat * dlat + dlon * dlon
    }
}

// ── Ingestion specs ───────────────────────────────────────────────────────────

/// Input description of one node, as handed over by a loader.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeSpec {
    pub id:         NodeId,
    pub pos:        Option<GeoPoint>,
    pub severity:   f64,
    pub population: f64,
    /// Initial demand; the engine turns non-zero values into requests.
    pub demand:     u32,
}

impl NodeSpec {
    pub fn new(id: NodeId) -> Self {
        Self { id, pos: None, severity: 0.0, population: 0.0, demand: 0 }
    }

    pub fn at(mut self, pos: GeoPoint) -> Self {
        self.pos = Some(pos);
        self
    }

    pub fn severity(mut self, severity: f64) -> Self {
        self.severity = severity;
        self
    }

    pub fn population(mut self, population: f64) -> Self {
        self.population = population;
        self
    }

    pub fn demand(mut self, demand: u32) -> Self {
        self.demand = demand;
        self
    }
}

/// Input description of one undirected edge.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeSpec {
    pub id:          EdgeId,
    pub u:           NodeId,
    pub v:           NodeId,
    pub travel_time: f64,
    pub reliability: f64,
}

impl EdgeSpec {
    pub fn new(id: EdgeId, u: NodeId, v: NodeId, travel_time: f64, reliability: f64) -> Self {
        Self { id, u, v, travel_time, reliability }
    }
}

/// Read-only snapshot of one edge.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EdgeView {
    pub id:          EdgeId,
    pub u:           NodeId,
    pub v:           NodeId,
    pub travel_time: f64,
    pub reliability: f64,
    pub state:       EdgeState,
}

impl EdgeView {
    /// Travel time under the current state: base time times the degraded
    /// penalty, infinite when Down.
    #[inline]
    pub fn effective_time(&self) -> f64 {
        self.travel_time * self.state.penalty()
    }

    /// The endpoint opposite `node`, or `None` if `node` is not an endpoint.
    pub fn other(&self, node: NodeId) -> Option<NodeId> {
        if node == self.u {
            Some(self.v)
        } else if node == self.v {
            Some(self.u)
        } else {
            None
        }
    }
}

// ── Graph ─────────────────────────────────────────────────────────────────────

/// Undirected road graph with mutable edge availability.
///
/// Do not construct directly; use [`GraphBuilder`] or [`Graph::from_specs`].
#[derive(Clone)]
pub struct Graph {
    // ── Node data (indexed by internal node index) ────────────────────────
    node_ids:        Vec<NodeId>,
    node_pos:        Vec<Option<GeoPoint>>,
    node_severity:   Vec<f64>,
    node_population: Vec<f64>,
    node_demand:     Vec<u32>,
    node_urgency:    Vec<f64>,
    node_index:      FxHashMap<NodeId, u32>,

    // ── CSR incidence ─────────────────────────────────────────────────────
    adj_start: Vec<u32>,
    adj_edge:  Vec<u32>,
    adj_other: Vec<u32>,

    // ── Edge data (indexed by internal edge index) ────────────────────────
    edge_ids:         Vec<EdgeId>,
    edge_u:           Vec<u32>,
    edge_v:           Vec<u32>,
    edge_travel_time: Vec<f64>,
    edge_reliability: Vec<f64>,
    edge_state:       Vec<EdgeState>,
    edge_index:       FxHashMap<EdgeId, u32>,

    /// Bumped on every effective edge-state transition.
    version: u64,

    /// Lower bound on travel time per metre of straight-line distance, or
    /// `None` when some node has no coordinates.
    time_per_metre: Option<f64>,

    spatial_idx: RTree<NodeEntry>,
}

impl Graph {
    /// Validate `nodes` and `edges` and build a graph in one call.
    pub fn from_specs(nodes: Vec<NodeSpec>, edges: Vec<EdgeSpec>) -> GraphResult<Graph> {
        let mut b = GraphBuilder::with_capacity(nodes.len(), edges.len());
        for n in nodes {
            b.add_node(n);
        }
        for e in edges {
            b.add_edge(e);
        }
        b.build()
    }

    /// A graph with no nodes; every query against it fails.
    pub fn empty() -> Self {
        GraphBuilder::new()
            .build()
            .unwrap_or_else(|_| unreachable!("an empty builder always validates"))
    }

    // ── Dimensions ────────────────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.node_ids.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty()
    }

    /// Incremented on every effective edge-state change.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    // ── Lookups ───────────────────────────────────────────────────────────

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.node_index.contains_key(&node)
    }

    pub fn contains_edge(&self, edge: EdgeId) -> bool {
        self.edge_index.contains_key(&edge)
    }

    /// Iterator over all node ids in ingestion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.node_ids.iter().copied()
    }

    /// Iterator over all edge ids in ingestion order.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edge_ids.iter().copied()
    }

    pub fn node_pos(&self, node: NodeId) -> Option<GeoPoint> {
        self.node_ix(node).and_then(|ix| self.node_pos[ix as usize])
    }

    pub fn severity(&self, node: NodeId) -> Option<f64> {
        self.node_ix(node).map(|ix| self.node_severity[ix as usize])
    }

    pub fn population(&self, node: NodeId) -> Option<f64> {
        self.node_ix(node).map(|ix| self.node_population[ix as usize])
    }

    pub fn demand(&self, node: NodeId) -> Option<u32> {
        self.node_ix(node).map(|ix| self.node_demand[ix as usize])
    }

    pub fn urgency(&self, node: NodeId) -> Option<f64> {
        self.node_ix(node).map(|ix| self.node_urgency[ix as usize])
    }

    pub fn edge(&self, edge: EdgeId) -> Option<EdgeView> {
        self.edge_ix(edge).map(|ix| self.edge_view(ix))
    }

    pub fn edge_state(&self, edge: EdgeId) -> Option<EdgeState> {
        self.edge_ix(edge).map(|ix| self.edge_state[ix as usize])
    }

    /// Lazy iterator over `(edge, other_node)` for every edge incident to
    /// `node` that is currently Up or Degraded.
    pub fn neighbors(&self, node: NodeId) -> GraphResult<impl Iterator<Item = (EdgeId, NodeId)> + '_> {
        let ix = self.node_ix(node).ok_or(GraphError::NodeNotFound(node))?;
        Ok(self
            .passable_incident(ix)
            .map(|(e, other)| (self.edge_ids[e as usize], self.node_ids[other as usize])))
    }

    /// Number of incident edges regardless of state.
    pub fn degree(&self, node: NodeId) -> usize {
        match self.node_ix(node) {
            Some(ix) => (self.adj_start[ix as usize + 1] - self.adj_start[ix as usize]) as usize,
            None => 0,
        }
    }

    /// Return the nearest node to `pos`, or `None` if no node has coordinates.
    pub fn nearest_node(&self, pos: GeoPoint) -> Option<NodeId> {
        self.spatial_idx
            .nearest_neighbor(&[pos.lat, pos.lon])
            .map(|e| e.id)
    }

    /// Lower bound on travel time per metre, if every node has coordinates.
    pub fn time_per_metre(&self) -> Option<f64> {
        self.time_per_metre
    }

    // ── Mutation ──────────────────────────────────────────────────────────

    /// Transition `edge` to `state`.
    ///
    /// Returns the change event, or `None` if the edge was already in that
    /// exact state.  Unknown edges and unusable penalties fail with
    /// [`GraphError::InvalidEdgeState`].
    pub fn set_edge_state(&mut self, edge: EdgeId, state: EdgeState) -> GraphResult<Option<EdgeStateChange>> {
        let ix = self.edge_ix(edge).ok_or_else(|| GraphError::InvalidEdgeState {
            edge,
            reason: "unknown edge id".into(),
        })?;
        state.validate(edge)?;

        let from = self.edge_state[ix as usize];
        if from == state {
            return Ok(None);
        }
        self.edge_state[ix as usize] = state;
        self.version += 1;
        tracing::debug!(%edge, %from, to = %state, version = self.version, "edge state changed");
        Ok(Some(EdgeStateChange { edge, from, to: state, version: self.version }))
    }

    /// Apply a new severity/population report to `node`.
    pub fn set_priority_inputs(&mut self, node: NodeId, severity: f64, population: f64) -> GraphResult<()> {
        let ix = self.node_ix(node).ok_or(GraphError::NodeNotFound(node))? as usize;
        check_attribute(node, "severity", severity)?;
        check_attribute(node, "population", population)?;
        self.node_severity[ix] = severity;
        self.node_population[ix] = population;
        Ok(())
    }

    /// Store a derived urgency score.  Negative values are clamped to 0.
    pub fn set_urgency(&mut self, node: NodeId, urgency: f64) -> GraphResult<()> {
        let ix = self.node_ix(node).ok_or(GraphError::NodeNotFound(node))? as usize;
        self.node_urgency[ix] = if urgency.is_finite() { urgency.max(0.0) } else { 0.0 };
        Ok(())
    }

    // ── Crate-internal index access (router hot path) ─────────────────────

    #[inline]
    pub(crate) fn node_ix(&self, node: NodeId) -> Option<u32> {
        self.node_index.get(&node).copied()
    }

    #[inline]
    pub(crate) fn edge_ix(&self, edge: EdgeId) -> Option<u32> {
        self.edge_index.get(&edge).copied()
    }

    #[inline]
    pub(crate) fn node_id_at(&self, ix: u32) -> NodeId {
        self.node_ids[ix as usize]
    }

    #[inline]
    pub(crate) fn edge_id_at(&self, ix: u32) -> EdgeId {
        self.edge_ids[ix as usize]
    }

    #[inline]
    pub(crate) fn pos_at(&self, ix: u32) -> Option<GeoPoint> {
        self.node_pos[ix as usize]
    }

    #[inline]
    pub(crate) fn travel_time_at(&self, e: u32) -> f64 {
        self.edge_travel_time[e as usize]
    }

    #[inline]
    pub(crate) fn reliability_at(&self, e: u32) -> f64 {
        self.edge_reliability[e as usize]
    }

    #[inline]
    pub(crate) fn state_at(&self, e: u32) -> EdgeState {
        self.edge_state[e as usize]
    }

    /// `(edge_ix, other_node_ix)` for passable incident edges.  Contiguous
    /// CSR scan; no allocation.
    #[inline]
    pub(crate) fn passable_incident(&self, node_ix: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
        let start = self.adj_start[node_ix as usize] as usize;
        let end   = self.adj_start[node_ix as usize + 1] as usize;
        (start..end)
            .map(move |i| (self.adj_edge[i], self.adj_other[i]))
            .filter(move |&(e, _)| self.edge_state[e as usize].is_passable())
    }

    fn edge_view(&self, ix: u32) -> EdgeView {
        let i = ix as usize;
        EdgeView {
            id:          self.edge_ids[i],
            u:           self.node_ids[self.edge_u[i] as usize],
            v:           self.node_ids[self.edge_v[i] as usize],
            travel_time: self.edge_travel_time[i],
            reliability: self.edge_reliability[i],
            state:       self.edge_state[i],
        }
    }
}

fn check_attribute(node: NodeId, field: &'static str, value: f64) -> GraphResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(GraphError::InvalidNodeAttribute { node, field, value });
    }
    Ok(())
}

// ── GraphBuilder ──────────────────────────────────────────────────────────────

/// Collect node and edge specs, then call [`build`](Self::build).
///
/// `build()` validates everything before allocating the graph; the first
/// violation is returned and nothing is kept.
///
/// # Example
///
/// ```
/// use rr_core::{EdgeId, NodeId};
/// use rr_graph::{EdgeSpec, GraphBuilder, NodeSpec};
///
/// let mut b = GraphBuilder::new();
/// b.add_node(NodeSpec::new(NodeId(0)));
/// b.add_node(NodeSpec::new(NodeId(1)).severity(4.0).demand(6));
/// b.add_edge(EdgeSpec::new(EdgeId(0), NodeId(0), NodeId(1), 12.0, 0.9));
/// let graph = b.build().unwrap();
/// assert_eq!(graph.node_count(), 2);
/// assert_eq!(graph.degree(NodeId(0)), 1);
/// ```
#[derive(Default)]
pub struct GraphBuilder {
    nodes: Vec<NodeSpec>,
    edges: Vec<EdgeSpec>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-allocate for bulk loads.
    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(nodes),
            edges: Vec::with_capacity(edges),
        }
    }

    pub fn add_node(&mut self, node: NodeSpec) -> &mut Self {
        self.nodes.push(node);
        self
    }

    pub fn add_edge(&mut self, edge: EdgeSpec) -> &mut Self {
        self.edges.push(edge);
        self
    }

    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn edge_count(&self) -> usize { self.edges.len() }

    /// Validate and consume the builder.
    ///
    /// Time complexity: O(N + E) for validation and CSR construction plus
    /// O(N log N) for the R-tree bulk load.
    pub fn build(self) -> GraphResult<Graph> {
        // ── Validate nodes ────────────────────────────────────────────────
        let mut node_index: FxHashMap<NodeId, u32> = FxHashMap::default();
        node_index.reserve(self.nodes.len());
        for (i, n) in self.nodes.iter().enumerate() {
            if node_index.insert(n.id, i as u32).is_some() {
                return Err(GraphError::DuplicateNode(n.id));
            }
            check_attribute(n.id, "severity", n.severity)?;
            check_attribute(n.id, "population", n.population)?;
            if n.pos.is_some_and(|p| !p.is_finite()) {
                return Err(GraphError::InvalidCoordinates(n.id));
            }
        }

        // ── Validate edges ────────────────────────────────────────────────
        let mut edge_index: FxHashMap<EdgeId, u32> = FxHashMap::default();
        edge_index.reserve(self.edges.len());
        let mut edge_u = Vec::with_capacity(self.edges.len());
        let mut edge_v = Vec::with_capacity(self.edges.len());
        for (i, e) in self.edges.iter().enumerate() {
            if edge_index.insert(e.id, i as u32).is_some() {
                return Err(GraphError::DuplicateEdge(e.id));
            }
            let u = *node_index
                .get(&e.u)
                .ok_or(GraphError::DanglingEdge { edge: e.id, node: e.u })?;
            let v = *node_index
                .get(&e.v)
                .ok_or(GraphError::DanglingEdge { edge: e.id, node: e.v })?;
            if !(0.0..=1.0).contains(&e.reliability) {
                return Err(GraphError::ReliabilityOutOfRange { edge: e.id, value: e.reliability });
            }
            if !e.travel_time.is_finite() || e.travel_time <= 0.0 {
                return Err(GraphError::InvalidTravelTime { edge: e.id, value: e.travel_time });
            }
            edge_u.push(u);
            edge_v.push(v);
        }

        let node_count = self.nodes.len();

        // ── CSR incidence: each edge listed under both endpoints ──────────
        let mut adj_start = vec![0u32; node_count + 1];
        for (&u, &v) in edge_u.iter().zip(&edge_v) {
            adj_start[u as usize + 1] += 1;
            if u != v {
                adj_start[v as usize + 1] += 1;
            }
        }
        for i in 1..=node_count {
            adj_start[i] += adj_start[i - 1];
        }
        let total = adj_start[node_count] as usize;
        let mut adj_edge  = vec![0u32; total];
        let mut adj_other = vec![0u32; total];
        let mut cursor: Vec<u32> = adj_start[..node_count].to_vec();
        for (e, (&u, &v)) in edge_u.iter().zip(&edge_v).enumerate() {
            let slot = cursor[u as usize] as usize;
            adj_edge[slot]  = e as u32;
            adj_other[slot] = v;
            cursor[u as usize] += 1;
            if u != v {
                let slot = cursor[v as usize] as usize;
                adj_edge[slot]  = e as u32;
                adj_other[slot] = u;
                cursor[v as usize] += 1;
            }
        }

        // ── A* heuristic ratio ────────────────────────────────────────────
        let node_pos: Vec<Option<GeoPoint>> = self.nodes.iter().map(|n| n.pos).collect();
        let time_per_metre = if node_pos.iter().all(Option::is_some) {
            let ratio = self
                .edges
                .iter()
                .zip(edge_u.iter().zip(&edge_v))
                .filter_map(|(e, (&u, &v))| {
                    let d = node_pos[u as usize]?.distance_m(node_pos[v as usize]?);
                    (d > 0.0).then(|| e.travel_time / d)
                })
                .fold(f64::INFINITY, f64::min);
            // No edge with positive length: the heuristic degenerates to 0.
            Some(if ratio.is_finite() { ratio * HEURISTIC_SLACK } else { 0.0 })
        } else {
            None
        };

        // Bulk-load R-tree for O(N log N) construction (faster than N inserts).
        let entries: Vec<NodeEntry> = self
            .nodes
            .iter()
            .filter_map(|n| n.pos.map(|p| NodeEntry { point: [p.lat, p.lon], id: n.id }))
            .collect();
        let spatial_idx = RTree::bulk_load(entries);

        let edge_count = self.edges.len();
        tracing::info!(nodes = node_count, edges = edge_count, astar = time_per_metre.is_some(), "graph ingested");

        Ok(Graph {
            node_ids:         self.nodes.iter().map(|n| n.id).collect(),
            node_pos,
            node_severity:    self.nodes.iter().map(|n| n.severity).collect(),
            node_population:  self.nodes.iter().map(|n| n.population).collect(),
            node_demand:      self.nodes.iter().map(|n| n.demand).collect(),
            node_urgency:     vec![0.0; node_count],
            node_index,
            adj_start,
            adj_edge,
            adj_other,
            edge_ids:         self.edges.iter().map(|e| e.id).collect(),
            edge_u,
            edge_v,
            edge_travel_time: self.edges.iter().map(|e| e.travel_time).collect(),
            edge_reliability: self.edges.iter().map(|e| e.reliability).collect(),
            edge_state:       vec![EdgeState::Up; edge_count],
            edge_index,
            version:          0,
            time_per_metre,
            spatial_idx,
        })
    }
}
