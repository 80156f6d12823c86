//! Per-vehicle position, committed legs and route state.
//!
//! # Position model
//!
//! A vehicle is either **at a node** (`on_edge == None`) or **on an edge**
//! heading to `on_edge.to`.  The node it will next stand on is its
//! *anchor*; every replan and every new leg starts there, so the edge being
//! driven is never rerouted mid-way unless it goes Down.
//!
//! Committed work is a queue of [`Leg`]s.  The first leg is consumed edge by
//! edge through `cursor`; the invariant is
//!
//! ```text
//! legs[0].route.nodes[cursor] == anchor()
//! ```
//!
//! A leg without a stop is a homing leg back to a depot.  It is always last
//! and is cancelled as soon as a new stop is committed.

use std::collections::VecDeque;

use rr_core::{EdgeId, NodeId, RequestId, VehicleId};
use rr_graph::{CostModel, Graph, Route, RouteMode};

use crate::{DeliveryPlan, FleetError, FleetResult, PlannedStop};

// ── Route state ───────────────────────────────────────────────────────────────

/// Per-vehicle route lifecycle.
///
/// ```text
/// Idle → Planned → InTransit → Blocked → Replanned → InTransit → … → Delivered
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RouteState {
    /// No stops committed and nothing delivered yet.
    #[default]
    Idle,
    /// Stops committed; not moving toward them yet.
    Planned,
    /// Driving toward the next stop.
    InTransit,
    /// The next edge (or the edge being driven) became impassable.
    Blocked,
    /// A detour has been committed; becomes `InTransit` on the first move.
    Replanned,
    /// Every committed stop has been served.
    Delivered,
}

impl RouteState {
    pub fn as_str(self) -> &'static str {
        match self {
            RouteState::Idle      => "idle",
            RouteState::Planned   => "planned",
            RouteState::InTransit => "in_transit",
            RouteState::Blocked   => "blocked",
            RouteState::Replanned => "replanned",
            RouteState::Delivered => "delivered",
        }
    }
}

// ── Stops, legs, deliveries ───────────────────────────────────────────────────

/// One committed delivery.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stop {
    pub request:  RequestId,
    pub node:     NodeId,
    pub quantity: u32,
}

/// A path segment ending at a stop, or at a depot when `stop` is `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct Leg {
    pub stop:  Option<Stop>,
    pub route: Route,
    /// Node the leg must end at, kept while the route is being repaired.
    target:    NodeId,
}

impl Leg {
    pub fn to_stop(stop: Stop, route: Route) -> Self {
        Self { stop: Some(stop), route, target: stop.node }
    }

    pub fn homing(depot: NodeId, route: Route) -> Self {
        Self { stop: None, route, target: depot }
    }

    /// The stop node, or the depot of a homing leg.
    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn origin(&self) -> Option<NodeId> {
        self.route.origin()
    }

    pub fn destination(&self) -> Option<NodeId> {
        self.route.destination()
    }
}

/// Per-leg instruction for [`Vehicle::apply_edits`].
#[derive(Clone, Debug, PartialEq)]
pub enum LegEdit {
    Keep,
    /// New route for the leg; must start where the previous kept leg ends.
    Reroute(Route),
    /// Remove the leg and hand its stop back.
    Drop,
}

/// The edge currently being driven.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OnEdge {
    pub edge:      EdgeId,
    pub to:        NodeId,
    /// Seconds already spent on this edge.
    pub travelled: f64,
}

/// Emitted by [`Vehicle::advance`] when a stop is served.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Delivery {
    pub vehicle:  VehicleId,
    pub request:  RequestId,
    pub node:     NodeId,
    pub quantity: u32,
    /// Seconds into the `advance` call at which the stop was reached.
    pub offset:   f64,
}

// ── Mission log ───────────────────────────────────────────────────────────────

/// What a vehicle actually drove, accumulated by [`Vehicle::advance`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MissionLog {
    /// Seconds spent moving, including partial edges and turn-backs.
    pub travel_time:     f64,
    /// Edges driven to their end.
    pub edges:           u32,
    /// Sum of the reliability of every completed edge.
    pub reliability_sum: f64,
    /// Every node stood on, starting with the depot.
    pub route:           Vec<NodeId>,
}

impl MissionLog {
    fn starting_at(node: NodeId) -> Self {
        Self { route: vec![node], ..Self::default() }
    }

    fn arrive(&mut self, node: NodeId, time: f64, reliability: f64) {
        self.travel_time += time;
        self.edges += 1;
        self.reliability_sum += reliability;
        self.route.push(node);
    }

    /// Mean reliability of the completed edges, `None` before the first.
    pub fn average_reliability(&self) -> Option<f64> {
        (self.edges > 0).then(|| self.reliability_sum / f64::from(self.edges))
    }
}

// ── Vehicle ───────────────────────────────────────────────────────────────────

/// A capacity-limited vehicle.
///
/// `remaining` is the capacity not yet promised to any stop.  It only grows
/// back when a stop is handed back (unreachable); delivering does not
/// restore it.  Hence committed load never exceeds `capacity`.
#[derive(Clone, Debug)]
pub struct Vehicle {
    id:        VehicleId,
    capacity:  u32,
    remaining: u32,
    node:      NodeId,
    on_edge:   Option<OnEdge>,
    legs:      VecDeque<Leg>,
    cursor:    usize,
    /// Time still owed to a turn-back manoeuvre.
    delay:     f64,
    idle_time: f64,
    delivered: u32,
    state:     RouteState,
    active:    bool,
    log:       MissionLog,
}

impl Vehicle {
    /// A fully loaded vehicle parked at `depot`.
    pub fn new(id: VehicleId, capacity: u32, depot: NodeId) -> Self {
        Self {
            id,
            capacity,
            remaining: capacity,
            node:      depot,
            on_edge:   None,
            legs:      VecDeque::new(),
            cursor:    0,
            delay:     0.0,
            idle_time: 0.0,
            delivered: 0,
            state:     RouteState::Idle,
            active:    true,
            log:       MissionLog::starting_at(depot),
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    #[inline] pub fn id(&self) -> VehicleId { self.id }
    #[inline] pub fn capacity(&self) -> u32 { self.capacity }
    #[inline] pub fn remaining(&self) -> u32 { self.remaining }
    #[inline] pub fn node(&self) -> NodeId { self.node }
    #[inline] pub fn on_edge(&self) -> Option<OnEdge> { self.on_edge }
    #[inline] pub fn state(&self) -> RouteState { self.state }
    #[inline] pub fn idle_time(&self) -> f64 { self.idle_time }
    #[inline] pub fn delivered(&self) -> u32 { self.delivered }
    #[inline] pub fn is_active(&self) -> bool { self.active }
    #[inline] pub fn mission(&self) -> &MissionLog { &self.log }

    pub fn legs(&self) -> impl Iterator<Item = &Leg> {
        self.legs.iter()
    }

    pub fn leg_count(&self) -> usize {
        self.legs.len()
    }

    /// Index into `legs[0].route.edges` of the next edge to start.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Quantity committed but not yet delivered.
    pub fn load(&self) -> u32 {
        self.stops().map(|s| s.quantity).sum()
    }

    /// Committed stops in service order.
    pub fn stops(&self) -> impl Iterator<Item = &Stop> {
        self.legs.iter().filter_map(|l| l.stop.as_ref())
    }

    pub fn has_stops(&self) -> bool {
        self.legs.iter().any(|l| l.stop.is_some())
    }

    pub fn is_homing(&self) -> bool {
        self.legs.back().is_some_and(|l| l.stop.is_none())
    }

    /// No legs, not on an edge.
    pub fn is_parked(&self) -> bool {
        self.legs.is_empty() && self.on_edge.is_none()
    }

    /// Capacity spent and nothing left to drive.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0 && self.is_parked()
    }

    /// The node the vehicle will next stand on.
    pub fn anchor(&self) -> NodeId {
        self.on_edge.map_or(self.node, |e| e.to)
    }

    /// Where the next committed stop's leg must start: the last stop node,
    /// or the anchor when no stop is committed.
    pub fn tail_node(&self) -> NodeId {
        self.legs
            .iter()
            .rev()
            .find(|l| l.stop.is_some())
            .and_then(Leg::destination)
            .unwrap_or_else(|| self.anchor())
    }

    /// Whether leg 0 is already being driven, so it may not be reordered.
    pub fn first_leg_in_motion(&self) -> bool {
        !self.legs.is_empty() && (self.cursor > 0 || self.on_edge.is_some())
    }

    /// Every edge still to be traversed, in order, starting with the edge
    /// currently being driven.
    pub fn edges_ahead(&self) -> impl Iterator<Item = EdgeId> + '_ {
        let current = self.on_edge.map(|e| e.edge);
        let cursor = self.cursor;
        current.into_iter().chain(self.legs.iter().enumerate().flat_map(move |(i, leg)| {
            let start = if i == 0 { cursor } else { 0 };
            leg.route.edges[start.min(leg.route.edges.len())..].iter().copied()
        }))
    }

    /// Index of the first leg whose remaining part uses `edge`, or `None`.
    /// The edge being driven counts as part of leg 0.
    pub fn first_leg_using(&self, edge: EdgeId) -> Option<usize> {
        if self.on_edge.is_some_and(|e| e.edge == edge) {
            return Some(0);
        }
        self.legs.iter().enumerate().find_map(|(i, leg)| {
            let start = if i == 0 { self.cursor.min(leg.route.edges.len()) } else { 0 };
            leg.route.edges[start..].contains(&edge).then_some(i)
        })
    }

    /// Remaining edges of leg `index` (for leg 0, only the untraversed part).
    pub fn leg_remaining_edges(&self, index: usize) -> &[EdgeId] {
        match self.legs.get(index) {
            Some(leg) if index == 0 => &leg.route.edges[self.cursor.min(leg.route.edges.len())..],
            Some(leg) => &leg.route.edges,
            None => &[],
        }
    }

    /// Start node of leg `index` as the vehicle will reach it.
    pub fn leg_origin(&self, index: usize) -> Option<NodeId> {
        match index {
            0 => (!self.legs.is_empty()).then(|| self.anchor()),
            i => self.legs.get(i - 1).and_then(Leg::destination),
        }
    }

    pub fn leg(&self, index: usize) -> Option<&Leg> {
        self.legs.get(index)
    }

    // ── Commitment ────────────────────────────────────────────────────────

    /// Append a stop reached by `route`, which must start at
    /// [`tail_node`](Self::tail_node).
    ///
    /// Cancels a pending homing leg.  Fails with
    /// [`FleetError::CapacityExceeded`] rather than clipping the quantity.
    pub fn commit_stop(&mut self, stop: Stop, route: Route) -> FleetResult<()> {
        if !self.active {
            return Err(FleetError::Inactive { vehicle: self.id });
        }
        if stop.quantity > self.remaining {
            return Err(FleetError::CapacityExceeded {
                vehicle:   self.id,
                requested: stop.quantity,
                remaining: self.remaining,
            });
        }
        self.cancel_homing();
        let expected = self.tail_node();
        let got = route.origin().unwrap_or(NodeId::INVALID);
        if got != expected {
            return Err(FleetError::LegOriginMismatch { vehicle: self.id, expected, got });
        }
        self.remaining -= stop.quantity;
        self.legs.push_back(Leg::to_stop(stop, route));
        if matches!(self.state, RouteState::Idle | RouteState::Delivered) {
            self.state = RouteState::Planned;
        }
        Ok(())
    }

    /// Drive back to a depot.  Ignored unless the vehicle has no legs.
    pub fn set_homing(&mut self, route: Route) -> bool {
        if !self.legs.is_empty() || route.origin() != Some(self.anchor()) || route.is_trivial() {
            return false;
        }
        let Some(depot) = route.destination() else {
            return false;
        };
        self.legs.push_back(Leg::homing(depot, route));
        self.cursor = 0;
        true
    }

    /// Drop a trailing homing leg.  Returns `true` if one was removed.
    pub fn cancel_homing(&mut self) -> bool {
        if !self.is_homing() {
            return false;
        }
        self.legs.pop_back();
        if self.legs.is_empty() {
            self.cursor = 0;
        }
        true
    }

    /// Replace the route of leg `index`.  The route must start where the
    /// vehicle will be when the leg begins.
    pub fn replace_leg_route(&mut self, index: usize, route: Route) -> FleetResult<()> {
        let expected = self.leg_origin(index).ok_or(FleetError::VehicleNotFound(self.id))?;
        let got = route.origin().unwrap_or(NodeId::INVALID);
        if got != expected {
            return Err(FleetError::LegOriginMismatch { vehicle: self.id, expected, got });
        }
        if let Some(leg) = self.legs.get_mut(index) {
            leg.route = route;
        }
        if index == 0 {
            self.cursor = 0;
        }
        Ok(())
    }

    /// Remove leg `index` and return its stop, giving the capacity back.
    ///
    /// The following leg (if any) now starts from a different node; the
    /// caller must reroute it.
    pub fn drop_leg(&mut self, index: usize) -> Option<Stop> {
        let leg = self.legs.remove(index)?;
        if index == 0 {
            self.cursor = 0;
        }
        if let Some(stop) = leg.stop {
            self.remaining += stop.quantity;
        }
        leg.stop
    }

    /// Replace every leg after the first `keep` with `legs`.
    pub fn replace_tail(&mut self, keep: usize, legs: Vec<Leg>) {
        self.legs.truncate(keep);
        if keep == 0 {
            self.cursor = 0;
        }
        self.legs.extend(legs);
    }

    /// Rebuild the leg queue from one [`LegEdit`] per existing leg.
    ///
    /// Every edit is checked before anything changes.  Returns the stops of
    /// dropped legs; their quantity is added back to `remaining`.
    pub fn apply_edits(&mut self, edits: Vec<LegEdit>) -> FleetResult<Vec<Stop>> {
        if edits.len() != self.legs.len() {
            return Err(FleetError::EditCountMismatch {
                vehicle:  self.id,
                legs:     self.legs.len(),
                edits:    edits.len(),
            });
        }

        let mut expected = self.anchor();
        for (i, (leg, edit)) in self.legs.iter().zip(&edits).enumerate() {
            let (origin, dest) = match edit {
                LegEdit::Keep if i == 0 => (expected, leg.destination()),
                LegEdit::Keep => (leg.origin().unwrap_or(NodeId::INVALID), leg.destination()),
                LegEdit::Reroute(route) => (route.origin().unwrap_or(NodeId::INVALID), route.destination()),
                LegEdit::Drop => continue,
            };
            if origin != expected {
                return Err(FleetError::LegOriginMismatch { vehicle: self.id, expected, got: origin });
            }
            expected = dest.unwrap_or(expected);
        }

        let changed = edits.iter().any(|e| *e != LegEdit::Keep);
        let old = std::mem::take(&mut self.legs);
        let mut keep_cursor = false;
        let mut dropped = Vec::new();
        for (i, (leg, edit)) in old.into_iter().zip(edits).enumerate() {
            match edit {
                LegEdit::Keep => {
                    if self.legs.is_empty() {
                        keep_cursor = i == 0;
                    }
                    self.legs.push_back(leg);
                }
                LegEdit::Reroute(route) => self.legs.push_back(Leg { route, ..leg }),
                LegEdit::Drop => {
                    if let Some(stop) = leg.stop {
                        self.remaining += stop.quantity;
                        dropped.push(stop);
                    }
                }
            }
        }
        if !keep_cursor {
            self.cursor = 0;
        }

        if !self.has_stops() {
            self.state = if self.delivered > 0 { RouteState::Delivered } else { RouteState::Idle };
        } else if changed && matches!(self.state, RouteState::Blocked | RouteState::InTransit) {
            self.state = RouteState::Replanned;
        }
        Ok(dropped)
    }

    /// The edge being driven went Down: return to its start node.
    ///
    /// The time already spent on the edge is owed again as return time.
    pub fn turn_back(&mut self) {
        if let Some(on) = self.on_edge.take() {
            self.delay += on.travelled;
            // Leg 0 no longer starts at the far node; it must be rerouted
            // to its target.
            if let Some(leg) = self.legs.front_mut() {
                leg.route = Route::trivial(self.node);
            }
            self.cursor = 0;
        }
        self.state = RouteState::Blocked;
    }

    pub fn set_state(&mut self, state: RouteState) {
        self.state = state;
    }

    /// Leave the active fleet.
    pub fn retire(&mut self) {
        self.active = false;
    }

    // ── Movement ──────────────────────────────────────────────────────────

    /// Move along committed legs for `dt` seconds against the current graph.
    ///
    /// Stops are served on arrival.  Time spent parked or blocked counts as
    /// idle time.
    pub fn advance(&mut self, dt: f64, graph: &Graph) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        if !dt.is_finite() || dt <= 0.0 {
            return deliveries;
        }
        let mut budget = dt;

        if self.delay > 0.0 {
            let d = self.delay.min(budget);
            self.delay -= d;
            self.log.travel_time += d;
            budget -= d;
        }

        while budget > 0.0 {
            // Finish the edge being driven.
            if let Some(mut on) = self.on_edge {
                let view = graph.edge(on.edge);
                let total = view.as_ref().map_or(f64::INFINITY, |v| v.effective_time());
                if !total.is_finite() {
                    self.state = RouteState::Blocked;
                    self.idle_time += budget;
                    break;
                }
                let need = (total - on.travelled).max(0.0);
                if budget >= need {
                    budget -= need;
                    self.node = on.to;
                    self.on_edge = None;
                    let reliability = view.map_or(0.0, |v| v.reliability);
                    self.log.arrive(on.to, need, reliability);
                } else {
                    on.travelled += budget;
                    self.log.travel_time += budget;
                    self.on_edge = Some(on);
                    break;
                }
                continue;
            }

            let Some(leg) = self.legs.front() else {
                self.idle_time += budget;
                break;
            };

            // Leg finished: serve its stop.
            if self.cursor >= leg.route.edges.len() {
                let stop = leg.stop;
                self.legs.pop_front();
                self.cursor = 0;
                if let Some(stop) = stop {
                    self.delivered += stop.quantity;
                    deliveries.push(Delivery {
                        vehicle:  self.id,
                        request:  stop.request,
                        node:     stop.node,
                        quantity: stop.quantity,
                        offset:   dt - budget,
                    });
                    if !self.has_stops() {
                        self.state = RouteState::Delivered;
                    }
                }
                continue;
            }

            let edge = leg.route.edges[self.cursor];
            let to = leg.route.nodes[self.cursor + 1];
            let to_stop = leg.stop.is_some();
            if !graph.edge_state(edge).is_some_and(|s| s.is_passable()) {
                self.state = RouteState::Blocked;
                self.idle_time += budget;
                break;
            }
            self.cursor += 1;
            self.on_edge = Some(OnEdge { edge, to, travelled: 0.0 });
            if to_stop {
                self.state = RouteState::InTransit;
            }
        }

        deliveries
    }

    // ── Plan view ─────────────────────────────────────────────────────────

    /// Snapshot of the remaining route, with ETAs measured from `now`.
    pub fn plan(&self, graph: &Graph, model: &CostModel, mode: RouteMode, now: f64) -> DeliveryPlan {
        let mut t           = now + self.delay;
        let mut cost        = 0.0;
        let mut reliability = 1.0;
        let mut path        = vec![self.node];
        let mut stops       = Vec::new();

        if let Some(on) = self.on_edge {
            if let Some(view) = graph.edge(on.edge) {
                t += (view.effective_time() - on.travelled).max(0.0);
                cost += model.edge_cost(&view, mode);
                reliability *= view.reliability;
            }
            path.push(on.to);
        }

        for (i, leg) in self.legs.iter().enumerate() {
            let start = if i == 0 { self.cursor.min(leg.route.edges.len()) } else { 0 };
            for k in start..leg.route.edges.len() {
                if let Some(view) = graph.edge(leg.route.edges[k]) {
                    t += view.effective_time();
                    cost += model.edge_cost(&view, mode);
                    reliability *= view.reliability;
                }
                path.push(leg.route.nodes[k + 1]);
            }
            if let Some(stop) = leg.stop {
                stops.push(PlannedStop {
                    request:  stop.request,
                    node:     stop.node,
                    quantity: stop.quantity,
                    eta:      t,
                });
            }
        }

        DeliveryPlan {
            vehicle: self.id,
            state: self.state,
            stops,
            reliability,
            cost,
            path,
        }
    }
}
