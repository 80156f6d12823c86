//! The `Engine` struct and its step loop.

use rr_core::{
    EdgeId, EngineConfig, GeoPoint, NodeId, Request, RequestId, RequestStatus, SimClock, Step,
    UnservedReason, VehicleId,
};
use rr_fleet::{Delivery, DeliveryPlan, FleetAllocator, StopOrderRefiner, Unserved, Vehicle};
use rr_graph::{EdgeSpec, EdgeState, EdgeStateChange, Graph, GraphError, NodeSpec, RouteMode, Router};
use rr_priority::{UrgencyModel, ordered_pending};
use rr_replan::{EdgeEventQueue, EdgeEventSender, Replanner, SendOutcome};

use crate::{EngineError, EngineObserver, EngineResult};

// ── Summaries ─────────────────────────────────────────────────────────────────

/// What one [`Engine::step`] did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepSummary {
    pub step:        Step,
    /// Edge events drained from the queue.
    pub events:      usize,
    /// Events that actually changed an edge's state.
    pub changes:     usize,
    /// `NoPathFound` requests put back to Pending after a recovery.
    pub retried:     usize,
    pub replanned:   usize,
    pub stale:       usize,
    /// Stops with no alternate path, returned to the pending pool.
    pub handed_back: usize,
    /// `CapacityExceeded` requests put back to Pending once a vehicle could
    /// carry them again.
    pub reclaimed:   usize,
    pub assigned:    usize,
    /// Requests that became Unserved during this step.
    pub unserved:    Vec<Unserved>,
    pub reordered:   usize,
    /// Vehicles sent back to a depot.
    pub homing:      usize,
}

impl StepSummary {
    /// `true` when the step changed nothing.
    pub fn is_quiet(&self) -> bool {
        self.changes == 0
            && self.retried == 0
            && self.replanned == 0
            && self.handed_back == 0
            && self.reclaimed == 0
            && self.assigned == 0
            && self.unserved.is_empty()
            && self.reordered == 0
            && self.homing == 0
    }
}

/// Every vehicle's plan plus the requests the fleet cannot serve.
#[derive(Clone, Debug, PartialEq)]
pub struct FleetPlans {
    pub step:     Step,
    /// Simulated time the ETAs are measured against.
    pub elapsed:  f64,
    pub plans:    Vec<DeliveryPlan>,
    pub unserved: Vec<Unserved>,
}

impl FleetPlans {
    pub fn plan(&self, vehicle: VehicleId) -> Option<&DeliveryPlan> {
        self.plans.iter().find(|p| p.vehicle == vehicle)
    }
}

/// Outcome of [`Engine::run`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub steps:              u64,
    /// Every request terminal and every vehicle parked before `max_steps`.
    pub completed:          bool,
    pub elapsed:            f64,
    pub delivered:          usize,
    pub delivered_quantity: u64,
    pub unserved:           usize,
    /// Requests still Pending or Assigned.
    pub outstanding:        usize,
    pub total_idle_time:    f64,
    /// Sum of every vehicle's driving time.
    pub total_travel_time:  f64,
    pub edges_travelled:    u64,
    /// Mean reliability over every edge driven by the fleet; 0 if none.
    pub avg_reliability:    f64,
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// The orchestrator.
///
/// Owns the graph, the fleet, the request pool and every component.  Each
/// [`step`](Self::step) runs, in order:
///
/// 1. **Events**: drain the edge-event queue and apply the transitions.
/// 2. **Recovery**: on any recovery, `NoPathFound` requests become Pending
///    again (if `retry_unreachable_on_recovery`).
/// 3. **Replan**: repair the routes that use a changed edge; hand back stops
///    with no alternate path.  `CapacityExceeded` requests that some vehicle
///    can now carry become Pending again.
/// 4. **Urgency**: recompute scores if requests or severities changed.
/// 5. **Allocate**: greedy assignment of Pending requests by urgency.
/// 6. **Refine**: reorder the stops of vehicles touched in 3 or 5.
/// 7. **Homing**: vehicles with nothing left to do drive to the nearest
///    depot (if `return_to_depot`).
///
/// Vehicles move only in [`advance`](Self::advance).
///
/// Create via [`EngineBuilder`][crate::EngineBuilder].
pub struct Engine {
    config:    EngineConfig,
    mode:      RouteMode,
    clock:     SimClock,
    graph:     Graph,
    router:    Box<dyn Router>,
    fleet:     Vec<(VehicleId, u32)>,
    depots:    Vec<NodeId>,
    vehicles:  Vec<Vehicle>,
    /// Indexed by `RequestId`.
    requests:  Vec<Request>,
    urgency:   UrgencyModel,
    allocator: FleetAllocator,
    refiner:   StopOrderRefiner,
    replanner: Replanner,
    events:    EdgeEventQueue,
}

impl Engine {
    pub(crate) fn new(
        config: EngineConfig,
        mode:   RouteMode,
        fleet:  Vec<(VehicleId, u32)>,
        depots: Vec<NodeId>,
        router: Box<dyn Router>,
    ) -> Self {
        Self {
            mode,
            clock:     SimClock::new(),
            graph:     Graph::empty(),
            router,
            fleet,
            depots,
            vehicles:  Vec::new(),
            requests:  Vec::new(),
            urgency:   UrgencyModel::new(config.urgency.clone()),
            allocator: FleetAllocator::new(mode),
            refiner:   StopOrderRefiner::new(config.refine.clone(), mode),
            replanner: Replanner::new(config.replan_penalty_threshold, mode),
            events:    EdgeEventQueue::new(config.event_queue_capacity),
            config,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn config(&self) -> &EngineConfig { &self.config }
    pub fn mode(&self) -> RouteMode { self.mode }
    pub fn clock(&self) -> &SimClock { &self.clock }
    pub fn graph(&self) -> &Graph { &self.graph }
    pub fn depots(&self) -> &[NodeId] { &self.depots }
    pub fn vehicles(&self) -> &[Vehicle] { &self.vehicles }
    pub fn requests(&self) -> &[Request] { &self.requests }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.id() == id)
    }

    pub fn request(&self, id: RequestId) -> Option<&Request> {
        self.requests.get(id.0 as usize)
    }

    /// A producer handle for edge events, usable from other threads.
    pub fn event_sender(&self) -> EdgeEventSender {
        self.events.sender()
    }

    /// Degraded reports superseded under backpressure so far.
    pub fn dropped_events(&self) -> u64 {
        self.events.dropped()
    }

    // ── Ingestion ─────────────────────────────────────────────────────────

    /// Validate and install a new graph, then reset the run.
    ///
    /// Malformed input is rejected as a whole and leaves the engine as it
    /// was.  One request is submitted for every node with demand > 0.
    pub fn load_graph(&mut self, nodes: Vec<NodeSpec>, edges: Vec<EdgeSpec>) -> EngineResult<()> {
        let graph = Graph::from_specs(nodes, edges)?;
        self.load(graph)
    }

    /// Install an already built graph and reset the run.
    pub fn load(&mut self, graph: Graph) -> EngineResult<()> {
        if let Some(&depot) = self.depots.iter().find(|&&d| !graph.contains_node(d)) {
            return Err(GraphError::NodeNotFound(depot).into());
        }
        let home = self.depots[0];

        // Events reported against the previous graph are meaningless now.
        let discarded = self.events.drain().len();

        self.graph = graph;
        self.clock = SimClock::new();
        self.requests.clear();
        self.urgency = UrgencyModel::new(self.config.urgency.clone());
        self.replanner.reset();
        self.vehicles = self
            .fleet
            .iter()
            .map(|&(id, capacity)| Vehicle::new(id, capacity, home))
            .collect();

        let demands: Vec<(NodeId, u32)> = self
            .graph
            .node_ids()
            .filter_map(|n| self.graph.demand(n).filter(|&d| d > 0).map(|d| (n, d)))
            .collect();
        for (node, quantity) in demands {
            self.push_request(node, quantity);
        }

        tracing::info!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            vehicles = self.vehicles.len(),
            requests = self.requests.len(),
            depot = %home,
            discarded,
            "graph loaded"
        );
        Ok(())
    }

    // ── Boundary operations ───────────────────────────────────────────────

    /// Enqueue a delivery request.  `priority_hint` is a fresh severity
    /// report for the node.
    pub fn submit_delivery_request(
        &mut self,
        node:          NodeId,
        quantity:      u32,
        priority_hint: Option<f64>,
    ) -> EngineResult<RequestId> {
        if !self.graph.contains_node(node) {
            return Err(GraphError::NodeNotFound(node).into());
        }
        if quantity == 0 {
            return Err(EngineError::ZeroQuantity { node });
        }
        if let Some(severity) = priority_hint {
            let population = self.graph.population(node).unwrap_or(0.0);
            self.urgency.report(&mut self.graph, node, severity, population)?;
        }
        Ok(self.push_request(node, quantity))
    }

    /// Snap `pos` to the nearest node, then submit.
    pub fn submit_request_near(
        &mut self,
        pos:           GeoPoint,
        quantity:      u32,
        priority_hint: Option<f64>,
    ) -> EngineResult<RequestId> {
        let node = self.graph.nearest_node(pos).ok_or(EngineError::EmptyGraph)?;
        self.submit_delivery_request(node, quantity, priority_hint)
    }

    /// Update a node's severity and population density.
    pub fn report_severity(&mut self, node: NodeId, severity: f64, population: f64) -> EngineResult<()> {
        self.urgency.report(&mut self.graph, node, severity, population)?;
        Ok(())
    }

    /// Queue an availability change.  It takes effect on the next `step`.
    pub fn report_edge_state(&self, edge: EdgeId, state: EdgeState) -> EngineResult<SendOutcome> {
        if !self.graph.contains_edge(edge) {
            return Err(GraphError::InvalidEdgeState { edge, reason: "unknown edge id".into() }.into());
        }
        state.validate(edge)?;
        Ok(self.events.sender().send(edge, state)?)
    }

    /// Queue a Degraded report at the configured default penalty.
    pub fn report_edge_degraded(&self, edge: EdgeId) -> EngineResult<SendOutcome> {
        self.report_edge_state(edge, EdgeState::Degraded { penalty: self.config.cost.degraded_penalty })
    }

    /// Run one iteration of event processing, replanning and allocation.
    pub fn step(&mut self) -> EngineResult<StepSummary> {
        let mut summary = StepSummary { step: self.clock.step, ..StepSummary::default() };
        let router: &dyn Router = self.router.as_ref();

        // ── ① Events ──────────────────────────────────────────────────────
        let events = self.events.drain();
        summary.events = events.len();
        let mut changes: Vec<EdgeStateChange> = Vec::new();
        for event in events {
            match self.graph.set_edge_state(event.edge, event.state) {
                Ok(Some(change)) => changes.push(change),
                Ok(None) => {}
                Err(err) => tracing::warn!(edge = %event.edge, seq = event.seq, %err, "edge event rejected"),
            }
        }
        summary.changes = changes.len();

        // ── ② Recovery ────────────────────────────────────────────────────
        if self.config.retry_unreachable_on_recovery && changes.iter().any(EdgeStateChange::is_recovery) {
            let unreachable = RequestStatus::Unserved { reason: UnservedReason::NoPathFound };
            for req in self.requests.iter_mut().filter(|r| r.status == unreachable) {
                req.status = RequestStatus::Pending;
                summary.retried += 1;
            }
            if summary.retried > 0 {
                tracing::debug!(retried = summary.retried, "unreachable requests retried after recovery");
                self.urgency.mark_dirty();
            }
        }

        // ── ③ Replan ──────────────────────────────────────────────────────
        let report = self.replanner.run(&self.graph, &mut self.vehicles, router, &changes)?;
        summary.replanned = report.replanned.len();
        summary.stale = report.stale;
        summary.handed_back = report.handed_back.len();
        for stop in &report.handed_back {
            if let Some(req) = self.requests.get_mut(stop.request.0 as usize) {
                req.status = RequestStatus::Pending;
            }
        }
        if !report.handed_back.is_empty() {
            self.urgency.mark_dirty();
        }
        summary.reclaimed = reopen_capacity_unserved(&mut self.requests, &self.vehicles);
        if summary.reclaimed > 0 {
            tracing::debug!(reclaimed = summary.reclaimed, "capacity freed, over-capacity requests reopened");
            self.urgency.mark_dirty();
        }

        // ── ④ Urgency ─────────────────────────────────────────────────────
        self.urgency.refresh(&mut self.graph, &mut self.requests)?;

        // ── ⑤ Allocate ────────────────────────────────────────────────────
        let order = ordered_pending(&self.requests);
        let allocation = self.allocator.allocate(
            router,
            &self.graph,
            &mut self.vehicles,
            &mut self.requests,
            &order,
        );
        summary.assigned = allocation.assigned.len();
        if !allocation.unserved.is_empty() {
            // Unserved requests leave the active set used for normalisation.
            self.urgency.mark_dirty();
        }
        summary.unserved = allocation.unserved;

        // ── ⑥ Refine ──────────────────────────────────────────────────────
        let mut targets = allocation.touched;
        targets.extend(report.replanned);
        targets.sort_unstable();
        targets.dedup();
        let requests = &self.requests;
        let urgency_of = |id: RequestId| requests.get(id.0 as usize).map_or(0.0, |r| r.urgency);
        summary.reordered =
            self.refiner.refine_all(&mut self.vehicles, &targets, &self.graph, router, &urgency_of);

        // ── ⑦ Homing ──────────────────────────────────────────────────────
        if self.config.return_to_depot {
            summary.homing = send_home(&mut self.vehicles, &self.depots, &self.graph, router, self.mode);
        }

        tracing::debug!(
            step = %summary.step,
            changes = summary.changes,
            replanned = summary.replanned,
            assigned = summary.assigned,
            unserved = summary.unserved.len(),
            "step complete"
        );
        self.clock.next_step();
        Ok(summary)
    }

    /// The current plan of every vehicle and the Unserved list.
    pub fn current_plans(&self) -> FleetPlans {
        let model = self.router.cost_model();
        let now = self.clock.elapsed;
        FleetPlans {
            step:     self.clock.step,
            elapsed:  now,
            plans:    self.vehicles.iter().map(|v| v.plan(&self.graph, model, self.mode, now)).collect(),
            unserved: self.unserved(),
        }
    }

    /// Every request currently reported Unserved, by id.
    pub fn unserved(&self) -> Vec<Unserved> {
        self.requests
            .iter()
            .filter_map(|r| match r.status {
                RequestStatus::Unserved { reason } => Some(Unserved {
                    request:  r.id,
                    node:     r.node,
                    quantity: r.quantity,
                    reason,
                }),
                _ => None,
            })
            .collect()
    }

    /// Move the fleet for `duration` and advance the clock.
    ///
    /// Served stops mark their requests Delivered.  A vehicle whose capacity
    /// is spent leaves the fleet once parked (at a depot when
    /// `return_to_depot` is set).
    pub fn advance(&mut self, duration: f64) -> Vec<Delivery> {
        let mut out = Vec::new();
        for vehicle in self.vehicles.iter_mut().filter(|v| v.is_active()) {
            for delivery in vehicle.advance(duration, &self.graph) {
                if let Some(req) = self.requests.get_mut(delivery.request.0 as usize) {
                    req.status = RequestStatus::Delivered { vehicle: delivery.vehicle };
                }
                out.push(delivery);
            }
            let home = !self.config.return_to_depot || self.depots.contains(&vehicle.node());
            if vehicle.is_exhausted() && home {
                tracing::debug!(vehicle = %vehicle.id(), node = %vehicle.node(), "vehicle retired");
                vehicle.retire();
            }
        }
        if !out.is_empty() {
            self.urgency.mark_dirty();
        }
        self.clock.advance(duration);
        out
    }

    /// `true` once every request is terminal and the fleet is parked.
    pub fn is_settled(&self) -> bool {
        self.requests.iter().all(|r| r.status.is_terminal())
            && self.vehicles.iter().all(|v| !v.is_active() || v.is_parked())
    }

    /// Alternate `step` and `advance(dt)` until settled or `max_steps`.
    pub fn run<O: EngineObserver>(&mut self, max_steps: u64, dt: f64, observer: &mut O) -> EngineResult<RunSummary> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(EngineError::Config(format!("advance duration must be finite and > 0, got {dt}")));
        }
        tracing::info!(max_steps, dt, requests = self.requests.len(), "run started");

        let mut steps = 0;
        let mut completed = false;
        while steps < max_steps {
            let step = self.clock.step;
            observer.on_step_start(step);
            let summary = self.step()?;
            steps += 1;
            for u in &summary.unserved {
                observer.on_unserved(step, u);
            }
            observer.on_step_end(&summary);
            observer.on_plans(step, &self.current_plans().plans);

            if self.is_settled() {
                completed = true;
                break;
            }
            let start = self.clock.elapsed;
            for delivery in self.advance(dt) {
                observer.on_delivery(&delivery, start + delivery.offset);
            }
        }

        let summary = self.run_summary(steps, completed);
        tracing::info!(
            steps,
            completed,
            delivered = summary.delivered,
            unserved = summary.unserved,
            elapsed = summary.elapsed,
            avg_reliability = summary.avg_reliability,
            "run finished"
        );
        observer.on_run_end(&summary);
        Ok(summary)
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn push_request(&mut self, node: NodeId, quantity: u32) -> RequestId {
        let id = RequestId(self.requests.len() as u64);
        self.requests.push(Request::new(id, node, quantity));
        self.urgency.mark_dirty();
        tracing::debug!(request = %id, %node, quantity, "request submitted");
        id
    }

    fn run_summary(&self, steps: u64, completed: bool) -> RunSummary {
        let mut s = RunSummary { steps, completed, elapsed: self.clock.elapsed, ..RunSummary::default() };
        for req in &self.requests {
            match req.status {
                RequestStatus::Delivered { .. } => {
                    s.delivered += 1;
                    s.delivered_quantity += u64::from(req.quantity);
                }
                RequestStatus::Unserved { .. } => s.unserved += 1,
                _ => s.outstanding += 1,
            }
        }
        s.total_idle_time = self.vehicles.iter().map(Vehicle::idle_time).sum();
        let mut reliability_sum = 0.0;
        for log in self.vehicles.iter().map(Vehicle::mission) {
            s.total_travel_time += log.travel_time;
            s.edges_travelled += u64::from(log.edges);
            reliability_sum += log.reliability_sum;
        }
        if s.edges_travelled > 0 {
            s.avg_reliability = reliability_sum / s.edges_travelled as f64;
        }
        s
    }
}

/// Put `CapacityExceeded` requests back to Pending when some active vehicle
/// has at least their quantity left.  Returns the number reopened.
fn reopen_capacity_unserved(requests: &mut [Request], vehicles: &[Vehicle]) -> usize {
    let largest = vehicles.iter().filter(|v| v.is_active()).map(Vehicle::remaining).max().unwrap_or(0);
    let over = RequestStatus::Unserved { reason: UnservedReason::CapacityExceeded };
    let mut reopened = 0;
    for req in requests.iter_mut().filter(|r| r.status == over && r.quantity <= largest) {
        req.status = RequestStatus::Pending;
        reopened += 1;
    }
    reopened
}

/// Give each active vehicle with no legs a homing leg to the cheapest depot.
/// Returns the number of vehicles sent.
fn send_home(vehicles: &mut [Vehicle], depots: &[NodeId], graph: &Graph, router: &dyn Router, mode: RouteMode) -> usize {
    let mut sent = 0;
    for vehicle in vehicles.iter_mut() {
        let at = vehicle.anchor();
        if !vehicle.is_active() || vehicle.leg_count() > 0 || depots.contains(&at) {
            continue;
        }
        let best = depots
            .iter()
            .filter_map(|&d| router.route(graph, at, d, mode).ok())
            .min_by(|a, b| a.cost.total_cmp(&b.cost));
        match best {
            Some(route) => {
                let depot = route.destination().unwrap_or(at);
                if vehicle.set_homing(route) {
                    tracing::debug!(vehicle = %vehicle.id(), %depot, "returning to depot");
                    sent += 1;
                }
            }
            None => tracing::debug!(vehicle = %vehicle.id(), node = %at, "no depot reachable"),
        }
    }
    sent
}
