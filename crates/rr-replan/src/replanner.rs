//! Incremental route repair after edge-state changes.
//!
//! # Phases
//!
//! 1. **Schedule** (sequential, mutating): for every change that requires a
//!    replan, find the vehicles whose remaining route uses the edge.  A
//!    vehicle driving an edge that went Down turns back; a vehicle whose
//!    next edge went Down is marked `Blocked`.  Each affected vehicle gets
//!    one coalesced [`ReplanJob`] and its generation is bumped.
//! 2. **Compute** (read-only, parallel with the `parallel` feature): for
//!    each job, walk the vehicle's legs and reroute every leg that crosses
//!    a trigger edge or an impassable edge, or whose origin moved because an
//!    earlier stop was dropped.  Untouched legs are kept as they are.
//! 3. **Commit** (sequential): results whose generation or graph version
//!    no longer match are rejected with
//!    [`StaleComputation`](ReplanError::StaleComputation) /
//!    [`GraphChanged`](ReplanError::GraphChanged).  Others rewrite the
//!    vehicle's legs; stops with no alternate path are handed back.

use rustc_hash::FxHashMap;

use rr_core::{EdgeId, VehicleId};
use rr_fleet::{LegEdit, RouteState, Stop, Vehicle};
use rr_graph::{EdgeStateChange, Graph, RouteMode, Router};

use crate::{ReplanError, ReplanResult};

/// A scheduled recomputation for one vehicle.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplanJob {
    pub vehicle:    VehicleId,
    pub generation: u64,
    /// Graph version the job was scheduled against.
    pub version:    u64,
    /// Edges that triggered the job; legs crossing them are rerouted.
    pub triggers:   Vec<EdgeId>,
}

/// Result of computing a [`ReplanJob`].
#[derive(Clone, Debug)]
pub struct ReplanOutcome {
    pub vehicle:    VehicleId,
    pub generation: u64,
    pub version:    u64,
    /// One edit per leg the vehicle had when the job was computed.
    pub edits:      Vec<LegEdit>,
}

impl ReplanOutcome {
    pub fn rerouted(&self) -> usize {
        self.edits.iter().filter(|e| matches!(e, LegEdit::Reroute(_))).count()
    }

    pub fn dropped(&self) -> usize {
        self.edits.iter().filter(|e| matches!(e, LegEdit::Drop)).count()
    }
}

/// Summary of one [`Replanner::run`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplanReport {
    /// Vehicles whose legs were rewritten, ascending.
    pub replanned:   Vec<VehicleId>,
    /// Stops with no alternate path, returned for reassignment.
    pub handed_back: Vec<Stop>,
    /// Results discarded as superseded.
    pub stale:       usize,
}

/// Tracks per-vehicle replan generations.
#[derive(Clone, Debug)]
pub struct Replanner {
    threshold:   f64,
    mode:        RouteMode,
    generations: FxHashMap<VehicleId, u64>,
}

impl Replanner {
    pub fn new(threshold: f64, mode: RouteMode) -> Self {
        Self { threshold, mode, generations: FxHashMap::default() }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Current generation for `vehicle` (0 if never scheduled).
    pub fn generation(&self, vehicle: VehicleId) -> u64 {
        self.generations.get(&vehicle).copied().unwrap_or(0)
    }

    /// Forget all generations.
    pub fn reset(&mut self) {
        self.generations.clear();
    }

    // ── Phase 1 ───────────────────────────────────────────────────────────

    /// Turn the relevant changes into at most one job per vehicle.
    pub fn schedule(&mut self, graph: &Graph, vehicles: &mut [Vehicle], changes: &[EdgeStateChange]) -> Vec<ReplanJob> {
        let triggers: Vec<&EdgeStateChange> =
            changes.iter().filter(|c| c.requires_replan(self.threshold)).collect();
        if triggers.is_empty() {
            return Vec::new();
        }

        let mut jobs = Vec::new();
        for vehicle in vehicles.iter_mut().filter(|v| v.is_active()) {
            let mut hit = Vec::new();
            for change in &triggers {
                if vehicle.first_leg_using(change.edge).is_none() {
                    continue;
                }
                hit.push(change.edge);
                if change.to.is_passable() {
                    continue;
                }
                if vehicle.on_edge().is_some_and(|e| e.edge == change.edge) {
                    tracing::debug!(vehicle = %vehicle.id(), edge = %change.edge, "edge under vehicle went down, turning back");
                    vehicle.turn_back();
                } else if vehicle.on_edge().is_none()
                    && vehicle.leg_remaining_edges(0).first() == Some(&change.edge)
                {
                    vehicle.set_state(RouteState::Blocked);
                }
            }
            if hit.is_empty() {
                continue;
            }
            let generation = self.generations.entry(vehicle.id()).or_insert(0);
            *generation += 1;
            jobs.push(ReplanJob {
                vehicle:    vehicle.id(),
                generation: *generation,
                version:    graph.version(),
                triggers:   hit,
            });
        }
        jobs
    }

    // ── Phase 2 ───────────────────────────────────────────────────────────

    /// Compute the leg edits for one job.  Read-only.
    pub fn compute(&self, job: &ReplanJob, vehicle: &Vehicle, graph: &Graph, router: &dyn Router) -> ReplanOutcome {
        let passable = |e: &EdgeId| graph.edge_state(*e).is_some_and(|s| s.is_passable());

        let mut edits = Vec::with_capacity(vehicle.leg_count());
        let mut origin = vehicle.anchor();
        let mut origin_moved = false;

        for (i, leg) in vehicle.legs().enumerate() {
            let target = leg.target();
            let remaining = vehicle.leg_remaining_edges(i);
            let broken = leg.destination() != Some(target)
                || (i == 0 && leg.route.nodes.get(vehicle.cursor()) != Some(&origin))
                || remaining.iter().any(|e| job.triggers.contains(e) || !passable(e));

            if !origin_moved && !broken {
                edits.push(LegEdit::Keep);
                origin = leg.destination().unwrap_or(origin);
                continue;
            }

            match router.route(graph, origin, target, self.mode) {
                Ok(route) => {
                    edits.push(LegEdit::Reroute(route));
                    origin = target;
                    origin_moved = false;
                }
                Err(err) => {
                    tracing::debug!(vehicle = %vehicle.id(), leg = i, %err, "no alternate path for leg");
                    edits.push(LegEdit::Drop);
                    origin_moved = true;
                }
            }
        }

        ReplanOutcome {
            vehicle:    job.vehicle,
            generation: job.generation,
            version:    job.version,
            edits,
        }
    }

    /// Compute every job.  Jobs are independent; with the `parallel`
    /// feature they run on Rayon.
    pub fn compute_all(&self, jobs: &[ReplanJob], vehicles: &[Vehicle], graph: &Graph, router: &dyn Router) -> Vec<ReplanOutcome> {
        let index: FxHashMap<VehicleId, usize> =
            vehicles.iter().enumerate().map(|(i, v)| (v.id(), i)).collect();

        #[cfg(not(feature = "parallel"))]
        {
            jobs.iter()
                .filter_map(|job| {
                    let v = &vehicles[*index.get(&job.vehicle)?];
                    Some(self.compute(job, v, graph, router))
                })
                .collect()
        }

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            jobs.par_iter()
                .filter_map(|job| {
                    let v = &vehicles[*index.get(&job.vehicle)?];
                    Some(self.compute(job, v, graph, router))
                })
                .collect()
        }
    }

    // ── Phase 3 ───────────────────────────────────────────────────────────

    /// Apply one outcome.  Returns the stops handed back.
    pub fn commit(&self, outcome: ReplanOutcome, vehicles: &mut [Vehicle], graph: &Graph) -> ReplanResult<Vec<Stop>> {
        let current = self.generation(outcome.vehicle);
        if outcome.generation != current {
            return Err(ReplanError::StaleComputation {
                vehicle:    outcome.vehicle,
                generation: outcome.generation,
                current,
            });
        }
        if outcome.version != graph.version() {
            return Err(ReplanError::GraphChanged {
                vehicle:  outcome.vehicle,
                computed: outcome.version,
                current:  graph.version(),
            });
        }
        let vehicle = vehicles
            .iter_mut()
            .find(|v| v.id() == outcome.vehicle)
            .ok_or(ReplanError::VehicleNotFound(outcome.vehicle))?;
        Ok(vehicle.apply_edits(outcome.edits)?)
    }

    /// Schedule, compute and commit in one go.
    pub fn run(
        &mut self,
        graph:    &Graph,
        vehicles: &mut [Vehicle],
        router:   &dyn Router,
        changes:  &[EdgeStateChange],
    ) -> ReplanResult<ReplanReport> {
        let jobs = self.schedule(graph, vehicles, changes);
        let outcomes = self.compute_all(&jobs, vehicles, graph, router);

        let mut report = ReplanReport::default();
        for outcome in outcomes {
            let vehicle = outcome.vehicle;
            let (rerouted, dropped) = (outcome.rerouted(), outcome.dropped());
            match self.commit(outcome, vehicles, graph) {
                Ok(stops) => {
                    tracing::debug!(%vehicle, rerouted, dropped, "replan committed");
                    for stop in &stops {
                        tracing::warn!(%vehicle, request = %stop.request, node = %stop.node, "stop unreachable, handed back");
                    }
                    report.handed_back.extend(stops);
                    report.replanned.push(vehicle);
                }
                Err(err) if err.is_stale() => {
                    tracing::debug!(%vehicle, %err, "stale replan discarded");
                    report.stale += 1;
                }
                Err(err) => return Err(err),
            }
        }
        report.replanned.sort_unstable();
        Ok(report)
    }
}
