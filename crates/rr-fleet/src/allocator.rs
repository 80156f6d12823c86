//! Greedy urgency-ordered assignment of requests to vehicles.
//!
//! # Algorithm
//!
//! 1. Take the next pending request in priority order.
//! 2. Candidates are active vehicles whose remaining capacity covers the
//!    quantity.  Route each candidate from its tail node (last committed
//!    stop, or current anchor) to the request node.  These searches are
//!    independent and run on Rayon with the `parallel` feature.
//! 3. Commit to the cheapest candidate; ties go to the lower vehicle id.
//! 4. A request with no capacity-feasible vehicle is reported
//!    `CapacityExceeded`; one whose candidates all fail to route is reported
//!    `NoPathFound`.  Either way the pass moves on to the next request.
//!
//! The loop over requests is sequential: each commitment moves a vehicle's
//! tail and changes the next request's candidate costs.

use rustc_hash::FxHashMap;

use rr_core::{NodeId, Request, RequestId, RequestStatus, UnservedReason, VehicleId};
use rr_graph::{Graph, GraphResult, Route, RouteMode, Router};

use crate::{Stop, Unserved, Vehicle};

/// Outcome of one allocation pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Allocation {
    pub assigned: Vec<(RequestId, VehicleId)>,
    pub unserved: Vec<Unserved>,
    /// Vehicles that received at least one stop, ascending.
    pub touched:  Vec<VehicleId>,
}

impl Allocation {
    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty() && self.unserved.is_empty()
    }
}

/// Greedy fleet allocator.
#[derive(Clone, Debug, Default)]
pub struct FleetAllocator {
    mode: RouteMode,
}

impl FleetAllocator {
    pub fn new(mode: RouteMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> RouteMode {
        self.mode
    }

    /// Assign the requests in `order` (ids of `Pending` requests, highest
    /// priority first).  Request statuses are updated in place.
    pub fn allocate(
        &self,
        router:   &dyn Router,
        graph:    &Graph,
        vehicles: &mut [Vehicle],
        requests: &mut [Request],
        order:    &[RequestId],
    ) -> Allocation {
        let index: FxHashMap<RequestId, usize> =
            requests.iter().enumerate().map(|(i, r)| (r.id, i)).collect();
        let mut out = Allocation::default();

        for &rid in order {
            let Some(&ri) = index.get(&rid) else { continue };
            let req = &requests[ri];
            if !req.is_pending() {
                continue;
            }
            let (node, quantity) = (req.node, req.quantity);

            let candidates: Vec<usize> = vehicles
                .iter()
                .enumerate()
                .filter(|(_, v)| v.is_active() && v.remaining() >= quantity)
                .map(|(i, _)| i)
                .collect();

            if candidates.is_empty() {
                self.mark_unserved(&mut requests[ri], UnservedReason::CapacityExceeded, &mut out);
                continue;
            }

            let scored = self.score(router, graph, vehicles, &candidates, node);
            let best = scored
                .into_iter()
                .filter_map(|(vi, r)| r.ok().map(|route| (vi, route)))
                .min_by(|(va, ra), (vb, rb)| {
                    ra.cost
                        .total_cmp(&rb.cost)
                        .then_with(|| vehicles[*va].id().cmp(&vehicles[*vb].id()))
                });

            let Some((vi, route)) = best else {
                self.mark_unserved(&mut requests[ri], UnservedReason::NoPathFound, &mut out);
                continue;
            };

            let vehicle = &mut vehicles[vi];
            let stop = Stop { request: rid, node, quantity };
            let cost = route.cost;
            match vehicle.commit_stop(stop, route) {
                Ok(()) => {
                    tracing::debug!(request = %rid, vehicle = %vehicle.id(), %node, quantity, cost, "request assigned");
                    requests[ri].status = RequestStatus::Assigned { vehicle: vehicle.id() };
                    out.assigned.push((rid, vehicle.id()));
                    out.touched.push(vehicle.id());
                }
                Err(err) => {
                    // Candidates were filtered on capacity; this only fires if
                    // the vehicle's tail moved underneath us.
                    tracing::warn!(request = %rid, vehicle = %vehicle.id(), %err, "commit rejected");
                    self.mark_unserved(&mut requests[ri], UnservedReason::CapacityExceeded, &mut out);
                }
            }
        }

        out.touched.sort_unstable();
        out.touched.dedup();
        out
    }

    fn mark_unserved(&self, req: &mut Request, reason: UnservedReason, out: &mut Allocation) {
        tracing::warn!(request = %req.id, node = %req.node, quantity = req.quantity, %reason, "request unserved");
        req.status = RequestStatus::Unserved { reason };
        out.unserved.push(Unserved {
            request:  req.id,
            node:     req.node,
            quantity: req.quantity,
            reason,
        });
    }

    /// Route every candidate vehicle's tail to `target`.
    fn score(
        &self,
        router:     &dyn Router,
        graph:      &Graph,
        vehicles:   &[Vehicle],
        candidates: &[usize],
        target:     NodeId,
    ) -> Vec<(usize, GraphResult<Route>)> {
        let mode = self.mode;

        #[cfg(not(feature = "parallel"))]
        {
            candidates
                .iter()
                .map(|&vi| (vi, router.route(graph, vehicles[vi].tail_node(), target, mode)))
                .collect()
        }

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            candidates
                .par_iter()
                .map(|&vi| (vi, router.route(graph, vehicles[vi].tail_node(), target, mode)))
                .collect()
        }
    }
}

