//! Unit tests for rr-fleet.

#[cfg(test)]
mod helpers {
    use rr_core::{CostWeights, EdgeId, NodeId};
    use rr_graph::{DijkstraRouter, EdgeSpec, Graph, NodeSpec};

    /// depot(0) – 1 – 2 – 3 – 4 with unit travel time and reliability 1,
    /// plus a detour 1 – 5 – 3 (travel 2 each).
    ///
    /// Edges: e0 = 0-1, e1 = 1-2, e2 = 2-3, e3 = 3-4, e4 = 1-5, e5 = 5-3.
    pub fn line_with_detour() -> Graph {
        let nodes = (0..6).map(|i| NodeSpec::new(NodeId(i))).collect();
        let mut edges: Vec<EdgeSpec> = (0..4)
            .map(|i| EdgeSpec::new(EdgeId(i), NodeId(i), NodeId(i + 1), 1.0, 1.0))
            .collect();
        edges.push(EdgeSpec::new(EdgeId(4), NodeId(1), NodeId(5), 2.0, 1.0));
        edges.push(EdgeSpec::new(EdgeId(5), NodeId(5), NodeId(3), 2.0, 1.0));
        Graph::from_specs(nodes, edges).unwrap()
    }

    pub fn router() -> DijkstraRouter {
        DijkstraRouter::new(CostWeights { time: 1.0, reliability: 0.0, ..CostWeights::default() })
    }
}

// ── Vehicle ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod vehicle {
    use rr_core::{EdgeId, NodeId, RequestId, VehicleId};
    use rr_graph::{EdgeSpec, EdgeState, Graph, NodeSpec, RouteMode, Router};
    use crate::{FleetError, RouteState, Stop, Vehicle};

    fn stop(req: u64, node: u32, qty: u32) -> Stop {
        Stop { request: RequestId(req), node: NodeId(node), quantity: qty }
    }

    #[test]
    fn new_vehicle_is_full_and_idle() {
        let v = Vehicle::new(VehicleId(0), 10, NodeId(0));
        assert_eq!(v.remaining(), 10);
        assert_eq!(v.load(), 0);
        assert_eq!(v.state(), RouteState::Idle);
        assert!(v.is_parked());
        assert!(!v.is_exhausted());
    }

    #[test]
    fn commit_rejects_over_capacity() {
        let g = super::helpers::line_with_detour();
        let r = super::helpers::router();
        let mut v = Vehicle::new(VehicleId(3), 5, NodeId(0));
        let route = r.route(&g, NodeId(0), NodeId(2), RouteMode::Balanced).unwrap();
        let err = v.commit_stop(stop(0, 2, 6), route).unwrap_err();
        assert!(matches!(
            err,
            FleetError::CapacityExceeded { vehicle: VehicleId(3), requested: 6, remaining: 5 }
        ));
        assert_eq!(v.remaining(), 5);
        assert!(v.is_parked());
    }

    #[test]
    fn commit_requires_matching_origin() {
        let g = super::helpers::line_with_detour();
        let r = super::helpers::router();
        let mut v = Vehicle::new(VehicleId(0), 5, NodeId(0));
        let route = r.route(&g, NodeId(1), NodeId(2), RouteMode::Balanced).unwrap();
        assert!(matches!(v.commit_stop(stop(0, 2, 1), route), Err(FleetError::LegOriginMismatch { .. })));
    }

    #[test]
    fn advance_delivers_in_order() {
        let g = super::helpers::line_with_detour();
        let r = super::helpers::router();
        let mut v = Vehicle::new(VehicleId(0), 10, NodeId(0));
        v.commit_stop(stop(0, 2, 4), r.route(&g, NodeId(0), NodeId(2), RouteMode::Balanced).unwrap()).unwrap();
        v.commit_stop(stop(1, 4, 3), r.route(&g, NodeId(2), NodeId(4), RouteMode::Balanced).unwrap()).unwrap();
        assert_eq!(v.remaining(), 3);
        assert_eq!(v.load(), 7);
        assert_eq!(v.state(), RouteState::Planned);

        let d = v.advance(1.5, &g);
        assert!(d.is_empty());
        assert_eq!(v.state(), RouteState::InTransit);
        assert_eq!(v.node(), NodeId(1));
        assert_eq!(v.anchor(), NodeId(2));

        let d = v.advance(1.0, &g);
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].request, RequestId(0));
        assert!((d[0].offset - 0.5).abs() < 1e-12);
        assert_eq!(v.load(), 3);

        let d = v.advance(10.0, &g);
        assert_eq!(d.len(), 1);
        assert_eq!(v.node(), NodeId(4));
        assert_eq!(v.state(), RouteState::Delivered);
        assert_eq!(v.delivered(), 7);
        // 1.5 s of driving, the rest parked.
        assert!((v.idle_time() - 8.5).abs() < 1e-9);
    }

    #[test]
    fn mission_log_tracks_driven_edges() {
        let nodes = (0..3).map(|i| NodeSpec::new(NodeId(i))).collect();
        let edges = vec![
            EdgeSpec::new(EdgeId(0), NodeId(0), NodeId(1), 2.0, 0.9),
            EdgeSpec::new(EdgeId(1), NodeId(1), NodeId(2), 3.0, 0.7),
        ];
        let g = Graph::from_specs(nodes, edges).unwrap();
        let r = super::helpers::router();
        let mut v = Vehicle::new(VehicleId(0), 10, NodeId(0));
        assert_eq!(v.mission().route, vec![NodeId(0)]);
        assert_eq!(v.mission().average_reliability(), None);

        v.commit_stop(stop(0, 2, 1), r.route(&g, NodeId(0), NodeId(2), RouteMode::Balanced).unwrap()).unwrap();
        v.advance(3.0, &g);
        let log = v.mission();
        assert_eq!(log.edges, 1);
        assert_eq!(log.route, vec![NodeId(0), NodeId(1)]);
        assert!((log.travel_time - 3.0).abs() < 1e-9);

        v.advance(10.0, &g);
        let log = v.mission();
        assert_eq!(log.edges, 2);
        assert_eq!(log.route, vec![NodeId(0), NodeId(1), NodeId(2)]);
        assert!((log.travel_time - 5.0).abs() < 1e-9);
        assert!((log.reliability_sum - 1.6).abs() < 1e-9);
        assert!((log.average_reliability().unwrap() - 0.8).abs() < 1e-9);
        assert!((v.idle_time() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn blocked_on_down_edge() {
        let mut g = super::helpers::line_with_detour();
        let r = super::helpers::router();
        let mut v = Vehicle::new(VehicleId(0), 10, NodeId(0));
        v.commit_stop(stop(0, 4, 1), r.route(&g, NodeId(0), NodeId(4), RouteMode::Balanced).unwrap()).unwrap();
        g.set_edge_state(EdgeId(0), EdgeState::Down).unwrap();
        v.advance(3.0, &g);
        assert_eq!(v.state(), RouteState::Blocked);
        assert_eq!(v.node(), NodeId(0));
        assert!((v.idle_time() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn turn_back_owes_travelled_time() {
        let g = super::helpers::line_with_detour();
        let r = super::helpers::router();
        let mut v = Vehicle::new(VehicleId(0), 10, NodeId(0));
        v.commit_stop(stop(0, 2, 1), r.route(&g, NodeId(0), NodeId(2), RouteMode::Balanced).unwrap()).unwrap();
        v.advance(0.4, &g);
        assert!(v.on_edge().is_some());
        v.turn_back();
        assert_eq!(v.state(), RouteState::Blocked);
        assert_eq!(v.anchor(), NodeId(0));
        assert!(v.on_edge().is_none());
        // Reroute leg 0 and move: the first 0.4 s repay the turn-back.
        v.replace_leg_route(0, r.route(&g, NodeId(0), NodeId(2), RouteMode::Balanced).unwrap()).unwrap();
        v.advance(0.4, &g);
        assert_eq!(v.node(), NodeId(0));
        assert!(v.on_edge().is_none());
    }

    #[test]
    fn edges_ahead_skip_traversed_prefix() {
        let g = super::helpers::line_with_detour();
        let r = super::helpers::router();
        let mut v = Vehicle::new(VehicleId(0), 10, NodeId(0));
        v.commit_stop(stop(0, 4, 1), r.route(&g, NodeId(0), NodeId(4), RouteMode::Balanced).unwrap()).unwrap();
        v.advance(1.5, &g);
        let ahead: Vec<_> = v.edges_ahead().collect();
        assert_eq!(ahead, vec![EdgeId(1), EdgeId(2), EdgeId(3)]);
        assert_eq!(v.first_leg_using(EdgeId(0)), None);
        assert_eq!(v.first_leg_using(EdgeId(1)), Some(0));
        assert_eq!(v.first_leg_using(EdgeId(3)), Some(0));
    }

    #[test]
    fn drop_leg_returns_capacity() {
        let g = super::helpers::line_with_detour();
        let r = super::helpers::router();
        let mut v = Vehicle::new(VehicleId(0), 10, NodeId(0));
        v.commit_stop(stop(0, 2, 4), r.route(&g, NodeId(0), NodeId(2), RouteMode::Balanced).unwrap()).unwrap();
        v.commit_stop(stop(1, 4, 3), r.route(&g, NodeId(2), NodeId(4), RouteMode::Balanced).unwrap()).unwrap();
        let dropped = v.drop_leg(0).unwrap();
        assert_eq!(dropped.request, RequestId(0));
        assert_eq!(v.remaining(), 7);
        assert_eq!(v.leg_origin(0), Some(NodeId(0)));
    }

    #[test]
    fn homing_cancelled_by_new_stop() {
        let g = super::helpers::line_with_detour();
        let r = super::helpers::router();
        let mut v = Vehicle::new(VehicleId(0), 10, NodeId(2));
        assert!(v.set_homing(r.route(&g, NodeId(2), NodeId(0), RouteMode::Balanced).unwrap()));
        assert!(v.is_homing());
        v.advance(0.5, &g);
        // Mid-edge toward node 1: a new stop is routed from the anchor.
        let tail = v.tail_node();
        assert_eq!(tail, NodeId(1));
        v.commit_stop(stop(0, 4, 2), r.route(&g, tail, NodeId(4), RouteMode::Balanced).unwrap()).unwrap();
        assert!(!v.is_homing());
        assert_eq!(v.leg_count(), 1);
    }

    #[test]
    fn plan_reports_etas_and_path() {
        let g = super::helpers::line_with_detour();
        let r = super::helpers::router();
        let mut v = Vehicle::new(VehicleId(0), 10, NodeId(0));
        v.commit_stop(stop(0, 2, 4), r.route(&g, NodeId(0), NodeId(2), RouteMode::Balanced).unwrap()).unwrap();
        v.commit_stop(stop(1, 4, 3), r.route(&g, NodeId(2), NodeId(4), RouteMode::Balanced).unwrap()).unwrap();
        let plan = v.plan(&g, r.cost_model(), RouteMode::Balanced, 100.0);
        assert_eq!(plan.vehicle, VehicleId(0));
        assert_eq!(plan.stops.len(), 2);
        assert_eq!(plan.stops[0].eta, 102.0);
        assert_eq!(plan.stops[1].eta, 104.0);
        assert_eq!(plan.path, (0..5).map(NodeId).collect::<Vec<_>>());
        assert_eq!(plan.total_quantity(), 7);
        assert_eq!(plan.reliability, 1.0);
    }
}

// ── Allocator ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod allocator {
    use rr_core::{EdgeId, NodeId, Request, RequestId, RequestStatus, UnservedReason, VehicleId};
    use rr_graph::EdgeState;
    use crate::{FleetAllocator, Vehicle};

    fn request(id: u64, node: u32, qty: u32, urgency: f64) -> Request {
        let mut r = Request::new(RequestId(id), NodeId(node), qty);
        r.urgency = urgency;
        r
    }

    #[test]
    fn capacities_ten_and_five() {
        let g = super::helpers::line_with_detour();
        let r = super::helpers::router();
        let mut fleet = vec![
            Vehicle::new(VehicleId(1), 10, NodeId(0)),
            Vehicle::new(VehicleId(2), 5, NodeId(0)),
        ];
        let mut reqs = vec![
            request(0, 2, 8, 1.0),
            request(1, 3, 4, 0.8),
            request(2, 4, 3, 0.5),
        ];
        let order = [RequestId(0), RequestId(1), RequestId(2)];
        let out = FleetAllocator::default().allocate(&r, &g, &mut fleet, &mut reqs, &order);

        assert_eq!(out.assigned, vec![(RequestId(0), VehicleId(1)), (RequestId(1), VehicleId(2))]);
        assert_eq!(out.unserved.len(), 1);
        assert_eq!(out.unserved[0].request, RequestId(2));
        assert_eq!(out.unserved[0].reason, UnservedReason::CapacityExceeded);
        assert_eq!(reqs[2].status, RequestStatus::Unserved { reason: UnservedReason::CapacityExceeded });
        assert_eq!(fleet[0].remaining(), 2);
        assert_eq!(fleet[1].remaining(), 1);
        assert_eq!(out.touched, vec![VehicleId(1), VehicleId(2)]);
    }

    #[test]
    fn cheapest_vehicle_wins() {
        let g = super::helpers::line_with_detour();
        let r = super::helpers::router();
        let mut fleet = vec![
            Vehicle::new(VehicleId(0), 10, NodeId(0)),
            Vehicle::new(VehicleId(1), 10, NodeId(4)),
        ];
        let mut reqs = vec![request(0, 3, 1, 1.0)];
        let out = FleetAllocator::default().allocate(&r, &g, &mut fleet, &mut reqs, &[RequestId(0)]);
        assert_eq!(out.assigned, vec![(RequestId(0), VehicleId(1))]);
    }

    #[test]
    fn ties_go_to_lower_id() {
        let g = super::helpers::line_with_detour();
        let r = super::helpers::router();
        let mut fleet = vec![
            Vehicle::new(VehicleId(7), 10, NodeId(0)),
            Vehicle::new(VehicleId(3), 10, NodeId(0)),
        ];
        let mut reqs = vec![request(0, 2, 1, 1.0)];
        let out = FleetAllocator::default().allocate(&r, &g, &mut fleet, &mut reqs, &[RequestId(0)]);
        assert_eq!(out.assigned, vec![(RequestId(0), VehicleId(3))]);
    }

    #[test]
    fn unreachable_is_reported_and_pass_continues() {
        let mut g = super::helpers::line_with_detour();
        g.set_edge_state(EdgeId(3), EdgeState::Down).unwrap();
        let r = super::helpers::router();
        let mut fleet = vec![Vehicle::new(VehicleId(0), 10, NodeId(0))];
        let mut reqs = vec![request(0, 4, 2, 1.0), request(1, 2, 2, 0.5)];
        let out = FleetAllocator::default().allocate(&r, &g, &mut fleet, &mut reqs, &[RequestId(0), RequestId(1)]);
        assert_eq!(out.unserved[0].reason, UnservedReason::NoPathFound);
        assert_eq!(out.assigned, vec![(RequestId(1), VehicleId(0))]);
        assert_eq!(fleet[0].remaining(), 8);
    }

    #[test]
    fn later_stops_chain_from_tail() {
        let g = super::helpers::line_with_detour();
        let r = super::helpers::router();
        let mut fleet = vec![Vehicle::new(VehicleId(0), 10, NodeId(0))];
        let mut reqs = vec![request(0, 2, 1, 1.0), request(1, 4, 1, 0.5)];
        FleetAllocator::default().allocate(&r, &g, &mut fleet, &mut reqs, &[RequestId(0), RequestId(1)]);
        let legs: Vec<_> = fleet[0].legs().collect();
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[1].origin(), Some(NodeId(2)));
        assert_eq!(legs[1].destination(), Some(NodeId(4)));
    }
}

// ── Refinement ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod refine {
    use rr_core::{NodeId, RefinePolicy, RefineStrategy, RequestId, VehicleId};
    use rr_graph::{RouteMode, Router};
    use crate::{LegMatrix, Stop, StopOrderRefiner, Vehicle, exact_order, exchange_order, order_objective};

    /// Deterministic asymmetric matrix for `n` stops.
    fn matrix(n: usize) -> LegMatrix {
        let mut m = LegMatrix::new(n);
        for a in 0..=n {
            for b in 1..=n {
                if a != b {
                    let c = 1.0 + ((a * 7 + b * 13) % 17) as f64;
                    m.set(a, b, c, c * 0.5);
                }
            }
        }
        m
    }

    #[test]
    fn exact_never_worse_than_identity_or_exchange() {
        for n in 2..=7 {
            let m = matrix(n);
            let urgency: Vec<f64> = (0..n).map(|k| ((k * 5) % 4) as f64 * 0.25).collect();
            let identity: Vec<usize> = (1..=n).collect();
            let dp = exact_order(&m, &urgency, 0.3);
            let ex = exchange_order(&m, &urgency, 0.3, identity.clone(), 50);
            let f = |o: &[usize]| order_objective(&m, &urgency, o, 0.3);
            assert!(f(&dp) <= f(&identity) + 1e-9, "n={n}");
            assert!(f(&dp) <= f(&ex) + 1e-9, "n={n}");
            let mut sorted = dp.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, identity, "dp must be a permutation");
        }
    }

    #[test]
    fn exact_matches_brute_force() {
        let n = 4;
        let m = matrix(n);
        let urgency = [1.0, 0.0, 0.5, 0.25];
        let dp = exact_order(&m, &urgency, 1.0);
        let best = permutations(n)
            .into_iter()
            .map(|o| order_objective(&m, &urgency, &o, 1.0))
            .fold(f64::INFINITY, f64::min);
        assert!((order_objective(&m, &urgency, &dp, 1.0) - best).abs() < 1e-9);
    }

    fn permutations(n: usize) -> Vec<Vec<usize>> {
        fn go(rest: Vec<usize>, acc: Vec<usize>, out: &mut Vec<Vec<usize>>) {
            if rest.is_empty() {
                out.push(acc);
                return;
            }
            for i in 0..rest.len() {
                let mut r = rest.clone();
                let x = r.remove(i);
                let mut a = acc.clone();
                a.push(x);
                go(r, a, out);
            }
        }
        let mut out = Vec::new();
        go((1..=n).collect(), Vec::new(), &mut out);
        out
    }

    #[test]
    fn urgent_stop_pulled_forward() {
        // Two stops equally far from start and each other: only urgency
        // decides, so the urgent one goes first.
        let mut m = LegMatrix::new(2);
        for (a, b) in [(0, 1), (0, 2), (1, 2), (2, 1)] {
            m.set(a, b, 1.0, 1.0);
        }
        let order = exact_order(&m, &[0.1, 1.0], 1.0);
        assert_eq!(order, vec![2, 1]);
    }

    #[test]
    fn off_keeps_identity() {
        let r = StopOrderRefiner::new(
            RefinePolicy { strategy: RefineStrategy::Off, ..RefinePolicy::default() },
            RouteMode::Balanced,
        );
        assert_eq!(r.solve(&matrix(5), &[1.0; 5]), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn vehicle_reordered_without_touching_capacity() {
        let g = super::helpers::line_with_detour();
        let router = super::helpers::router();
        let mut v = Vehicle::new(VehicleId(0), 10, NodeId(0));
        // Greedy order 0 → 4 → 2 doubles back; the refiner should fix it.
        let s_far  = Stop { request: RequestId(0), node: NodeId(4), quantity: 3 };
        let s_near = Stop { request: RequestId(1), node: NodeId(2), quantity: 2 };
        v.commit_stop(s_far, router.route(&g, NodeId(0), NodeId(4), RouteMode::Balanced).unwrap()).unwrap();
        v.commit_stop(s_near, router.route(&g, NodeId(4), NodeId(2), RouteMode::Balanced).unwrap()).unwrap();

        let refiner = StopOrderRefiner::new(RefinePolicy::default(), RouteMode::Balanced);
        let urgency = |_: RequestId| 0.5;
        let mut fleet = vec![v];
        let changed = refiner.refine_all(&mut fleet, &[VehicleId(0)], &g, &router, &urgency);
        assert_eq!(changed, 1);
        let order: Vec<_> = fleet[0].stops().map(|s| s.request).collect();
        assert_eq!(order, vec![RequestId(1), RequestId(0)]);
        assert_eq!(fleet[0].remaining(), 5);

        // Second pass finds nothing better.
        assert_eq!(refiner.refine_all(&mut fleet, &[VehicleId(0)], &g, &router, &urgency), 0);
    }

    #[test]
    fn stop_in_motion_stays_first() {
        let g = super::helpers::line_with_detour();
        let router = super::helpers::router();
        let mut v = Vehicle::new(VehicleId(0), 10, NodeId(0));
        let s_far  = Stop { request: RequestId(0), node: NodeId(4), quantity: 1 };
        let s_near = Stop { request: RequestId(1), node: NodeId(2), quantity: 1 };
        v.commit_stop(s_far, router.route(&g, NodeId(0), NodeId(4), RouteMode::Balanced).unwrap()).unwrap();
        v.commit_stop(s_near, router.route(&g, NodeId(4), NodeId(2), RouteMode::Balanced).unwrap()).unwrap();
        v.advance(0.5, &g);
        let refiner = StopOrderRefiner::new(RefinePolicy::default(), RouteMode::Balanced);
        assert!(refiner.propose(&v, &g, &router, &|_: RequestId| 1.0).is_none());
    }
}
