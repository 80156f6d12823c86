//! Unit tests for rr-replan.

#[cfg(test)]
mod helpers {
    use rr_core::{CostWeights, EdgeId, NodeId, RequestId, VehicleId};
    use rr_fleet::{Stop, Vehicle};
    use rr_graph::{DijkstraRouter, EdgeSpec, Graph, NodeSpec, RouteMode, Router};

    /// depot(0) – 1 – 2 – 3 – 4, unit times, with detour 1 – 5 – 3 (2 + 2).
    ///
    /// Edges: e0 = 0-1, e1 = 1-2, e2 = 2-3, e3 = 3-4, e4 = 1-5, e5 = 5-3.
    pub fn graph() -> Graph {
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

    /// A vehicle at the depot with one stop at `node`.
    pub fn vehicle_to(id: u32, g: &Graph, node: u32) -> Vehicle {
        let mut v = Vehicle::new(VehicleId(id), 10, NodeId(0));
        let route = router().route(g, NodeId(0), NodeId(node), RouteMode::Balanced).unwrap();
        v.commit_stop(Stop { request: RequestId(id as u64), node: NodeId(node), quantity: 2 }, route)
            .unwrap();
        v
    }
}

// ── Queue ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod queue {
    use rr_core::EdgeId;
    use rr_graph::EdgeState;
    use crate::{EdgeEventQueue, SendOutcome};

    #[test]
    fn drain_in_submission_order() {
        let q = EdgeEventQueue::new(8);
        let tx = q.sender();
        tx.send(EdgeId(3), EdgeState::Down).unwrap();
        tx.send(EdgeId(1), EdgeState::degraded()).unwrap();
        tx.send(EdgeId(3), EdgeState::Up).unwrap();
        let events = q.drain();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].edge, EdgeId(3));
        assert_eq!(events[2].state, EdgeState::Up);
        assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));
        assert!(q.is_empty());
    }

    #[test]
    fn full_queue_coalesces_degraded_keeps_critical() {
        let q = EdgeEventQueue::new(2);
        let tx = q.sender();
        assert!(matches!(tx.send(EdgeId(0), EdgeState::Down).unwrap(), SendOutcome::Queued { .. }));
        assert!(matches!(tx.send(EdgeId(1), EdgeState::Down).unwrap(), SendOutcome::Queued { .. }));
        assert!(matches!(tx.send(EdgeId(2), EdgeState::degraded()).unwrap(), SendOutcome::Coalesced { .. }));
        assert!(matches!(tx.send(EdgeId(3), EdgeState::Down).unwrap(), SendOutcome::Overflowed { .. }));
        assert!(matches!(tx.send(EdgeId(0), EdgeState::Up).unwrap(), SendOutcome::Overflowed { .. }));
        assert_eq!(q.len(), 5);
        assert_eq!(q.dropped(), 0);

        let edges: Vec<_> = q.drain().into_iter().map(|e| (e.edge, e.state)).collect();
        assert_eq!(
            edges,
            vec![
                (EdgeId(0), EdgeState::Down),
                (EdgeId(1), EdgeState::Down),
                (EdgeId(2), EdgeState::degraded()),
                (EdgeId(3), EdgeState::Down),
                (EdgeId(0), EdgeState::Up),
            ]
        );
        assert!(q.is_empty());
    }

    #[test]
    fn newest_degraded_report_wins_under_backpressure() {
        let q = EdgeEventQueue::new(1);
        let tx = q.sender();
        tx.send(EdgeId(1), EdgeState::Down).unwrap();
        let light = EdgeState::Degraded { penalty: 1.2 };
        let heavy = EdgeState::Degraded { penalty: 3.0 };
        assert!(matches!(tx.send(EdgeId(1), light).unwrap(), SendOutcome::Coalesced { .. }));
        assert!(matches!(tx.send(EdgeId(1), heavy).unwrap(), SendOutcome::Coalesced { .. }));
        assert_eq!(q.dropped(), 1);

        let events = q.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].state, EdgeState::Down);
        assert_eq!(events[1].state, heavy);
        assert!(events[0].seq < events[1].seq);
    }

    #[test]
    fn senders_work_across_threads() {
        let q = EdgeEventQueue::new(64);
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let tx = q.sender();
                std::thread::spawn(move || {
                    for i in 0..8 {
                        tx.send(EdgeId(t * 8 + i), EdgeState::Down).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let events = q.drain();
        assert_eq!(events.len(), 32);
        assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));
    }
}

// ── Replanner ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod replanner {
    use rr_core::{EdgeId, NodeId, RequestId, VehicleId};
    use rr_fleet::{LegEdit, RouteState, Vehicle};
    use rr_graph::{EdgeState, RouteMode, Router};
    use crate::{ReplanError, Replanner};

    #[test]
    fn detour_for_vehicle_ahead_of_failure() {
        let mut g = super::helpers::graph();
        let r = super::helpers::router();
        let mut fleet = vec![
            super::helpers::vehicle_to(0, &g, 4),
            super::helpers::vehicle_to(1, &g, 1),
        ];
        fleet[0].advance(0.5, &g);
        fleet[0].set_state(RouteState::InTransit);

        let change = g.set_edge_state(EdgeId(1), EdgeState::Down).unwrap().unwrap();
        let mut rp = Replanner::new(1.5, RouteMode::Balanced);
        let report = rp.run(&g, &mut fleet, &r, &[change]).unwrap();

        assert_eq!(report.replanned, vec![VehicleId(0)]);
        assert!(report.handed_back.is_empty());
        let path: Vec<_> = fleet[0].edges_ahead().collect();
        // Still finishing e0, then the detour 1-5-3-4.
        assert_eq!(path, vec![EdgeId(0), EdgeId(4), EdgeId(5), EdgeId(3)]);
        assert_eq!(fleet[0].state(), RouteState::Replanned);
        // The other vehicle is untouched.
        assert_eq!(fleet[1].edges_ahead().collect::<Vec<_>>(), vec![EdgeId(0)]);
        assert_eq!(rp.generation(VehicleId(1)), 0);
    }

    #[test]
    fn vehicle_on_failed_edge_turns_back() {
        let mut g = super::helpers::graph();
        let r = super::helpers::router();
        let mut fleet = vec![super::helpers::vehicle_to(0, &g, 4)];
        fleet[0].advance(1.5, &g);
        assert_eq!(fleet[0].on_edge().map(|e| e.edge), Some(EdgeId(1)));

        let change = g.set_edge_state(EdgeId(1), EdgeState::Down).unwrap().unwrap();
        let mut rp = Replanner::new(1.5, RouteMode::Balanced);
        rp.run(&g, &mut fleet, &r, &[change]).unwrap();

        assert!(fleet[0].on_edge().is_none());
        assert_eq!(fleet[0].node(), NodeId(1));
        assert_eq!(fleet[0].edges_ahead().collect::<Vec<_>>(), vec![EdgeId(4), EdgeId(5), EdgeId(3)]);
        assert_eq!(fleet[0].state(), RouteState::Replanned);
    }

    #[test]
    fn homing_vehicle_turned_back_still_heads_to_depot() {
        let mut g = super::helpers::graph();
        let r = super::helpers::router();
        let mut v = Vehicle::new(VehicleId(0), 10, NodeId(3));
        assert!(v.set_homing(r.route(&g, NodeId(3), NodeId(0), RouteMode::Balanced).unwrap()));
        let mut fleet = vec![v];
        fleet[0].advance(0.5, &g);
        assert_eq!(fleet[0].on_edge().map(|e| e.edge), Some(EdgeId(2)));

        let change = g.set_edge_state(EdgeId(2), EdgeState::Down).unwrap().unwrap();
        let mut rp = Replanner::new(1.5, RouteMode::Balanced);
        let report = rp.run(&g, &mut fleet, &r, &[change]).unwrap();

        assert_eq!(report.replanned, vec![VehicleId(0)]);
        assert!(report.handed_back.is_empty());
        assert!(fleet[0].is_homing());
        assert_eq!(fleet[0].node(), NodeId(3));
        assert_eq!(fleet[0].leg(0).map(|l| l.target()), Some(NodeId(0)));
        assert_eq!(fleet[0].edges_ahead().collect::<Vec<_>>(), vec![EdgeId(5), EdgeId(4), EdgeId(0)]);
    }

    #[test]
    fn unreachable_stop_handed_back() {
        let mut g = super::helpers::graph();
        let r = super::helpers::router();
        let mut fleet = vec![super::helpers::vehicle_to(0, &g, 4)];
        let change = g.set_edge_state(EdgeId(3), EdgeState::Down).unwrap().unwrap();
        let mut rp = Replanner::new(1.5, RouteMode::Balanced);
        let report = rp.run(&g, &mut fleet, &r, &[change]).unwrap();

        assert_eq!(report.handed_back.len(), 1);
        assert_eq!(report.handed_back[0].request, RequestId(0));
        assert_eq!(fleet[0].remaining(), 10);
        assert!(!fleet[0].has_stops());
        assert_eq!(fleet[0].state(), RouteState::Idle);
    }

    #[test]
    fn mild_degradation_ignored() {
        let mut g = super::helpers::graph();
        let r = super::helpers::router();
        let mut fleet = vec![super::helpers::vehicle_to(0, &g, 4)];
        let change = g
            .set_edge_state(EdgeId(2), EdgeState::Degraded { penalty: 1.2 })
            .unwrap()
            .unwrap();
        let mut rp = Replanner::new(1.5, RouteMode::Balanced);
        let report = rp.run(&g, &mut fleet, &r, &[change]).unwrap();
        assert!(report.replanned.is_empty());
    }

    #[test]
    fn severe_degradation_reroutes() {
        let mut g = super::helpers::graph();
        let r = super::helpers::router();
        let mut fleet = vec![super::helpers::vehicle_to(0, &g, 4)];
        // 1-2-3 becomes 1 + 5 = 6 > detour 4.
        let change = g
            .set_edge_state(EdgeId(2), EdgeState::Degraded { penalty: 5.0 })
            .unwrap()
            .unwrap();
        let mut rp = Replanner::new(1.5, RouteMode::Balanced);
        let report = rp.run(&g, &mut fleet, &r, &[change]).unwrap();
        assert_eq!(report.replanned, vec![VehicleId(0)]);
        assert_eq!(
            fleet[0].edges_ahead().collect::<Vec<_>>(),
            vec![EdgeId(0), EdgeId(4), EdgeId(5), EdgeId(3)]
        );
    }

    #[test]
    fn stale_generation_rejected() {
        let mut g = super::helpers::graph();
        let r = super::helpers::router();
        let mut fleet = vec![super::helpers::vehicle_to(0, &g, 4)];
        let change = g.set_edge_state(EdgeId(1), EdgeState::Down).unwrap().unwrap();
        let mut rp = Replanner::new(1.5, RouteMode::Balanced);

        let first = rp.schedule(&g, &mut fleet, &[change]);
        let second = rp.schedule(&g, &mut fleet, &[change]);
        assert_eq!(first[0].generation, 1);
        assert_eq!(second[0].generation, 2);

        let old = rp.compute(&first[0], &fleet[0], &g, &r);
        let err = rp.commit(old, &mut fleet, &g).unwrap_err();
        assert!(matches!(
            err,
            ReplanError::StaleComputation { vehicle: VehicleId(0), generation: 1, current: 2 }
        ));
        assert!(err.is_stale());

        let fresh = rp.compute(&second[0], &fleet[0], &g, &r);
        assert!(matches!(fresh.edits[0], LegEdit::Reroute(_)));
        rp.commit(fresh, &mut fleet, &g).unwrap();
    }

    #[test]
    fn graph_change_after_compute_rejected() {
        let mut g = super::helpers::graph();
        let r = super::helpers::router();
        let mut fleet = vec![super::helpers::vehicle_to(0, &g, 4)];
        let change = g.set_edge_state(EdgeId(1), EdgeState::Down).unwrap().unwrap();
        let mut rp = Replanner::new(1.5, RouteMode::Balanced);
        let jobs = rp.schedule(&g, &mut fleet, &[change]);
        let outcome = rp.compute(&jobs[0], &fleet[0], &g, &r);
        g.set_edge_state(EdgeId(4), EdgeState::Down).unwrap();
        assert!(matches!(
            rp.commit(outcome, &mut fleet, &g),
            Err(ReplanError::GraphChanged { computed: 1, current: 2, .. })
        ));
    }
}
