//! Unit tests for rr-io.

#[cfg(test)]
mod fixtures {
    /// depot(0) – 1 – 2 along the equator, one vehicle.
    pub const SMALL_JSON: &str = r#"{
        "nodes": [
            { "id": 0, "demand": 0, "priority": 0, "x": 0.00, "y": 0.0 },
            { "id": 1, "demand": 5, "priority": 3, "x": 0.01, "y": 0.0 },
            { "id": 2, "demand": 4, "priority": 5, "x": 0.02, "y": 0.0, "population": 120 }
        ],
        "edges": [
            { "u": 0, "v": 1, "cost": 10, "reliability": 0.9 },
            { "u": 1, "v": 2, "cost": 12, "reliability": 0.95 }
        ],
        "vehicles": [{ "id": 1, "capacity": 20 }],
        "hospitals": [0]
    }"#;
}

// ── Generator ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod generator {
    use rustc_hash::FxHashSet;

    use rr_core::{CostWeights, EngineConfig, NodeId, SimRng, VehicleId};
    use rr_graph::{DijkstraRouter, Graph, RouteMode, Router};

    use crate::{RandomScenario, ScenarioGenerator};

    #[test]
    fn same_seed_same_scenario() {
        let g = RandomScenario::default();
        let a = g.generate(&mut SimRng::new(42));
        let b = g.generate(&mut SimRng::new(42));
        let c = g.generate(&mut SimRng::new(43));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn default_layout() {
        let s = RandomScenario::default().generate(&mut SimRng::new(42));
        assert_eq!(s.nodes.len(), 50);
        assert_eq!(s.depots, vec![NodeId(0), NodeId(49)]);
        assert_eq!(
            s.vehicles,
            vec![(VehicleId(1), 40), (VehicleId(2), 45), (VehicleId(3), 42)]
        );
        for n in &s.nodes {
            if s.depots.contains(&n.id) {
                assert_eq!(n.demand, 0);
                assert_eq!(n.severity, 0.0);
            } else {
                assert!((4..=18).contains(&n.demand), "demand {}", n.demand);
                assert!((1.0..=5.0).contains(&n.severity));
            }
            assert!(n.pos.is_some());
        }
    }

    #[test]
    fn edges_unique_and_in_range() {
        let s = RandomScenario::default().generate(&mut SimRng::new(7));
        assert!(s.edges.len() >= 49);
        let mut pairs = FxHashSet::default();
        for (i, e) in s.edges.iter().enumerate() {
            assert_eq!(e.id.0 as usize, i);
            assert!(e.u < e.v);
            assert!(pairs.insert((e.u, e.v)), "duplicate pair {:?}", (e.u, e.v));
            assert!((10.0..=60.0).contains(&e.travel_time));
            assert!((0.70..=0.99).contains(&e.reliability));
            assert!(((e.reliability * 100.0).round() - e.reliability * 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn network_is_connected() {
        let s = RandomScenario::default().generate(&mut SimRng::new(11));
        let graph = Graph::from_specs(s.nodes.clone(), s.edges.clone()).unwrap();
        let router = DijkstraRouter::new(CostWeights::default());
        for n in graph.node_ids().collect::<Vec<_>>() {
            assert!(router.route(&graph, NodeId(0), n, RouteMode::Balanced).is_ok(), "{n} unreachable");
        }
    }

    #[test]
    fn scenario_builds_an_engine() {
        let s = RandomScenario::default().with_nodes(12).generate(&mut SimRng::new(3));
        assert_eq!(s.depots, vec![NodeId(0), NodeId(11)]);
        s.validate().unwrap();
        let engine = s.into_engine(EngineConfig::default()).unwrap();
        // Every non-depot node has demand and becomes a request.
        assert_eq!(engine.requests().len(), 10);
        assert_eq!(engine.vehicles().len(), 3);
    }

    #[test]
    fn tiny_node_count_still_has_two_depots() {
        let s = RandomScenario::default().with_nodes(0).generate(&mut SimRng::new(1));
        assert_eq!(s.nodes.len(), 2);
        assert_eq!(s.edges.len(), 1);
        assert_eq!(s.total_demand(), 0);
    }
}

// ── JSON ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod json {
    use std::io::Cursor;

    use rr_core::{EdgeId, NodeId, SimRng, VehicleId};
    use rr_graph::GraphError;

    use crate::{
        IoError, RandomScenario, ScenarioGenerator, load_scenario_json, load_scenario_reader,
        save_scenario_json, write_scenario_json,
    };

    #[test]
    fn loads_data_json_shape() {
        let s = load_scenario_reader(Cursor::new(super::fixtures::SMALL_JSON)).unwrap();
        assert_eq!(s.nodes.len(), 3);
        assert_eq!(s.nodes[1].severity, 3.0);
        assert_eq!(s.nodes[2].population, 120.0);
        assert_eq!(s.nodes[1].demand, 5);
        let pos = s.nodes[1].pos.unwrap();
        assert!((pos.lon - 0.01).abs() < 1e-12);
        assert_eq!(pos.lat, 0.0);
        assert_eq!(s.edges[1].id, EdgeId(1));
        assert_eq!(s.edges[1].travel_time, 12.0);
        assert_eq!(s.vehicles, vec![(VehicleId(1), 20)]);
        assert_eq!(s.depots, vec![NodeId(0)]);
        assert_eq!(s.total_demand(), 9);
        assert_eq!(s.fleet_capacity(), 20);
    }

    #[test]
    fn hospitals_default_to_node_zero() {
        let json = r#"{ "nodes": [{ "id": 0 }, { "id": 1, "demand": 3 }],
                        "edges": [{ "u": 0, "v": 1, "cost": 5, "reliability": 1.0 }],
                        "vehicles": [{ "id": 7, "capacity": 4 }] }"#;
        let s = load_scenario_reader(Cursor::new(json)).unwrap();
        assert_eq!(s.depots, vec![NodeId(0)]);
        assert!(s.nodes[0].pos.is_none());
    }

    #[test]
    fn explicit_edge_ids_kept() {
        let json = r#"{ "nodes": [{ "id": 0 }, { "id": 1 }],
                        "edges": [{ "id": 40, "u": 0, "v": 1, "cost": 5, "reliability": 1.0 }],
                        "vehicles": [{ "id": 1, "capacity": 4 }] }"#;
        let s = load_scenario_reader(Cursor::new(json)).unwrap();
        assert_eq!(s.edges[0].id, EdgeId(40));
    }

    #[test]
    fn malformed_scenarios_rejected() {
        let half_coords = r#"{ "nodes": [{ "id": 0, "x": 1.0 }], "vehicles": [{ "id": 1, "capacity": 4 }] }"#;
        assert!(matches!(load_scenario_reader(Cursor::new(half_coords)), Err(IoError::Invalid(_))));

        let dangling = r#"{ "nodes": [{ "id": 0 }],
                            "edges": [{ "u": 0, "v": 9, "cost": 5, "reliability": 1.0 }],
                            "vehicles": [{ "id": 1, "capacity": 4 }] }"#;
        assert!(matches!(
            load_scenario_reader(Cursor::new(dangling)),
            Err(IoError::Graph(GraphError::DanglingEdge { .. }))
        ));

        let no_fleet = r#"{ "nodes": [{ "id": 0 }], "vehicles": [] }"#;
        assert!(matches!(load_scenario_reader(Cursor::new(no_fleet)), Err(IoError::Invalid(_))));

        let bad_depot = r#"{ "nodes": [{ "id": 0 }], "vehicles": [{ "id": 1, "capacity": 4 }], "hospitals": [3] }"#;
        assert!(matches!(load_scenario_reader(Cursor::new(bad_depot)), Err(IoError::Invalid(_))));

        let no_nodes = r#"{ "nodes": [], "vehicles": [{ "id": 1, "capacity": 4 }] }"#;
        assert!(matches!(load_scenario_reader(Cursor::new(no_nodes)), Err(IoError::Invalid(_))));

        assert!(matches!(load_scenario_reader(Cursor::new("{ \"nodes\": 3 }")), Err(IoError::Json(_))));
    }

    #[test]
    fn saved_scenario_reloads() {
        let original = RandomScenario::default().with_nodes(20).generate(&mut SimRng::new(5));
        let mut buf = Vec::new();
        write_scenario_json(&original, &mut buf).unwrap();
        let loaded = load_scenario_reader(Cursor::new(buf)).unwrap();

        assert_eq!(loaded.depots, original.depots);
        assert_eq!(loaded.vehicles, original.vehicles);
        assert_eq!(loaded.nodes.len(), original.nodes.len());
        for (a, b) in loaded.nodes.iter().zip(&original.nodes) {
            assert_eq!((a.id, a.demand), (b.id, b.demand));
            assert_eq!(a.severity, b.severity);
        }
        for (a, b) in loaded.edges.iter().zip(&original.edges) {
            assert_eq!((a.id, a.u, a.v, a.travel_time), (b.id, b.u, b.v, b.travel_time));
            assert!((a.reliability - b.reliability).abs() < 1e-12);
        }
    }

    #[test]
    fn file_helpers() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("data.json");
        let s = load_scenario_reader(Cursor::new(super::fixtures::SMALL_JSON)).unwrap();
        save_scenario_json(&s, &path).unwrap();
        let back = load_scenario_json(&path).unwrap();
        assert_eq!(back.edges.len(), 2);
        assert!(matches!(load_scenario_json(&dir.path().join("missing.json")), Err(IoError::Io(_))));
    }
}

// ── Reports ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod reports {
    use std::io::Cursor;

    use tempfile::TempDir;

    use rr_core::{EngineConfig, NodeId, RequestId, Step, UnservedReason, VehicleId};
    use rr_engine::EngineObserver;
    use rr_fleet::{Delivery, Unserved};

    use crate::writer::ReportWriter;
    use crate::{
        CsvReportWriter, DeliveryRow, IoError, IoResult, ReportObserver, StepSummaryRow, UnservedRow,
        load_scenario_reader,
    };

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("create temp dir")
    }

    fn headers(path: std::path::PathBuf) -> Vec<String> {
        let mut rdr = csv::Reader::from_path(path).unwrap();
        rdr.headers().unwrap().iter().map(str::to_owned).collect()
    }

    fn rows(path: std::path::PathBuf) -> Vec<csv::StringRecord> {
        let mut rdr = csv::Reader::from_path(path).unwrap();
        rdr.records().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn csv_files_and_headers() {
        let dir = tmp();
        let mut w = CsvReportWriter::new(dir.path()).unwrap();
        w.finish().unwrap();
        w.finish().unwrap();
        assert_eq!(
            headers(dir.path().join("deliveries.csv")),
            ["step", "time", "vehicle_id", "request_id", "node_id", "quantity"]
        );
        assert_eq!(headers(dir.path().join("step_summaries.csv"))[0], "step");
        assert_eq!(headers(dir.path().join("step_summaries.csv")).len(), 12);
        assert_eq!(
            headers(dir.path().join("unserved.csv")),
            ["step", "request_id", "node_id", "quantity", "reason"]
        );
    }

    #[test]
    fn csv_rows_written() {
        let dir = tmp();
        let mut w = CsvReportWriter::new(dir.path()).unwrap();
        w.write_deliveries(&[DeliveryRow { step: 2, time: 12.5, vehicle: 1, request: 4, node: 3, quantity: 6 }])
            .unwrap();
        w.write_step_summary(&StepSummaryRow { step: 2, assigned: 3, ..StepSummaryRow::default() })
            .unwrap();
        w.write_unserved(&UnservedRow { step: 2, request: 5, node: 9, quantity: 1, reason: "no_path_found" })
            .unwrap();
        w.finish().unwrap();

        let d = rows(dir.path().join("deliveries.csv"));
        assert_eq!(d.len(), 1);
        assert_eq!(&d[0][1], "12.500");
        assert_eq!(&d[0][3], "4");
        let s = rows(dir.path().join("step_summaries.csv"));
        assert_eq!(&s[0][8], "3");
        let u = rows(dir.path().join("unserved.csv"));
        assert_eq!(&u[0][4], "no_path_found");
    }

    #[test]
    fn observer_reports_a_full_run() {
        let dir = tmp();
        let scenario = load_scenario_reader(Cursor::new(super::fixtures::SMALL_JSON)).unwrap();
        let mut engine = scenario.into_engine(EngineConfig::default()).unwrap();
        let mut obs = ReportObserver::new(CsvReportWriter::new(dir.path()).unwrap());
        let summary = engine.run(200, 10.0, &mut obs).unwrap();

        assert!(summary.completed);
        assert_eq!(summary.delivered, 2);
        assert!(obs.take_error().is_none());
        assert_eq!(obs.deliveries_written(), 2);
        assert_eq!(obs.summaries_written() as u64, summary.steps);

        let d = rows(dir.path().join("deliveries.csv"));
        assert_eq!(d.len(), 2);
        let delivered: u32 = d.iter().map(|r| r[5].parse::<u32>().unwrap()).sum();
        assert_eq!(delivered, 9);
        assert_eq!(rows(dir.path().join("step_summaries.csv")).len() as u64, summary.steps);
        assert!(rows(dir.path().join("unserved.csv")).is_empty());
    }

    /// Fails every write with a numbered message.
    struct FailingWriter {
        calls: usize,
    }

    impl ReportWriter for FailingWriter {
        fn write_deliveries(&mut self, _rows: &[DeliveryRow]) -> IoResult<()> {
            self.calls += 1;
            Err(IoError::Invalid(format!("call {}", self.calls)))
        }
        fn write_step_summary(&mut self, _row: &StepSummaryRow) -> IoResult<()> {
            self.calls += 1;
            Err(IoError::Invalid(format!("call {}", self.calls)))
        }
        fn write_unserved(&mut self, _row: &UnservedRow) -> IoResult<()> {
            self.calls += 1;
            Err(IoError::Invalid(format!("call {}", self.calls)))
        }
        fn finish(&mut self) -> IoResult<()> {
            Ok(())
        }
    }

    #[test]
    fn observer_keeps_first_error() {
        let mut obs = ReportObserver::new(FailingWriter { calls: 0 });
        let unserved = Unserved {
            request:  RequestId(0),
            node:     NodeId(1),
            quantity: 3,
            reason:   UnservedReason::NoPathFound,
        };
        obs.on_unserved(Step(0), &unserved);
        obs.on_delivery(
            &Delivery { vehicle: VehicleId(0), request: RequestId(1), node: NodeId(2), quantity: 1, offset: 0.5 },
            3.5,
        );
        obs.on_step_start(Step(1));

        match obs.take_error() {
            Some(IoError::Invalid(msg)) => assert_eq!(msg, "call 1"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(obs.take_error().is_none());
        assert_eq!(obs.into_writer().calls, 2);
    }
}

// ── Disruptions ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod disrupt {
    use rustc_hash::FxHashMap;

    use rr_core::{EdgeId, Step};
    use rr_engine::EngineObserver;
    use rr_graph::EdgeState;
    use rr_replan::EdgeEventQueue;

    use crate::RandomDisruptions;

    #[test]
    fn toggles_on_schedule() {
        let q = EdgeEventQueue::new(64);
        let edges: Vec<EdgeId> = (0..3).map(EdgeId).collect();
        let mut d = RandomDisruptions::new(q.sender(), edges, 5, 42);
        for s in 0..=20 {
            d.on_step_start(Step(s));
        }

        let steps: Vec<u64> = d.log().iter().map(|x| x.step.0).collect();
        assert_eq!(steps, vec![5, 10, 15, 20]);
        let events = q.drain();
        assert_eq!(events.len(), 4);

        // Each road alternates Down, Up, Down ...
        let mut last: FxHashMap<EdgeId, EdgeState> = FxHashMap::default();
        for e in &events {
            let expected = match last.get(&e.edge) {
                Some(EdgeState::Down) => EdgeState::Up,
                _ => EdgeState::Down,
            };
            assert_eq!(e.state, expected);
            last.insert(e.edge, e.state);
        }
        let down = last.values().filter(|s| **s == EdgeState::Down).count();
        assert_eq!(d.down_count(), down);
    }

    #[test]
    fn same_seed_same_disruptions() {
        let run = |seed| {
            let q = EdgeEventQueue::new(64);
            let mut d = RandomDisruptions::new(q.sender(), (0..10).map(EdgeId).collect(), 2, seed);
            for s in 0..20 {
                d.on_step_start(Step(s));
            }
            d.log().to_vec()
        };
        assert_eq!(run(9), run(9));
    }

    #[test]
    fn disabled_when_every_is_zero_or_no_edges() {
        let q = EdgeEventQueue::new(8);
        let mut off = RandomDisruptions::new(q.sender(), vec![EdgeId(0)], 0, 1);
        let mut empty = RandomDisruptions::new(q.sender(), Vec::new(), 1, 1);
        for s in 0..10 {
            off.on_step_start(Step(s));
            empty.on_step_start(Step(s));
        }
        assert!(off.log().is_empty());
        assert!(empty.log().is_empty());
        assert!(q.is_empty());
    }
}
