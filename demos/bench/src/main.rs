//! bench — routing and end-to-end timing on random road networks.
//!
//! For each network size the bench times a batch of point-to-point searches
//! with both routers, then a full engine run with a small fleet.
//!
//! ```text
//! cargo run -p bench --profile fast
//! cargo run -p bench --profile fast -- 20000 160000   # one custom size
//! ```

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};

use rr_core::{EdgeId, EngineConfig, GeoPoint, NodeId, SimRng, VehicleId};
use rr_engine::NoopObserver;
use rr_graph::{AStarRouter, DijkstraRouter, EdgeSpec, Graph, NodeSpec, RouteMode, Router};
use rr_io::{Scenario, ScenarioGenerator};

// ── Constants ─────────────────────────────────────────────────────────────────

const SEED:        u64 = 42;
const QUERIES:     usize = 200;
const MAX_STEPS:   u64 = 10_000;
const STEP_LENGTH: f64 = 15.0;

/// `(nodes, edge attempts)` per run.
const SIZES: [(u32, usize); 6] = [
    (50, 200),
    (200, 1_000),
    (500, 3_000),
    (1_000, 8_000),
    (2_000, 16_000),
    (5_000, 40_000),
];

// ── Generator ─────────────────────────────────────────────────────────────────

/// Unstructured random network: a random spanning tree plus up to
/// `edge_attempts` random extra roads.  Node positions are scattered over a
/// unit square so the A* bound has something to work with.
struct SparseNetwork {
    nodes:         u32,
    edge_attempts: usize,
}

impl ScenarioGenerator for SparseNetwork {
    fn generate(&self, rng: &mut SimRng) -> Scenario {
        let n = self.nodes.max(2);
        let nodes: Vec<NodeSpec> = (0..n)
            .map(|i| {
                let at = GeoPoint::new(rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0));
                let spec = NodeSpec::new(NodeId(i)).at(at);
                if i == 0 {
                    return spec;
                }
                let demand = rng.gen_range(0..=5);
                let spec = spec.severity(f64::from(rng.gen_range(1..=5_u32)));
                if demand > 0 { spec.demand(demand) } else { spec }
            })
            .collect();

        let mut edges: Vec<EdgeSpec> = Vec::with_capacity(n as usize + self.edge_attempts);
        let road = |edges: &mut Vec<EdgeSpec>, rng: &mut SimRng, u: u32, v: u32| {
            let id = EdgeId(edges.len() as u32);
            let cost = f64::from(rng.gen_range(5..=50_u32));
            let rel = (rng.gen_range(0.6..=1.0) * 100.0_f64).round() / 100.0;
            edges.push(EdgeSpec::new(id, NodeId(u), NodeId(v), cost, rel));
        };
        for i in 1..n {
            let parent = rng.gen_range(0..i);
            road(&mut edges, rng, i, parent);
        }
        for _ in 0..self.edge_attempts {
            let (u, v) = (rng.gen_range(0..n), rng.gen_range(0..n));
            if u != v {
                road(&mut edges, rng, u, v);
            }
        }

        Scenario {
            nodes,
            edges,
            vehicles: vec![(VehicleId(1), 10), (VehicleId(2), 12)],
            depots:   vec![NodeId(0)],
        }
    }
}

// ── Timing ────────────────────────────────────────────────────────────────────

/// Time `QUERIES` random searches.  Returns the total time and how many
/// found a path.
fn time_queries(router: &dyn Router, graph: &Graph, pairs: &[(NodeId, NodeId)]) -> (Duration, usize) {
    let t0 = Instant::now();
    let found = pairs
        .iter()
        .filter(|&&(a, b)| router.route(graph, a, b, RouteMode::Balanced).is_ok())
        .count();
    (t0.elapsed(), found)
}

struct Row {
    nodes:     usize,
    edges:     usize,
    dijkstra:  Duration,
    astar:     Duration,
    found:     usize,
    run:       Duration,
    steps:     u64,
    delivered: usize,
    settled:   bool,
}

fn bench_size(nodes: u32, edge_attempts: usize) -> Result<Row> {
    let mut rng = SimRng::new(SEED);
    let scenario = SparseNetwork { nodes, edge_attempts }.generate(&mut rng);
    let config = EngineConfig { seed: SEED, ..EngineConfig::default() };

    let graph = Graph::from_specs(scenario.nodes.clone(), scenario.edges.clone())
        .with_context(|| format!("building a {nodes}-node network"))?;
    let n = graph.node_count() as u32;
    let pairs: Vec<(NodeId, NodeId)> =
        (0..QUERIES).map(|_| (NodeId(rng.gen_range(0..n)), NodeId(rng.gen_range(0..n)))).collect();

    let (dijkstra, found) = time_queries(&DijkstraRouter::new(config.cost.clone()), &graph, &pairs);
    let (astar, found_astar) = time_queries(&AStarRouter::new(config.cost.clone()), &graph, &pairs);
    if found != found_astar {
        bail!("routers disagree on reachability: dijkstra {found}, a* {found_astar}");
    }

    let mut engine = scenario.into_engine(config)?;
    let t0 = Instant::now();
    let summary = engine.run(MAX_STEPS, STEP_LENGTH, &mut NoopObserver)?;
    let run = t0.elapsed();
    tracing::info!(nodes, steps = summary.steps, delivered = summary.delivered, "size finished");

    Ok(Row {
        nodes: graph.node_count(),
        edges: graph.edge_count(),
        dijkstra,
        astar,
        found,
        run,
        steps: summary.steps,
        delivered: summary.delivered,
        settled: summary.completed,
    })
}

fn per_query_us(total: Duration) -> f64 {
    total.as_secs_f64() * 1e6 / QUERIES as f64
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let sizes: Vec<(u32, usize)> = match args.as_slice() {
        [] => SIZES.to_vec(),
        [nodes, edges] => vec![(
            nodes.parse().with_context(|| format!("node count {nodes:?}"))?,
            edges.parse().with_context(|| format!("edge count {edges:?}"))?,
        )],
        _ => bail!("usage: bench [NODES EDGE_ATTEMPTS]"),
    };

    println!("=== bench — relief_router scalability ===");
    println!(
        "{:<7} {:<7} {:>12} {:>12} {:>7} {:>10} {:>7} {:>10} {:<8}",
        "Nodes", "Edges", "Dijkstra us", "A* us", "Found", "Run (s)", "Steps", "Delivered", "Status",
    );
    println!("{}", "-".repeat(90));

    for (nodes, edge_attempts) in sizes {
        let row = bench_size(nodes, edge_attempts)?;
        println!(
            "{:<7} {:<7} {:>12.1} {:>12.1} {:>7} {:>10.3} {:>7} {:>10} {:<8}",
            row.nodes,
            row.edges,
            per_query_us(row.dijkstra),
            per_query_us(row.astar),
            row.found,
            row.run.as_secs_f64(),
            row.steps,
            row.delivered,
            if row.settled { "settled" } else { "limit" },
        );
    }

    Ok(())
}
