//! Scenario container and random scenario generation.

use rustc_hash::FxHashSet;

use rr_core::{EdgeId, EngineConfig, GeoPoint, NodeId, SimRng, VehicleId};
use rr_engine::{Engine, EngineBuilder};
use rr_graph::{EdgeSpec, Graph, NodeSpec};

use crate::{IoError, IoResult};

// ── Scenario ──────────────────────────────────────────────────────────────────

/// Everything needed to start a run: the road network, the fleet and the
/// depots.  Node demand is submitted as requests when the graph is loaded.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scenario {
    pub nodes:    Vec<NodeSpec>,
    pub edges:    Vec<EdgeSpec>,
    pub vehicles: Vec<(VehicleId, u32)>,
    pub depots:   Vec<NodeId>,
}

impl Scenario {
    /// Sum of node demand over the whole network.
    pub fn total_demand(&self) -> u64 {
        self.nodes.iter().map(|n| u64::from(n.demand)).sum()
    }

    /// Sum of vehicle capacities.
    pub fn fleet_capacity(&self) -> u64 {
        self.vehicles.iter().map(|&(_, c)| u64::from(c)).sum()
    }

    /// Check the scenario as a whole: the graph must ingest cleanly and the
    /// fleet and depots must be usable.
    pub fn validate(&self) -> IoResult<()> {
        if self.vehicles.is_empty() {
            return Err(IoError::Invalid("scenario has no vehicles".into()));
        }
        if self.depots.is_empty() {
            return Err(IoError::Invalid("scenario has no depots".into()));
        }
        let graph = Graph::from_specs(self.nodes.clone(), self.edges.clone())?;
        if graph.is_empty() {
            return Err(IoError::Invalid("scenario has no nodes".into()));
        }
        if let Some(d) = self.depots.iter().find(|&&d| !graph.contains_node(d)) {
            return Err(IoError::Invalid(format!("depot {d} is not a node")));
        }
        Ok(())
    }

    /// An [`EngineBuilder`] preloaded with this scenario's fleet and depots.
    pub fn builder(&self) -> EngineBuilder {
        EngineBuilder::new()
            .fleet(self.vehicles.iter().copied())
            .depots(self.depots.iter().copied())
    }

    /// Build an engine with `config` and load the network into it.
    pub fn into_engine(self, config: EngineConfig) -> IoResult<Engine> {
        let mut engine = self.builder().config(config).build()?;
        engine.load_graph(self.nodes, self.edges)?;
        Ok(engine)
    }
}

// ── Generator ─────────────────────────────────────────────────────────────────

/// Source of synthetic scenarios.  Implementations draw all randomness from
/// the supplied `rng` so a seed fully determines the result.
pub trait ScenarioGenerator {
    fn generate(&self, rng: &mut SimRng) -> Scenario;
}

const PRIORITIES:       [u32; 5] = [1, 2, 3, 4, 5];
const PRIORITY_WEIGHTS: [u32; 5] = [1, 2, 4, 6, 10];

/// Grid-scattered disaster area with a guaranteed-connected road network.
///
/// | Field                 | Default                          |
/// |-----------------------|----------------------------------|
/// | `nodes`               | 50 (two depots: first and last)  |
/// | `grid_width`          | 7 columns                        |
/// | `spacing` / `jitter`  | 0.09° / ±0.04°                   |
/// | `demand`              | 4..=18 per non-depot node        |
/// | `tree_cost`           | 10..=50, reliability 0.80..=0.99 |
/// | `extra_edge_attempts` | 200                              |
/// | `extra_cost`          | 10..=60, reliability 0.70..=0.98 |
/// | `vehicles`            | capacities 40, 45, 42            |
///
/// Non-depot severities are drawn from 1..=5 weighted towards 5.  A random
/// spanning tree keeps every node reachable; extra edges are accepted with
/// probability `0.7 / (grid distance + 1)` so most of them join neighbours.
#[derive(Clone, Debug)]
pub struct RandomScenario {
    pub nodes:               u32,
    pub grid_width:          u32,
    pub spacing:             f64,
    pub jitter:              f64,
    pub demand:              (u32, u32),
    pub tree_cost:           (u32, u32),
    pub tree_reliability:    (f64, f64),
    pub extra_edge_attempts: usize,
    pub extra_cost:          (u32, u32),
    pub extra_reliability:   (f64, f64),
    pub vehicles:            Vec<(VehicleId, u32)>,
}

impl Default for RandomScenario {
    fn default() -> Self {
        Self {
            nodes:               50,
            grid_width:          7,
            spacing:             0.09,
            jitter:              0.04,
            demand:              (4, 18),
            tree_cost:           (10, 50),
            tree_reliability:    (0.80, 0.99),
            extra_edge_attempts: 200,
            extra_cost:          (10, 60),
            extra_reliability:   (0.70, 0.98),
            vehicles:            vec![(VehicleId(1), 40), (VehicleId(2), 45), (VehicleId(3), 42)],
        }
    }
}

impl RandomScenario {
    pub fn with_nodes(mut self, nodes: u32) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_vehicles(mut self, vehicles: impl IntoIterator<Item = (VehicleId, u32)>) -> Self {
        self.vehicles = vehicles.into_iter().collect();
        self
    }

    fn grid_distance(&self, a: u32, b: u32) -> u32 {
        let w = self.grid_width.max(1);
        (a % w).abs_diff(b % w) + (a / w).abs_diff(b / w)
    }
}

impl ScenarioGenerator for RandomScenario {
    fn generate(&self, rng: &mut SimRng) -> Scenario {
        let n = self.nodes.max(2);
        let w = self.grid_width.max(1);
        let depots = vec![NodeId(0), NodeId(n - 1)];

        let nodes: Vec<NodeSpec> = (0..n)
            .map(|i| {
                let x = f64::from(i % w) * self.spacing + rng.gen_range(-self.jitter..=self.jitter);
                let y = f64::from(i / w) * self.spacing + rng.gen_range(-self.jitter..=self.jitter);
                let spec = NodeSpec::new(NodeId(i)).at(GeoPoint::new(y, x));
                if depots.contains(&NodeId(i)) {
                    return spec;
                }
                let demand = rng.gen_range(self.demand.0..=self.demand.1);
                let priority = rng.choose_weighted(&PRIORITIES, &PRIORITY_WEIGHTS).copied().unwrap_or(1);
                spec.demand(demand).severity(f64::from(priority))
            })
            .collect();

        let mut pairs: FxHashSet<(u32, u32)> = FxHashSet::default();
        let mut edges: Vec<EdgeSpec> = Vec::new();
        let mut push = |edges: &mut Vec<EdgeSpec>, a: u32, b: u32, cost: u32, rel: f64| {
            if pairs.insert((a.min(b), a.max(b))) {
                let id = EdgeId(edges.len() as u32);
                edges.push(EdgeSpec::new(id, NodeId(a.min(b)), NodeId(a.max(b)), f64::from(cost), rel));
            }
        };

        // Spanning tree: each node hangs off a random earlier one.
        for i in 1..n {
            let parent = rng.gen_range(0..i);
            let cost = rng.gen_range(self.tree_cost.0..=self.tree_cost.1);
            let rel = round2(rng.gen_range(self.tree_reliability.0..=self.tree_reliability.1));
            push(&mut edges, i, parent, cost, rel);
        }

        for _ in 0..self.extra_edge_attempts {
            let u = rng.gen_range(0..n);
            let v = rng.gen_range(0..n);
            if u == v {
                continue;
            }
            let accept = 0.7 / f64::from(self.grid_distance(u, v) + 1);
            if rng.random::<f64>() < accept {
                let cost = rng.gen_range(self.extra_cost.0..=self.extra_cost.1);
                let rel = round2(rng.gen_range(self.extra_reliability.0..=self.extra_reliability.1));
                push(&mut edges, u, v, cost, rel);
            }
        }

        tracing::debug!(nodes = nodes.len(), edges = edges.len(), "random scenario generated");
        Scenario { nodes, edges, vehicles: self.vehicles.clone(), depots }
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
