//! Fluent builder for constructing an [`Engine`].

use rr_core::{EngineConfig, NodeId, VehicleId};
use rr_graph::{AStarRouter, RouteMode, Router};

use crate::{Engine, EngineError, EngineResult};

/// Fluent builder for [`Engine`].
///
/// # Inputs
///
/// | Method             | Default                                      |
/// |--------------------|----------------------------------------------|
/// | `.vehicle(id, c)`  | required: at least one vehicle               |
/// | `.depot(n)`        | required: at least one depot                 |
/// | `.config(c)`       | `EngineConfig::default()`                    |
/// | `.router(r)`       | `AStarRouter` over `config.cost`             |
/// | `.mode(m)`         | `RouteMode::Balanced`                        |
///
/// Vehicles start at the first depot.  The graph is supplied afterwards with
/// [`Engine::load_graph`], which may be called again to start a new run.
///
/// # Example
///
/// ```rust,ignore
/// let mut engine = EngineBuilder::new()
///     .vehicle(VehicleId(0), 40)
///     .vehicle(VehicleId(1), 45)
///     .depot(NodeId(0))
///     .build()?;
/// engine.load_graph(nodes, edges)?;
/// engine.run(500, 10.0, &mut NoopObserver)?;
/// ```
pub struct EngineBuilder {
    config: EngineConfig,
    mode:   RouteMode,
    fleet:  Vec<(VehicleId, u32)>,
    depots: Vec<NodeId>,
    router: Option<Box<dyn Router>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            mode:   RouteMode::default(),
            fleet:  Vec::new(),
            depots: Vec::new(),
            router: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Routing objective for allocation, replanning and plan costs.
    pub fn mode(mut self, mode: RouteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Add a vehicle with the given capacity.
    pub fn vehicle(mut self, id: VehicleId, capacity: u32) -> Self {
        self.fleet.push((id, capacity));
        self
    }

    /// Add several vehicles at once.
    pub fn fleet(mut self, fleet: impl IntoIterator<Item = (VehicleId, u32)>) -> Self {
        self.fleet.extend(fleet);
        self
    }

    /// Add a depot.  The first one is where the fleet starts.
    pub fn depot(mut self, node: NodeId) -> Self {
        self.depots.push(node);
        self
    }

    pub fn depots(mut self, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        self.depots.extend(nodes);
        self
    }

    /// Replace the default A* router.
    pub fn router<R: Router + 'static>(mut self, router: R) -> Self {
        self.router = Some(Box::new(router));
        self
    }

    /// Validate inputs and return an engine with an empty graph.
    pub fn build(self) -> EngineResult<Engine> {
        self.config.validate()?;

        if self.fleet.is_empty() {
            return Err(EngineError::Config("fleet must contain at least one vehicle".into()));
        }
        if let Some((id, _)) = self.fleet.iter().find(|(_, cap)| *cap == 0) {
            return Err(EngineError::Config(format!("vehicle {id} has zero capacity")));
        }
        let mut ids: Vec<VehicleId> = self.fleet.iter().map(|(id, _)| *id).collect();
        ids.sort_unstable();
        if let Some(w) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(EngineError::Config(format!("duplicate vehicle id {}", w[0])));
        }
        if self.depots.is_empty() {
            return Err(EngineError::Config("at least one depot is required".into()));
        }

        let router = self
            .router
            .unwrap_or_else(|| Box::new(AStarRouter::new(self.config.cost.clone())));

        Ok(Engine::new(self.config, self.mode, self.fleet, self.depots, router))
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
