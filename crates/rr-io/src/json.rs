//! JSON scenario files.
//!
//! # Format
//!
//! ```json
//! {
//!   "nodes":     [{ "id": 1, "demand": 12, "priority": 4, "x": 0.09, "y": 0.0 }],
//!   "edges":     [{ "u": 0, "v": 1, "cost": 23, "reliability": 0.91 }],
//!   "vehicles":  [{ "id": 1, "capacity": 40 }],
//!   "hospitals": [0, 49]
//! }
//! ```
//!
//! | Field                 | Notes                                                  |
//! |-----------------------|--------------------------------------------------------|
//! | `nodes[].priority`    | becomes the node severity; default 0                   |
//! | `nodes[].demand`      | submitted as a request on load; default 0              |
//! | `nodes[].population`  | optional, default 0                                    |
//! | `nodes[].x`, `.y`     | optional longitude / latitude, both or neither         |
//! | `edges[].cost`        | travel time                                            |
//! | `edges[].id`          | optional; defaults to the position in the list         |
//! | `hospitals`           | depots; defaults to `[0]`                              |

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use rr_core::{EdgeId, GeoPoint, NodeId, VehicleId};
use rr_graph::{EdgeSpec, NodeSpec};

use crate::{IoError, IoResult, Scenario};

// ── Records ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct ScenarioRecord {
    nodes:     Vec<NodeRecord>,
    #[serde(default)]
    edges:     Vec<EdgeRecord>,
    vehicles:  Vec<VehicleRecord>,
    #[serde(default = "default_hospitals")]
    hospitals: Vec<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeRecord {
    id:         u32,
    #[serde(default)]
    demand:     u32,
    #[serde(default)]
    priority:   f64,
    #[serde(default)]
    population: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    x:          Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    y:          Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EdgeRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    id:          Option<u32>,
    u:           u32,
    v:           u32,
    cost:        f64,
    reliability: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct VehicleRecord {
    id:       u32,
    capacity: u32,
}

fn default_hospitals() -> Vec<u32> {
    vec![0]
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Load a scenario from a JSON file.
pub fn load_scenario_json(path: &Path) -> IoResult<Scenario> {
    let file = File::open(path)?;
    load_scenario_reader(BufReader::new(file))
}

/// Load a scenario from any JSON reader.
///
/// The whole scenario is validated before it is returned: structural errors
/// give [`IoError::Json`], an unusable network gives [`IoError::Graph`] and
/// other inconsistencies give [`IoError::Invalid`].
pub fn load_scenario_reader<R: Read>(reader: R) -> IoResult<Scenario> {
    let record: ScenarioRecord = serde_json::from_reader(reader)?;

    let nodes = record
        .nodes
        .into_iter()
        .map(|n| {
            let pos = match (n.x, n.y) {
                (Some(x), Some(y)) => Some(GeoPoint::new(y, x)),
                (None, None) => None,
                _ => {
                    return Err(IoError::Invalid(format!("node {} has only one of x / y", n.id)));
                }
            };
            let mut spec = NodeSpec::new(NodeId(n.id))
                .severity(n.priority)
                .population(n.population)
                .demand(n.demand);
            spec.pos = pos;
            Ok(spec)
        })
        .collect::<IoResult<Vec<_>>>()?;

    let edges = record
        .edges
        .into_iter()
        .enumerate()
        .map(|(i, e)| {
            let id = match e.id {
                Some(id) => EdgeId(id),
                None => EdgeId::try_from(i)
                    .map_err(|_| IoError::Invalid(format!("edge index {i} overflows an edge id")))?,
            };
            Ok(EdgeSpec::new(id, NodeId(e.u), NodeId(e.v), e.cost, e.reliability))
        })
        .collect::<IoResult<Vec<_>>>()?;

    let scenario = Scenario {
        nodes,
        edges,
        vehicles: record.vehicles.iter().map(|v| (VehicleId(v.id), v.capacity)).collect(),
        depots:   record.hospitals.into_iter().map(NodeId).collect(),
    };
    scenario.validate()?;

    tracing::info!(
        nodes = scenario.nodes.len(),
        edges = scenario.edges.len(),
        vehicles = scenario.vehicles.len(),
        "scenario loaded"
    );
    Ok(scenario)
}

// ── Saving ────────────────────────────────────────────────────────────────────

/// Write `scenario` as pretty-printed JSON to a file.
pub fn save_scenario_json(scenario: &Scenario, path: &Path) -> IoResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_scenario_json(scenario, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write `scenario` as pretty-printed JSON.  Edge ids are always written so
/// that reloading preserves them.
pub fn write_scenario_json<W: Write>(scenario: &Scenario, writer: W) -> IoResult<()> {
    let record = ScenarioRecord {
        nodes: scenario
            .nodes
            .iter()
            .map(|n| NodeRecord {
                id:         n.id.0,
                demand:     n.demand,
                priority:   n.severity,
                population: n.population,
                x:          n.pos.map(|p| p.lon),
                y:          n.pos.map(|p| p.lat),
            })
            .collect(),
        edges: scenario
            .edges
            .iter()
            .map(|e| EdgeRecord {
                id:          Some(e.id.0),
                u:           e.u.0,
                v:           e.v.0,
                cost:        e.travel_time,
                reliability: e.reliability,
            })
            .collect(),
        vehicles: scenario
            .vehicles
            .iter()
            .map(|&(id, capacity)| VehicleRecord { id: id.0, capacity })
            .collect(),
        hospitals: scenario.depots.iter().map(|d| d.0).collect(),
    };
    serde_json::to_writer_pretty(writer, &record)?;
    Ok(())
}
