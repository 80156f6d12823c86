//! relief50 — 50-node disaster relief run for the relief_router engine.
//!
//! Generates (or loads) a scenario with two depots and three vehicles, then
//! steps the engine while roads are randomly damaged and repaired.  Reports
//! are written to `output/relief50/`.
//!
//! ```text
//! cargo run -p relief50                 # generated scenario, seed 42
//! cargo run -p relief50 -- data.json    # scenario from file
//! ```

mod logging;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};

use rr_core::{EngineConfig, SimRng, Step};
use rr_engine::{EngineObserver, RunSummary, StepSummary};
use rr_fleet::{Delivery, Unserved};
use rr_io::{
    CsvReportWriter, RandomDisruptions, RandomScenario, ReportObserver, ScenarioGenerator,
    load_scenario_json, save_scenario_json,
};

// ── Constants ─────────────────────────────────────────────────────────────────

const SEED:           u64  = 42;
const MAX_STEPS:      u64  = 1_000;
const STEP_DURATION:  f64  = 15.0;
const DISRUPT_EVERY:  u64  = 50;
const OUTPUT_DIR:     &str = "output/relief50";

// ── Observer wrapper ──────────────────────────────────────────────────────────

/// Fans callbacks out to the report writer and the disruption driver, and
/// tallies replanning activity for the final report.
struct DemoObserver {
    report:    ReportObserver<CsvReportWriter>,
    disrupt:   RandomDisruptions,
    replanned: usize,
    stale:     usize,
}

impl EngineObserver for DemoObserver {
    fn on_step_start(&mut self, step: Step) {
        self.disrupt.on_step_start(step);
        self.report.on_step_start(step);
    }

    fn on_step_end(&mut self, summary: &StepSummary) {
        self.replanned += summary.replanned;
        self.stale += summary.stale;
        self.report.on_step_end(summary);
    }

    fn on_unserved(&mut self, step: Step, unserved: &Unserved) {
        self.report.on_unserved(step, unserved);
    }

    fn on_delivery(&mut self, delivery: &Delivery, time: f64) {
        self.report.on_delivery(delivery, time);
    }

    fn on_run_end(&mut self, summary: &RunSummary) {
        self.report.on_run_end(summary);
    }
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    logging::init();

    println!("=== relief50 — relief_router fleet routing ===");
    let output = Path::new(OUTPUT_DIR);
    std::fs::create_dir_all(output).with_context(|| format!("creating {OUTPUT_DIR}"))?;

    // 1. Scenario: from the command line or generated.
    let scenario = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => {
            println!("Scenario: {}", path.display());
            load_scenario_json(&path).with_context(|| format!("loading {}", path.display()))?
        }
        None => {
            println!("Scenario: generated, seed {SEED}");
            let scenario = RandomScenario::default().generate(&mut SimRng::new(SEED));
            save_scenario_json(&scenario, &output.join("data.json"))?;
            scenario
        }
    };
    println!(
        "  {} nodes, {} roads, {} vehicles (capacity {}), total demand {}",
        scenario.nodes.len(),
        scenario.edges.len(),
        scenario.vehicles.len(),
        scenario.fleet_capacity(),
        scenario.total_demand(),
    );
    println!();

    // 2. Engine.
    let config = EngineConfig { seed: SEED, ..EngineConfig::default() };
    let mut engine = scenario.into_engine(config)?;
    tracing::info!(seed = SEED, max_steps = MAX_STEPS, dt = STEP_DURATION, "engine ready");

    // 3. Observers.
    let roads = engine.graph().edge_ids().collect();
    let mut obs = DemoObserver {
        report:    ReportObserver::new(CsvReportWriter::new(output)?),
        disrupt:   RandomDisruptions::new(engine.event_sender(), roads, DISRUPT_EVERY, SEED),
        replanned: 0,
        stale:     0,
    };

    // 4. Run.
    let t0 = Instant::now();
    let summary = engine.run(MAX_STEPS, STEP_DURATION, &mut obs)?;
    let elapsed = t0.elapsed();

    if let Some(e) = obs.report.take_error() {
        eprintln!("report error: {e}");
    }

    // 5. Final report.
    println!("Run finished in {:.3} s", elapsed.as_secs_f64());
    println!(
        "  steps {}  |  simulated time {:.1}  |  {}",
        summary.steps,
        summary.elapsed,
        if summary.completed { "settled" } else { "step limit reached" },
    );
    println!(
        "  delivered {} requests ({} units), unserved {}, outstanding {}",
        summary.delivered, summary.delivered_quantity, summary.unserved, summary.outstanding,
    );
    println!(
        "  road events {}, replans {}, stale discards {}, superseded reports {}",
        obs.disrupt.log().len(),
        obs.replanned,
        obs.stale,
        engine.dropped_events(),
    );
    println!(
        "  total mission time {:.1}  |  total idle time {:.1}",
        summary.total_travel_time, summary.total_idle_time,
    );
    println!(
        "  roads driven {}  |  average road reliability {:.3}",
        summary.edges_travelled, summary.avg_reliability,
    );
    println!(
        "  deliveries.csv {} rows, step_summaries.csv {} rows, unserved.csv {} rows",
        obs.report.deliveries_written(),
        obs.report.summaries_written(),
        obs.report.unserved_written(),
    );
    println!();

    println!(
        "{:<8} {:<9} {:<10} {:<6} {:<11} {:<10} {:<6} {:<9}",
        "Vehicle", "Capacity", "Delivered", "Node", "State", "Travel", "Roads", "Avg rel",
    );
    println!("{}", "-".repeat(74));
    for v in engine.vehicles() {
        let log = v.mission();
        println!(
            "{:<8} {:<9} {:<10} {:<6} {:<11} {:<10.1} {:<6} {:<9.3}",
            v.id().0,
            v.capacity(),
            v.delivered(),
            v.node().0,
            v.state().as_str(),
            log.travel_time,
            log.edges,
            log.average_reliability().unwrap_or(0.0),
        );
    }
    println!();
    for v in engine.vehicles() {
        let route: Vec<String> = v.mission().route.iter().map(|n| n.0.to_string()).collect();
        println!("  vehicle {} route: {}", v.id().0, route.join(" -> "));
    }

    Ok(())
}
