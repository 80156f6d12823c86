//! `rr-io` — scenario input and run reports for the `relief_router` engine.
//!
//! | Module       | Contents                                                     |
//! |--------------|--------------------------------------------------------------|
//! | [`scenario`] | `Scenario`, `ScenarioGenerator`, `RandomScenario`            |
//! | [`json`]     | load / save scenarios in the `data.json` format              |
//! | [`csv`]      | `CsvReportWriter` (`deliveries.csv`, `step_summaries.csv`, `unserved.csv`) |
//! | [`observer`] | `ReportObserver`, drives any [`ReportWriter`] from a run     |
//! | [`disrupt`]  | `RandomDisruptions`, seeded road damage and repair           |
//!
//! # Usage
//!
//! ```rust,ignore
//! use rr_io::{CsvReportWriter, RandomScenario, ReportObserver, ScenarioGenerator};
//!
//! let scenario = RandomScenario::default().generate(&mut SimRng::new(42));
//! let mut engine = scenario.into_engine(EngineConfig::default())?;
//! let mut obs = ReportObserver::new(CsvReportWriter::new(Path::new("./output"))?);
//! engine.run(1_000, 15.0, &mut obs)?;
//! obs.take_error().map(|e| eprintln!("report error: {e}"));
//! ```

pub mod csv;
pub mod disrupt;
pub mod error;
pub mod json;
pub mod observer;
pub mod row;
pub mod scenario;
pub mod writer;

#[cfg(test)]
mod tests;

pub use self::csv::CsvReportWriter;
pub use disrupt::{Disruption, RandomDisruptions};
pub use error::{IoError, IoResult};
pub use json::{load_scenario_json, load_scenario_reader, save_scenario_json, write_scenario_json};
pub use observer::ReportObserver;
pub use row::{DeliveryRow, StepSummaryRow, UnservedRow};
pub use scenario::{RandomScenario, Scenario, ScenarioGenerator};
pub use writer::ReportWriter;
