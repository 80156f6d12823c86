//! CSV report backend.
//!
//! Creates three files in the configured output directory:
//! - `deliveries.csv`
//! - `step_summaries.csv`
//! - `unserved.csv`

use std::fs::File;
use std::path::Path;

use csv::Writer;

use crate::writer::ReportWriter;
use crate::{DeliveryRow, IoResult, StepSummaryRow, UnservedRow};

/// Writes run reports to three CSV files.
pub struct CsvReportWriter {
    deliveries: Writer<File>,
    summaries:  Writer<File>,
    unserved:   Writer<File>,
    finished:   bool,
}

impl CsvReportWriter {
    /// Open (or create) the CSV files in `dir` and write the header rows.
    pub fn new(dir: &Path) -> IoResult<Self> {
        let mut deliveries = Writer::from_path(dir.join("deliveries.csv"))?;
        deliveries.write_record(["step", "time", "vehicle_id", "request_id", "node_id", "quantity"])?;

        let mut summaries = Writer::from_path(dir.join("step_summaries.csv"))?;
        summaries.write_record([
            "step",
            "events",
            "changes",
            "retried",
            "replanned",
            "stale",
            "handed_back",
            "reclaimed",
            "assigned",
            "unserved",
            "reordered",
            "homing",
        ])?;

        let mut unserved = Writer::from_path(dir.join("unserved.csv"))?;
        unserved.write_record(["step", "request_id", "node_id", "quantity", "reason"])?;

        Ok(Self { deliveries, summaries, unserved, finished: false })
    }
}

impl ReportWriter for CsvReportWriter {
    fn write_deliveries(&mut self, rows: &[DeliveryRow]) -> IoResult<()> {
        for row in rows {
            self.deliveries.write_record(&[
                row.step.to_string(),
                format!("{:.3}", row.time),
                row.vehicle.to_string(),
                row.request.to_string(),
                row.node.to_string(),
                row.quantity.to_string(),
            ])?;
        }
        Ok(())
    }

    fn write_step_summary(&mut self, row: &StepSummaryRow) -> IoResult<()> {
        self.summaries.write_record(&[
            row.step.to_string(),
            row.events.to_string(),
            row.changes.to_string(),
            row.retried.to_string(),
            row.replanned.to_string(),
            row.stale.to_string(),
            row.handed_back.to_string(),
            row.reclaimed.to_string(),
            row.assigned.to_string(),
            row.unserved.to_string(),
            row.reordered.to_string(),
            row.homing.to_string(),
        ])?;
        Ok(())
    }

    fn write_unserved(&mut self, row: &UnservedRow) -> IoResult<()> {
        self.unserved.write_record(&[
            row.step.to_string(),
            row.request.to_string(),
            row.node.to_string(),
            row.quantity.to_string(),
            row.reason.to_string(),
        ])?;
        Ok(())
    }

    fn finish(&mut self) -> IoResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.deliveries.flush()?;
        self.summaries.flush()?;
        self.unserved.flush()?;
        Ok(())
    }
}
