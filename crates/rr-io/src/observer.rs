//! `ReportObserver<W>` bridges `EngineObserver` to a `ReportWriter`.

use rr_core::Step;
use rr_engine::{EngineObserver, RunSummary, StepSummary};
use rr_fleet::{Delivery, Unserved};

use crate::row::{DeliveryRow, StepSummaryRow, UnservedRow};
use crate::writer::ReportWriter;
use crate::{IoError, IoResult};

/// An [`EngineObserver`] that writes deliveries, step summaries and unserved
/// requests to any [`ReportWriter`] backend.
///
/// Deliveries are buffered and written in one batch per step.  Errors from
/// the writer are stored internally because observer methods have no return
/// value; check them with [`take_error`][Self::take_error] after the run.
pub struct ReportObserver<W: ReportWriter> {
    writer:     W,
    step:       Step,
    pending:    Vec<DeliveryRow>,
    deliveries: usize,
    summaries:  usize,
    unserved:   usize,
    last_error: Option<IoError>,
}

impl<W: ReportWriter> ReportObserver<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            step:       Step::ZERO,
            pending:    Vec::new(),
            deliveries: 0,
            summaries:  0,
            unserved:   0,
            last_error: None,
        }
    }

    /// Take the stored write error (if any) after the run returns.
    pub fn take_error(&mut self) -> Option<IoError> {
        self.last_error.take()
    }

    /// Unwrap the inner writer (e.g. to inspect files after the run).
    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Delivery rows handed to the writer so far.
    pub fn deliveries_written(&self) -> usize {
        self.deliveries
    }

    /// Step summary rows handed to the writer so far.
    pub fn summaries_written(&self) -> usize {
        self.summaries
    }

    /// Unserved rows handed to the writer so far.
    pub fn unserved_written(&self) -> usize {
        self.unserved
    }

    fn flush_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let result = self.writer.write_deliveries(&self.pending);
        self.deliveries += self.pending.len();
        self.pending.clear();
        self.store_err(result);
    }

    fn store_err(&mut self, result: IoResult<()>) {
        if let Err(e) = result {
            // Keep only the first error.
            if self.last_error.is_none() {
                tracing::warn!(error = %e, "report write failed");
                self.last_error = Some(e);
            }
        }
    }
}

impl<W: ReportWriter> EngineObserver for ReportObserver<W> {
    fn on_step_start(&mut self, step: Step) {
        self.flush_pending();
        self.step = step;
    }

    fn on_step_end(&mut self, summary: &StepSummary) {
        let result = self.writer.write_step_summary(&StepSummaryRow::from(summary));
        self.summaries += 1;
        self.store_err(result);
    }

    fn on_unserved(&mut self, step: Step, unserved: &Unserved) {
        let result = self.writer.write_unserved(&UnservedRow::new(step, unserved));
        self.unserved += 1;
        self.store_err(result);
    }

    fn on_delivery(&mut self, delivery: &Delivery, time: f64) {
        self.pending.push(DeliveryRow::new(self.step, delivery, time));
    }

    fn on_run_end(&mut self, _summary: &RunSummary) {
        self.flush_pending();
        let result = self.writer.finish();
        self.store_err(result);
    }
}
