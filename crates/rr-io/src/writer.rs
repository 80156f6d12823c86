//! The `ReportWriter` trait implemented by report backends.

use crate::{DeliveryRow, IoResult, StepSummaryRow, UnservedRow};

/// Sink for run reports.
///
/// Errors are returned to the caller; [`ReportObserver`](crate::ReportObserver)
/// stores them because observer callbacks cannot fail.
pub trait ReportWriter {
    /// Write a batch of deliveries.
    fn write_deliveries(&mut self, rows: &[DeliveryRow]) -> IoResult<()>;

    /// Write one step summary row.
    fn write_step_summary(&mut self, row: &StepSummaryRow) -> IoResult<()>;

    /// Write one unserved request.
    fn write_unserved(&mut self, row: &UnservedRow) -> IoResult<()>;

    /// Flush and close all underlying file handles.  Idempotent.
    fn finish(&mut self) -> IoResult<()>;
}
