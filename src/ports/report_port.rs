//! Report output port.

use std::path::Path;

use crate::domain::error::MidasError;
use crate::domain::report::BacktestReport;

/// Port for persisting a finished backtest report.
pub trait ReportPort {
    fn write(&self, report: &BacktestReport, output_path: &Path) -> Result<(), MidasError>;
}
