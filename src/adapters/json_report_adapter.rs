//! JSON report adapter implementing ReportPort.

use std::fs;
use std::path::Path;

use log::info;

use crate::domain::error::MidasError;
use crate::domain::report::BacktestReport;
use crate::ports::report_port::ReportPort;

pub struct JsonReportAdapter {
    pretty: bool,
}

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    pub fn compact() -> Self {
        Self { pretty: false }
    }

    pub fn render(&self, report: &BacktestReport) -> Result<String, MidasError> {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(report)
        } else {
            serde_json::to_string(report)
        };
        rendered.map_err(|e| MidasError::Report {
            reason: format!("failed to serialize report: {e}"),
        })
    }
}

impl Default for JsonReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, report: &BacktestReport, output_path: &Path) -> Result<(), MidasError> {
        let json = self.render(report)?;
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(output_path, json)?;
        info!("Report written to {}", output_path.display());
        Ok(())
    }
}
