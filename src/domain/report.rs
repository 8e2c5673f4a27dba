//! Structured backtest report: everything a renderer needs in one value.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::backtest::{BacktestConfig, BacktestResult};
use crate::domain::metrics::{
    Breakdown, Metrics, Verdict, breakdown_by_exit_reason, breakdown_by_sector,
};
use crate::domain::universe::LoadedUniverse;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub end_date: NaiveDate,
    pub test_start: NaiveDate,
    pub lookback_days: i64,
    pub test_days: i64,
    pub max_positions: usize,
    pub benchmark: Option<String>,
    pub regime_enabled: bool,
    pub max_per_sector: usize,
    pub loaded: Vec<String>,
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEntry {
    pub ticker: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub run: RunSummary,
    pub metrics: Metrics,
    pub verdict: Verdict,
    pub by_exit_reason: Vec<Breakdown>,
    pub by_sector: Vec<Breakdown>,
    pub result: BacktestResult,
}

/// Knobs that shaped the run but live outside `BacktestConfig`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    pub benchmark: Option<String>,
    pub regime_enabled: bool,
    pub max_per_sector: usize,
}

impl BacktestReport {
    pub fn build(
        universe: &LoadedUniverse,
        config: &BacktestConfig,
        context: RunContext,
        result: BacktestResult,
    ) -> Self {
        let metrics = Metrics::compute(&result.trades, &result.balances());
        let verdict = Verdict::classify(&metrics);

        let run = RunSummary {
            end_date: config.end_date,
            test_start: config.test_start(),
            lookback_days: config.lookback_days,
            test_days: config.test_days,
            max_positions: config.max_positions,
            benchmark: context.benchmark,
            regime_enabled: context.regime_enabled,
            max_per_sector: context.max_per_sector,
            loaded: universe.tickers().iter().map(|t| t.to_string()).collect(),
            skipped: universe
                .skipped
                .iter()
                .map(|s| SkippedEntry {
                    ticker: s.ticker.clone(),
                    reason: s.reason.to_string(),
                })
                .collect(),
        };

        BacktestReport {
            run,
            verdict,
            by_exit_reason: breakdown_by_exit_reason(&result.trades),
            by_sector: breakdown_by_sector(&result.trades),
            metrics,
            result,
        }
    }

    pub fn has_trades(&self) -> bool {
        !self.result.trades.is_empty()
    }
}
