//! Day-by-day simulation driver.
//!
//! The calendar is the reference instrument's trading days. Each simulated
//! day runs: regime gate, position management, signal scan, sector
//! selection, entries, then one balance point.

use chrono::{Duration, NaiveDate};
use log::{debug, info};
use serde::Serialize;
use std::ops::Range;

use crate::domain::diversification::{SectorSelector, rank_candidates};
use crate::domain::error::MidasError;
use crate::domain::instrument::InstrumentData;
use crate::domain::portfolio::{BalancePoint, Portfolio};
use crate::domain::position::{Position, PositionUpdate, Trade};
use crate::domain::regime::RegimeFilter;
use crate::domain::signal::{Signal, generate_signal};
use crate::domain::universe::LoadedUniverse;

pub const DEFAULT_LOOKBACK_DAYS: i64 = 400;
pub const DEFAULT_TEST_DAYS: i64 = 90;
pub const DEFAULT_WARMUP_BARS: usize = 200;
pub const DEFAULT_MAX_POSITIONS: usize = 5;

const PROGRESS_EVERY: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    /// Last calendar day of the test window.
    pub end_date: NaiveDate,
    /// Calendar days of history fetched before `end_date`.
    pub lookback_days: i64,
    /// Calendar days simulated, counted back from `end_date`.
    pub test_days: i64,
    /// Reference bars that must precede the first simulated day.
    pub warmup_bars: usize,
    pub max_positions: usize,
}

impl BacktestConfig {
    pub fn new(end_date: NaiveDate) -> Self {
        BacktestConfig {
            end_date,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            test_days: DEFAULT_TEST_DAYS,
            warmup_bars: DEFAULT_WARMUP_BARS,
            max_positions: DEFAULT_MAX_POSITIONS,
        }
    }

    pub fn fetch_start(&self) -> NaiveDate {
        self.end_date - Duration::days(self.lookback_days)
    }

    pub fn test_start(&self) -> NaiveDate {
        self.end_date - Duration::days(self.test_days)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub balance_curve: Vec<BalancePoint>,
    pub blocked_days: usize,
    pub no_signal_days: usize,
    pub simulated_days: usize,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    /// Positions still open when the calendar ran out. They have no trade.
    pub open_at_end: usize,
}

impl BacktestResult {
    pub fn balances(&self) -> Vec<f64> {
        self.balance_curve.iter().map(|p| p.balance).collect()
    }
}

/// Calendar indices to simulate: from the first day on or after
/// `test_start`, but never before `warmup_bars`. `None` if that is empty.
pub fn simulation_window(
    calendar: &[NaiveDate],
    test_start: NaiveDate,
    warmup_bars: usize,
) -> Option<Range<usize>> {
    let first_in_window = calendar.iter().position(|d| *d >= test_start)?;
    let start = first_in_window.max(warmup_bars);
    (start < calendar.len()).then_some(start..calendar.len())
}

pub fn run_backtest(
    universe: &LoadedUniverse,
    benchmark: Option<&InstrumentData>,
    config: &BacktestConfig,
    regime: &dyn RegimeFilter,
    selector: &dyn SectorSelector,
) -> Result<BacktestResult, MidasError> {
    let reference = universe.reference().ok_or_else(|| MidasError::NoData {
        reason: "no instruments loaded".to_string(),
    })?;
    let calendar = reference.dates();

    let window = simulation_window(&calendar, config.test_start(), config.warmup_bars)
        .ok_or_else(|| MidasError::NoData {
            reason: format!(
                "{} has {} bars; none fall in the test window after {} warmup bars",
                reference.ticker,
                calendar.len(),
                config.warmup_bars
            ),
        })?;
    let days = &calendar[window];
    let total = days.len();

    info!(
        "Simulating {} days ({} to {}) over {} instruments",
        total,
        days[0],
        days[total - 1],
        universe.len()
    );

    let mut portfolio = Portfolio::new(config.max_positions);
    let mut blocked_days = 0;
    let mut no_signal_days = 0;

    for (offset, &date) in days.iter().enumerate() {
        if is_blocked(benchmark, regime, date) {
            debug!("{date}: regime unfavorable, no activity");
            blocked_days += 1;
        } else {
            manage_positions(&mut portfolio, universe, date);

            if !portfolio.is_full() {
                let candidates = scan_candidates(&portfolio, universe, date);
                if candidates.is_empty() {
                    no_signal_days += 1;
                } else {
                    open_positions(&mut portfolio, candidates, selector, date);
                }
            }
        }

        portfolio.record_balance(date);

        let progress = offset + 1;
        if progress % PROGRESS_EVERY == 0 || progress == total {
            info!("Processed {}/{} days", progress, total);
        }
    }

    Ok(BacktestResult {
        open_at_end: portfolio.position_count(),
        trades: portfolio.trades,
        balance_curve: portfolio.balance_curve,
        blocked_days,
        no_signal_days,
        simulated_days: total,
        first_day: days[0],
        last_day: days[total - 1],
    })
}

/// Missing benchmark data never blocks.
fn is_blocked(
    benchmark: Option<&InstrumentData>,
    regime: &dyn RegimeFilter,
    date: NaiveDate,
) -> bool {
    let Some(benchmark) = benchmark else {
        return false;
    };
    match benchmark.index_on_or_before(date) {
        Some(index) => !regime.is_favorable(&benchmark.bars, index),
        None => false,
    }
}

fn manage_positions(portfolio: &mut Portfolio, universe: &LoadedUniverse, date: NaiveDate) {
    for ticker in portfolio.open_tickers() {
        let Some(bar) = universe.get(&ticker).and_then(|i| i.bar_on(date)) else {
            continue;
        };
        let update = match portfolio.position_mut(&ticker) {
            Some(position) => position.advance(bar),
            None => continue,
        };
        match update {
            PositionUpdate::Closed(trade) => {
                debug!(
                    "{date}: closed {} ({}, {:+.2}%)",
                    trade.ticker, trade.exit_reason, trade.pnl_pct
                );
                portfolio.close_position(trade);
            }
            PositionUpdate::Tp1Hit => debug!("{date}: {ticker} reached TP1, stop at entry"),
            PositionUpdate::Held => {}
        }
    }
}

fn scan_candidates(
    portfolio: &Portfolio,
    universe: &LoadedUniverse,
    date: NaiveDate,
) -> Vec<Signal> {
    universe
        .instruments
        .iter()
        .filter(|inst| !portfolio.has_position(&inst.ticker))
        .filter_map(|inst| {
            let index = inst.index_on(date)?;
            generate_signal(&inst.ticker, &inst.sector, inst.history_through(index))
        })
        .collect()
}

fn open_positions(
    portfolio: &mut Portfolio,
    mut candidates: Vec<Signal>,
    selector: &dyn SectorSelector,
    date: NaiveDate,
) {
    rank_candidates(&mut candidates);
    let picks = {
        let open_sectors = portfolio.open_sectors();
        selector.select(&candidates, portfolio.free_slots(), &open_sectors)
    };
    for signal in picks {
        debug!(
            "{date}: open {} at {:.2} (score {}, {})",
            signal.ticker, signal.entry_price, signal.score, signal.sector
        );
        portfolio.add_position(Position::open(&signal, date));
    }
}
