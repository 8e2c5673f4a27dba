#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use midas::cli::BacktestSettings;
use midas::domain::backtest::BacktestConfig;
use midas::domain::error::MidasError;
pub use midas::domain::ohlcv::OhlcvBar;
use midas::domain::retry::RetryPolicy;
use midas::domain::universe::SectorMap;
use midas::ports::data_port::{Interval, MarketDataPort};
use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Mutex;

/// In-memory data port. A ticker registered with `with_failures(n)` fails
/// its first `n` fetches with a transient error.
pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    failures: Mutex<HashMap<String, u32>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_failures(self, ticker: &str, count: u32) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(ticker.to_string(), count);
        self
    }

    pub fn calls(&self, ticker: &str) -> u32 {
        self.calls.lock().unwrap().get(ticker).copied().unwrap_or(0)
    }
}

impl MarketDataPort for MockDataPort {
    fn fetch_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        _interval: Interval,
    ) -> Result<Vec<OhlcvBar>, MidasError> {
        *self.calls.lock().unwrap().entry(ticker.to_string()).or_insert(0) += 1;

        if let Some(remaining) = self.failures.lock().unwrap().get_mut(ticker) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(MidasError::DataFetch {
                    ticker: ticker.to_string(),
                    reason: "connection reset".to_string(),
                });
            }
        }

        match self.data.get(ticker) {
            Some(bars) => Ok(bars
                .iter()
                .filter(|b| b.date() >= start && b.date() <= end)
                .cloned()
                .collect()),
            None => Err(MidasError::DataUnavailable {
                ticker: ticker.to_string(),
                reason: "unknown ticker".to_string(),
            }),
        }
    }
}

pub fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

pub fn day(offset: i64) -> NaiveDateTime {
    (start() + Duration::days(offset)).and_hms_opt(0, 0, 0).unwrap()
}

fn bar(ticker: &str, timestamp: NaiveDateTime, close: f64, spread: f64, volume: f64) -> OhlcvBar {
    OhlcvBar {
        ticker: ticker.to_string(),
        timestamp,
        open: close,
        high: close + spread,
        low: close - spread,
        close,
        volume,
    }
}

/// Daily series alternating +2.5 / -2.0. `phase` 1 shifts the pattern by one bar.
pub fn zigzag(ticker: &str, n: usize, phase: usize) -> Vec<OhlcvBar> {
    let mut close: f64 = 100.0;
    (0..n)
        .map(|i| {
            if i > 0 {
                close += if (i + phase) % 2 == 1 { 2.5 } else { -2.0 };
            }
            bar(ticker, day(i as i64), close, 0.5, 1000.0)
        })
        .collect()
}

/// Daily series falling by one point per bar.
pub fn falling(ticker: &str, n: usize) -> Vec<OhlcvBar> {
    (0..n)
        .map(|i| bar(ticker, day(i as i64), 500.0 - i as f64, 0.5, 1000.0))
        .collect()
}

/// Hourly zigzag alternating +1.25 / -1.0 from 2024-09-02 10:00. An even
/// `n` ends on an up bar; `last_volume` sets the final bar's volume.
pub fn hourly_zigzag(ticker: &str, n: usize, last_volume: f64) -> Vec<OhlcvBar> {
    let first = NaiveDate::from_ymd_opt(2024, 9, 2)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap();
    let mut close: f64 = 50.0;
    (0..n)
        .map(|i| {
            if i > 0 {
                close += if i % 2 == 1 { 1.25 } else { -1.0 };
            }
            let volume = if i == n - 1 { last_volume } else { 1000.0 };
            bar(ticker, first + Duration::hours(i as i64), close, 0.25, volume)
        })
        .collect()
}

/// Settings for a 260-day zigzag universe: 60 simulated days after 200
/// warmup bars, no pause between retries.
pub fn settings(tickers: &[(&str, &str)]) -> BacktestSettings {
    BacktestSettings {
        backtest: BacktestConfig {
            end_date: day(259).date(),
            lookback_days: 400,
            test_days: 60,
            warmup_bars: 200,
            max_positions: 5,
        },
        tickers: tickers.iter().map(|(t, _)| t.to_string()).collect(),
        sectors: SectorMap::from_pairs(tickers.iter().map(|(t, s)| (*t, *s))),
        benchmark: Some("XU100.IS".to_string()),
        regime_enabled: true,
        regime_period: 20,
        max_per_sector: 2,
        retry: RetryPolicy::new(3, std::time::Duration::ZERO),
    }
}

pub fn same_code(actual: ExitCode, expected: ExitCode) -> bool {
    format!("{actual:?}") == format!("{expected:?}")
}
