//! CSV file data adapter.
//!
//! One file per ticker and interval: `<dir>/<TICKER>.csv` for daily bars,
//! `<dir>/<TICKER>_1h.csv` for hourly bars. Header row
//! `date,open,high,low,close,volume`; dates are `YYYY-MM-DD` or
//! `YYYY-MM-DD HH:MM:SS`.

use crate::domain::error::MidasError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::{Interval, MarketDataPort};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn csv_path(&self, ticker: &str, interval: Interval) -> PathBuf {
        match interval {
            Interval::Daily => self.base_path.join(format!("{ticker}.csv")),
            Interval::Hourly => self.base_path.join(format!("{ticker}_{interval}.csv")),
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl MarketDataPort for CsvAdapter {
    fn fetch_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<OhlcvBar>, MidasError> {
        let path = self.csv_path(ticker, interval);
        let unavailable = |reason: String| MidasError::DataUnavailable {
            ticker: ticker.to_string(),
            reason,
        };

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| unavailable(format!("failed to read {}: {}", path.display(), e)))?;

        let mut bars = Vec::new();
        for (line, row) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = row.map_err(|e| unavailable(format!("CSV parse error: {e}")))?;
            let timestamp = parse_timestamp(&row.date).ok_or_else(|| {
                unavailable(format!("invalid date '{}' on row {}", row.date, line + 1))
            })?;

            let date = timestamp.date();
            if date < start || date > end {
                continue;
            }

            bars.push(OhlcvBar {
                ticker: ticker.to_string(),
                timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }
}
