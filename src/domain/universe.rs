//! Instrument universe: ticker lists, sector mapping and concurrent loading.
//!
//! Every ticker is fetched on the rayon pool with its own bounded retry.
//! Failures exclude the ticker and are logged; only an empty result is an
//! error. Loaded instruments keep the configured order.

use crate::domain::error::MidasError;
use crate::domain::instrument::InstrumentData;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::retry::RetryPolicy;
use crate::ports::data_port::{Interval, MarketDataPort};
use chrono::NaiveDate;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};

/// Sector assigned to tickers missing from the sector map.
pub const DEFAULT_SECTOR: &str = "Diğer";

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

/// Comma-separated ticker list, trimmed and uppercased. Rejects empty
/// tokens and duplicates.
pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if !seen.insert(code.clone()) {
            return Err(UniverseError::DuplicateTicker(code));
        }
        codes.push(code);
    }

    Ok(codes)
}

/// Ticker → sector name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectorMap {
    sectors: BTreeMap<String, String>,
}

impl SectorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut map = SectorMap::new();
        for (ticker, sector) in pairs {
            map.insert(ticker.as_ref(), sector);
        }
        map
    }

    pub fn insert(&mut self, ticker: &str, sector: impl Into<String>) {
        self.sectors
            .insert(ticker.trim().to_uppercase(), sector.into());
    }

    pub fn sector_of(&self, ticker: &str) -> &str {
        self.sectors
            .get(ticker)
            .map(String::as_str)
            .unwrap_or(DEFAULT_SECTOR)
    }

    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }
}

/// What to fetch for each ticker and how hard to try.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub interval: Interval,
    pub min_bars: usize,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    FetchFailed { attempts: u32, reason: String },
    InsufficientBars { bars: usize, minimum: usize },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::FetchFailed { attempts, reason } => {
                write!(f, "fetch failed after {attempts} attempts: {reason}")
            }
            SkipReason::InsufficientBars { bars, minimum } => {
                write!(f, "only {bars} bars, minimum {minimum} required")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTicker {
    pub ticker: String,
    pub reason: SkipReason,
}

/// Immutable snapshot of everything that loaded.
#[derive(Debug, Clone)]
pub struct LoadedUniverse {
    pub instruments: Vec<InstrumentData>,
    pub skipped: Vec<SkippedTicker>,
}

impl LoadedUniverse {
    /// The first loaded instrument. Its dates drive the simulation calendar.
    pub fn reference(&self) -> Option<&InstrumentData> {
        self.instruments.first()
    }

    pub fn get(&self, ticker: &str) -> Option<&InstrumentData> {
        self.instruments.iter().find(|i| i.ticker == ticker)
    }

    pub fn tickers(&self) -> Vec<&str> {
        self.instruments.iter().map(|i| i.ticker.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

/// Fetch one ticker with retry and check it has enough bars.
pub fn fetch_instrument(
    port: &dyn MarketDataPort,
    ticker: &str,
    request: &FetchRequest,
) -> Result<Vec<OhlcvBar>, SkipReason> {
    let mut bars = request
        .retry
        .run(ticker, || {
            port.fetch_history(ticker, request.start, request.end, request.interval)
        })
        .map_err(|e| SkipReason::FetchFailed {
            attempts: request.retry.max_attempts.max(1),
            reason: e.to_string(),
        })?;

    if bars.len() < request.min_bars {
        return Err(SkipReason::InsufficientBars {
            bars: bars.len(),
            minimum: request.min_bars,
        });
    }

    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

/// Load all `tickers` concurrently. Fails with [`MidasError::NoData`] only
/// when nothing loads.
pub fn load_universe(
    port: &dyn MarketDataPort,
    tickers: &[String],
    sectors: &SectorMap,
    request: &FetchRequest,
) -> Result<LoadedUniverse, MidasError> {
    info!(
        "Fetching {} tickers ({} bars, {} to {})",
        tickers.len(),
        request.interval,
        request.start,
        request.end
    );

    let outcomes: Vec<Result<InstrumentData, SkippedTicker>> = tickers
        .par_iter()
        .map(|ticker| {
            fetch_instrument(port, ticker, request)
                .map(|bars| {
                    InstrumentData::new(
                        ticker.clone(),
                        sectors.sector_of(ticker).to_string(),
                        bars,
                    )
                })
                .map_err(|reason| SkippedTicker {
                    ticker: ticker.clone(),
                    reason,
                })
        })
        .collect();

    let mut instruments = Vec::new();
    let mut skipped = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(data) => {
                debug!("  {}: {} bars [OK]", data.ticker, data.bar_count());
                instruments.push(data);
            }
            Err(skip) => {
                warn!("Skipping {} ({})", skip.ticker, skip.reason);
                skipped.push(skip);
            }
        }
    }

    if instruments.is_empty() {
        return Err(MidasError::NoData {
            reason: format!("none of the {} tickers could be loaded", tickers.len()),
        });
    }

    info!(
        "Loaded {} of {} tickers",
        instruments.len(),
        instruments.len() + skipped.len()
    );

    Ok(LoadedUniverse {
        instruments,
        skipped,
    })
}

/// Benchmark series, or `None` when it cannot be loaded. A missing
/// benchmark never fails the run.
pub fn load_benchmark(
    port: &dyn MarketDataPort,
    ticker: &str,
    request: &FetchRequest,
) -> Option<InstrumentData> {
    let request = FetchRequest {
        min_bars: 1,
        ..request.clone()
    };
    match fetch_instrument(port, ticker, &request) {
        Ok(bars) => {
            info!("Benchmark {}: {} bars", ticker, bars.len());
            Some(InstrumentData::new(
                ticker.to_string(),
                DEFAULT_SECTOR.to_string(),
                bars,
            ))
        }
        Err(reason) => {
            warn!("Benchmark {} unavailable ({}); regime filter disabled", ticker, reason);
            None
        }
    }
}
