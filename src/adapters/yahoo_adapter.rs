//! Yahoo Finance data adapter.
//!
//! Fetches bars from Yahoo's v8 chart API with a blocking client. One HTTP
//! request per call; retrying is left to the universe loader. Yahoo has no
//! official API and may change the response format without notice.

use crate::domain::error::MidasError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::{Interval, MarketDataPort};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::time::Duration;

const BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

pub struct YahooAdapter {
    client: reqwest::blocking::Client,
}

impl YahooAdapter {
    pub fn new() -> Result<Self, MidasError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| MidasError::DataFetch {
                ticker: "*".to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    fn chart_url(ticker: &str, start: NaiveDate, end: NaiveDate, interval: Interval) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end
            .succ_opt()
            .unwrap_or(end)
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp();
        format!("{BASE_URL}/{ticker}?period1={start_ts}&period2={end_ts}&interval={interval}")
    }
}

/// Bars from a chart response. Rows with any missing price are dropped
/// (holidays and halted sessions come back as nulls). Daily bars are
/// stamped at midnight of their UTC date.
fn parse_response(
    ticker: &str,
    interval: Interval,
    resp: ChartResponse,
) -> Result<Vec<OhlcvBar>, MidasError> {
    let unavailable = |reason: String| MidasError::DataUnavailable {
        ticker: ticker.to_string(),
        reason,
    };

    let result = match (resp.chart.result, resp.chart.error) {
        (_, Some(err)) => return Err(unavailable(format!("{}: {}", err.code, err.description))),
        (Some(result), None) => result,
        (None, None) => return Err(unavailable("empty result with no error".into())),
    };

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| unavailable("result array is empty".into()))?;
    let timestamps = data.timestamp.unwrap_or_default();
    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| unavailable("no quote data".into()))?;

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let at = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
        let (Some(open), Some(high), Some(low), Some(close)) =
            (at(&quote.open), at(&quote.high), at(&quote.low), at(&quote.close))
        else {
            continue;
        };

        let stamp = DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| unavailable(format!("invalid timestamp: {ts}")))?;
        let timestamp: NaiveDateTime = match interval {
            Interval::Daily => stamp.date().and_time(chrono::NaiveTime::MIN),
            Interval::Hourly => stamp,
        };

        bars.push(OhlcvBar {
            ticker: ticker.to_string(),
            timestamp,
            open,
            high,
            low,
            close,
            volume: at(&quote.volume).unwrap_or(0.0),
        });
    }

    Ok(bars)
}

impl MarketDataPort for YahooAdapter {
    fn fetch_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<OhlcvBar>, MidasError> {
        let url = Self::chart_url(ticker, start, end, interval);
        let transient = |reason: String| MidasError::DataFetch {
            ticker: ticker.to_string(),
            reason,
        };

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| transient(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(transient(format!("HTTP {status}")));
        }

        let chart: ChartResponse = resp
            .json()
            .map_err(|e| transient(format!("failed to parse response: {e}")))?;

        let mut bars = parse_response(ticker, interval, chart)?;
        bars.retain(|b| b.date() >= start && b.date() <= end);
        Ok(bars)
    }
}
