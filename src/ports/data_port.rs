//! Market data access port.

use std::fmt;

use crate::domain::error::MidasError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

/// Bar interval requested from a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    Daily,
    Hourly,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Daily => "1d",
            Interval::Hourly => "1h",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of historical bars. Implementations make one attempt per call;
/// retrying is the caller's business. Transient failures are reported as
/// [`MidasError::DataFetch`].
pub trait MarketDataPort: Sync {
    /// Bars for `ticker` dated within `[start, end]`, oldest first.
    fn fetch_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<OhlcvBar>, MidasError>;
}
