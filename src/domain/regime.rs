//! Market regime gate on a benchmark index.

use crate::domain::indicator::ema::calculate_ema;
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_REGIME_EMA_PERIOD: usize = 20;

/// Decides whether new entries are allowed on the benchmark bar at `index`.
pub trait RegimeFilter {
    fn is_favorable(&self, benchmark: &[OhlcvBar], index: usize) -> bool;
}

/// Favorable while the benchmark closes at or above its EMA. Too little
/// history, or an index past the end, counts as favorable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmaTrendFilter {
    pub period: usize,
}

impl Default for EmaTrendFilter {
    fn default() -> Self {
        EmaTrendFilter {
            period: DEFAULT_REGIME_EMA_PERIOD,
        }
    }
}

impl RegimeFilter for EmaTrendFilter {
    fn is_favorable(&self, benchmark: &[OhlcvBar], index: usize) -> bool {
        if index >= benchmark.len() || index + 1 < self.period {
            return true;
        }
        let history = &benchmark[..=index];
        let ema = calculate_ema(history, self.period);
        match ema.simple_at(index) {
            Some(value) => history[index].close >= value,
            None => true,
        }
    }
}

/// Never blocks. Used when the regime filter is switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysFavorable;

impl RegimeFilter for AlwaysFavorable {
    fn is_favorable(&self, _benchmark: &[OhlcvBar], _index: usize) -> bool {
        true
    }
}
