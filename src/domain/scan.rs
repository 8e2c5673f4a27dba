//! Latest-bar scan across a universe, ranked by score.

use log::debug;

use crate::domain::diversification::rank_candidates;
use crate::domain::instrument::InstrumentData;
use crate::domain::signal::{Signal, generate_signal};

/// Instruments with fewer bars are not evaluated.
pub const SCAN_MIN_BARS: usize = 20;
pub const DEFAULT_TOP_N: usize = 5;
/// Calendar days of intraday history fetched for a scan.
pub const DEFAULT_SCAN_LOOKBACK_DAYS: i64 = 5;

/// Evaluates each instrument's most recent bar and returns the best
/// `top_n` signals, score descending then ticker ascending.
pub fn scan(instruments: &[InstrumentData], top_n: usize) -> Vec<Signal> {
    let mut signals: Vec<Signal> = instruments
        .iter()
        .filter(|inst| inst.bar_count() >= SCAN_MIN_BARS)
        .filter_map(|inst| {
            let signal = generate_signal(&inst.ticker, &inst.sector, &inst.bars);
            if let Some(s) = &signal {
                debug!("{}: score {}, R:R {:.2}", s.ticker, s.score, s.risk_reward_ratio);
            }
            signal
        })
        .collect();

    rank_candidates(&mut signals);
    signals.truncate(top_n);
    signals
}
