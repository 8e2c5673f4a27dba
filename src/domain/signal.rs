//! Entry signal scoring.
//!
//! A signal is scored additively from a snapshot of indicator values at the
//! evaluation bar. Rules are grouped; inside a group the first rule that
//! holds scores and the rest are skipped, so banded conditions (RSI zones,
//! Bollinger position, volume level) can never score twice.

use log::warn;
use serde::Serialize;

use crate::domain::indicator::{IndicatorParams, IndicatorSet};
use crate::domain::ohlcv::OhlcvBar;

/// Bars required before a signal is evaluated at all.
pub const MIN_HISTORY_BARS: usize = 50;
/// Signals scoring below this are discarded.
pub const MIN_SCORE: u32 = 60;

const VOLUME_LOOKBACK: usize = 20;
const SWING_LOOKBACK: usize = 5;

const SWING_STOP_BUFFER: f64 = 0.998;
const DEFAULT_STOP_FRACTION: f64 = 0.008;
const MIN_RISK_FRACTION: f64 = 0.005;
const MAX_RISK_FRACTION: f64 = 0.015;
const TP1_RISK_MULTIPLE: f64 = 1.5;
const TP2_RISK_MULTIPLE: f64 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub ticker: String,
    pub direction: Direction,
    pub score: u32,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
    pub risk_pct: f64,
    pub reward_pct: f64,
    pub risk_reward_ratio: f64,
    pub reasons: Vec<String>,
    pub sector: String,
}

/// Scalar inputs to the scoring rules, all taken at the evaluation bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    pub price: f64,
    pub prev_close: f64,
    pub rsi: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub vwap: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    pub volume: f64,
    pub avg_volume: f64,
}

impl IndicatorSnapshot {
    /// Snapshot of the last bar. `None` if any indicator is still warming up.
    /// VWAP is the exception: with no cumulative volume it is NaN, so the
    /// VWAP rule fails while the other rules still score.
    pub fn at_last(set: &IndicatorSet<'_>) -> Option<Self> {
        let bars = set.bars();
        if bars.len() < 2 {
            return None;
        }
        let i = bars.len() - 1;
        let (_, bb_middle, bb_lower) = set.bollinger().bands_at(i)?;

        let volume_window = &bars[bars.len().saturating_sub(VOLUME_LOOKBACK)..];
        let avg_volume =
            volume_window.iter().map(|b| b.volume).sum::<f64>() / volume_window.len() as f64;

        Some(IndicatorSnapshot {
            price: bars[i].close,
            prev_close: bars[i - 1].close,
            rsi: set.rsi().simple_at(i)?,
            ema_fast: set.ema_fast().simple_at(i)?,
            ema_slow: set.ema_slow().simple_at(i)?,
            vwap: set.vwap().simple_at(i).unwrap_or(f64::NAN),
            bb_middle,
            bb_lower,
            volume: bars[i].volume,
            avg_volume,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Condition {
    AboveVwap,
    RsiNeutral,
    RsiOversold,
    FastAboveSlow,
    AboveBollingerMiddle,
    AboveBollingerLower,
    VolumeSurge,
    VolumeAboveAverage,
    GreenBar,
    AboveFastEma,
}

impl Condition {
    fn holds(self, s: &IndicatorSnapshot) -> bool {
        match self {
            Condition::AboveVwap => s.price > s.vwap,
            Condition::RsiNeutral => (40.0..=60.0).contains(&s.rsi),
            Condition::RsiOversold => (30.0..40.0).contains(&s.rsi),
            Condition::FastAboveSlow => s.ema_fast > s.ema_slow,
            Condition::AboveBollingerMiddle => s.price > s.bb_middle,
            Condition::AboveBollingerLower => s.price > s.bb_lower,
            Condition::VolumeSurge => s.volume > s.avg_volume * 1.3,
            Condition::VolumeAboveAverage => s.volume > s.avg_volume,
            Condition::GreenBar => s.price > s.prev_close,
            Condition::AboveFastEma => s.price > s.ema_fast,
        }
    }

    fn reason(self, s: &IndicatorSnapshot) -> String {
        match self {
            Condition::AboveVwap => format!("VWAP üzeri ({:.2})", s.vwap),
            Condition::RsiNeutral => format!("RSI nötr ({:.0})", s.rsi),
            Condition::RsiOversold => format!("RSI düşük - fırsat ({:.0})", s.rsi),
            Condition::FastAboveSlow => "Kısa momentum yukarı".to_string(),
            Condition::AboveBollingerMiddle => "BB ortası üzeri".to_string(),
            Condition::AboveBollingerLower => "BB alt bandı üzeri".to_string(),
            Condition::VolumeSurge => "Hacim yüksek (+30%)".to_string(),
            Condition::VolumeAboveAverage => "Hacim normal".to_string(),
            Condition::GreenBar => "Son mum yeşil".to_string(),
            Condition::AboveFastEma => "EMA9 üzeri".to_string(),
        }
    }
}

struct ScoreRule {
    condition: Condition,
    points: u32,
}

const fn rule(condition: Condition, points: u32) -> ScoreRule {
    ScoreRule { condition, points }
}

const SCORE_GROUPS: &[&[ScoreRule]] = &[
    &[rule(Condition::AboveVwap, 20)],
    &[rule(Condition::RsiNeutral, 15), rule(Condition::RsiOversold, 20)],
    &[rule(Condition::FastAboveSlow, 20)],
    &[
        rule(Condition::AboveBollingerMiddle, 15),
        rule(Condition::AboveBollingerLower, 10),
    ],
    &[
        rule(Condition::VolumeSurge, 15),
        rule(Condition::VolumeAboveAverage, 8),
    ],
    &[rule(Condition::GreenBar, 10)],
    &[rule(Condition::AboveFastEma, 5)],
];

/// Upper bound of the score scale. The oversold RSI band can push the raw
/// sum to 105, which is capped here.
pub const MAX_SCORE: u32 = 100;

/// Total score and the reasons that contributed, in rule order.
pub fn score_snapshot(snapshot: &IndicatorSnapshot) -> (u32, Vec<String>) {
    let mut score = 0;
    let mut reasons = Vec::new();

    for group in SCORE_GROUPS {
        if let Some(hit) = group.iter().find(|r| r.condition.holds(snapshot)) {
            score += hit.points;
            reasons.push(hit.condition.reason(snapshot));
        }
    }

    (score.min(MAX_SCORE), reasons)
}

/// Stop and targets derived from the entry price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskLevels {
    pub stop_loss: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
    pub risk: f64,
}

/// Stop sits under the recent swing low or 0.8% below price, whichever is
/// tighter, then the risk is clamped into [0.5%, 1.5%] of price.
/// Returns `None` when the risk comes out non-positive or non-finite.
pub fn risk_levels(price: f64, swing_low: f64) -> Option<RiskLevels> {
    let mut stop_loss = (swing_low * SWING_STOP_BUFFER).max(price * (1.0 - DEFAULT_STOP_FRACTION));
    let mut risk = price - stop_loss;

    if risk / price < MIN_RISK_FRACTION {
        stop_loss = price * (1.0 - MIN_RISK_FRACTION);
        risk = price - stop_loss;
    }
    if risk / price > MAX_RISK_FRACTION {
        stop_loss = price * (1.0 - MAX_RISK_FRACTION);
        risk = price - stop_loss;
    }

    if !risk.is_finite() || risk <= 0.0 {
        return None;
    }

    Some(RiskLevels {
        stop_loss,
        take_profit_1: price + risk * TP1_RISK_MULTIPLE,
        take_profit_2: price + risk * TP2_RISK_MULTIPLE,
        risk,
    })
}

/// Evaluate the last bar of `bars`. The caller slices history so the last
/// bar is the evaluation bar.
pub fn generate_signal(ticker: &str, sector: &str, bars: &[OhlcvBar]) -> Option<Signal> {
    if bars.len() < MIN_HISTORY_BARS {
        return None;
    }

    let set = IndicatorSet::new(bars, IndicatorParams::default());
    let snapshot = IndicatorSnapshot::at_last(&set)?;

    let (score, reasons) = score_snapshot(&snapshot);
    if score < MIN_SCORE {
        return None;
    }

    let price = snapshot.price;
    let swing_low = bars[bars.len() - SWING_LOOKBACK..]
        .iter()
        .map(|b| b.low)
        .fold(f64::INFINITY, f64::min);

    let Some(levels) = risk_levels(price, swing_low) else {
        warn!(
            "{}: degenerate risk at price {:.2} (swing low {:.2}); signal skipped",
            ticker, price, swing_low
        );
        return None;
    };

    Some(Signal {
        ticker: ticker.to_string(),
        direction: Direction::Long,
        score,
        entry_price: price,
        stop_loss: levels.stop_loss,
        take_profit_1: levels.take_profit_1,
        take_profit_2: levels.take_profit_2,
        risk_pct: levels.risk / price * 100.0,
        reward_pct: (levels.take_profit_1 - price) / price * 100.0,
        risk_reward_ratio: (levels.take_profit_1 - price) / levels.risk,
        reasons,
        sector: sector.to_string(),
    })
}
