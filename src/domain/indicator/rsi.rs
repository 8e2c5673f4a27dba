//! RSI (Relative Strength Index) indicator.
//!
//! Average gain/loss are plain rolling means over the last `n` close-to-close
//! changes (no Wilder smoothing):
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / (avg_loss + 1e-10)))
//!
//! The epsilon keeps a loss-free window finite (RSI tends to 100).
//! Warmup: first n bars are invalid (need n price changes).

use crate::domain::indicator::{
    IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue, invalid_point,
};
use crate::domain::ohlcv::OhlcvBar;

pub const RSI_EPSILON: f64 = 1e-10;

pub fn calculate_rsi(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());

    if period == 0 || bars.len() < 2 {
        values.extend(bars.iter().map(invalid_point));
        return IndicatorSeries {
            indicator_type: IndicatorType::Rsi(period),
            values,
        };
    }

    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;

    values.push(invalid_point(&bars[0]));

    for i in 1..bars.len() {
        let (gain, loss) = split_change(bars[i].close - bars[i - 1].close);
        gain_sum += gain;
        loss_sum += loss;

        // Drop the change that fell out of the window.
        if i > period {
            let dropped = bars[i - period].close - bars[i - period - 1].close;
            let (old_gain, old_loss) = split_change(dropped);
            gain_sum -= old_gain;
            loss_sum -= old_loss;
        }

        if i < period {
            values.push(invalid_point(&bars[i]));
            continue;
        }

        let avg_gain = (gain_sum / period as f64).max(0.0);
        let avg_loss = (loss_sum / period as f64).max(0.0);
        let rs = avg_gain / (avg_loss + RSI_EPSILON);
        let rsi = 100.0 - (100.0 / (1.0 + rs));

        values.push(IndicatorPoint {
            timestamp: bars[i].timestamp,
            valid: true,
            value: IndicatorValue::Simple(rsi.clamp(0.0, 100.0)),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}

fn split_change(change: f64) -> (f64, f64) {
    if change > 0.0 {
        (change, 0.0)
    } else {
        (0.0, -change)
    }
}
