//! Bollinger Bands indicator.
//!
//! - Middle: rolling mean of closes over n bars
//! - Upper/Lower: middle ± width × population standard deviation (divides by N)
//!
//! Default parameters: period=20, width=2.0 (passed as 200 hundredths so the
//! type stays hashable). Warmup: first (period-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_bollinger(
    bars: &[OhlcvBar],
    period: usize,
    stddev_mult_x100: u32,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Bollinger {
        period,
        stddev_mult_x100,
    };
    let width = stddev_mult_x100 as f64 / 100.0;
    let warmup = period.saturating_sub(1);

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if period == 0 || i < warmup {
                return IndicatorPoint {
                    timestamp: bar.timestamp,
                    valid: false,
                    value: IndicatorValue::Bollinger {
                        upper: 0.0,
                        middle: 0.0,
                        lower: 0.0,
                    },
                };
            }

            let window = &bars[i + 1 - period..=i];
            let (middle, stddev) = mean_and_population_stddev(window);

            IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value: IndicatorValue::Bollinger {
                    upper: middle + width * stddev,
                    middle,
                    lower: middle - width * stddev,
                },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

fn mean_and_population_stddev(window: &[OhlcvBar]) -> (f64, f64) {
    let n = window.len() as f64;
    let mean = window.iter().map(|b| b.close).sum::<f64>() / n;
    let variance = window
        .iter()
        .map(|b| (b.close - mean).powi(2))
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}
