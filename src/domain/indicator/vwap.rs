//! Volume Weighted Average Price.
//!
//! VWAP[i] = sum(typical_price * volume) / sum(volume) over bars 0..=i.
//! One cumulative session over the whole slice; nothing resets it.
//! A point is invalid while cumulative volume is still zero.

use crate::domain::indicator::{
    IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue, invalid_point,
};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_vwap(bars: &[OhlcvBar]) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());
    let mut cum_pv = 0.0;
    let mut cum_volume = 0.0;

    for bar in bars {
        cum_pv += bar.typical_price() * bar.volume;
        cum_volume += bar.volume;

        if cum_volume > 0.0 {
            values.push(IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value: IndicatorValue::Simple(cum_pv / cum_volume),
            });
        } else {
            values.push(invalid_point(bar));
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Vwap,
        values,
    }
}
