//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters
//! - `IndicatorSeries`: A time series of indicator values, aligned with the bars
//! - `IndicatorSet`: The lazily computed indicators the signal generator reads

pub mod bollinger;
pub mod ema;
pub mod rsi;
pub mod vwap;

use chrono::NaiveDateTime;
use std::cell::OnceCell;
use std::fmt;

use crate::domain::ohlcv::OhlcvBar;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Bollinger { upper: f64, middle: f64, lower: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Ema(usize),
    Rsi(usize),
    Vwap,
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Scalar value at `index`, `None` while still warming up.
    pub fn simple_at(&self, index: usize) -> Option<f64> {
        match self.values.get(index)? {
            IndicatorPoint {
                valid: true,
                value: IndicatorValue::Simple(v),
                ..
            } => Some(*v),
            _ => None,
        }
    }

    /// Bands at `index` as (upper, middle, lower).
    pub fn bands_at(&self, index: usize) -> Option<(f64, f64, f64)> {
        match self.values.get(index)? {
            IndicatorPoint {
                valid: true,
                value:
                    IndicatorValue::Bollinger {
                        upper,
                        middle,
                        lower,
                    },
                ..
            } => Some((*upper, *middle, *lower)),
            _ => None,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Vwap => write!(f, "VWAP"),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}

pub(crate) fn invalid_point(bar: &OhlcvBar) -> IndicatorPoint {
    IndicatorPoint {
        timestamp: bar.timestamp,
        valid: false,
        value: IndicatorValue::Simple(0.0),
    }
}

/// Parameters for the indicators the signal generator consumes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub bollinger_period: usize,
    pub bollinger_mult_x100: u32,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        IndicatorParams {
            rsi_period: 14,
            ema_fast: 9,
            ema_slow: 21,
            bollinger_period: 20,
            bollinger_mult_x100: 200,
        }
    }
}

/// Derived series over one bar slice. Each series is computed on first
/// access and reused afterwards; none of them is ever mutated.
pub struct IndicatorSet<'a> {
    bars: &'a [OhlcvBar],
    params: IndicatorParams,
    rsi: OnceCell<IndicatorSeries>,
    ema_fast: OnceCell<IndicatorSeries>,
    ema_slow: OnceCell<IndicatorSeries>,
    vwap: OnceCell<IndicatorSeries>,
    bollinger: OnceCell<IndicatorSeries>,
}

impl<'a> IndicatorSet<'a> {
    pub fn new(bars: &'a [OhlcvBar], params: IndicatorParams) -> Self {
        Self {
            bars,
            params,
            rsi: OnceCell::new(),
            ema_fast: OnceCell::new(),
            ema_slow: OnceCell::new(),
            vwap: OnceCell::new(),
            bollinger: OnceCell::new(),
        }
    }

    pub fn bars(&self) -> &'a [OhlcvBar] {
        self.bars
    }

    pub fn rsi(&self) -> &IndicatorSeries {
        self.rsi
            .get_or_init(|| rsi::calculate_rsi(self.bars, self.params.rsi_period))
    }

    pub fn ema_fast(&self) -> &IndicatorSeries {
        self.ema_fast
            .get_or_init(|| ema::calculate_ema(self.bars, self.params.ema_fast))
    }

    pub fn ema_slow(&self) -> &IndicatorSeries {
        self.ema_slow
            .get_or_init(|| ema::calculate_ema(self.bars, self.params.ema_slow))
    }

    pub fn vwap(&self) -> &IndicatorSeries {
        self.vwap.get_or_init(|| vwap::calculate_vwap(self.bars))
    }

    pub fn bollinger(&self) -> &IndicatorSeries {
        self.bollinger.get_or_init(|| {
            bollinger::calculate_bollinger(
                self.bars,
                self.params.bollinger_period,
                self.params.bollinger_mult_x100,
            )
        })
    }
}
