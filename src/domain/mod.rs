//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod signal;
pub mod regime;
pub mod diversification;
pub mod position;
pub mod portfolio;
pub mod instrument;
pub mod retry;
pub mod universe;
pub mod backtest;
pub mod metrics;
pub mod report;
pub mod scan;
pub mod config_validation;
pub mod error;
