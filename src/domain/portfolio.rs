//! Open positions, trade ledger and cumulative P&L series.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use super::position::{Position, Trade};

/// Cumulative realized P&L (percent points) after a simulated day.
/// The seed point carries no date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalancePoint {
    pub date: Option<NaiveDate>,
    pub balance: f64,
}

/// Positions are keyed by ticker, so there is at most one per instrument and
/// iteration runs in ticker order.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub max_positions: usize,
    pub positions: BTreeMap<String, Position>,
    pub trades: Vec<Trade>,
    pub balance_curve: Vec<BalancePoint>,
    realized: f64,
}

impl Portfolio {
    pub fn new(max_positions: usize) -> Self {
        Portfolio {
            max_positions,
            positions: BTreeMap::new(),
            trades: Vec::new(),
            balance_curve: vec![BalancePoint {
                date: None,
                balance: 0.0,
            }],
            realized: 0.0,
        }
    }

    /// Adds a position unless the ticker is already held or the portfolio is
    /// full. Returns whether it was added.
    pub fn add_position(&mut self, position: Position) -> bool {
        if self.is_full() || self.positions.contains_key(&position.ticker) {
            return false;
        }
        self.positions.insert(position.ticker.clone(), position);
        true
    }

    pub fn has_position(&self, ticker: &str) -> bool {
        self.positions.contains_key(ticker)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn free_slots(&self) -> usize {
        self.max_positions.saturating_sub(self.positions.len())
    }

    pub fn is_full(&self) -> bool {
        self.free_slots() == 0
    }

    /// Sectors of open positions, one entry per position.
    pub fn open_sectors(&self) -> Vec<&str> {
        self.positions.values().map(|p| p.sector.as_str()).collect()
    }

    pub fn open_tickers(&self) -> Vec<String> {
        self.positions.keys().cloned().collect()
    }

    pub fn position_mut(&mut self, ticker: &str) -> Option<&mut Position> {
        self.positions.get_mut(ticker)
    }

    /// Removes the position and appends its closing trade to the ledger.
    pub fn close_position(&mut self, trade: Trade) {
        self.positions.remove(&trade.ticker);
        self.realized += trade.pnl_pct;
        self.trades.push(trade);
    }

    pub fn record_balance(&mut self, date: NaiveDate) {
        self.balance_curve.push(BalancePoint {
            date: Some(date),
            balance: self.realized,
        });
    }

    pub fn balances(&self) -> Vec<f64> {
        self.balance_curve.iter().map(|p| p.balance).collect()
    }
}
