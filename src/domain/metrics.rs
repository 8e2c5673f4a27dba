//! Performance statistics over the trade ledger and balance series.
//!
//! All P&L figures are in percent points of entry price, summed across
//! trades. A trade with zero P&L counts as a loser.

use serde::Serialize;
use std::collections::BTreeMap;

use super::position::Trade;

/// Floor for gross loss in the profit factor denominator.
const MIN_GROSS_LOSS: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total_trades: usize,
    pub winners: usize,
    pub losers: usize,
    /// Fraction of winners, 0.0 to 1.0.
    pub win_rate: f64,
    pub total_return: f64,
    pub avg_trade: f64,
    pub avg_win: f64,
    /// Mean P&L of losers (zero or negative).
    pub avg_loss: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: f64,
    pub max_drawdown: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_days_held: f64,
}

/// Trades grouped under one key (exit reason or sector).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown {
    pub key: String,
    pub count: usize,
    pub total_pnl: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Excellent,
    Strong,
    Acceptable,
    Weak,
    NeedsRevision,
}

impl Verdict {
    pub fn classify(metrics: &Metrics) -> Self {
        let wr = metrics.win_rate * 100.0;
        let pf = metrics.profit_factor;
        let dd = metrics.max_drawdown;

        if wr >= 70.0 && pf >= 3.0 && dd < 8.0 {
            Verdict::Excellent
        } else if wr >= 65.0 && pf >= 2.5 && dd < 10.0 {
            Verdict::Strong
        } else if wr >= 60.0 && pf >= 2.0 {
            Verdict::Acceptable
        } else if wr >= 55.0 && pf >= 1.5 {
            Verdict::Weak
        } else {
            Verdict::NeedsRevision
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Verdict::Excellent => "EXCELLENT: targets met (70%+ WR, 3.0+ PF, <8% DD)",
            Verdict::Strong => "STRONG: suitable for live use",
            Verdict::Acceptable => "ACCEPTABLE: use with care",
            Verdict::Weak => "WEAK: needs optimization",
            Verdict::NeedsRevision => "NEEDS REVISION: strategy should be reworked",
        }
    }
}

impl Metrics {
    pub fn compute(trades: &[Trade], balances: &[f64]) -> Self {
        let mut winners = 0usize;
        let mut losers = 0usize;
        let mut gross_profit = 0.0_f64;
        let mut loser_sum = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_days = 0u64;

        for trade in trades {
            let pnl = trade.pnl_pct;
            if trade.is_winner() {
                winners += 1;
                gross_profit += pnl;
                largest_win = largest_win.max(pnl);
            } else {
                losers += 1;
                loser_sum += pnl;
                largest_loss = largest_loss.min(pnl);
            }
            total_days += u64::from(trade.days_held);
        }

        let total_trades = trades.len();
        let total_return = gross_profit + loser_sum;
        let gross_loss = loser_sum.abs();

        let mean = |sum: f64, n: usize| if n > 0 { sum / n as f64 } else { 0.0 };

        Metrics {
            total_trades,
            winners,
            losers,
            win_rate: mean(winners as f64, total_trades),
            total_return,
            avg_trade: mean(total_return, total_trades),
            avg_win: mean(gross_profit, winners),
            avg_loss: mean(loser_sum, losers),
            gross_profit,
            gross_loss,
            profit_factor: gross_profit / gross_loss.max(MIN_GROSS_LOSS),
            max_drawdown: max_drawdown(balances),
            largest_win,
            largest_loss,
            avg_days_held: mean(total_days as f64, total_trades),
        }
    }
}

/// Largest fall from a running peak. The peak starts at zero, so a series
/// that only ever loses still reports its depth below zero.
pub fn max_drawdown(balances: &[f64]) -> f64 {
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;
    for &balance in balances {
        peak = peak.max(balance);
        max_dd = max_dd.max(peak - balance);
    }
    max_dd
}

fn breakdown_by<F>(trades: &[Trade], key: F) -> Vec<Breakdown>
where
    F: Fn(&Trade) -> String,
{
    let mut groups: BTreeMap<String, (usize, f64)> = BTreeMap::new();
    for trade in trades {
        let entry = groups.entry(key(trade)).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += trade.pnl_pct;
    }

    let mut rows: Vec<Breakdown> = groups
        .into_iter()
        .map(|(key, (count, total_pnl))| Breakdown {
            key,
            count,
            total_pnl,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.total_pnl
            .total_cmp(&a.total_pnl)
            .then_with(|| a.key.cmp(&b.key))
    });
    rows
}

pub fn breakdown_by_exit_reason(trades: &[Trade]) -> Vec<Breakdown> {
    breakdown_by(trades, |t| t.exit_reason.to_string())
}

pub fn breakdown_by_sector(trades: &[Trade]) -> Vec<Breakdown> {
    breakdown_by(trades, |t| t.sector.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::ExitReason;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn trade(ticker: &str, sector: &str, pnl_pct: f64, reason: ExitReason) -> Trade {
        Trade {
            ticker: ticker.to_string(),
            sector: sector.to_string(),
            entry_date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            exit_date: NaiveDate::from_ymd_opt(2024, 6, 7).unwrap(),
            entry_price: 100.0,
            exit_price: 100.0 + pnl_pct,
            pnl_pct,
            exit_reason: reason,
            days_held: 4,
            score: 75,
        }
    }

    fn sample_trades() -> Vec<Trade> {
        vec![
            trade("AKBNK.IS", "Bankacılık", 2.0, ExitReason::Tp1Tp2),
            trade("THYAO.IS", "Havacılık", -0.8, ExitReason::StopLoss),
            trade("GARAN.IS", "Bankacılık", 1.0, ExitReason::Tp1TimeStop),
            trade("ASELS.IS", "Savunma", 0.0, ExitReason::StopLoss),
        ]
    }

    #[test]
    fn counts_and_rates() {
        let m = Metrics::compute(&sample_trades(), &[0.0, 2.0, 1.2, 2.2, 2.2]);
        assert_eq!(m.total_trades, 4);
        assert_eq!(m.winners, 2);
        assert_eq!(m.losers, 2);
        assert!((m.win_rate - 0.5).abs() < 1e-12);
        assert!((m.total_return - 2.2).abs() < 1e-12);
        assert!((m.avg_trade - 0.55).abs() < 1e-12);
        assert!((m.avg_win - 1.5).abs() < 1e-12);
        assert!((m.avg_loss - (-0.4)).abs() < 1e-12);
        assert!((m.gross_profit - 3.0).abs() < 1e-12);
        assert!((m.gross_loss - 0.8).abs() < 1e-12);
        assert!((m.profit_factor - 3.75).abs() < 1e-12);
        assert!((m.max_drawdown - 0.8).abs() < 1e-12);
        assert!((m.largest_win - 2.0).abs() < 1e-12);
        assert!((m.largest_loss - (-0.8)).abs() < 1e-12);
        assert!((m.avg_days_held - 4.0).abs() < 1e-12);
    }

    #[test]
    fn no_trades_is_all_zero() {
        let m = Metrics::compute(&[], &[0.0]);
        assert_eq!(m.total_trades, 0);
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.avg_trade, 0.0);
        assert_eq!(m.profit_factor, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
    }

    #[test]
    fn profit_factor_floors_gross_loss() {
        let trades = vec![trade("A", "S", 1.0, ExitReason::Tp1Tp2)];
        let m = Metrics::compute(&trades, &[0.0, 1.0]);
        assert!((m.profit_factor - 100.0).abs() < 1e-9);
    }

    #[test]
    fn breakeven_trade_is_a_loser() {
        let trades = vec![trade("A", "S", 0.0, ExitReason::StopLoss)];
        let m = Metrics::compute(&trades, &[0.0, 0.0]);
        assert_eq!(m.winners, 0);
        assert_eq!(m.losers, 1);
    }

    #[test]
    fn drawdown_from_zero_seed() {
        assert_eq!(max_drawdown(&[]), 0.0);
        assert!((max_drawdown(&[0.0, -1.0, -3.0, -2.0]) - 3.0).abs() < 1e-12);
        assert!((max_drawdown(&[0.0, 5.0, 2.0, 6.0, 1.0, 4.0]) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn exit_reason_breakdown_sorted_by_pnl() {
        let rows = breakdown_by_exit_reason(&sample_trades());
        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["TP1+TP2", "TP1+10D", "STOP_LOSS"]);
        assert_eq!(rows[2].count, 2);
        assert!((rows[2].total_pnl - (-0.8)).abs() < 1e-12);
    }

    #[test]
    fn sector_breakdown_breaks_ties_by_key() {
        let trades = vec![
            trade("A", "Savunma", 1.0, ExitReason::TimeStop),
            trade("B", "Enerji", 1.0, ExitReason::TimeStop),
            trade("C", "Bankacılık", 3.0, ExitReason::Tp1Tp2),
        ];
        let rows = breakdown_by_sector(&trades);
        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["Bankacılık", "Enerji", "Savunma"]);
    }

    fn metrics_with(win_rate: f64, profit_factor: f64, max_drawdown: f64) -> Metrics {
        let mut m = Metrics::compute(&[], &[]);
        m.win_rate = win_rate;
        m.profit_factor = profit_factor;
        m.max_drawdown = max_drawdown;
        m
    }

    #[test]
    fn verdict_thresholds() {
        assert_eq!(Verdict::classify(&metrics_with(0.72, 3.1, 5.0)), Verdict::Excellent);
        assert_eq!(Verdict::classify(&metrics_with(0.72, 3.1, 9.0)), Verdict::Strong);
        assert_eq!(Verdict::classify(&metrics_with(0.66, 2.6, 12.0)), Verdict::Acceptable);
        assert_eq!(Verdict::classify(&metrics_with(0.60, 2.0, 30.0)), Verdict::Acceptable);
        assert_eq!(Verdict::classify(&metrics_with(0.56, 1.6, 0.0)), Verdict::Weak);
        assert_eq!(Verdict::classify(&metrics_with(0.80, 1.2, 0.0)), Verdict::NeedsRevision);
    }

    proptest! {
        #[test]
        fn drawdown_is_never_negative(balances in prop::collection::vec(-50.0f64..50.0, 0..60)) {
            prop_assert!(max_drawdown(&balances) >= 0.0);
        }

        #[test]
        fn rising_balance_has_no_drawdown(steps in prop::collection::vec(0.0f64..5.0, 0..60)) {
            let mut balances = vec![0.0];
            for step in steps {
                let last = balances[balances.len() - 1];
                balances.push(last + step);
            }
            prop_assert_eq!(max_drawdown(&balances), 0.0);
        }

        #[test]
        fn win_rate_in_unit_range(pnls in prop::collection::vec(-5.0f64..5.0, 0..40)) {
            let trades: Vec<Trade> = pnls
                .iter()
                .map(|&p| trade("T", "S", p, ExitReason::TimeStop))
                .collect();
            let m = Metrics::compute(&trades, &[]);
            prop_assert!((0.0..=1.0).contains(&m.win_rate));
            prop_assert_eq!(m.winners + m.losers, m.total_trades);
        }
    }
}
