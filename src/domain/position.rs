//! Open position lifecycle: partial take-profit, breakeven stop, time stop.
//!
//! A position moves OPEN → TP1 hit → closed. Each simulated day the driver
//! feeds the instrument's bar to [`Position::advance`], which checks the
//! exits in a fixed order: stop, first target, second target, time stop.

use chrono::NaiveDate;
use serde::Serialize;

use super::ohlcv::OhlcvBar;
use super::signal::Signal;

/// Days after which a still-open position is closed at the bar's close.
pub const TIME_STOP_DAYS: u32 = 10;

/// Fraction of the position realized at each target.
const PARTIAL_FRACTION: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ExitReason {
    #[serde(rename = "STOP_LOSS")]
    StopLoss,
    #[serde(rename = "TP1+TP2")]
    Tp1Tp2,
    #[serde(rename = "TP1+10D")]
    Tp1TimeStop,
    #[serde(rename = "10D")]
    TimeStop,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "STOP_LOSS",
            ExitReason::Tp1Tp2 => "TP1+TP2",
            ExitReason::Tp1TimeStop => "TP1+10D",
            ExitReason::TimeStop => "10D",
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub ticker: String,
    pub sector: String,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
    pub days_held: u32,
    pub tp1_hit: bool,
    pub pnl_accumulated: f64,
    pub score: u32,
}

/// Closed-trade record. `pnl_pct` is fixed at closure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub ticker: String,
    pub sector: String,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub pnl_pct: f64,
    pub exit_reason: ExitReason,
    pub days_held: u32,
    pub score: u32,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.pnl_pct > 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PositionUpdate {
    Held,
    Tp1Hit,
    Closed(Trade),
}

fn pct_move(from: f64, to: f64) -> f64 {
    (to - from) / from * 100.0
}

impl Position {
    pub fn open(signal: &Signal, entry_date: NaiveDate) -> Self {
        Position {
            ticker: signal.ticker.clone(),
            sector: signal.sector.clone(),
            entry_date,
            entry_price: signal.entry_price,
            stop_loss: signal.stop_loss,
            take_profit_1: signal.take_profit_1,
            take_profit_2: signal.take_profit_2,
            days_held: 0,
            tp1_hit: false,
            pnl_accumulated: 0.0,
            score: signal.score,
        }
    }

    /// Apply one day's bar. Counts the day, then evaluates exits in order.
    ///
    /// A stop hit after TP1 records `(stop - entry) / entry` for the whole
    /// position, which is zero once the stop sits at breakeven; the half
    /// already banked at TP1 is not added back.
    pub fn advance(&mut self, bar: &OhlcvBar) -> PositionUpdate {
        self.days_held += 1;
        let date = bar.date();

        if bar.low <= self.stop_loss {
            let pnl = pct_move(self.entry_price, self.stop_loss);
            return PositionUpdate::Closed(self.close(
                date,
                self.stop_loss,
                pnl,
                ExitReason::StopLoss,
            ));
        }

        if !self.tp1_hit && bar.high >= self.take_profit_1 {
            self.tp1_hit = true;
            self.pnl_accumulated =
                pct_move(self.entry_price, self.take_profit_1) * PARTIAL_FRACTION;
            self.stop_loss = self.entry_price;
            return PositionUpdate::Tp1Hit;
        }

        if self.tp1_hit && bar.high >= self.take_profit_2 {
            let pnl = self.pnl_accumulated
                + pct_move(self.entry_price, self.take_profit_2) * PARTIAL_FRACTION;
            return PositionUpdate::Closed(self.close(
                date,
                self.take_profit_2,
                pnl,
                ExitReason::Tp1Tp2,
            ));
        }

        if self.days_held >= TIME_STOP_DAYS {
            let (pnl, reason) = if self.tp1_hit {
                (
                    self.pnl_accumulated
                        + pct_move(self.entry_price, bar.close) * PARTIAL_FRACTION,
                    ExitReason::Tp1TimeStop,
                )
            } else {
                (pct_move(self.entry_price, bar.close), ExitReason::TimeStop)
            };
            return PositionUpdate::Closed(self.close(date, bar.close, pnl, reason));
        }

        PositionUpdate::Held
    }

    fn close(
        &self,
        exit_date: NaiveDate,
        exit_price: f64,
        pnl_pct: f64,
        reason: ExitReason,
    ) -> Trade {
        Trade {
            ticker: self.ticker.clone(),
            sector: self.sector.clone(),
            entry_date: self.entry_date,
            exit_date,
            entry_price: self.entry_price,
            exit_price,
            pnl_pct,
            exit_reason: reason,
            days_held: self.days_held,
            score: self.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_position() -> Position {
        Position {
            ticker: "AKBNK.IS".into(),
            sector: "Bankacılık".into(),
            entry_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            entry_price: 100.0,
            stop_loss: 99.0,
            take_profit_1: 101.5,
            take_profit_2: 102.5,
            days_held: 0,
            tp1_hit: false,
            pnl_accumulated: 0.0,
            score: 80,
        }
    }

    fn bar(day: u32, high: f64, low: f64, close: f64) -> OhlcvBar {
        OhlcvBar {
            ticker: "AKBNK.IS".into(),
            timestamp: NaiveDate::from_ymd_opt(2024, 3, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    fn closed(update: PositionUpdate) -> Trade {
        match update {
            PositionUpdate::Closed(trade) => trade,
            other => panic!("expected Closed, got {other:?}"),
        }
    }

    #[test]
    fn quiet_day_is_held() {
        let mut pos = sample_position();
        assert_eq!(pos.advance(&bar(2, 100.5, 99.5, 100.2)), PositionUpdate::Held);
        assert_eq!(pos.days_held, 1);
    }

    #[test]
    fn stop_loss_closes_full_position() {
        let mut pos = sample_position();
        let trade = closed(pos.advance(&bar(2, 100.5, 98.5, 99.0)));
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert_relative_eq!(trade.pnl_pct, -1.0, epsilon = 1e-9);
        assert_relative_eq!(trade.exit_price, 99.0);
        assert_eq!(trade.days_held, 1);
        assert_eq!(trade.exit_date, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }

    #[test]
    fn stop_is_checked_before_target() {
        // Wide bar touching both stop and TP1: stop wins.
        let mut pos = sample_position();
        let trade = closed(pos.advance(&bar(2, 103.0, 98.0, 100.0)));
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
    }

    #[test]
    fn tp1_banks_half_and_moves_stop_to_entry() {
        let mut pos = sample_position();
        assert_eq!(pos.advance(&bar(2, 101.6, 99.5, 101.0)), PositionUpdate::Tp1Hit);
        assert!(pos.tp1_hit);
        assert_relative_eq!(pos.stop_loss, 100.0);
        assert_relative_eq!(pos.pnl_accumulated, 0.75, epsilon = 1e-9);
    }

    #[test]
    fn tp1_and_tp2_on_same_bar_takes_only_tp1() {
        let mut pos = sample_position();
        assert_eq!(pos.advance(&bar(2, 103.0, 99.5, 102.8)), PositionUpdate::Tp1Hit);
        let trade = closed(pos.advance(&bar(3, 103.0, 100.5, 102.8)));
        assert_eq!(trade.exit_reason, ExitReason::Tp1Tp2);
        assert_relative_eq!(trade.pnl_pct, 0.75 + 1.25, epsilon = 1e-9);
        assert_relative_eq!(trade.exit_price, 102.5);
        assert_eq!(trade.days_held, 2);
    }

    #[test]
    fn breakeven_stop_after_tp1_records_zero() {
        let mut pos = sample_position();
        pos.advance(&bar(2, 101.6, 99.5, 101.0));
        let trade = closed(pos.advance(&bar(3, 101.0, 99.9, 100.0)));
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert_relative_eq!(trade.pnl_pct, 0.0);
    }

    #[test]
    fn time_stop_without_tp1() {
        let mut pos = sample_position();
        for day in 2..11 {
            assert_eq!(pos.advance(&bar(day, 100.5, 99.5, 100.0)), PositionUpdate::Held);
        }
        let trade = closed(pos.advance(&bar(11, 100.8, 99.8, 100.4)));
        assert_eq!(trade.exit_reason, ExitReason::TimeStop);
        assert_eq!(trade.days_held, TIME_STOP_DAYS);
        assert_relative_eq!(trade.pnl_pct, 0.4, epsilon = 1e-9);
        assert_relative_eq!(trade.exit_price, 100.4);
    }

    #[test]
    fn time_stop_after_tp1_adds_half_at_close() {
        let mut pos = sample_position();
        pos.advance(&bar(2, 101.6, 99.5, 101.0));
        for day in 3..11 {
            assert_eq!(pos.advance(&bar(day, 101.0, 100.5, 100.8)), PositionUpdate::Held);
        }
        let trade = closed(pos.advance(&bar(11, 101.0, 100.5, 101.0)));
        assert_eq!(trade.exit_reason, ExitReason::Tp1TimeStop);
        assert_relative_eq!(trade.pnl_pct, 0.75 + 0.5, epsilon = 1e-9);
    }

    #[test]
    fn stop_never_drops_below_entry_after_tp1() {
        let mut pos = sample_position();
        pos.advance(&bar(2, 101.6, 99.5, 101.0));
        for day in 3..8 {
            pos.advance(&bar(day, 101.2, 100.2, 100.9));
            assert!(pos.stop_loss >= pos.entry_price);
        }
    }

    #[test]
    fn open_copies_signal_levels() {
        let signal = Signal {
            ticker: "THYAO.IS".into(),
            direction: crate::domain::signal::Direction::Long,
            score: 75,
            entry_price: 250.0,
            stop_loss: 248.0,
            take_profit_1: 253.0,
            take_profit_2: 255.0,
            risk_pct: 0.8,
            reward_pct: 1.2,
            risk_reward_ratio: 1.5,
            reasons: vec![],
            sector: "Havacılık".into(),
        };
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let pos = Position::open(&signal, date);
        assert_eq!(pos.ticker, "THYAO.IS");
        assert_eq!(pos.sector, "Havacılık");
        assert_eq!(pos.entry_date, date);
        assert_eq!(pos.days_held, 0);
        assert!(!pos.tp1_hit);
        assert_eq!(pos.score, 75);
    }

    #[test]
    fn exit_reason_labels() {
        assert_eq!(ExitReason::StopLoss.to_string(), "STOP_LOSS");
        assert_eq!(ExitReason::Tp1Tp2.to_string(), "TP1+TP2");
        assert_eq!(ExitReason::Tp1TimeStop.to_string(), "TP1+10D");
        assert_eq!(ExitReason::TimeStop.to_string(), "10D");
        assert_eq!(
            serde_json::to_string(&ExitReason::Tp1Tp2).unwrap(),
            "\"TP1+TP2\""
        );
    }
}
