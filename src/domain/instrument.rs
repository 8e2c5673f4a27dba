//! One loaded instrument: its bars plus a date lookup.

use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct InstrumentData {
    pub ticker: String,
    pub sector: String,
    pub bars: Vec<OhlcvBar>,
    date_index: HashMap<NaiveDate, usize>,
}

impl InstrumentData {
    /// Bars must be sorted oldest first. With intraday bars the index points
    /// at the last bar of each day.
    pub fn new(ticker: String, sector: String, bars: Vec<OhlcvBar>) -> Self {
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date(), i))
            .collect();
        Self {
            ticker,
            sector,
            bars,
            date_index,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.bars.iter().map(|b| b.date()).collect();
        dates.dedup();
        dates
    }

    pub fn index_on(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }

    pub fn bar_on(&self, date: NaiveDate) -> Option<&OhlcvBar> {
        self.index_on(date).map(|i| &self.bars[i])
    }

    /// Index of the last bar dated on or before `date`.
    pub fn index_on_or_before(&self, date: NaiveDate) -> Option<usize> {
        let after = self.bars.partition_point(|b| b.date() <= date);
        after.checked_sub(1)
    }

    /// History up to and including `index`.
    pub fn history_through(&self, index: usize) -> &[OhlcvBar] {
        let end = (index + 1).min(self.bars.len());
        &self.bars[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bar(date: &str, close: f64) -> OhlcvBar {
        OhlcvBar {
            ticker: "EREGL.IS".to_string(),
            timestamp: NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1000.0,
        }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample() -> InstrumentData {
        InstrumentData::new(
            "EREGL.IS".into(),
            "Demir-Çelik".into(),
            vec![
                make_bar("2024-01-02", 100.0),
                make_bar("2024-01-03", 101.0),
                make_bar("2024-01-05", 102.0),
            ],
        )
    }

    #[test]
    fn bar_on_uses_date_index() {
        let data = sample();
        assert_eq!(data.index_on(d("2024-01-03")), Some(1));
        assert!((data.bar_on(d("2024-01-05")).unwrap().close - 102.0).abs() < f64::EPSILON);
        assert!(data.bar_on(d("2024-01-04")).is_none());
    }

    #[test]
    fn index_on_or_before_fills_gaps() {
        let data = sample();
        assert_eq!(data.index_on_or_before(d("2024-01-01")), None);
        assert_eq!(data.index_on_or_before(d("2024-01-02")), Some(0));
        assert_eq!(data.index_on_or_before(d("2024-01-04")), Some(1));
        assert_eq!(data.index_on_or_before(d("2024-02-01")), Some(2));
    }

    #[test]
    fn history_through_includes_index() {
        let data = sample();
        assert_eq!(data.history_through(1).len(), 2);
        assert_eq!(data.history_through(10).len(), 3);
    }

    #[test]
    fn dates_are_deduplicated_for_intraday_bars() {
        let mut bars = vec![make_bar("2024-01-02", 100.0), make_bar("2024-01-02", 101.0)];
        bars[1].timestamp = d("2024-01-02").and_hms_opt(15, 0, 0).unwrap();
        bars.push(make_bar("2024-01-03", 102.0));
        let data = InstrumentData::new("EREGL.IS".into(), "Demir-Çelik".into(), bars);
        assert_eq!(data.dates(), vec![d("2024-01-02"), d("2024-01-03")]);
        assert_eq!(data.index_on(d("2024-01-02")), Some(1));
        assert_eq!(data.bar_count(), 3);
    }
}
