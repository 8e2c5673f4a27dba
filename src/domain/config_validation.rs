//! Configuration validation.
//!
//! Checks every field a run reads before any data is fetched, so a bad
//! config fails fast with the offending section and key.

use crate::domain::error::MidasError;
use crate::domain::universe::parse_codes;
use crate::ports::config_port::ConfigPort;
use chrono::{Duration, NaiveDate};
use std::ops::RangeInclusive;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Upper bound for every calendar-day span (lookback, test window).
pub const MAX_DAY_SPAN: i64 = 36_500;

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> MidasError {
    MidasError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Integer value of `[section] key`, or `default` when absent. A
/// non-numeric value is an error, not a silent default.
pub fn read_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
    min: i64,
) -> Result<i64, MidasError> {
    read_int_in(config, section, key, default, min..=i64::MAX)
}

/// Like [`read_int`], with an upper bound as well.
pub fn read_int_in(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
    bounds: RangeInclusive<i64>,
) -> Result<i64, MidasError> {
    let value = match config.get_string(section, key) {
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(section, key, format!("'{raw}' is not an integer")))?,
        None => default,
    };
    if value < *bounds.start() {
        return Err(invalid(section, key, format!("must be at least {}", bounds.start())));
    }
    if value > *bounds.end() {
        return Err(invalid(section, key, format!("must be at most {}", bounds.end())));
    }
    Ok(value)
}

/// Calendar-day span from `[section] key`, between 1 and [`MAX_DAY_SPAN`].
pub fn read_day_span(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, MidasError> {
    read_int_in(config, section, key, default, 1..=MAX_DAY_SPAN)
}

pub fn read_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, MidasError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(None);
    };
    let date = NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| invalid(section, key, "invalid date format (expected YYYY-MM-DD)"))?;
    // Every day span is subtracted from this date later on.
    if date.checked_sub_signed(Duration::days(MAX_DAY_SPAN)).is_none() {
        return Err(invalid(section, key, "date is out of range"));
    }
    Ok(Some(date))
}

/// Ticker list from `[section] tickers`.
pub fn read_tickers(config: &dyn ConfigPort, section: &str) -> Result<Vec<String>, MidasError> {
    let raw = config
        .get_string(section, "tickers")
        .ok_or_else(|| MidasError::ConfigMissing {
            section: section.to_string(),
            key: "tickers".to_string(),
        })?;
    parse_codes(&raw).map_err(|e| invalid(section, "tickers", e.to_string()))
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), MidasError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());
    match source.trim().to_lowercase().as_str() {
        "csv" => {
            let dir = config.get_string("data", "csv_dir").unwrap_or_default();
            if dir.trim().is_empty() {
                return Err(MidasError::ConfigMissing {
                    section: "data".to_string(),
                    key: "csv_dir".to_string(),
                });
            }
            Ok(())
        }
        "yahoo" => Ok(()),
        other => Err(invalid(
            "data",
            "source",
            format!("unknown source '{other}' (expected csv or yahoo)"),
        )),
    }
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), MidasError> {
    validate_data_config(config)?;
    read_tickers(config, "backtest")?;
    read_date(config, "backtest", "end_date")?;

    let lookback = read_day_span(config, "backtest", "lookback_days", 400)?;
    let test_days = read_day_span(config, "backtest", "test_days", 90)?;
    if test_days > lookback {
        return Err(invalid(
            "backtest",
            "test_days",
            format!("must not exceed lookback_days ({lookback})"),
        ));
    }
    read_int(config, "backtest", "warmup_bars", 200, 0)?;
    read_int(config, "backtest", "max_positions", 5, 1)?;
    read_int_in(config, "backtest", "fetch_attempts", 3, 1..=i64::from(u32::MAX))?;
    read_int(config, "backtest", "fetch_retry_delay_ms", 1000, 0)?;

    if let Some(benchmark) = config.get_string("backtest", "benchmark") {
        if benchmark.trim().is_empty() {
            return Err(invalid("backtest", "benchmark", "must not be empty"));
        }
    }

    read_int(config, "regime", "ema_period", 20, 1)?;
    read_int(config, "diversification", "max_per_sector", 2, 1)?;
    validate_sectors(config)?;
    Ok(())
}

pub fn validate_scan_config(config: &dyn ConfigPort) -> Result<(), MidasError> {
    validate_data_config(config)?;
    if config.get_string("scan", "tickers").is_some() {
        read_tickers(config, "scan")?;
    } else {
        read_tickers(config, "backtest")
            .map_err(|_| MidasError::ConfigMissing {
                section: "scan".to_string(),
                key: "tickers".to_string(),
            })?;
    }
    read_day_span(config, "scan", "lookback_days", 5)?;
    read_int(config, "scan", "top", 5, 1)?;
    read_int_in(config, "backtest", "fetch_attempts", 3, 1..=i64::from(u32::MAX))?;
    read_int(config, "backtest", "fetch_retry_delay_ms", 1000, 0)?;
    validate_sectors(config)?;
    Ok(())
}

fn validate_sectors(config: &dyn ConfigPort) -> Result<(), MidasError> {
    for (ticker, sector) in config.get_section("sectors") {
        if sector.trim().is_empty() {
            return Err(invalid("sectors", &ticker, "sector name must not be empty"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapConfig(HashMap<(String, String), String>);

    impl MapConfig {
        fn new(entries: &[(&str, &str, &str)]) -> Self {
            MapConfig(
                entries
                    .iter()
                    .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
                    .collect(),
            )
        }
    }

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.0.get(&(section.to_string(), key.to_string())).cloned()
        }
        fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        fn get_section(&self, section: &str) -> Vec<(String, String)> {
            let mut pairs: Vec<(String, String)> = self
                .0
                .iter()
                .filter(|((s, _), _)| s == section)
                .map(|((_, k), v)| (k.clone(), v.clone()))
                .collect();
            pairs.sort();
            pairs
        }
    }

    fn valid_entries() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("data", "source", "csv"),
            ("data", "csv_dir", "/tmp/bars"),
            ("backtest", "tickers", "AKBNK.IS,GARAN.IS"),
            ("backtest", "end_date", "2024-12-31"),
        ]
    }

    fn with(extra: &[(&'static str, &'static str, &'static str)]) -> MapConfig {
        let mut entries = valid_entries();
        for e in extra {
            entries.retain(|(s, k, _)| !(s == &e.0 && k == &e.1));
            entries.push(*e);
        }
        MapConfig::new(&entries)
    }

    fn invalid_key(result: Result<(), MidasError>) -> String {
        match result {
            Err(MidasError::ConfigInvalid { key, .. }) => key,
            Err(MidasError::ConfigMissing { key, .. }) => key,
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn minimal_config_is_valid() {
        assert!(validate_backtest_config(&with(&[])).is_ok());
    }

    #[test]
    fn csv_source_requires_dir() {
        let config = MapConfig::new(&[("data", "source", "csv"), ("backtest", "tickers", "A")]);
        assert_eq!(invalid_key(validate_backtest_config(&config)), "csv_dir");
    }

    #[test]
    fn unknown_source_rejected() {
        let config = with(&[("data", "source", "bloomberg")]);
        assert_eq!(invalid_key(validate_backtest_config(&config)), "source");
    }

    #[test]
    fn yahoo_source_needs_no_dir() {
        let config = MapConfig::new(&[("data", "source", "yahoo"), ("backtest", "tickers", "A")]);
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn tickers_required_and_parsed() {
        let config = MapConfig::new(&[("data", "source", "yahoo")]);
        assert!(matches!(
            validate_backtest_config(&config),
            Err(MidasError::ConfigMissing { .. })
        ));
        let config = with(&[("backtest", "tickers", "A,,B")]);
        assert_eq!(invalid_key(validate_backtest_config(&config)), "tickers");
    }

    #[test]
    fn bad_end_date_rejected() {
        let config = with(&[("backtest", "end_date", "31/12/2024")]);
        assert_eq!(invalid_key(validate_backtest_config(&config)), "end_date");
    }

    #[test]
    fn non_numeric_int_rejected() {
        let config = with(&[("backtest", "max_positions", "five")]);
        assert_eq!(invalid_key(validate_backtest_config(&config)), "max_positions");
    }

    #[test]
    fn zero_max_positions_rejected() {
        let config = with(&[("backtest", "max_positions", "0")]);
        assert_eq!(invalid_key(validate_backtest_config(&config)), "max_positions");
    }

    #[test]
    fn test_window_longer_than_lookback_rejected() {
        let config = with(&[("backtest", "lookback_days", "60"), ("backtest", "test_days", "90")]);
        assert_eq!(invalid_key(validate_backtest_config(&config)), "test_days");
    }

    #[test]
    fn zero_sector_cap_rejected() {
        let config = with(&[("diversification", "max_per_sector", "0")]);
        assert_eq!(invalid_key(validate_backtest_config(&config)), "max_per_sector");
    }

    #[test]
    fn scan_falls_back_to_backtest_tickers() {
        assert!(validate_scan_config(&with(&[])).is_ok());
        let config = MapConfig::new(&[("data", "source", "yahoo")]);
        assert_eq!(invalid_key(validate_scan_config(&config)), "tickers");
    }

    #[test]
    fn scan_top_must_be_positive() {
        let config = with(&[("scan", "top", "0")]);
        assert_eq!(invalid_key(validate_scan_config(&config)), "top");
    }

    #[test]
    fn day_spans_are_capped() {
        let config = with(&[("backtest", "lookback_days", "200000000")]);
        assert_eq!(invalid_key(validate_backtest_config(&config)), "lookback_days");

        let config = with(&[
            ("backtest", "lookback_days", "36500"),
            ("backtest", "test_days", "36501"),
        ]);
        assert_eq!(invalid_key(validate_backtest_config(&config)), "test_days");

        let config = with(&[("backtest", "lookback_days", "36500")]);
        assert!(validate_backtest_config(&config).is_ok());

        let config = with(&[("scan", "lookback_days", "99999999")]);
        assert_eq!(invalid_key(validate_scan_config(&config)), "lookback_days");
    }

    #[test]
    fn fetch_attempts_must_fit_u32() {
        let config = with(&[("backtest", "fetch_attempts", "4294967296")]);
        assert_eq!(invalid_key(validate_backtest_config(&config)), "fetch_attempts");
        let config = with(&[("backtest", "fetch_attempts", "4294967295")]);
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn read_int_uses_default_when_absent() {
        let config = with(&[]);
        assert_eq!(read_int(&config, "backtest", "warmup_bars", 200, 0).unwrap(), 200);
    }

    #[test]
    fn read_date_parses() {
        let config = with(&[]);
        assert_eq!(
            read_date(&config, "backtest", "end_date").unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31)
        );
        assert_eq!(read_date(&config, "backtest", "missing").unwrap(), None);
    }
}
