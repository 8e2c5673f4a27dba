//! CLI definition and dispatch.

use chrono::{Duration, Local, NaiveDate};
use clap::{Parser, Subcommand};
use log::info;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{
    self as backtest_engine, BacktestConfig, DEFAULT_LOOKBACK_DAYS, DEFAULT_MAX_POSITIONS,
    DEFAULT_TEST_DAYS, DEFAULT_WARMUP_BARS,
};
use crate::domain::config_validation::{
    read_date, read_day_span, read_int, read_int_in, read_tickers, validate_backtest_config,
    validate_scan_config,
};
use crate::domain::diversification::{DEFAULT_MAX_PER_SECTOR, SectorCapSelector};
use crate::domain::error::MidasError;
use crate::domain::regime::{
    AlwaysFavorable, DEFAULT_REGIME_EMA_PERIOD, EmaTrendFilter, RegimeFilter,
};
use crate::domain::report::{BacktestReport, RunContext};
use crate::domain::retry::RetryPolicy;
use crate::domain::scan::{
    self as scanner, DEFAULT_SCAN_LOOKBACK_DAYS, DEFAULT_TOP_N, SCAN_MIN_BARS,
};
use crate::domain::signal::{MIN_HISTORY_BARS, Signal};
use crate::domain::universe::{FetchRequest, SectorMap, load_benchmark, load_universe};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{Interval, MarketDataPort};
use crate::ports::report_port::ReportPort;

pub const DEFAULT_BENCHMARK: &str = "XU100.IS";

#[derive(Parser, Debug)]
#[command(name = "midas", about = "Signal scoring and historical backtesting")]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over the configured universe
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Write the full report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Rank the latest intraday signals
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        /// Override [scan] top
        #[arg(long)]
        top: Option<usize>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Everything a backtest run reads from the config file.
#[derive(Debug, Clone)]
pub struct BacktestSettings {
    pub backtest: BacktestConfig,
    pub tickers: Vec<String>,
    pub sectors: SectorMap,
    pub benchmark: Option<String>,
    pub regime_enabled: bool,
    pub regime_period: usize,
    pub max_per_sector: usize,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub tickers: Vec<String>,
    pub sectors: SectorMap,
    pub lookback_days: i64,
    pub top: usize,
    pub retry: RetryPolicy,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_backtest(&config, output.as_deref())
            }
        }
        Command::Scan { config, top } => run_scan(&config, top),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = MidasError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(e: MidasError) -> ExitCode {
    eprintln!("error: {e}");
    (&e).into()
}

fn run_backtest(config_path: &Path, output_path: Option<&Path>) -> ExitCode {
    // Stage 1: Load config
    info!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Validate and build settings
    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(e);
    }
    let settings = match build_backtest_settings(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    // Stage 3: Data source
    let data_port = match build_data_port(&adapter) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    // Stages 4-7: fetch, simulate, aggregate, report
    run_backtest_pipeline(data_port.as_ref(), &settings, output_path)
}

pub fn build_backtest_settings(adapter: &dyn ConfigPort) -> Result<BacktestSettings, MidasError> {
    let end_date = read_date(adapter, "backtest", "end_date")?
        .unwrap_or_else(|| Local::now().date_naive());

    let backtest = BacktestConfig {
        end_date,
        lookback_days: read_day_span(adapter, "backtest", "lookback_days", DEFAULT_LOOKBACK_DAYS)?,
        test_days: read_day_span(adapter, "backtest", "test_days", DEFAULT_TEST_DAYS)?,
        warmup_bars: read_int(adapter, "backtest", "warmup_bars", DEFAULT_WARMUP_BARS as i64, 0)?
            as usize,
        max_positions: read_int(
            adapter,
            "backtest",
            "max_positions",
            DEFAULT_MAX_POSITIONS as i64,
            1,
        )? as usize,
    };

    let benchmark = adapter
        .get_string("backtest", "benchmark")
        .map(|b| b.trim().to_uppercase())
        .unwrap_or_else(|| DEFAULT_BENCHMARK.to_string());

    Ok(BacktestSettings {
        backtest,
        tickers: read_tickers(adapter, "backtest")?,
        sectors: build_sector_map(adapter),
        benchmark: Some(benchmark).filter(|b| !b.is_empty()),
        regime_enabled: adapter.get_bool("regime", "enabled", true),
        regime_period: read_int(
            adapter,
            "regime",
            "ema_period",
            DEFAULT_REGIME_EMA_PERIOD as i64,
            1,
        )? as usize,
        max_per_sector: read_int(
            adapter,
            "diversification",
            "max_per_sector",
            DEFAULT_MAX_PER_SECTOR as i64,
            1,
        )? as usize,
        retry: build_retry_policy(adapter)?,
    })
}

pub fn build_scan_settings(adapter: &dyn ConfigPort) -> Result<ScanSettings, MidasError> {
    let tickers = if adapter.get_string("scan", "tickers").is_some() {
        read_tickers(adapter, "scan")?
    } else {
        read_tickers(adapter, "backtest")?
    };

    Ok(ScanSettings {
        tickers,
        sectors: build_sector_map(adapter),
        lookback_days: read_day_span(
            adapter,
            "scan",
            "lookback_days",
            DEFAULT_SCAN_LOOKBACK_DAYS,
        )?,
        top: read_int(adapter, "scan", "top", DEFAULT_TOP_N as i64, 1)? as usize,
        retry: build_retry_policy(adapter)?,
    })
}

fn build_retry_policy(adapter: &dyn ConfigPort) -> Result<RetryPolicy, MidasError> {
    let defaults = RetryPolicy::default();
    let attempts = read_int_in(
        adapter,
        "backtest",
        "fetch_attempts",
        i64::from(defaults.max_attempts),
        1..=i64::from(u32::MAX),
    )?;
    let delay_ms = read_int(
        adapter,
        "backtest",
        "fetch_retry_delay_ms",
        defaults.delay.as_millis() as i64,
        0,
    )?;

    let out_of_range = |key: &str| MidasError::ConfigInvalid {
        section: "backtest".into(),
        key: key.into(),
        reason: "value out of range".into(),
    };
    let attempts = u32::try_from(attempts).map_err(|_| out_of_range("fetch_attempts"))?;
    let delay_ms = u64::try_from(delay_ms).map_err(|_| out_of_range("fetch_retry_delay_ms"))?;
    Ok(RetryPolicy::new(
        attempts,
        std::time::Duration::from_millis(delay_ms),
    ))
}

/// `[sectors]` entries keyed by upper-case ticker.
pub fn build_sector_map(adapter: &dyn ConfigPort) -> SectorMap {
    SectorMap::from_pairs(
        adapter
            .get_section("sectors")
            .into_iter()
            .map(|(ticker, sector)| (ticker, sector.trim().to_string())),
    )
}

pub fn build_data_port(adapter: &dyn ConfigPort) -> Result<Box<dyn MarketDataPort>, MidasError> {
    let source = adapter
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string())
        .trim()
        .to_lowercase();

    match source.as_str() {
        "csv" => {
            let dir = adapter
                .get_string("data", "csv_dir")
                .ok_or_else(|| MidasError::ConfigMissing {
                    section: "data".into(),
                    key: "csv_dir".into(),
                })?;
            Ok(Box::new(CsvAdapter::new(PathBuf::from(dir.trim()))))
        }
        #[cfg(feature = "yahoo")]
        "yahoo" => {
            let adapter = crate::adapters::yahoo_adapter::YahooAdapter::new()?;
            Ok(Box::new(adapter))
        }
        #[cfg(not(feature = "yahoo"))]
        "yahoo" => Err(MidasError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: "yahoo feature is required for this source".into(),
        }),
        other => Err(MidasError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: format!("unknown source '{other}'"),
        }),
    }
}

/// Fetch, simulate and aggregate. The returned report is ready to render.
pub fn execute_backtest(
    data_port: &dyn MarketDataPort,
    settings: &BacktestSettings,
) -> Result<BacktestReport, MidasError> {
    let config = &settings.backtest;
    let request = FetchRequest {
        start: config.fetch_start(),
        end: config.end_date,
        interval: Interval::Daily,
        min_bars: MIN_HISTORY_BARS,
        retry: settings.retry,
    };

    // Stage 4: Load universe and benchmark
    let universe = load_universe(data_port, &settings.tickers, &settings.sectors, &request)?;
    let benchmark = match (&settings.benchmark, settings.regime_enabled) {
        (Some(ticker), true) => load_benchmark(data_port, ticker, &request),
        _ => None,
    };

    // Stage 5: Simulate
    let ema_filter = EmaTrendFilter {
        period: settings.regime_period,
    };
    let regime: &dyn RegimeFilter = if settings.regime_enabled {
        &ema_filter
    } else {
        &AlwaysFavorable
    };
    let selector = SectorCapSelector {
        max_per_sector: settings.max_per_sector,
    };
    let result =
        backtest_engine::run_backtest(&universe, benchmark.as_ref(), config, regime, &selector)?;

    // Stage 6: Aggregate
    let context = RunContext {
        benchmark: benchmark.as_ref().map(|b| b.ticker.clone()),
        regime_enabled: settings.regime_enabled,
        max_per_sector: settings.max_per_sector,
    };
    Ok(BacktestReport::build(&universe, config, context, result))
}

pub fn run_backtest_pipeline(
    data_port: &dyn MarketDataPort,
    settings: &BacktestSettings,
    output_path: Option<&Path>,
) -> ExitCode {
    let report = match execute_backtest(data_port, settings) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    print!("{}", format_summary(&report));

    // Stage 7: Write report
    if let Some(path) = output_path {
        if let Err(e) = JsonReportAdapter::new().write(&report, path) {
            return fail(e);
        }
    }
    ExitCode::SUCCESS
}

/// Human-readable rendering of a report for the terminal.
pub fn format_summary(report: &BacktestReport) -> String {
    Summary(report).to_string()
}

struct Summary<'a>(&'a BacktestReport);

impl fmt::Display for Summary<'_> {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let rule = "=".repeat(70);
        let result = &report.result;
        let m = &report.metrics;

        writeln!(out, "{rule}")?;
        writeln!(
            out,
            "BACKTEST RESULTS: {} to {} ({} days)",
            result.first_day, result.last_day, result.simulated_days
        )?;
        writeln!(out, "{rule}")?;

        if !report.run.skipped.is_empty() {
            writeln!(out, "\nSkipped tickers:")?;
            for s in &report.run.skipped {
                writeln!(out, "   {}: {}", s.ticker, s.reason)?;
            }
        }

        if !report.has_trades() {
            writeln!(out, "\nNo trades were made.")?;
            writeln!(out, "   Regime blocked:  {} days", result.blocked_days)?;
            writeln!(out, "   No signal:       {} days", result.no_signal_days)?;
            writeln!(out, "   Days tested:     {}", result.simulated_days)?;
            return Ok(());
        }

        writeln!(out, "\nGENERAL:")?;
        writeln!(out, "   Total trades:    {}", m.total_trades)?;
        writeln!(out, "   Winners:         {}", m.winners)?;
        writeln!(out, "   Losers:          {}", m.losers)?;
        writeln!(out, "   Win rate:        {:.1}%", m.win_rate * 100.0)?;

        writeln!(out, "\nP&L:")?;
        writeln!(out, "   Total return:    {:.2}%", m.total_return)?;
        writeln!(out, "   Avg trade:       {:.2}%", m.avg_trade)?;
        writeln!(out, "   Avg win:         {:.2}%", m.avg_win)?;
        writeln!(out, "   Avg loss:        {:.2}%", m.avg_loss)?;

        writeln!(out, "\nPERFORMANCE:")?;
        writeln!(out, "   Profit factor:   {:.2}", m.profit_factor)?;
        writeln!(out, "   Max drawdown:    {:.1}%", m.max_drawdown)?;

        writeln!(out, "\nFILTERS:")?;
        writeln!(out, "   Regime blocked:  {} days", result.blocked_days)?;
        writeln!(out, "   No signal:       {} days", result.no_signal_days)?;
        if result.open_at_end > 0 {
            writeln!(out, "   Still open:      {} positions", result.open_at_end)?;
        }

        writeln!(out, "\nEXIT REASONS:")?;
        for b in &report.by_exit_reason {
            writeln!(out, "   {:12}: {:2} trades, {:+.2}%", b.key, b.count, b.total_pnl)?;
        }

        writeln!(out, "\nSECTORS:")?;
        for b in &report.by_sector {
            writeln!(out, "   {:18}: {:2} trades, {:+.2}%", b.key, b.count, b.total_pnl)?;
        }

        writeln!(out, "\nTRADES:")?;
        writeln!(out, "{}", "-".repeat(90))?;
        for (i, t) in result.trades.iter().enumerate() {
            let mark = if t.is_winner() { "+" } else { "-" };
            writeln!(
                out,
                "  {:2}. {} {:10} | {}->{} ({:2}d) | {:.2}->{:.2} | {:+.2}% | {:10} | {}",
                i + 1,
                mark,
                t.ticker,
                t.entry_date.format("%m/%d"),
                t.exit_date.format("%m/%d"),
                t.days_held,
                t.entry_price,
                t.exit_price,
                t.pnl_pct,
                t.exit_reason.as_str(),
                t.sector,
            )?;
        }

        writeln!(out, "\n{rule}")?;
        writeln!(out, "VERDICT: {}", report.verdict.describe())?;
        writeln!(out, "{rule}")
    }
}

pub fn run_dry_run(config_path: &Path) -> ExitCode {
    info!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(e);
    }
    let settings = match build_backtest_settings(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    let bt = &settings.backtest;
    println!("Config validated successfully");
    println!("\nWindow:");
    println!("  fetch:         {} to {}", bt.fetch_start(), bt.end_date);
    println!("  test:          {} to {}", bt.test_start(), bt.end_date);
    println!("  warmup bars:   {}", bt.warmup_bars);
    println!("  max positions: {}", bt.max_positions);

    println!("\nRegime:");
    match (&settings.benchmark, settings.regime_enabled) {
        (Some(b), true) => println!("  {} close >= EMA{}", b, settings.regime_period),
        _ => println!("  disabled"),
    }

    println!(
        "\nUniverse ({} tickers, max {} per sector):",
        settings.tickers.len(),
        settings.max_per_sector
    );
    for ticker in &settings.tickers {
        println!("  {:10} {}", ticker, settings.sectors.sector_of(ticker));
    }

    println!(
        "\nFetch: {} attempts, {}ms apart",
        settings.retry.max_attempts,
        settings.retry.delay.as_millis()
    );
    println!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_scan(config_path: &Path, top_override: Option<usize>) -> ExitCode {
    info!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_scan_config(&adapter) {
        return fail(e);
    }
    let mut settings = match build_scan_settings(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    if let Some(top) = top_override {
        settings.top = top.max(1);
    }

    let data_port = match build_data_port(&adapter) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    match execute_scan(data_port.as_ref(), &settings, Local::now().date_naive()) {
        Ok(signals) => {
            print!("{}", format_scan(&signals));
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

/// Fetch hourly bars ending `today` and rank the latest signals.
pub fn execute_scan(
    data_port: &dyn MarketDataPort,
    settings: &ScanSettings,
    today: NaiveDate,
) -> Result<Vec<Signal>, MidasError> {
    let request = FetchRequest {
        start: today - Duration::days(settings.lookback_days),
        end: today,
        interval: Interval::Hourly,
        min_bars: SCAN_MIN_BARS,
        retry: settings.retry,
    };
    let universe = load_universe(data_port, &settings.tickers, &settings.sectors, &request)?;
    Ok(scanner::scan(&universe.instruments, settings.top))
}

pub fn format_scan(signals: &[Signal]) -> String {
    ScanTable(signals).to_string()
}

struct ScanTable<'a>(&'a [Signal]);

impl fmt::Display for ScanTable<'_> {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(out, "No signals.");
        }
        for (i, s) in self.0.iter().enumerate() {
            writeln!(
                out,
                "{:2}. {:10} score {:3} | entry {:.2} | SL {:.2} | TP1 {:.2} | TP2 {:.2} | R:R {:.2} | {}",
                i + 1,
                s.ticker,
                s.score,
                s.entry_price,
                s.stop_loss,
                s.take_profit_1,
                s.take_profit_2,
                s.risk_reward_ratio,
                s.sector,
            )?;
            writeln!(out, "    {}", s.reasons.join(", "))?;
        }
        Ok(())
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    info!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(e);
    }
    if !adapter.get_section("scan").is_empty() {
        if let Err(e) = validate_scan_config(&adapter) {
            return fail(e);
        }
    }

    println!("Configuration is valid.");
    ExitCode::SUCCESS
}
