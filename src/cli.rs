//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use crate::adapters::csv_adapter::{self, CsvAdapter};
use crate::adapters::eastmoney_adapter::EastmoneyAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::text_report_adapter::TextReportAdapter;
use crate::domain::config_validation::{RunConfig, load_run_config, resolve_utc_offset};
use crate::domain::error::GridError;
use crate::domain::period::{Period, parse_period};
use crate::domain::runner::{InstrumentReport, Sinks, run_universe};
use crate::domain::universe::parse_codes;
use crate::ports::config_port::ConfigPort;
use crate::ports::price_source_port::PriceSourcePort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_CSV_DIR: &str = "data";

#[derive(Parser, Debug)]
#[command(name = "gridtrader", about = "Dual-tier grid backtester for fund net values")]
pub struct Cli {
    /// Log engine triggers (debug level) unless RUST_LOG is set
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest every configured fund over every configured period
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Backtest a single fund instead of the configured list
        #[arg(long)]
        code: Option<String>,
        /// Run a single period selector (0-5, 3m, 1y, all, 30d, until:YYYY-MM-DD)
        #[arg(long)]
        period: Option<String>,
        /// Value stored in the operation_id column
        #[arg(long, default_value_t = 0)]
        operation_id: i64,
        #[arg(long)]
        no_store: bool,
        #[arg(long)]
        no_report: bool,
    },
    /// Validate a configuration and print the resolved values
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Download a fund's series through the configured source and export it as CSV
    Fetch {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: String,
        /// Output directory (defaults to [source] csv_dir)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            config,
            code,
            period,
            operation_id,
            no_store,
            no_report,
        } => run_backtest(
            &config,
            code.as_deref(),
            period.as_deref(),
            operation_id,
            no_store,
            no_report,
        ),
        Command::Validate { config } => run_validate(&config),
        Command::Fetch { config, code, out } => run_fetch(&config, &code, out.as_deref()),
    }
}

fn fail(err: &GridError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

/// Picks the price source named by `[source] kind`.
pub fn build_source(
    config: &dyn ConfigPort,
) -> Result<Box<dyn PriceSourcePort + Sync>, GridError> {
    let kind = config
        .get_string("source", "kind")
        .unwrap_or_else(|| "eastmoney".to_string())
        .to_lowercase();

    match kind.as_str() {
        "eastmoney" => Ok(Box::new(EastmoneyAdapter::from_config(config)?)),
        "csv" => {
            let dir = config
                .get_string("source", "csv_dir")
                .unwrap_or_else(|| DEFAULT_CSV_DIR.to_string());
            Ok(Box::new(CsvAdapter::new(
                PathBuf::from(dir),
                resolve_utc_offset(config)?,
            )))
        }
        other => Err(GridError::invalid(
            "source",
            "kind",
            format!("unknown source '{}', expected eastmoney or csv", other),
        )),
    }
}

/// `--code` replaces the configured list.
pub fn resolve_codes(
    code_override: Option<&str>,
    run_config: &RunConfig,
) -> Result<Vec<String>, GridError> {
    match code_override {
        Some(code) => parse_codes(&[code])
            .map_err(|e| GridError::invalid("universe", "fund_codes", e.to_string())),
        None => Ok(run_config.universe.codes.clone()),
    }
}

/// `--period` replaces the configured periods.
pub fn resolve_periods(
    period_override: Option<&str>,
    run_config: &RunConfig,
) -> Result<Vec<Period>, GridError> {
    match period_override {
        Some(token) => Ok(vec![parse_period(token, run_config.offset)?]),
        None => Ok(run_config.universe.periods.clone()),
    }
}

fn run_backtest(
    config_path: &Path,
    code_override: Option<&str>,
    period_override: Option<&str>,
    operation_id: i64,
    no_store: bool,
    no_report: bool,
) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let run_config = match load_run_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    // Stage 2: Apply overrides
    let codes = match resolve_codes(code_override, &run_config) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let periods = match resolve_periods(period_override, &run_config) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };

    // Stage 3: Price source
    let source = match build_source(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    // Stage 4: Sinks
    let report = if no_report {
        None
    } else {
        match TextReportAdapter::from_config(&adapter) {
            Ok(r) => Some(r),
            Err(e) => return fail(&e),
        }
    };

    #[cfg(feature = "sqlite")]
    let store = if no_store {
        None
    } else {
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        let store = match SqliteAdapter::from_config(&adapter) {
            Ok(s) => s,
            Err(e) => return fail(&e),
        };
        if let Err(e) = store.initialize_schema() {
            return fail(&e);
        }
        Some(store)
    };
    #[cfg(not(feature = "sqlite"))]
    if !no_store {
        eprintln!("warning: built without the sqlite feature, results are not stored");
    }

    let sinks = Sinks {
        report: report.as_ref().map(|r| r as &(dyn ReportPort + Sync)),
        #[cfg(feature = "sqlite")]
        store: store
            .as_ref()
            .map(|s| s as &(dyn crate::ports::result_store_port::ResultStorePort + Sync)),
        #[cfg(not(feature = "sqlite"))]
        store: None,
    };

    run_backtest_pipeline(
        source.as_ref(),
        sinks,
        &run_config,
        &codes,
        &periods,
        operation_id,
    )
}

/// Stages 5-6: run the universe and summarise. Split out so it can be driven
/// with in-memory ports.
pub fn run_backtest_pipeline(
    source: &(dyn PriceSourcePort + Sync),
    sinks: Sinks<'_>,
    run_config: &RunConfig,
    codes: &[String],
    periods: &[Period],
    operation_id: i64,
) -> ExitCode {
    // Stage 5: Run
    eprintln!(
        "Running {} funds x {} periods ({} in flight)",
        codes.len(),
        periods.len(),
        run_config.max_in_flight
    );
    let started = Instant::now();
    let reports = run_universe(
        source,
        sinks,
        codes,
        periods,
        &run_config.params,
        run_config.max_in_flight,
        operation_id,
    );

    // Stage 6: Summary
    print_summary(&reports);
    eprintln!("\nFinished in {:.1}s", started.elapsed().as_secs_f64());

    exit_code_for(&reports)
}

/// Success when at least one period completed and every sink accepted its
/// output; otherwise the code of the first failure.
pub fn exit_code_for(reports: &[InstrumentReport]) -> ExitCode {
    let first_sink_error = reports
        .iter()
        .flat_map(|r| r.periods.iter())
        .flat_map(|p| p.sink_errors.iter())
        .next();
    if let Some(err) = first_sink_error {
        return err.into();
    }

    if reports.iter().any(|r| r.completed().next().is_some()) {
        return ExitCode::SUCCESS;
    }

    let first_failure = reports.iter().find_map(|r| {
        r.fetch_error
            .as_ref()
            .or_else(|| r.periods.iter().find_map(|p| p.result.as_ref().err()))
    });
    match first_failure {
        Some(err) => err.into(),
        None => ExitCode::from(5),
    }
}

fn print_summary(reports: &[InstrumentReport]) {
    eprintln!("\n=== Results ===");
    eprintln!(
        "{:<8} {:<16} {:>12} {:>12} {:>12} {:>10}",
        "Fund", "Period", "Total", "Balance", "Holdings", "Profit"
    );

    for report in reports {
        if let Some(err) = &report.fetch_error {
            eprintln!("{:<8} skipped: {}", report.code, err);
            continue;
        }
        for period in &report.periods {
            match &period.result {
                Ok(s) => eprintln!(
                    "{:<8} {:<16} {:>12.2} {:>12.2} {:>12.2} {:>10.2}",
                    s.fund_code, s.period, s.total_value, s.balance, s.holdings_value, s.profit
                ),
                Err(e) => eprintln!(
                    "{:<8} {:<16} skipped: {}",
                    report.code,
                    period.period.code(),
                    e
                ),
            }
            for err in &period.sink_errors {
                eprintln!("         warning: {}", err);
            }
        }
    }

    let completed: usize = reports.iter().map(|r| r.completed().count()).sum();
    let failed_funds = reports.iter().filter(|r| r.fetch_error.is_some()).count();
    let failed_periods: usize = reports.iter().map(|r| r.failed_periods()).sum();
    eprintln!(
        "\n{} runs completed, {} funds skipped, {} periods skipped",
        completed, failed_funds, failed_periods
    );
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let run_config = match load_run_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    if let Err(e) = build_source(&adapter) {
        return fail(&e);
    }

    eprintln!("Config validated successfully");
    let p = &run_config.params;
    eprintln!("\nStrategy:");
    eprintln!("  grid_size:      {}", p.grid_size);
    eprintln!("  big_grid_size:  {}", p.big_grid_size);
    eprintln!("  factor:         {}", p.factor);
    eprintln!("  amount:         {:.2} (big tier {:.2})", p.amount, p.big_amount());
    eprintln!("  sum:            {:.2}", p.initial_balance);
    eprintln!(
        "  thresholds:     {} / {}",
        p.threshold_low_fraction, p.threshold_high_fraction
    );

    eprintln!("\nFunds ({}):", run_config.universe.count());
    for code in &run_config.universe.codes {
        eprintln!("  {}", code);
    }

    eprintln!("\nPeriods ({} runs):", run_config.universe.run_count());
    for period in &run_config.universe.periods {
        eprintln!("  {:<16} {}", period.code(), period.label());
    }

    eprintln!("\nmax_in_flight: {}", run_config.max_in_flight);
    eprintln!("utc offset:    {}", run_config.offset);
    ExitCode::SUCCESS
}

fn run_fetch(config_path: &Path, code: &str, out: Option<&Path>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let offset = match resolve_utc_offset(&adapter) {
        Ok(o) => o,
        Err(e) => return fail(&e),
    };
    let source = match build_source(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    let out_dir = out.map(Path::to_path_buf).unwrap_or_else(|| {
        PathBuf::from(
            adapter
                .get_string("source", "csv_dir")
                .unwrap_or_else(|| DEFAULT_CSV_DIR.to_string()),
        )
    });

    eprintln!("Fetching {}...", code);
    let series = match source.fetch_series(code) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    match csv_adapter::write_series(&out_dir, code, &series, offset) {
        Ok(path) => {
            eprintln!("Wrote {} points to {}", series.len(), path.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}
