//! Per-instrument orchestration and the bounded worker pool.
//!
//! A fund is fetched once and simulated for every configured period. A
//! failed fetch skips the fund; an empty window skips only that period.
//! Funds run on scoped worker threads, at most `max_in_flight` at a time,
//! admitted in input order: when the pool is full the oldest worker is
//! joined before the next one starts.

use std::collections::VecDeque;
use std::thread::{self, ScopedJoinHandle};

use tracing::{info, warn};

use crate::domain::error::GridError;
use crate::domain::grid_engine::{GridRunResult, run_grid_backtest};
use crate::domain::period::{Period, resolve_window};
use crate::domain::price_series::PriceSeries;
use crate::domain::strategy::StrategyParameters;
use crate::domain::summary::RunSummary;
use crate::domain::thresholds::{Thresholds, compute_thresholds};
use crate::ports::price_source_port::PriceSourcePort;
use crate::ports::report_port::{ReportContext, ReportPort};
use crate::ports::result_store_port::ResultStorePort;

pub const DEFAULT_MAX_IN_FLIGHT: usize = 5;

/// Everything produced by one simulated period.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodOutcome {
    pub period: Period,
    pub thresholds: Thresholds,
    pub start_index: usize,
    pub end_index: usize,
    /// Timestamp of the first point in the window.
    pub window_start: i64,
    /// Timestamp of the last point in the window.
    pub window_end: i64,
    pub result: GridRunResult,
}

/// Resolves the window, derives the bands and runs the engine.
pub fn run_period(
    series: &PriceSeries,
    period: Period,
    params: &StrategyParameters,
) -> Result<PeriodOutcome, GridError> {
    let (start, end) = resolve_window(series, period)?;
    let thresholds = compute_thresholds(
        series,
        start,
        end,
        params.threshold_low_fraction,
        params.threshold_high_fraction,
    )
    .map_err(|_| GridError::EmptyWindow {
        period: period.code(),
    })?;

    let window = series.window(start, end);
    let result = run_grid_backtest(window, &thresholds, params);

    Ok(PeriodOutcome {
        period,
        thresholds,
        start_index: start,
        end_index: end,
        window_start: window[0].timestamp,
        window_end: window[window.len() - 1].timestamp,
        result,
    })
}

/// Optional destinations for completed periods.
#[derive(Clone, Copy, Default)]
pub struct Sinks<'a> {
    pub report: Option<&'a (dyn ReportPort + Sync)>,
    pub store: Option<&'a (dyn ResultStorePort + Sync)>,
}

#[derive(Debug)]
pub struct PeriodReport {
    pub period: Period,
    pub result: Result<RunSummary, GridError>,
    /// Report or store failures; they do not invalidate `result`.
    pub sink_errors: Vec<GridError>,
}

#[derive(Debug)]
pub struct InstrumentReport {
    pub code: String,
    /// Set when the series could not be obtained; `periods` is then empty.
    pub fetch_error: Option<GridError>,
    pub periods: Vec<PeriodReport>,
}

impl InstrumentReport {
    fn failed(code: &str, err: GridError) -> Self {
        InstrumentReport {
            code: code.to_string(),
            fetch_error: Some(err),
            periods: Vec::new(),
        }
    }

    pub fn completed(&self) -> impl Iterator<Item = &RunSummary> {
        self.periods.iter().filter_map(|p| p.result.as_ref().ok())
    }

    pub fn failed_periods(&self) -> usize {
        self.periods.iter().filter(|p| p.result.is_err()).count()
    }
}

fn deliver(
    sinks: Sinks<'_>,
    code: &str,
    params: &StrategyParameters,
    outcome: &PeriodOutcome,
    summary: &RunSummary,
) -> Vec<GridError> {
    let mut errors = Vec::new();

    if let Some(report) = sinks.report {
        let ctx = ReportContext {
            fund_code: code,
            params,
            outcome,
        };
        if let Err(e) = report.write(&ctx) {
            warn!(code, period = %outcome.period, error = %e, "report not written");
            errors.push(e);
        }
    }

    if let Some(store) = sinks.store {
        if let Err(e) = store.save(summary) {
            warn!(code, period = %outcome.period, error = %e, "summary not stored");
            errors.push(e);
        }
    }

    errors
}

/// Fetches one fund and runs every period against it.
pub fn run_instrument(
    source: &dyn PriceSourcePort,
    sinks: Sinks<'_>,
    code: &str,
    periods: &[Period],
    params: &StrategyParameters,
    operation_id: i64,
) -> InstrumentReport {
    info!(code, "processing fund");

    let series = match source.fetch_series(code) {
        Ok(series) if series.is_empty() => {
            let err = GridError::SourceUnavailable {
                code: code.to_string(),
                reason: "empty price series".into(),
            };
            warn!(code, error = %err, "skipping fund");
            return InstrumentReport::failed(code, err);
        }
        Ok(series) => series,
        Err(err) => {
            warn!(code, error = %err, "skipping fund");
            return InstrumentReport::failed(code, err);
        }
    };

    let mut reports = Vec::with_capacity(periods.len());
    for &period in periods {
        let report = match run_period(&series, period, params) {
            Ok(outcome) => {
                let summary = RunSummary::from_outcome(code, &outcome, operation_id);
                info!(
                    code,
                    period = %period,
                    total_value = summary.total_value,
                    profit = summary.profit,
                    operations = outcome.result.operations.len(),
                    "period complete"
                );
                let sink_errors = deliver(sinks, code, params, &outcome, &summary);
                PeriodReport {
                    period,
                    result: Ok(summary),
                    sink_errors,
                }
            }
            Err(err) => {
                warn!(code, period = %period, error = %err, "skipping period");
                PeriodReport {
                    period,
                    result: Err(err),
                    sink_errors: Vec::new(),
                }
            }
        };
        reports.push(report);
    }

    InstrumentReport {
        code: code.to_string(),
        fetch_error: None,
        periods: reports,
    }
}

fn join_worker(code: &str, handle: ScopedJoinHandle<'_, InstrumentReport>) -> InstrumentReport {
    handle.join().unwrap_or_else(|_| {
        warn!(code, "worker panicked");
        InstrumentReport::failed(
            code,
            GridError::WorkerPanicked {
                code: code.to_string(),
            },
        )
    })
}

/// Runs every fund on a bounded pool. Reports come back in the order of `codes`.
pub fn run_universe(
    source: &(dyn PriceSourcePort + Sync),
    sinks: Sinks<'_>,
    codes: &[String],
    periods: &[Period],
    params: &StrategyParameters,
    max_in_flight: usize,
    operation_id: i64,
) -> Vec<InstrumentReport> {
    let cap = max_in_flight.max(1);
    let mut reports = Vec::with_capacity(codes.len());

    thread::scope(|scope| {
        let mut in_flight: VecDeque<(&str, ScopedJoinHandle<'_, InstrumentReport>)> =
            VecDeque::with_capacity(cap);

        for code in codes {
            if in_flight.len() >= cap {
                if let Some((oldest, handle)) = in_flight.pop_front() {
                    reports.push(join_worker(oldest, handle));
                }
            }
            let code = code.as_str();
            let handle = scope.spawn(move || {
                run_instrument(source, sinks, code, periods, params, operation_id)
            });
            in_flight.push_back((code, handle));
        }

        while let Some((code, handle)) = in_flight.pop_front() {
            reports.push(join_worker(code, handle));
        }
    });

    reports
}
