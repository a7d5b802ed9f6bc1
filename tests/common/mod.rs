#![allow(dead_code)]

use gridtrader::domain::error::GridError;
use gridtrader::domain::period::SECONDS_PER_DAY;
use gridtrader::domain::price_series::{PricePoint, PriceSeries};
use gridtrader::domain::strategy::StrategyParameters;
use gridtrader::domain::summary::RunSummary;
use gridtrader::ports::price_source_port::PriceSourcePort;
use gridtrader::ports::report_port::{ReportContext, ReportPort};
use gridtrader::ports::result_store_port::ResultStorePort;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// 2024-01-01T00:00:00Z.
pub const DAY0: i64 = 1_704_067_200;

pub fn daily_points(prices: &[f64]) -> Vec<PricePoint> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &p)| PricePoint::new(DAY0 + i as i64 * SECONDS_PER_DAY, p))
        .collect()
}

pub fn daily_series(code: &str, prices: &[f64]) -> PriceSeries {
    PriceSeries::from_points(code, daily_points(prices)).unwrap()
}

/// Oscillates around 1.0 so both grids trade.
pub fn wave_prices(days: usize) -> Vec<f64> {
    (0..days)
        .map(|d| 1.0 + 0.15 * ((d as f64) / 9.0).sin())
        .collect()
}

pub fn sample_params() -> StrategyParameters {
    StrategyParameters {
        grid_size: 0.05,
        big_grid_size: 0.1,
        factor: 2.0,
        amount: 100.0,
        initial_balance: 10_000.0,
        threshold_low_fraction: 0.3,
        threshold_high_fraction: 0.7,
    }
}

/// In-memory price source that also records concurrency.
pub struct MockPriceSource {
    pub data: HashMap<String, PriceSeries>,
    pub errors: HashMap<String, GridError>,
    pub panics: HashSet<String>,
    pub delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fetched: Mutex<Vec<String>>,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            panics: HashSet::new(),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn with_prices(mut self, code: &str, prices: &[f64]) -> Self {
        self.data.insert(code.to_string(), daily_series(code, prices));
        self
    }

    pub fn with_series(mut self, code: &str, series: PriceSeries) -> Self {
        self.data.insert(code.to_string(), series);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(
            code.to_string(),
            GridError::SourceUnavailable {
                code: code.to_string(),
                reason: reason.to_string(),
            },
        );
        self
    }

    pub fn with_malformed(mut self, code: &str) -> Self {
        self.errors.insert(
            code.to_string(),
            GridError::MalformedSource {
                code: code.to_string(),
                reason: "Data_netWorthTrend not found".to_string(),
            },
        );
        self
    }

    /// Fetching `code` panics inside the worker.
    pub fn with_panic(mut self, code: &str) -> Self {
        self.panics.insert(code.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn max_observed_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn fetched_codes(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    fn copy_error(err: &GridError) -> GridError {
        match err {
            GridError::MalformedSource { code, reason } => GridError::MalformedSource {
                code: code.clone(),
                reason: reason.clone(),
            },
            GridError::SourceUnavailable { code, reason } => GridError::SourceUnavailable {
                code: code.clone(),
                reason: reason.clone(),
            },
            other => GridError::SourceUnavailable {
                code: String::new(),
                reason: other.to_string(),
            },
        }
    }
}

impl PriceSourcePort for MockPriceSource {
    fn fetch_series(&self, code: &str) -> Result<PriceSeries, GridError> {
        if self.panics.contains(code) {
            panic!("price source failed hard for {code}");
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.fetched.lock().unwrap().push(code.to_string());

        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        let result = match self.errors.get(code) {
            Some(err) => Err(Self::copy_error(err)),
            None => Ok(self.data.get(code).cloned().unwrap_or_default()),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Store that keeps rows in memory, optionally failing every save.
#[derive(Default)]
pub struct RecordingStore {
    pub rows: Mutex<Vec<RunSummary>>,
    pub fail: bool,
}

impl RecordingStore {
    pub fn failing() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn rows(&self) -> Vec<RunSummary> {
        self.rows.lock().unwrap().clone()
    }
}

impl ResultStorePort for RecordingStore {
    fn save(&self, summary: &RunSummary) -> Result<(), GridError> {
        if self.fail {
            return Err(GridError::Database {
                reason: "database is locked".to_string(),
            });
        }
        self.rows.lock().unwrap().push(summary.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportCall {
    pub fund_code: String,
    pub period: String,
    pub operations: usize,
}

#[derive(Default)]
pub struct RecordingReport {
    pub calls: Mutex<Vec<ReportCall>>,
}

impl RecordingReport {
    pub fn calls(&self) -> Vec<ReportCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl ReportPort for RecordingReport {
    fn write(&self, ctx: &ReportContext<'_>) -> Result<(), GridError> {
        self.calls.lock().unwrap().push(ReportCall {
            fund_code: ctx.fund_code.to_string(),
            period: ctx.outcome.period.code(),
            operations: ctx.outcome.result.operations.len(),
        });
        Ok(())
    }
}
