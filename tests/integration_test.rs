//! Integration tests for the fund runner.
//!
//! Tests cover:
//! - Fetch failures and empty windows skip only their own unit of work
//! - The worker pool never exceeds its in-flight bound and reports in input order
//! - Report and store sinks receive every completed period
//! - End-to-end run into an in-memory SQLite store and text reports on disk

mod common;

use chrono::{FixedOffset, Offset, Utc};
use common::*;
use gridtrader::domain::error::GridError;
use gridtrader::domain::period::{Period, parse_period};
use gridtrader::domain::price_series::PriceSeries;
use gridtrader::domain::runner::{Sinks, run_instrument, run_period, run_universe};
use gridtrader::domain::summary::RunSummary;
use std::time::Duration;

fn codes(list: &[&str]) -> Vec<String> {
    list.iter().map(|c| c.to_string()).collect()
}

mod runner_isolation {
    use super::*;

    #[test]
    fn fetch_failure_skips_only_that_fund() {
        let source = MockPriceSource::new()
            .with_error("000001", "connection reset")
            .with_prices("004997", &wave_prices(120));
        let periods = [Period::Last3Months, Period::SinceEstablished];

        let reports = run_universe(
            &source,
            Sinks::default(),
            &codes(&["000001", "004997"]),
            &periods,
            &sample_params(),
            2,
            0,
        );

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].code, "000001");
        assert!(reports[0].fetch_error.as_ref().unwrap().is_source_failure());
        assert!(reports[0].periods.is_empty());

        assert_eq!(reports[1].code, "004997");
        assert!(reports[1].fetch_error.is_none());
        assert_eq!(reports[1].completed().count(), 2);
    }

    #[test]
    fn malformed_payload_is_a_source_failure() {
        let source = MockPriceSource::new().with_malformed("161725");
        let report = run_instrument(
            &source,
            Sinks::default(),
            "161725",
            &Period::STANDARD,
            &sample_params(),
            0,
        );
        assert!(matches!(
            report.fetch_error,
            Some(GridError::MalformedSource { .. })
        ));
        assert!(report.periods.is_empty());
    }

    #[test]
    fn empty_series_is_unavailable() {
        let source = MockPriceSource::new().with_series("510300", PriceSeries::default());
        let report = run_instrument(
            &source,
            Sinks::default(),
            "510300",
            &[Period::SinceEstablished],
            &sample_params(),
            0,
        );
        assert!(matches!(
            report.fetch_error,
            Some(GridError::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn empty_window_skips_only_that_period() {
        let source = MockPriceSource::new().with_prices("004997", &wave_prices(30));
        let before_data = parse_period("until:2023-12-01", Utc.fix()).unwrap();
        let store = RecordingStore::default();

        let report = run_instrument(
            &source,
            Sinks {
                report: None,
                store: Some(&store),
            },
            "004997",
            &[before_data, Period::SinceEstablished],
            &sample_params(),
            0,
        );

        assert_eq!(report.periods.len(), 2);
        assert!(matches!(
            report.periods[0].result,
            Err(GridError::EmptyWindow { .. })
        ));
        assert!(report.periods[1].result.is_ok());
        assert_eq!(report.failed_periods(), 1);
        assert_eq!(store.rows().len(), 1);
        assert_eq!(store.rows()[0].period, "5");
    }

    #[test]
    fn until_cutoff_excludes_the_cutoff_day() {
        // DAY0 is 2024-01-01T00:00Z; cutoff 2024-01-04 keeps days 0..3.
        let series = daily_series("004997", &wave_prices(10));
        let cutoff = parse_period("until:2024-01-04", Utc.fix()).unwrap();
        let outcome = run_period(&series, cutoff, &sample_params()).unwrap();
        assert_eq!(outcome.start_index, 0);
        assert_eq!(outcome.end_index, 3);
    }
}

mod bounded_pool {
    use super::*;

    fn many_codes(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{:06}", 100_000 + i)).collect()
    }

    fn source_for(codes: &[String]) -> MockPriceSource {
        let prices = wave_prices(60);
        codes
            .iter()
            .fold(MockPriceSource::new(), |src, code| src.with_prices(code, &prices))
            .with_delay(Duration::from_millis(15))
    }

    #[test]
    fn never_exceeds_max_in_flight() {
        let codes = many_codes(12);
        let source = source_for(&codes);

        let reports = run_universe(
            &source,
            Sinks::default(),
            &codes,
            &[Period::SinceEstablished],
            &sample_params(),
            3,
            0,
        );

        assert_eq!(reports.len(), 12);
        assert!(source.max_observed_in_flight() <= 3);
        assert!(source.max_observed_in_flight() >= 1);
    }

    #[test]
    fn reports_follow_input_order() {
        let codes = many_codes(9);
        let source = source_for(&codes);

        let reports = run_universe(
            &source,
            Sinks::default(),
            &codes,
            &[Period::SinceEstablished],
            &sample_params(),
            4,
            0,
        );

        let order: Vec<String> = reports.iter().map(|r| r.code.clone()).collect();
        assert_eq!(order, codes);
    }

    #[test]
    fn single_slot_admits_in_fifo_order() {
        let codes = many_codes(5);
        let source = source_for(&codes);

        run_universe(
            &source,
            Sinks::default(),
            &codes,
            &[Period::SinceEstablished],
            &sample_params(),
            1,
            0,
        );

        assert_eq!(source.fetched_codes(), codes);
        assert_eq!(source.max_observed_in_flight(), 1);
    }

    #[test]
    fn zero_bound_runs_one_at_a_time() {
        let codes = many_codes(3);
        let source = source_for(&codes);

        let reports = run_universe(
            &source,
            Sinks::default(),
            &codes,
            &[Period::SinceEstablished],
            &sample_params(),
            0,
            0,
        );

        assert_eq!(reports.len(), 3);
        assert_eq!(source.max_observed_in_flight(), 1);
    }

    #[test]
    fn worker_panic_fails_only_that_fund() {
        let codes = many_codes(5);
        let source = source_for(&codes).with_panic(&codes[2]);

        let reports = run_universe(
            &source,
            Sinks::default(),
            &codes,
            &[Period::SinceEstablished],
            &sample_params(),
            2,
            0,
        );

        let order: Vec<String> = reports.iter().map(|r| r.code.clone()).collect();
        assert_eq!(order, codes);
        assert!(matches!(
            reports[2].fetch_error,
            Some(GridError::WorkerPanicked { ref code }) if code == &codes[2]
        ));
        assert!(reports[2].periods.is_empty());
        for (i, report) in reports.iter().enumerate().filter(|(i, _)| *i != 2) {
            assert!(report.fetch_error.is_none(), "fund {i} failed");
            assert_eq!(report.completed().count(), 1);
        }
    }

    #[test]
    fn concurrent_runs_match_sequential_runs() {
        let codes = many_codes(6);
        let source = source_for(&codes);
        let periods = [Period::Last3Months, Period::SinceEstablished];

        let parallel = run_universe(
            &source,
            Sinks::default(),
            &codes,
            &periods,
            &sample_params(),
            6,
            0,
        );
        let sequential = run_universe(
            &source,
            Sinks::default(),
            &codes,
            &periods,
            &sample_params(),
            1,
            0,
        );

        for (a, b) in parallel.iter().zip(&sequential) {
            let a: Vec<&RunSummary> = a.completed().collect();
            let b: Vec<&RunSummary> = b.completed().collect();
            assert_eq!(a, b);
        }
    }
}

mod sinks {
    use super::*;

    #[test]
    fn every_completed_period_is_reported_and_stored() {
        let source = MockPriceSource::new()
            .with_prices("004997", &wave_prices(200))
            .with_prices("161725", &wave_prices(150));
        let store = RecordingStore::default();
        let report = RecordingReport::default();
        let periods = [Period::Last3Months, Period::Last6Months];

        let reports = run_universe(
            &source,
            Sinks {
                report: Some(&report),
                store: Some(&store),
            },
            &codes(&["004997", "161725"]),
            &periods,
            &sample_params(),
            2,
            42,
        );

        assert!(reports.iter().all(|r| r.failed_periods() == 0));
        let rows = store.rows();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.operation_id == 42));
        assert!(rows.iter().all(|r| r.loss == 0.0));

        let calls = report.calls();
        assert_eq!(calls.len(), 4);
        let mut keys: Vec<(String, String)> = calls
            .iter()
            .map(|c| (c.fund_code.clone(), c.period.clone()))
            .collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                ("004997".to_string(), "0".to_string()),
                ("004997".to_string(), "1".to_string()),
                ("161725".to_string(), "0".to_string()),
                ("161725".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn store_failure_keeps_the_result() {
        let source = MockPriceSource::new().with_prices("004997", &wave_prices(50));
        let store = RecordingStore::failing();

        let report = run_instrument(
            &source,
            Sinks {
                report: None,
                store: Some(&store),
            },
            "004997",
            &[Period::SinceEstablished],
            &sample_params(),
            0,
        );

        assert_eq!(report.periods.len(), 1);
        assert!(report.periods[0].result.is_ok());
        assert_eq!(report.periods[0].sink_errors.len(), 1);
        assert!(matches!(
            report.periods[0].sink_errors[0],
            GridError::Database { .. }
        ));
    }
}

mod summary_values {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn stored_values_are_rounded_outcome_values() {
        let prices = wave_prices(300);
        let series = daily_series("004997", &prices);
        let params = sample_params();
        let outcome = run_period(&series, Period::Last6Months, &params).unwrap();
        let summary = RunSummary::from_outcome("004997", &outcome, 1);

        assert_abs_diff_eq!(summary.balance, outcome.result.account.balance, epsilon = 0.005);
        assert_abs_diff_eq!(
            summary.total_value,
            outcome.result.total_value(),
            epsilon = 0.005
        );
        assert_abs_diff_eq!(
            summary.total_value,
            summary.balance + summary.holdings_value,
            epsilon = 0.011
        );
        assert_eq!(summary.percentile_70_price, (outcome.thresholds.high * 100.0).round() / 100.0);
        assert_eq!(summary.percentile_30_price, (outcome.thresholds.low * 100.0).round() / 100.0);
    }
}

#[cfg(feature = "sqlite")]
mod end_to_end {
    use super::*;
    use gridtrader::adapters::sqlite_adapter::SqliteAdapter;
    use gridtrader::adapters::text_report_adapter::TextReportAdapter;
    use std::fs;

    #[test]
    fn universe_into_sqlite_and_reports() {
        let dir = tempfile::TempDir::new().unwrap();
        let report_dir = dir.path().join("report");
        let reports = TextReportAdapter::new(&report_dir, FixedOffset::east_opt(8 * 3600).unwrap());
        let store = SqliteAdapter::in_memory().unwrap();
        store.initialize_schema().unwrap();

        let source = MockPriceSource::new()
            .with_prices("004997", &wave_prices(400))
            .with_error("999999", "HTTP status 404 Not Found");

        let results = run_universe(
            &source,
            Sinks {
                report: Some(&reports),
                store: Some(&store),
            },
            &codes(&["004997", "999999"]),
            &Period::STANDARD,
            &sample_params(),
            2,
            7,
        );

        assert_eq!(results[0].completed().count(), 6);
        assert!(results[1].fetch_error.is_some());

        let rows = store.load_summaries("004997").unwrap();
        assert_eq!(rows.len(), 6);
        let mut periods: Vec<String> = rows.iter().map(|r| r.period.clone()).collect();
        periods.sort();
        assert_eq!(periods, vec!["0", "1", "2", "3", "4", "5"]);
        assert!(store.load_summaries("999999").unwrap().is_empty());

        for row in &rows {
            let expected = results[0]
                .completed()
                .find(|s| s.period == row.period)
                .unwrap();
            assert_eq!(row, expected);

            let path = report_dir.join(format!("004997_{}_report.txt", row.period));
            let text = fs::read_to_string(&path).unwrap();
            assert!(text.starts_with("SUM: 10000.00  Amount: 100.00"));
            assert!(text.contains("trade operations"));
        }
    }
}
