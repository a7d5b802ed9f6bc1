//! Persisted per-run summary record.

use crate::domain::runner::PeriodOutcome;

/// Rounds half away from zero to two decimals.
pub fn round_to_two(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One stored row per fund x period. Field order and meaning match the
/// `TB_FUND` table.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub fund_code: String,
    pub period: String,
    pub total_value: f64,
    pub balance: f64,
    pub holdings_value: f64,
    pub profit: f64,
    /// Always zero; the column is kept for compatibility.
    pub loss: f64,
    pub percentile_70_price: f64,
    pub percentile_30_price: f64,
    pub operation_id: i64,
}

impl RunSummary {
    pub fn from_outcome(fund_code: &str, outcome: &PeriodOutcome, operation_id: i64) -> Self {
        let result = &outcome.result;
        RunSummary {
            fund_code: fund_code.to_string(),
            period: outcome.period.code(),
            total_value: round_to_two(result.total_value()),
            balance: round_to_two(result.account.balance),
            holdings_value: round_to_two(result.holdings_value()),
            profit: round_to_two(result.account.realized_profit),
            loss: 0.0,
            percentile_70_price: round_to_two(outcome.thresholds.high),
            percentile_30_price: round_to_two(outcome.thresholds.low),
            operation_id,
        }
    }
}
