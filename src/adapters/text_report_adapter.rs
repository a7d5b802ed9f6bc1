//! Plain-text report adapter implementing ReportPort.
//!
//! Writes `<dir>/<code>_<period>_report.txt`: a run header, the final
//! valuation and one block per trade operation in creation order.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::FixedOffset;

use crate::adapters::csv_adapter::format_date;
use crate::domain::config_validation::resolve_utc_offset;
use crate::domain::error::GridError;
use crate::domain::operation::TradeOperation;
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::{ReportContext, ReportPort};

pub const DEFAULT_REPORT_DIR: &str = "report";

const OPERATIONS_RULE: &str =
    "================================== trade operations ==================================";
const BLOCK_RULE: &str = "----------------------------------------------------------";

pub struct TextReportAdapter {
    dir: PathBuf,
    offset: FixedOffset,
}

impl TextReportAdapter {
    pub fn new(dir: impl Into<PathBuf>, offset: FixedOffset) -> Self {
        Self {
            dir: dir.into(),
            offset,
        }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, GridError> {
        let dir = config
            .get_string("report", "dir")
            .unwrap_or_else(|| DEFAULT_REPORT_DIR.to_string());
        Ok(Self::new(dir, resolve_utc_offset(config)?))
    }

    pub fn report_path(&self, fund_code: &str, period_code: &str) -> PathBuf {
        report_path(&self.dir, fund_code, period_code)
    }
}

fn report_path(dir: &Path, fund_code: &str, period_code: &str) -> PathBuf {
    // `until:YYYY-MM-DD` contains a colon, which is not portable in file names.
    let period = period_code.replace(':', "-");
    dir.join(format!("{}_{}_report.txt", fund_code, period))
}

fn format_operation(op: &TradeOperation, offset: FixedOffset) -> String {
    let sell_time = op
        .sell_timestamp
        .map(|ts| format_date(ts, offset))
        .unwrap_or_else(|| "not yet".to_string());
    let sell_price = op
        .sell_price
        .map(|p| format!("{:.4}", p))
        .unwrap_or_else(|| "-".to_string());

    format!(
        "Buy Time: {},    Price: {:.4},    Tier: {},    Status: {}\n\
         Sell Time: {},    Price: {}\n\
         {}\n",
        format_date(op.buy_timestamp, offset),
        op.buy_price,
        op.tier,
        op.status,
        sell_time,
        sell_price,
        BLOCK_RULE,
    )
}

/// Renders the full report text.
pub fn render(ctx: &ReportContext<'_>, offset: FixedOffset) -> String {
    let params = ctx.params;
    let outcome = ctx.outcome;
    let result = &outcome.result;
    let account = &result.account;

    let mut out = String::new();
    out.push_str(&format!(
        "SUM: {:.2}  Amount: {:.2}  Grid Size: {}  Big Grid Size: {}  Factor: {}\n",
        params.initial_balance, params.amount, params.grid_size, params.big_grid_size, params.factor
    ));
    out.push_str(&format!(
        "Holdings Value: {:.2}(holds {:.4} at price {:.4})  Balance: {:.2}  Total Value: {:.2}\n",
        result.holdings_value(),
        account.holdings,
        result.latest_price,
        account.balance,
        result.total_value()
    ));
    out.push_str(
        "PS: If Total Value (Holdings Value + Balance) < SUM, that shows you lost money at this moment!!!\n",
    );
    out.push_str(&format!("Profit: {:.2}  Loss\n", account.realized_profit));
    out.push_str(&format!("Lowest Balance: {:.2}\n", account.lowest_balance_seen));
    out.push_str(&format!(
        "Thresholds: high {:.4}  low {:.4}\n",
        outcome.thresholds.high, outcome.thresholds.low
    ));
    out.push_str(&format!(
        "Window: {} to {}\n\n",
        format_date(outcome.window_start, offset),
        format_date(outcome.window_end, offset)
    ));
    out.push_str(&format!(
        "dealed trade: {}  not dealed trade: {}  skipped: {}\n",
        result.dealt_count(),
        result.not_dealt_count(),
        result.skipped_count()
    ));
    out.push_str(OPERATIONS_RULE);
    out.push('\n');

    for op in &result.operations {
        out.push_str(&format_operation(op, offset));
    }

    out
}

impl ReportPort for TextReportAdapter {
    fn write(&self, ctx: &ReportContext<'_>) -> Result<(), GridError> {
        let path = self.report_path(ctx.fund_code, &ctx.outcome.period.code());
        let text = render(ctx, self.offset);

        let report_err = |e: std::io::Error| GridError::Report {
            path: path.display().to_string(),
            reason: e.to_string(),
        };
        fs::create_dir_all(&self.dir).map_err(report_err)?;
        fs::write(&path, text).map_err(report_err)?;

        Ok(())
    }
}
