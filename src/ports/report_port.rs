//! Report generation port.

use crate::domain::error::GridError;
use crate::domain::runner::PeriodOutcome;
use crate::domain::strategy::StrategyParameters;

/// Everything a report needs about one fund x period run.
pub struct ReportContext<'a> {
    pub fund_code: &'a str,
    pub params: &'a StrategyParameters,
    pub outcome: &'a PeriodOutcome,
}

/// Port for writing human-readable backtest reports.
pub trait ReportPort {
    fn write(&self, ctx: &ReportContext<'_>) -> Result<(), GridError>;
}
