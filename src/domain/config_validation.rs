//! Configuration validation.
//!
//! Validates every config field before a run starts and builds the
//! immutable run inputs from it.

use crate::domain::error::GridError;
use crate::domain::runner::DEFAULT_MAX_IN_FLIGHT;
use crate::domain::strategy::StrategyParameters;
use crate::domain::universe::{Universe, load_universe};
use crate::ports::config_port::ConfigPort;
use chrono::FixedOffset;

pub const DEFAULT_UTC_OFFSET_HOURS: i64 = 8;

/// Everything a backtest run needs from config.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub params: StrategyParameters,
    pub universe: Universe,
    pub max_in_flight: usize,
    pub offset: FixedOffset,
}

pub fn load_run_config(config: &dyn ConfigPort) -> Result<RunConfig, GridError> {
    let params = build_strategy_parameters(config)?;
    let offset = resolve_utc_offset(config)?;
    let universe = load_universe(config, offset)?;
    let max_in_flight = resolve_max_in_flight(config)?;

    Ok(RunConfig {
        params,
        universe,
        max_in_flight,
        offset,
    })
}

/// Reads `[strategy]` into validated parameters.
///
/// Missing keys take the defaults of [`StrategyParameters`]; `sum` is the
/// initial balance.
pub fn build_strategy_parameters(config: &dyn ConfigPort) -> Result<StrategyParameters, GridError> {
    let defaults = StrategyParameters::default();
    let params = StrategyParameters {
        grid_size: config.get_double("strategy", "grid_size", defaults.grid_size),
        big_grid_size: config.get_double("strategy", "big_grid_size", defaults.big_grid_size),
        factor: config.get_double("strategy", "factor", defaults.factor),
        amount: config.get_double("strategy", "amount", defaults.amount),
        initial_balance: config.get_double("strategy", "sum", defaults.initial_balance),
        threshold_low_fraction: config.get_double(
            "strategy",
            "threshold_low",
            defaults.threshold_low_fraction,
        ),
        threshold_high_fraction: config.get_double(
            "strategy",
            "threshold_high",
            defaults.threshold_high_fraction,
        ),
    };
    validate_strategy_parameters(&params)?;
    Ok(params)
}

pub fn validate_strategy_parameters(params: &StrategyParameters) -> Result<(), GridError> {
    validate_grid_size(params.grid_size)?;
    require_positive("big_grid_size", params.big_grid_size)?;
    require_positive("factor", params.factor)?;
    require_positive("amount", params.amount)?;
    require_positive("sum", params.initial_balance)?;
    validate_thresholds(params.threshold_low_fraction, params.threshold_high_fraction)?;
    Ok(())
}

fn validate_grid_size(value: f64) -> Result<(), GridError> {
    if !(value > 0.0 && value < 1.0) {
        return Err(GridError::invalid(
            "strategy",
            "grid_size",
            format!("grid_size must be between 0 and 1 (exclusive), got {}", value),
        ));
    }
    Ok(())
}

fn require_positive(key: &str, value: f64) -> Result<(), GridError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(GridError::invalid(
            "strategy",
            key,
            format!("{} must be positive, got {}", key, value),
        ));
    }
    Ok(())
}

fn validate_thresholds(low: f64, high: f64) -> Result<(), GridError> {
    if !(0.0..=1.0).contains(&low) {
        return Err(GridError::invalid(
            "strategy",
            "threshold_low",
            format!("threshold_low must be between 0 and 1, got {}", low),
        ));
    }
    if !(0.0..=1.0).contains(&high) {
        return Err(GridError::invalid(
            "strategy",
            "threshold_high",
            format!("threshold_high must be between 0 and 1, got {}", high),
        ));
    }
    if low > high {
        return Err(GridError::invalid(
            "strategy",
            "threshold_low",
            format!("threshold_low ({}) exceeds threshold_high ({})", low, high),
        ));
    }
    Ok(())
}

pub fn resolve_max_in_flight(config: &dyn ConfigPort) -> Result<usize, GridError> {
    let value = config.get_int("runner", "max_in_flight", DEFAULT_MAX_IN_FLIGHT as i64);
    if value < 1 {
        return Err(GridError::invalid(
            "runner",
            "max_in_flight",
            format!("max_in_flight must be at least 1, got {}", value),
        ));
    }
    Ok(value as usize)
}

/// Reads `[report] utc_offset_hours`, the offset used for calendar dates.
pub fn resolve_utc_offset(config: &dyn ConfigPort) -> Result<FixedOffset, GridError> {
    let hours = config.get_int("report", "utc_offset_hours", DEFAULT_UTC_OFFSET_HOURS);
    i32::try_from(hours)
        .ok()
        .and_then(|h| h.checked_mul(3600))
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| {
            GridError::invalid(
                "report",
                "utc_offset_hours",
                format!("{} is not a valid UTC offset", hours),
            )
        })
}
