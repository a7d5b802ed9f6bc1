//! Grid strategy parameters.

/// Parameters for one backtest run. Loaded once and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParameters {
    /// Fractional step for normal-tier buys/sells and big-tier buys.
    pub grid_size: f64,
    /// Fractional step for big-tier sells.
    pub big_grid_size: f64,
    /// Big-tier position multiplier applied to `amount`.
    pub factor: f64,
    /// Base order notional.
    pub amount: f64,
    pub initial_balance: f64,
    pub threshold_low_fraction: f64,
    pub threshold_high_fraction: f64,
}

impl StrategyParameters {
    pub fn big_amount(&self) -> f64 {
        self.amount * self.factor
    }
}

impl Default for StrategyParameters {
    fn default() -> Self {
        StrategyParameters {
            grid_size: 0.05,
            big_grid_size: 0.1,
            factor: 2.0,
            amount: 1000.0,
            initial_balance: 10_000.0,
            threshold_low_fraction: 0.3,
            threshold_high_fraction: 0.7,
        }
    }
}
