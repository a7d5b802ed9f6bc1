//! Dual-tier grid backtest engine.
//!
//! Walks a price window in timestamp order. On every point exactly one of
//! four triggers may fire, checked in this order:
//!
//! 1. normal buy: `base * (1 - grid_size) >= price` and `low <= price < high`
//! 2. big buy: `big_base * (1 - grid_size) >= price` and `price < low`
//! 3. normal sell: `base * (1 + grid_size) <= price`
//! 4. big sell: `big_base * (1 + big_grid_size) <= price`
//!
//! A buy that cannot be funded is recorded as skipped and leaves the base
//! price where it was, so the same trigger can fire again on the next point.

use tracing::debug;

use crate::domain::account::AccountState;
use crate::domain::operation::{OperationStatus, Tier, TradeOperation};
use crate::domain::price_series::PricePoint;
use crate::domain::strategy::StrategyParameters;
use crate::domain::thresholds::Thresholds;

/// Final state of one engine run.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRunResult {
    pub account: AccountState,
    /// Every operation in creation order, including skipped ones.
    pub operations: Vec<TradeOperation>,
    /// Price of the last point in the window.
    pub latest_price: f64,
}

impl GridRunResult {
    pub fn holdings_value(&self) -> f64 {
        self.account.holdings_value(self.latest_price)
    }

    pub fn total_value(&self) -> f64 {
        self.account.total_value(self.latest_price)
    }

    fn count_status(&self, status: OperationStatus) -> usize {
        self.operations.iter().filter(|op| op.status == status).count()
    }

    pub fn dealt_count(&self) -> usize {
        self.count_status(OperationStatus::Filled)
    }

    /// Operations that never closed: still open or skipped.
    pub fn not_dealt_count(&self) -> usize {
        self.operations.len() - self.dealt_count()
    }

    pub fn skipped_count(&self) -> usize {
        self.count_status(OperationStatus::Skipped)
    }

    pub fn open_count(&self) -> usize {
        self.count_status(OperationStatus::Open)
    }
}

struct GridState<'a> {
    params: &'a StrategyParameters,
    account: AccountState,
    base_price: f64,
    big_base_price: f64,
    operations: Vec<TradeOperation>,
}

impl<'a> GridState<'a> {
    fn new(params: &'a StrategyParameters, first_price: f64) -> Self {
        GridState {
            params,
            account: AccountState::new(params.initial_balance),
            base_price: first_price,
            big_base_price: first_price,
            operations: Vec::new(),
        }
    }

    fn notional(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Normal => self.params.amount,
            Tier::Big => self.params.big_amount(),
        }
    }

    fn sell_step(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Normal => self.params.grid_size,
            Tier::Big => self.params.big_grid_size,
        }
    }

    fn base_mut(&mut self, tier: Tier) -> &mut f64 {
        match tier {
            Tier::Normal => &mut self.base_price,
            Tier::Big => &mut self.big_base_price,
        }
    }

    fn buy(&mut self, tier: Tier, timestamp: i64, price: f64) {
        let notional = self.notional(tier);
        if !self.account.can_afford(notional) {
            debug!(%tier, timestamp, price, balance = self.account.balance, "buy skipped");
            self.operations
                .push(TradeOperation::skipped(tier, timestamp, price));
            return;
        }

        self.account.buy(notional, price);
        *self.base_mut(tier) = price;
        self.operations
            .push(TradeOperation::open(tier, timestamp, price));
        debug!(%tier, timestamp, price, balance = self.account.balance, "buy");
    }

    fn sell(&mut self, tier: Tier, timestamp: i64, price: f64) {
        *self.base_mut(tier) = price;

        let notional = self.notional(tier);
        let step = self.sell_step(tier);
        for op in self
            .operations
            .iter_mut()
            .filter(|op| op.tier == tier && op.is_open())
        {
            if op.buy_price * (1.0 + step) > price {
                continue;
            }
            op.close(timestamp, price);
            let profit = self.account.sell(op.units(notional), notional, price);
            debug!(%tier, timestamp, price, buy_price = op.buy_price, profit, "sell");
        }
    }

    fn step(&mut self, point: &PricePoint, thresholds: &Thresholds) {
        let PricePoint { timestamp, price } = *point;
        let grid = self.params.grid_size;

        if self.base_price * (1.0 - grid) >= price && thresholds.in_normal_band(price) {
            self.buy(Tier::Normal, timestamp, price);
        } else if self.big_base_price * (1.0 - grid) >= price && thresholds.below_band(price) {
            self.buy(Tier::Big, timestamp, price);
        } else if self.base_price * (1.0 + grid) <= price {
            self.sell(Tier::Normal, timestamp, price);
        } else if self.big_base_price * (1.0 + self.params.big_grid_size) <= price {
            self.sell(Tier::Big, timestamp, price);
        }
    }
}

/// Runs the grid strategy over `points`, which must be in ascending timestamp order.
///
/// An empty slice yields the untouched initial account and `latest_price` 0.
pub fn run_grid_backtest(
    points: &[PricePoint],
    thresholds: &Thresholds,
    params: &StrategyParameters,
) -> GridRunResult {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return GridRunResult {
            account: AccountState::new(params.initial_balance),
            operations: Vec::new(),
            latest_price: 0.0,
        };
    };

    let mut state = GridState::new(params, first.price);
    for point in points {
        state.step(point, thresholds);
    }

    GridRunResult {
        account: state.account,
        operations: state.operations,
        latest_price: last.price,
    }
}
