//! Cash and position state of a single simulation run.

#[derive(Debug, Clone, PartialEq)]
pub struct AccountState {
    pub balance: f64,
    pub holdings: f64,
    pub lowest_balance_seen: f64,
    pub realized_profit: f64,
}

impl AccountState {
    pub fn new(initial_balance: f64) -> Self {
        AccountState {
            balance: initial_balance,
            holdings: 0.0,
            lowest_balance_seen: initial_balance,
            realized_profit: 0.0,
        }
    }

    pub fn can_afford(&self, notional: f64) -> bool {
        self.balance >= notional
    }

    /// Spends `notional` on `notional / price` units.
    pub fn buy(&mut self, notional: f64, price: f64) {
        self.balance -= notional;
        self.holdings += notional / price;
        self.lowest_balance_seen = self.lowest_balance_seen.min(self.balance);
    }

    /// Sells `units` that cost `notional`; returns the profit booked.
    pub fn sell(&mut self, units: f64, notional: f64, price: f64) -> f64 {
        let proceeds = units * price;
        let profit = proceeds - notional;
        self.balance += proceeds;
        self.holdings -= units;
        self.realized_profit += profit;
        profit
    }

    pub fn holdings_value(&self, price: f64) -> f64 {
        self.holdings * price
    }

    pub fn total_value(&self, price: f64) -> f64 {
        self.holdings_value(price) + self.balance
    }
}
