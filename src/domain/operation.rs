//! Trade ledger entries.

use std::fmt;

/// Which grid governs an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Normal,
    Big,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Normal => f.write_str("Normal"),
            Tier::Big => f.write_str("Big"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationStatus {
    /// Buy fired without enough cash; no position was taken.
    Skipped,
    Open,
    Filled,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Skipped => f.write_str("Skipped"),
            OperationStatus::Open => f.write_str("Open"),
            OperationStatus::Filled => f.write_str("Filled"),
        }
    }
}

/// One buy lot and its eventual close.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOperation {
    pub buy_timestamp: i64,
    pub buy_price: f64,
    pub sell_timestamp: Option<i64>,
    pub sell_price: Option<f64>,
    pub tier: Tier,
    pub status: OperationStatus,
}

impl TradeOperation {
    pub fn open(tier: Tier, timestamp: i64, price: f64) -> Self {
        Self::new(tier, OperationStatus::Open, timestamp, price)
    }

    pub fn skipped(tier: Tier, timestamp: i64, price: f64) -> Self {
        Self::new(tier, OperationStatus::Skipped, timestamp, price)
    }

    fn new(tier: Tier, status: OperationStatus, timestamp: i64, price: f64) -> Self {
        TradeOperation {
            buy_timestamp: timestamp,
            buy_price: price,
            sell_timestamp: None,
            sell_price: None,
            tier,
            status,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == OperationStatus::Open
    }

    /// Units bought for a notional of `amount`.
    pub fn units(&self, amount: f64) -> f64 {
        amount / self.buy_price
    }

    /// Marks the operation filled. Only open operations transition.
    pub fn close(&mut self, timestamp: i64, price: f64) -> bool {
        if !self.is_open() {
            return false;
        }
        self.sell_timestamp = Some(timestamp);
        self.sell_price = Some(price);
        self.status = OperationStatus::Filled;
        true
    }
}
