//! Port traits at the boundaries of the backtest core.

pub mod config_port;
pub mod price_source_port;
pub mod report_port;
pub mod result_store_port;
