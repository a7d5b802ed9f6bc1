//! Core domain types and logic.

pub mod account;
pub mod config_validation;
pub mod error;
pub mod grid_engine;
pub mod operation;
pub mod period;
pub mod price_series;
pub mod runner;
pub mod strategy;
pub mod summary;
pub mod thresholds;
pub mod universe;
