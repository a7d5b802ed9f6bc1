//! Percentile price bands gating grid buys.

use crate::domain::error::GridError;
use crate::domain::price_series::PriceSeries;

/// Static `[low, high]` band derived once per simulation window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub high: f64,
    pub low: f64,
}

impl Thresholds {
    /// Normal-tier buys are allowed in `low <= price < high`.
    pub fn in_normal_band(&self, price: f64) -> bool {
        self.low <= price && price < self.high
    }

    /// Big-tier buys are allowed strictly below `low`.
    pub fn below_band(&self, price: f64) -> bool {
        price < self.low
    }
}

/// Rank of the `fraction` percentile among `n` sorted values, clamped to `n - 1`.
fn percentile_index(n: usize, fraction: f64) -> usize {
    let raw = (n as f64 * fraction).floor();
    // Negative and NaN products saturate to 0 in the cast.
    (raw as usize).min(n - 1)
}

/// Computes the bands over the prices in `[start, end)`.
pub fn compute_thresholds(
    series: &PriceSeries,
    start: usize,
    end: usize,
    low_fraction: f64,
    high_fraction: f64,
) -> Result<Thresholds, GridError> {
    let mut prices: Vec<f64> = series.window(start, end).iter().map(|p| p.price).collect();
    if prices.is_empty() {
        return Err(GridError::EmptyWindow {
            period: format!("[{start}, {end})"),
        });
    }
    prices.sort_by(f64::total_cmp);

    let n = prices.len();
    Ok(Thresholds {
        high: prices[percentile_index(n, high_fraction)],
        low: prices[percentile_index(n, low_fraction)],
    })
}
