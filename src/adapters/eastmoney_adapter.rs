//! Eastmoney fund data adapter.
//!
//! `pingzhongdata/<code>.js` is a JavaScript file assigning many `var`s; the
//! net worth history is the JSON array assigned to `Data_netWorthTrend`.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::domain::error::GridError;
use crate::domain::price_series::{PricePoint, PriceSeries};
use crate::ports::config_port::ConfigPort;
use crate::ports::price_source_port::PriceSourcePort;

pub const DEFAULT_BASE_URL: &str = "http://fund.eastmoney.com/pingzhongdata";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const NET_WORTH_MARKER: &str = "var Data_netWorthTrend = ";

#[derive(Debug, Deserialize)]
struct NetWorthEntry {
    /// Milliseconds since the epoch.
    x: i64,
    y: f64,
}

pub struct EastmoneyAdapter {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl EastmoneyAdapter {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GridError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GridError::invalid("source", "kind", format!("http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, GridError> {
        let base_url = config
            .get_string("source", "base_url")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout_secs = config.get_int("source", "timeout_secs", DEFAULT_TIMEOUT_SECS as i64);
        if timeout_secs < 1 {
            return Err(GridError::invalid(
                "source",
                "timeout_secs",
                format!("must be at least 1, got {}", timeout_secs),
            ));
        }
        Self::new(&base_url, Duration::from_secs(timeout_secs as u64))
    }

    pub fn url_for(&self, code: &str) -> String {
        format!("{}/{}.js", self.base_url, code)
    }
}

/// Extracts the net worth series from a `pingzhongdata` script body.
pub fn parse_net_worth_payload(code: &str, body: &str) -> Result<PriceSeries, GridError> {
    let malformed = |reason: String| GridError::MalformedSource {
        code: code.to_string(),
        reason,
    };

    let after_marker = body
        .find(NET_WORTH_MARKER)
        .map(|i| &body[i + NET_WORTH_MARKER.len()..])
        .ok_or_else(|| malformed("Data_netWorthTrend not found".into()))?;
    let open = after_marker
        .find('[')
        .ok_or_else(|| malformed("Data_netWorthTrend has no array".into()))?;
    let close = after_marker[open..]
        .find("];")
        .ok_or_else(|| malformed("Data_netWorthTrend array is not terminated".into()))?;
    let array = &after_marker[open..=open + close];

    let entries: Vec<NetWorthEntry> = serde_json::from_str(array)
        .map_err(|e| malformed(format!("Data_netWorthTrend: {}", e)))?;

    if entries.is_empty() {
        return Err(GridError::SourceUnavailable {
            code: code.to_string(),
            reason: "empty net worth history".into(),
        });
    }

    let points = entries
        .into_iter()
        .map(|entry| PricePoint::new(entry.x / 1000, entry.y))
        .collect();
    PriceSeries::from_points(code, points)
}

impl PriceSourcePort for EastmoneyAdapter {
    fn fetch_series(&self, code: &str) -> Result<PriceSeries, GridError> {
        let url = self.url_for(code);
        debug!(code, %url, "fetching");

        let unavailable = |reason: String| GridError::SourceUnavailable {
            code: code.to_string(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(unavailable(format!("HTTP status {}", response.status())));
        }

        let body = response.text().map_err(|e| unavailable(e.to_string()))?;
        let series = parse_net_worth_payload(code, &body)?;
        debug!(code, points = series.len(), "fetched");
        Ok(series)
    }
}
