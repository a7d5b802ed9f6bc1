//! Price series source port.

use crate::domain::error::GridError;
use crate::domain::price_series::PriceSeries;

pub trait PriceSourcePort {
    /// Returns the full net-asset-value history for `code`.
    ///
    /// Transport failures map to `SourceUnavailable`; payloads without the
    /// expected structure map to `MalformedSource`.
    fn fetch_series(&self, code: &str) -> Result<PriceSeries, GridError>;
}
