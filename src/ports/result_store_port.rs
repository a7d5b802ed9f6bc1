//! Result persistence port.

use crate::domain::error::GridError;
use crate::domain::summary::RunSummary;

/// Stores one summary row per fund x period run.
///
/// Implementations are shared by concurrently running workers.
pub trait ResultStorePort {
    fn save(&self, summary: &RunSummary) -> Result<(), GridError>;
}
