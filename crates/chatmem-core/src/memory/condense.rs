//! The condensation collaborator seam.

use async_trait::async_trait;

use super::error::{MemoryError, Result};
use super::exchange::Exchange;

/// Folds one exchange into a running summary.
///
/// Called without any session lock held; implementations may be slow or
/// fail. A failure leaves the exchange raw and is retried on a later append.
#[async_trait]
pub trait Condenser: Send + Sync {
    /// Return the new summary after folding `exchange` into `summary`.
    async fn condense(&self, summary: &str, exchange: &Exchange) -> Result<String>;
}

/// Condenser used when no model is configured. Always fails, so summary
/// strategies retain everything raw.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCondenser;

#[async_trait]
impl Condenser for NoopCondenser {
    async fn condense(&self, _summary: &str, _exchange: &Exchange) -> Result<String> {
        Err(MemoryError::CondenseFailed(
            "no condenser configured".to_string(),
        ))
    }
}
