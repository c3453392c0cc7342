//! A uniform read-side contract across signal source kinds. Grounded on
//! `ExecutionAdapter` (`vault/execution.rs`) -- same shape of "one async
//! trait, several concrete implementations selected once at startup from
//! config".

use crate::config::ADAPTER_FETCH_TIMEOUT;
use crate::model::{CanonicalSignal, SourceId};
use async_trait::async_trait;
use tracing::warn;

#[async_trait]
pub trait SignalAdapter: Send + Sync {
    /// Returns the freshest signal per `(source, canonical symbol)`.
    /// Stateless with respect to callers.
    async fn fetch_current(&self) -> Vec<CanonicalSignal>;

    fn source_id(&self) -> &SourceId;
}

/// Wraps any `SignalAdapter` with the per-source fetch timeout: a timeout
/// yields an empty result and does NOT fail the cycle.
pub async fn fetch_with_timeout(adapter: &dyn SignalAdapter) -> Vec<CanonicalSignal> {
    match tokio::time::timeout(ADAPTER_FETCH_TIMEOUT, adapter.fetch_current()).await {
        Ok(signals) => signals,
        Err(_) => {
            warn!(source = %adapter.source_id(), millis = ADAPTER_FETCH_TIMEOUT.as_millis(), "adapter fetch timed out, yielding empty result");
            Vec::new()
        }
    }
}
