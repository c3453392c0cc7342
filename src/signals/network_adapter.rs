//! Network-polled `SignalAdapter`: fetches and ranks remote producers (e.g.
//! a distributed-network/Bittensor subnet) on their own cadence, decoupled
//! from the per-cycle fetch path. Grounded on `BinancePriceFeed`
//! (`scrapers/binance_price_feed.rs`): a background task owns the poll loop
//! and publishes into a shared latest-view; readers never poll the network
//! themselves.

use crate::config::NETWORK_ADAPTER_POLL_INTERVAL;
use crate::model::{CanonicalSignal, CanonicalSymbol, SourceId};
use crate::signals::adapter::SignalAdapter;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One producer's reported view of a symbol, as returned by the network
/// endpoint, before ranking/aggregation.
#[derive(Debug, Clone, Deserialize)]
pub struct ProducerReport {
    pub producer_id: String,
    pub symbol: String,
    pub depth: f64,
    pub price: f64,
    /// Stake/weight/trust score used to rank producers; higher wins ties and
    /// receives a proportionally larger share of the blended depth.
    pub rank_score: f64,
}

#[derive(Debug, Default)]
struct LatestView {
    by_symbol: HashMap<CanonicalSymbol, CanonicalSignal>,
}

/// Aggregates per-symbol producer reports into one signal per symbol, using
/// `rank_score` as a weight. A symbol with zero total rank score is skipped
/// (no reliable producer for it this poll).
fn aggregate(source: &SourceId, reports: Vec<ProducerReport>, mapper: &dyn Fn(&str) -> Option<CanonicalSymbol>) -> HashMap<CanonicalSymbol, CanonicalSignal> {
    let mut by_symbol: HashMap<String, Vec<ProducerReport>> = HashMap::new();
    for report in reports {
        by_symbol.entry(report.symbol.clone()).or_default().push(report);
    }

    let mut out = HashMap::new();
    for (symbol, reports) in by_symbol {
        let Some(canonical) = mapper(&symbol) else {
            debug!(source = %source, symbol = %symbol, "no asset mapping for network producer symbol");
            continue;
        };
        let total_rank: f64 = reports.iter().map(|r| r.rank_score.max(0.0)).sum();
        if total_rank <= 0.0 {
            continue;
        }
        let depth = reports
            .iter()
            .map(|r| r.depth * (r.rank_score.max(0.0) / total_rank))
            .sum::<f64>();
        let price = reports
            .iter()
            .max_by(|a, b| a.rank_score.total_cmp(&b.rank_score))
            .map(|r| r.price)
            .unwrap_or(0.0);
        out.insert(
            canonical.clone(),
            CanonicalSignal {
                symbol: canonical,
                source: source.clone(),
                depth: depth.clamp(-1.0, 1.0),
                price,
                timestamp: chrono::Utc::now(),
                leverage: None,
            },
        );
    }
    out
}

pub struct NetworkSignalAdapter {
    source: SourceId,
    view: Arc<RwLock<LatestView>>,
}

impl NetworkSignalAdapter {
    /// Spawns the background poll loop and returns an adapter reading from
    /// it. `fetch_reports` performs the actual network call (injected so
    /// tests don't need a live endpoint); `map_symbol` is the asset mapper's
    /// forward lookup for this source.
    pub fn spawn<F, M>(source: SourceId, mut fetch_reports: F, map_symbol: M) -> Self
    where
        F: FnMut() -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<Vec<ProducerReport>>> + Send>>
            + Send
            + 'static,
        M: Fn(&str) -> Option<CanonicalSymbol> + Send + Sync + 'static,
    {
        let view = Arc::new(RwLock::new(LatestView::default()));
        let task_view = view.clone();
        let task_source = source.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(NETWORK_ADAPTER_POLL_INTERVAL);
            loop {
                interval.tick().await;
                match fetch_reports().await {
                    Ok(reports) => {
                        let aggregated = aggregate(&task_source, reports, &map_symbol);
                        *task_view.write() = LatestView { by_symbol: aggregated };
                    }
                    Err(e) => {
                        warn!(source = %task_source, error = %e, "network producer poll failed, keeping last view");
                    }
                }
            }
        });
        Self { source, view }
    }

    #[cfg(test)]
    fn for_test(source: SourceId) -> (Self, Arc<RwLock<LatestView>>) {
        let view = Arc::new(RwLock::new(LatestView::default()));
        (Self { source, view: view.clone() }, view)
    }
}

#[async_trait]
impl SignalAdapter for NetworkSignalAdapter {
    async fn fetch_current(&self) -> Vec<CanonicalSignal> {
        self.view.read().by_symbol.values().cloned().collect()
    }

    fn source_id(&self) -> &SourceId {
        &self.source
    }
}

/// Polling interval is asserted here, not enforced at call sites, since it
/// governs a background task rather than `fetch_current` itself.
pub const _POLL_INTERVAL: Duration = NETWORK_ADAPTER_POLL_INTERVAL;
