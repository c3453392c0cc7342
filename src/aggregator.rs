//! Blends every adapter's current signals under the weight-config snapshot
//! into one `TargetDepth` per canonical symbol, then hands the
//! reconciliation engine a single clean/dirty verdict against the previous
//! cycle's cached target.
//!
//! Grounded on `other_examples/.../signal_aggregator.rs`'s
//! "per-coin weighted composite signal across collectors" shape, adapted
//! from a per-exchange price composite to a per-source depth composite.

use crate::model::{CanonicalSymbol, SourceId, TargetDepth, WeightEntry};
use crate::signals::{fetch_with_timeout, SignalAdapter};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Upper bound on the whole fetch phase across every adapter, regardless of
/// how many sources are configured -- a single slow/hanging adapter must
/// never stall the cycle past this.
pub const AGGREGATE_DEADLINE: Duration = Duration::from_secs(8);

pub struct SignalAggregator {
    adapters: Vec<Arc<dyn SignalAdapter>>,
}

impl SignalAggregator {
    pub fn new(adapters: Vec<Arc<dyn SignalAdapter>>) -> Self {
        Self { adapters }
    }

    /// Fetches every adapter concurrently under `AGGREGATE_DEADLINE`, then
    /// blends the results under `weights`. A symbol absent from `weights`
    /// never appears in the output, even if a source reports on it.
    pub async fn aggregate(
        &self,
        weights: &HashMap<CanonicalSymbol, WeightEntry>,
    ) -> HashMap<CanonicalSymbol, TargetDepth> {
        let by_source = self.fetch_all().await;
        let mut out = HashMap::with_capacity(weights.len());
        for (symbol, entry) in weights {
            out.insert(symbol.clone(), blend(entry, &by_source));
        }
        out
    }

    async fn fetch_all(&self) -> HashMap<(SourceId, CanonicalSymbol), ContributedSignal> {
        let mut join_set = tokio::task::JoinSet::new();
        for adapter in &self.adapters {
            let adapter = adapter.clone();
            join_set.spawn(async move { fetch_with_timeout(adapter.as_ref()).await });
        }

        let mut by_source = HashMap::new();
        let drain = async {
            while let Some(result) = join_set.join_next().await {
                match result {
                    Ok(signals) => {
                        for signal in signals {
                            by_source.insert(
                                (signal.source.clone(), signal.symbol.clone()),
                                ContributedSignal { depth: signal.depth, price: signal.price, timestamp: signal.timestamp },
                            );
                        }
                    }
                    Err(e) => warn!(error = %e, "adapter fetch task panicked"),
                }
            }
        };

        if tokio::time::timeout(AGGREGATE_DEADLINE, drain).await.is_err() {
            warn!(seconds = AGGREGATE_DEADLINE.as_secs(), "aggregate deadline exceeded, using whatever arrived");
            join_set.abort_all();
        }
        by_source
    }
}

struct ContributedSignal {
    depth: f64,
    price: f64,
    timestamp: chrono::DateTime<chrono::Utc>,
}

/// Weighted sum of every source's depth contribution for one symbol, with a
/// weight-proportional average mark price. A source with no current signal
/// contributes nothing -- weights are not rescaled to compensate, so
/// opposite-sign equal-weight signals net to a flat target rather than
/// cancelling out as "no opinion".
fn blend(entry: &WeightEntry, by_source: &HashMap<(SourceId, CanonicalSymbol), ContributedSignal>) -> TargetDepth {
    let mut depth = 0.0;
    let mut price_weight_sum = 0.0;
    let mut price_numerator = 0.0;
    let mut contributing_timestamps = Vec::new();
    for source_weight in &entry.sources {
        if source_weight.weight <= 0.0 {
            continue;
        }
        if let Some(contributed) = by_source.get(&(source_weight.source.clone(), entry.symbol.clone())) {
            depth += source_weight.weight * contributed.depth;
            price_numerator += source_weight.weight * contributed.price;
            price_weight_sum += source_weight.weight;
            contributing_timestamps.push(contributed.timestamp);
        }
    }
    let price = if price_weight_sum > 0.0 { price_numerator / price_weight_sum } else { 0.0 };
    TargetDepth { depth: depth.clamp(-1.0, 1.0), price, contributing_timestamps }
}

/// A symbol is "dirty" (needs reconciliation this cycle) when its blended
/// target differs from the cached one, either in depth or in which signals
/// contributed. Identical on both counts is "clean" and is skipped by the
/// reconciliation engine entirely.
pub fn is_dirty(current: &TargetDepth, cached: Option<&TargetDepth>) -> bool {
    match cached {
        None => true,
        Some(cached) => current != cached,
    }
}
