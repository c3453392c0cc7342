//! File-backed `SignalAdapter`: polls the raw signal store, applies the
//! asset mapper and the TradingView race-reorder rule, reduces each
//! `(symbol)` group to its terminal signal. The producer writes a file;
//! this adapter only ever reads.

use crate::asset_mapper::AssetMapper;
use crate::model::CanonicalSignal;
use crate::model::SourceId;
use crate::signals::adapter::SignalAdapter;
use crate::signals::raw_store::{self, group_by_symbol};
use crate::signals::tradingview::{latest_of, reorder_race_pairs};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

pub struct FileSignalAdapter {
    source: SourceId,
    dir: PathBuf,
    asset_mapper: Arc<AssetMapper>,
}

impl FileSignalAdapter {
    pub fn new(source: SourceId, dir: PathBuf, asset_mapper: Arc<AssetMapper>) -> Self {
        Self { source, dir, asset_mapper }
    }
}

#[async_trait]
impl SignalAdapter for FileSignalAdapter {
    async fn fetch_current(&self) -> Vec<CanonicalSignal> {
        let raw = match raw_store::read_all(&self.dir).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(source = %self.source, error = %e, "raw signal store read failed");
                return Vec::new();
            }
        };

        let grouped = group_by_symbol(raw);
        let mut out = Vec::with_capacity(grouped.len());
        for (source_symbol, signals) in grouped {
            let (reordered, adjustments) = reorder_race_pairs(&signals);
            for adj in &adjustments {
                debug!(source = %self.source, symbol = %source_symbol, ?adj, "race-reordered");
            }
            let Some(terminal) = latest_of(&reordered) else { continue };

            let Some(canonical) = self.asset_mapper.map(&self.source, &source_symbol) else {
                debug!(source = %self.source, symbol = %source_symbol, "no asset mapping, dropping signal");
                continue;
            };

            out.push(CanonicalSignal {
                symbol: canonical,
                source: self.source.clone(),
                depth: terminal.depth,
                price: terminal.price,
                timestamp: terminal.timestamp,
                leverage: terminal.leverage,
            });
        }
        out
    }

    fn source_id(&self) -> &SourceId {
        &self.source
    }
}
