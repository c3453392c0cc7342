//! Weight & Leverage Config: loaded from `signal_weight_config.json`,
//! re-read at the start of every cycle. On parse failure, the last good
//! copy is retained and the failure is flagged. Entries with
//! `sum(weights) > 1` or `leverage` outside `[1, 20]` are rejected
//! individually -- one bad entry never blinds the whole file (modelled on
//! `risk.rs`'s guardrail-flag list).

use crate::error::ConfigError;
use crate::model::{CanonicalSymbol, WeightEntry};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

const MIN_LEVERAGE: u32 = 1;
const MAX_LEVERAGE: u32 = 20;

#[derive(Debug, Deserialize)]
struct RawEntry {
    symbol: String,
    leverage: u32,
    sources: Vec<RawSourceWeight>,
}

#[derive(Debug, Deserialize)]
struct RawSourceWeight {
    source: String,
    weight: f64,
}

fn validate(raw: Vec<RawEntry>) -> Vec<WeightEntry> {
    let mut accepted = Vec::with_capacity(raw.len());
    for entry in raw {
        let sum: f64 = entry.sources.iter().map(|s| s.weight).sum();
        if sum > 1.0 + 1e-9 {
            warn!(symbol = %entry.symbol, sum, "rejecting weight entry: sum of weights exceeds 1.0");
            continue;
        }
        if !(MIN_LEVERAGE..=MAX_LEVERAGE).contains(&entry.leverage) {
            warn!(symbol = %entry.symbol, leverage = entry.leverage, "rejecting weight entry: leverage out of range");
            continue;
        }
        accepted.push(WeightEntry {
            symbol: CanonicalSymbol::from(entry.symbol),
            leverage: entry.leverage,
            sources: entry
                .sources
                .into_iter()
                .map(|s| crate::model::SourceWeight { source: s.source.into(), weight: s.weight })
                .collect(),
        });
    }
    accepted
}

fn parse(path: &Path) -> Result<Vec<WeightEntry>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let raw: Vec<RawEntry> = serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(validate(raw))
}

pub struct WeightConfig {
    entries: RwLock<Arc<HashMap<CanonicalSymbol, WeightEntry>>>,
}

impl WeightConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let entries = parse(path)?;
        Ok(Self { entries: RwLock::new(Arc::new(index(entries))) })
    }

    pub fn reload(&self, path: &Path) -> Result<(), ConfigError> {
        match parse(path) {
            Ok(entries) => {
                *self.entries.write() = Arc::new(index(entries));
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "weight config reload failed, keeping last good copy");
                Err(e)
            }
        }
    }

    /// Immutable snapshot for one cycle. Must be captured once, before any
    /// account fan-out -- callers should take this snapshot in the cycle
    /// driver and pass it down, never re-read mid-cycle.
    pub fn snapshot(&self) -> Arc<HashMap<CanonicalSymbol, WeightEntry>> {
        self.entries.read().clone()
    }
}

fn index(entries: Vec<WeightEntry>) -> HashMap<CanonicalSymbol, WeightEntry> {
    entries.into_iter().map(|e| (e.symbol.clone(), e)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join("signal_weight_config.json");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn rejects_entry_exceeding_total_weight() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"[
                {"symbol": "BTCUSDT", "leverage": 3, "sources": [{"source": "tv", "weight": 0.1}, {"source": "bt", "weight": 0.15}]},
                {"symbol": "ETHUSDT", "leverage": 5, "sources": [{"source": "tv", "weight": 0.7}, {"source": "bt", "weight": 0.5}]}
            ]"#,
        );
        let cfg = WeightConfig::load(&path).unwrap();
        let snap = cfg.snapshot();
        assert!(snap.contains_key(&"BTCUSDT".into()));
        assert!(!snap.contains_key(&"ETHUSDT".into()));
    }

    #[test]
    fn rejects_entry_with_bad_leverage() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"[{"symbol": "BTCUSDT", "leverage": 25, "sources": []}]"#,
        );
        let cfg = WeightConfig::load(&path).unwrap();
        assert!(cfg.snapshot().is_empty());
    }

    #[test]
    fn reload_keeps_previous_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"[{"symbol": "BTCUSDT", "leverage": 3, "sources": []}]"#,
        );
        let cfg = WeightConfig::load(&path).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert!(cfg.reload(&path).is_err());
        assert!(cfg.snapshot().contains_key(&"BTCUSDT".into()));
    }
}
