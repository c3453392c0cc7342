//! Asset Mapper: per-source symbol -> canonical symbol table, reloaded at
//! the start of every cycle with fallback to the last good copy on parse
//! failure. Lookup and reverse lookup are both O(1).

use crate::error::ConfigError;
use crate::model::{CanonicalSymbol, SourceId};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Raw shape of `asset_mapping_config.json`: `{ "<source_id>": {
/// "<source_symbol>": "<canonical_symbol>", ... }, ... }`. Order within each
/// source's submap is preserved, hence `IndexMap` rather than `HashMap`.
#[derive(Debug, Deserialize)]
struct AssetMappingFile(IndexMap<String, IndexMap<String, String>>);

#[derive(Debug, Default)]
struct SourceTable {
    forward: HashMap<String, CanonicalSymbol>,
    reverse: HashMap<CanonicalSymbol, String>,
}

#[derive(Debug, Default)]
struct MapperTable {
    by_source: HashMap<SourceId, SourceTable>,
}

fn parse(path: &Path) -> Result<MapperTable, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let file: AssetMappingFile = serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        source: e,
    })?;

    let mut by_source = HashMap::new();
    for (source_id, submap) in file.0 {
        let mut table = SourceTable::default();
        for (source_symbol, canonical) in submap {
            let canonical = CanonicalSymbol::from(canonical);
            table.reverse.entry(canonical.clone()).or_insert_with(|| source_symbol.clone());
            table.forward.insert(source_symbol, canonical);
        }
        by_source.insert(SourceId::from(source_id), table);
    }
    Ok(MapperTable { by_source })
}

/// Holds the current mapping table behind a lock; `reload` swaps in a fresh
/// `Arc` only on success, so every reader always sees a fully-formed table
/// and never a torn read mid-reload.
pub struct AssetMapper {
    table: RwLock<Arc<MapperTable>>,
}

impl AssetMapper {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let table = parse(path)?;
        Ok(Self { table: RwLock::new(Arc::new(table)) })
    }

    /// Re-read from disk. On failure, keeps serving the previous snapshot
    /// and returns the error for the caller to log.
    pub fn reload(&self, path: &Path) -> Result<(), ConfigError> {
        match parse(path) {
            Ok(table) => {
                *self.table.write() = Arc::new(table);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "asset mapping reload failed, keeping last good copy");
                Err(e)
            }
        }
    }

    /// Map a source-scoped symbol to its canonical form. Returns `None` if
    /// unmapped -- callers drop the signal silently (logged once per cycle
    /// by the aggregator, not here).
    pub fn map(&self, source: &SourceId, source_symbol: &str) -> Option<CanonicalSymbol> {
        self.table.read().by_source.get(source)?.forward.get(source_symbol).cloned()
    }

    /// Reverse lookup, required by source-symbol-scoped polling adapters.
    pub fn unmap(&self, source: &SourceId, canonical: &CanonicalSymbol) -> Option<String> {
        self.table.read().by_source.get(source)?.reverse.get(canonical).cloned()
    }
}
