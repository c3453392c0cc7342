//! Execution Cache: one JSON document per account under
//! `account_asset_depths/<account>.json`, holding the last committed
//! `TargetDepth` per symbol. Read once at the start of a cycle, written
//! once at the end -- never touched mid-cycle by symbol tasks.
//!
//! An unparseable cache is advisory only: every symbol is treated as dirty
//! and a fresh file is written at the end of the cycle. Nothing about a
//! corrupt cache file should ever fail a cycle.

use crate::model::{CanonicalSymbol, TargetDepth};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ExecutionCacheDocument {
    pub targets: HashMap<CanonicalSymbol, TargetDepth>,
}

pub struct ExecutionCache {
    path: PathBuf,
    document: ExecutionCacheDocument,
}

impl ExecutionCache {
    /// Reads the cache for one account. Missing file or unparseable content
    /// both yield an empty document (every symbol dirty this cycle) rather
    /// than an error.
    pub async fn load(path: PathBuf) -> Self {
        let document = match tokio::fs::read_to_string(&path).await {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(document) => document,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "execution cache unparseable, treating as empty");
                    ExecutionCacheDocument::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ExecutionCacheDocument::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "execution cache unreadable, treating as empty");
                ExecutionCacheDocument::default()
            }
        };
        Self { path, document }
    }

    pub fn get(&self, symbol: &CanonicalSymbol) -> Option<&TargetDepth> {
        self.document.targets.get(symbol)
    }

    pub fn set(&mut self, symbol: CanonicalSymbol, target: TargetDepth) {
        self.document.targets.insert(symbol, target);
    }

    /// Atomically replaces the on-disk file: write to a sibling temp file,
    /// then rename over the destination, so a crash mid-write never leaves
    /// a half-written cache behind.
    pub async fn commit(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_string_pretty(&self.document)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, body).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}
