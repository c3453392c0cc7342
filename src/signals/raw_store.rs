//! Per-source append-overwrite files of the latest normalized signal set
//! under `raw_signals/<source_id>/...`. Producers are external; the core
//! only reads, and never deletes.

use crate::error::AdapterError;
use crate::model::RawSignal;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// Reads every `*.json` file directly under `dir`, each expected to hold a
/// JSON array of `RawSignal`. Invalid signals (`RawSignal::is_valid` ==
/// false) are dropped with a warning and do not fail the read.
pub async fn read_all(dir: &Path) -> Result<Vec<RawSignal>, AdapterError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(AdapterError::Io(e)),
    };

    let mut signals = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(t) => t,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read raw signal file");
                continue;
            }
        };
        match serde_json::from_str::<Vec<RawSignal>>(&text) {
            Ok(mut parsed) => signals.append(&mut parsed),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to parse raw signal file"),
        }
    }

    let before = signals.len();
    signals.retain(RawSignal::is_valid);
    if signals.len() != before {
        warn!(
            dropped = before - signals.len(),
            dir = %dir.display(),
            "dropped invalid raw signals"
        );
    }
    Ok(signals)
}

/// Groups signals by `source_symbol`, preserving each group's arrival order
/// (needed by the TradingView race-reorder rule, which operates per symbol).
pub fn group_by_symbol(signals: Vec<RawSignal>) -> HashMap<String, Vec<RawSignal>> {
    let mut grouped: HashMap<String, Vec<RawSignal>> = HashMap::new();
    for signal in signals {
        grouped.entry(signal.source_symbol.clone()).or_default().push(signal);
    }
    grouped
}
