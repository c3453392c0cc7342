//! `SymbolSpec` is memoized per `(account, symbol)` for `SPEC_CACHE_TTL`
//! since it rarely changes and fetching it fresh every cycle for every
//! account-symbol pair would be wasteful. A leverage or margin-mode change
//! invalidates the entry immediately, since venues sometimes report a
//! different `max_leverage`/`size_step` under a new margin mode.

use crate::config::SPEC_CACHE_TTL;
use crate::model::{AccountId, CanonicalSymbol, SymbolSpec};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Instant;

struct Entry {
    spec: SymbolSpec,
    fetched_at: Instant,
}

#[derive(Default)]
pub struct SymbolSpecCache {
    entries: RwLock<HashMap<(AccountId, CanonicalSymbol), Entry>>,
}

impl SymbolSpecCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, account: &AccountId, symbol: &CanonicalSymbol) -> Option<SymbolSpec> {
        let entries = self.entries.read();
        let entry = entries.get(&(account.clone(), symbol.clone()))?;
        if entry.fetched_at.elapsed() > SPEC_CACHE_TTL {
            return None;
        }
        Some(entry.spec)
    }

    pub fn put(&self, account: &AccountId, symbol: &CanonicalSymbol, spec: SymbolSpec) {
        self.entries
            .write()
            .insert((account.clone(), symbol.clone()), Entry { spec, fetched_at: Instant::now() });
    }

    pub fn invalidate(&self, account: &AccountId, symbol: &CanonicalSymbol) {
        self.entries.write().remove(&(account.clone(), symbol.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_returns_fresh_entry() {
        let cache = SymbolSpecCache::new();
        let account: AccountId = "bybit".into();
        let symbol: CanonicalSymbol = "BTCUSDT".into();
        cache.put(&account, &symbol, SymbolSpec::default());
        assert!(cache.get(&account, &symbol).is_some());
    }

    #[test]
    fn invalidate_clears_entry() {
        let cache = SymbolSpecCache::new();
        let account: AccountId = "bybit".into();
        let symbol: CanonicalSymbol = "BTCUSDT".into();
        cache.put(&account, &symbol, SymbolSpec::default());
        cache.invalidate(&account, &symbol);
        assert!(cache.get(&account, &symbol).is_none());
    }

    #[test]
    fn missing_entry_returns_none() {
        let cache = SymbolSpecCache::new();
        assert!(cache.get(&"bybit".into(), &"BTCUSDT".into()).is_none());
    }
}
