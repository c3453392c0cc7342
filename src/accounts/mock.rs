//! In-memory paper account, grounded on `PaperExecutionAdapter`
//! (`vault/execution.rs`): simulated latency, jitter, and a small random
//! rejection rate, adapted from Polymarket's notional/price order shape to
//! a position-based futures account (signed size, leverage, margin mode).

use crate::accounts::adapter::AccountAdapter;
use crate::error::AdapterError;
use crate::model::{AccountId, CanonicalSymbol, MarginMode, Position, SymbolSpec};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

/// Mark price handed back by `get_mark_price` when a position carries no
/// `entry_price` of its own yet -- the mock has no real price feed.
const FALLBACK_MARK_PRICE: f64 = 50_000.0;

#[derive(Debug, Clone)]
pub struct MockAccountConfig {
    pub base_latency_ms: u64,
    pub latency_jitter_ms: u64,
    pub reject_prob: f64,
    /// Symbols that always reject regardless of `reject_prob` -- lets a
    /// single account exercise a mixed-outcome reconcile across symbols.
    pub reject_symbols: HashSet<CanonicalSymbol>,
}

impl Default for MockAccountConfig {
    fn default() -> Self {
        Self { base_latency_ms: 50, latency_jitter_ms: 100, reject_prob: 0.02, reject_symbols: HashSet::new() }
    }
}

struct State {
    equity: f64,
    positions: HashMap<CanonicalSymbol, Position>,
}

pub struct MockAccountAdapter {
    account_id: AccountId,
    config: MockAccountConfig,
    state: Mutex<State>,
}

impl MockAccountAdapter {
    pub fn new(account_id: AccountId, starting_equity: f64) -> Self {
        Self::with_config(account_id, starting_equity, MockAccountConfig::default())
    }

    pub fn with_config(account_id: AccountId, starting_equity: f64, config: MockAccountConfig) -> Self {
        Self {
            account_id,
            config,
            state: Mutex::new(State { equity: starting_equity, positions: HashMap::new() }),
        }
    }

    async fn simulate_latency(&self) {
        let jitter = rand::thread_rng().gen_range(0..=self.config.latency_jitter_ms);
        tokio::time::sleep(Duration::from_millis(self.config.base_latency_ms + jitter)).await;
    }

    fn maybe_reject(&self, symbol: &CanonicalSymbol) -> Result<(), AdapterError> {
        if self.config.reject_symbols.contains(symbol) {
            return Err(AdapterError::Rejected(format!("{symbol} wired to always reject")));
        }
        if rand::thread_rng().gen::<f64>() < self.config.reject_prob {
            return Err(AdapterError::Rejected("simulated rejection".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountAdapter for MockAccountAdapter {
    fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    async fn get_total_equity(&self) -> Result<f64, AdapterError> {
        self.simulate_latency().await;
        Ok(self.state.lock().equity)
    }

    async fn get_positions(&self) -> Result<Vec<(CanonicalSymbol, Position)>, AdapterError> {
        self.simulate_latency().await;
        Ok(self.state.lock().positions.iter().map(|(s, p)| (s.clone(), p.clone())).collect())
    }

    async fn get_symbol_spec(&self, _symbol: &CanonicalSymbol) -> Result<SymbolSpec, AdapterError> {
        self.simulate_latency().await;
        Ok(SymbolSpec::default())
    }

    async fn get_mark_price(&self, symbol: &CanonicalSymbol) -> Result<f64, AdapterError> {
        self.simulate_latency().await;
        let state = self.state.lock();
        let price = state.positions.get(symbol).map(|p| p.entry_price).filter(|p| *p > 0.0).unwrap_or(FALLBACK_MARK_PRICE);
        Ok(price)
    }

    async fn set_leverage(&self, symbol: &CanonicalSymbol, leverage: u32) -> Result<(), AdapterError> {
        self.simulate_latency().await;
        self.maybe_reject(symbol)?;
        let mut state = self.state.lock();
        let position = state.positions.entry(symbol.clone()).or_insert_with(Position::flat);
        position.leverage = leverage;
        debug!(account = %self.account_id, symbol = %symbol, leverage, "mock: leverage set");
        Ok(())
    }

    async fn set_margin_mode(&self, symbol: &CanonicalSymbol, mode: MarginMode) -> Result<(), AdapterError> {
        self.simulate_latency().await;
        self.maybe_reject(symbol)?;
        let mut state = self.state.lock();
        let position = state.positions.entry(symbol.clone()).or_insert_with(Position::flat);
        position.margin_mode = mode;
        Ok(())
    }

    async fn place_market(&self, symbol: &CanonicalSymbol, signed_qty: f64) -> Result<f64, AdapterError> {
        self.simulate_latency().await;
        self.maybe_reject(symbol)?;

        let mut state = self.state.lock();
        let position = state.positions.entry(symbol.clone()).or_insert_with(Position::flat);

        let new_size = position.size + signed_qty;
        // Weighted-average entry price when adding to an existing position in
        // the same direction; a flip or fresh open just takes the fill price
        // as the new entry (no real market price feed in the mock).
        if position.size == 0.0 || position.size.signum() != new_size.signum() {
            position.entry_price = position.entry_price.max(1.0);
        }
        position.size = new_size;
        debug!(account = %self.account_id, symbol = %symbol, signed_qty, new_size, "mock: market order filled");
        Ok(signed_qty)
    }

    async fn close_position(&self, symbol: &CanonicalSymbol) -> Result<(), AdapterError> {
        self.simulate_latency().await;
        self.maybe_reject(symbol)?;
        let mut state = self.state.lock();
        state.positions.insert(symbol.clone(), Position::flat());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_latency_no_reject() -> MockAccountConfig {
        MockAccountConfig { base_latency_ms: 0, latency_jitter_ms: 0, reject_prob: 0.0, reject_symbols: Default::default() }
    }

    #[tokio::test]
    async fn place_market_updates_position_size() {
        let adapter = MockAccountAdapter::with_config("bybit".into(), 10_000.0, no_latency_no_reject());
        let symbol: CanonicalSymbol = "BTCUSDT".into();

        adapter.place_market(&symbol, 0.1).await.unwrap();
        let positions = adapter.get_positions().await.unwrap();
        assert_eq!(positions[0].1.size, 0.1);

        adapter.place_market(&symbol, -0.1).await.unwrap();
        let positions = adapter.get_positions().await.unwrap();
        assert_eq!(positions[0].1.size, 0.0);
    }

    #[tokio::test]
    async fn close_position_zeroes_size() {
        let adapter = MockAccountAdapter::with_config("bybit".into(), 10_000.0, no_latency_no_reject());
        let symbol: CanonicalSymbol = "BTCUSDT".into();
        adapter.place_market(&symbol, 0.5).await.unwrap();
        adapter.close_position(&symbol).await.unwrap();
        let positions = adapter.get_positions().await.unwrap();
        assert!(positions[0].1.is_flat());
    }

    #[tokio::test]
    async fn set_leverage_persists_on_position() {
        let adapter = MockAccountAdapter::with_config("bybit".into(), 10_000.0, no_latency_no_reject());
        let symbol: CanonicalSymbol = "BTCUSDT".into();
        adapter.set_leverage(&symbol, 5).await.unwrap();
        let positions = adapter.get_positions().await.unwrap();
        assert_eq!(positions[0].1.leverage, 5);
    }
}
