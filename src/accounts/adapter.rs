//! Account Processor Adapter: the venue-facing contract the reconciliation
//! engine drives. Grounded on `ExecutionAdapter` (`vault/execution.rs`) --
//! one async trait, several concrete implementations chosen once at
//! startup from `credentials.json`.

use crate::error::AdapterError;
use crate::model::{AccountId, CanonicalSymbol, MarginMode, Position, SymbolSpec};
use async_trait::async_trait;

#[async_trait]
pub trait AccountAdapter: Send + Sync {
    fn account_id(&self) -> &AccountId;

    /// Equity including unrealized PnL of open positions.
    async fn get_total_equity(&self) -> Result<f64, AdapterError>;

    async fn get_positions(&self) -> Result<Vec<(CanonicalSymbol, Position)>, AdapterError>;

    async fn get_symbol_spec(&self, symbol: &CanonicalSymbol) -> Result<SymbolSpec, AdapterError>;

    /// Venue ticker lookup, used only when neither a contributing signal
    /// nor the current position carry a usable mark price.
    async fn get_mark_price(&self, symbol: &CanonicalSymbol) -> Result<f64, AdapterError>;

    async fn set_leverage(&self, symbol: &CanonicalSymbol, leverage: u32) -> Result<(), AdapterError>;

    async fn set_margin_mode(&self, symbol: &CanonicalSymbol, mode: MarginMode) -> Result<(), AdapterError>;

    /// Places a market order for a signed quantity delta (positive = buy,
    /// negative = sell). Returns the filled quantity, signed the same way.
    async fn place_market(&self, symbol: &CanonicalSymbol, signed_qty: f64) -> Result<f64, AdapterError>;

    async fn close_position(&self, symbol: &CanonicalSymbol) -> Result<(), AdapterError>;
}
