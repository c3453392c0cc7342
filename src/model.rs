//! Core data types shared across every component.
//!
//! Newtypes around `String` keep a `CanonicalSymbol` from being passed where
//! an `AccountId` is expected -- adapter trait signatures lean on this.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

macro_rules! string_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_newtype!(CanonicalSymbol);
string_newtype!(SourceId);
string_newtype!(AccountId);

/// A single normalized signal as read from a source's raw file/feed, before
/// asset-mapping. `depth` is a signed fraction of account equity in [-1, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSignal {
    pub source_symbol: String,
    pub depth: f64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub leverage: Option<u32>,
}

impl RawSignal {
    /// A signal is invalid if its depth is NaN, outside [-1, 1], or its
    /// price is non-finite/negative. Dropped with a warning by the caller,
    /// never propagated as a cycle-level error.
    pub fn is_valid(&self) -> bool {
        self.depth.is_finite()
            && self.depth.abs() <= 1.0
            && self.price.is_finite()
            && self.price >= 0.0
    }
}

/// `RawSignal` after its `source_symbol` has been mapped to the canonical
/// namespace, tagged with the source it came from. Exists only in-memory
/// within a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalSignal {
    pub symbol: CanonicalSymbol,
    pub source: SourceId,
    pub depth: f64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub leverage: Option<u32>,
}

/// One `(source, weight)` pair contributing to a symbol's target depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceWeight {
    pub source: SourceId,
    pub weight: f64,
}

/// Per-canonical-symbol weighting table entry. Invariant: `sum(weights) <= 1.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightEntry {
    pub symbol: CanonicalSymbol,
    pub leverage: u32,
    pub sources: Vec<SourceWeight>,
}

impl WeightEntry {
    pub fn total_weight(&self) -> f64 {
        self.sources.iter().map(|s| s.weight).sum()
    }
}

/// Weighted blend of all contributing sources for one `(account, symbol)`,
/// plus the inputs that produced it -- used both for sizing and for the
/// clean/dirty comparison against the previous cycle's cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetDepth {
    pub depth: f64,
    /// Weighted-average mark price across contributing sources, used to
    /// convert `depth` (a fraction of equity) into a contract quantity.
    pub price: f64,
    /// Timestamp of the contributing signal for each source that had
    /// non-zero weight this cycle, in WeightEntry order. Used verbatim for
    /// the execution cache's clean/dirty comparison.
    pub contributing_timestamps: Vec<DateTime<Utc>>,
}

/// A venue-reported open position for one canonical symbol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum MarginMode {
    Isolated,
    Cross,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Signed quantity: positive is long, negative is short, zero is flat.
    pub size: f64,
    pub entry_price: f64,
    pub leverage: u32,
    pub margin_mode: MarginMode,
}

impl Position {
    pub fn flat() -> Self {
        Self {
            size: 0.0,
            entry_price: 0.0,
            leverage: 1,
            margin_mode: MarginMode::Isolated,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.size == 0.0
    }
}

/// A frozen-for-the-cycle view of one account: equity (including
/// unrealized PnL) and every open position. Captured exactly once per
/// `(cycle, account)` and shared read-only by every symbol task for that
/// account.
#[derive(Debug, Clone)]
pub struct AccountSnapshot {
    pub total_equity: f64,
    pub positions: HashMap<CanonicalSymbol, Position>,
}

impl AccountSnapshot {
    pub fn position_for(&self, symbol: &CanonicalSymbol) -> Position {
        self.positions.get(symbol).cloned().unwrap_or_else(Position::flat)
    }
}

/// Exchange-reported contract spec for one `(account, symbol)`, memoized
/// with a TTL by the Symbol-Spec Cache. Also carries the venue's margin
/// capabilities, since both are reported by the same endpoint on most
/// exchanges and both gate the reconciliation state machine's ADJUST step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SymbolSpec {
    pub min_size: f64,
    pub size_step: f64,
    pub price_step: f64,
    pub max_single_order_size: f64,
    pub contract_multiplier: f64,
    pub max_leverage: u32,
    /// Whether this venue offers isolated margin for this symbol at all --
    /// some only offer cross, in which case the desired margin mode falls
    /// back to cross rather than isolated.
    pub supports_isolated_margin: bool,
    /// Whether leverage/margin-mode changes are accepted while a position
    /// is open. If false, the engine closes to flat before applying either.
    pub allows_change_while_open: bool,
}

impl Default for SymbolSpec {
    fn default() -> Self {
        Self {
            min_size: 0.001,
            size_step: 0.001,
            price_step: 0.01,
            max_single_order_size: 100.0,
            contract_multiplier: 1.0,
            max_leverage: 20,
            supports_isolated_margin: true,
            allows_change_while_open: false,
        }
    }
}

/// Desired margin mode for a symbol given what the venue supports: isolated
/// unless the venue only offers cross.
pub fn desired_margin_mode(spec: &SymbolSpec) -> MarginMode {
    if spec.supports_isolated_margin {
        MarginMode::Isolated
    } else {
        MarginMode::Cross
    }
}

/// An audit record produced by the TradingView race-reorder rule.
/// Never persisted -- logged at `debug!` per cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalAdjustment {
    pub original_timestamp: DateTime<Utc>,
    pub adjusted_timestamp: DateTime<Utc>,
    pub reason: &'static str,
}

/// Side of a market order, derived from the sign of the requested delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn from_signed_qty(qty: f64) -> Self {
        if qty >= 0.0 {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_signal_rejects_out_of_range_depth() {
        let mut sig = RawSignal {
            source_symbol: "BTCUSDT".into(),
            depth: 1.5,
            price: 50_000.0,
            timestamp: Utc::now(),
            leverage: None,
        };
        assert!(!sig.is_valid());
        sig.depth = f64::NAN;
        assert!(!sig.is_valid());
        sig.depth = -1.0;
        assert!(sig.is_valid());
    }

    #[test]
    fn weight_entry_sums_weights() {
        let entry = WeightEntry {
            symbol: "BTCUSDT".into(),
            leverage: 3,
            sources: vec![
                SourceWeight { source: "tradingview".into(), weight: 0.1 },
                SourceWeight { source: "bittensor".into(), weight: 0.15 },
            ],
        };
        assert!((entry.total_weight() - 0.25).abs() < 1e-9);
    }
}
