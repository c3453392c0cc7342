//! Per-symbol reconciliation state machine:
//! INSPECT -> RESIZE|FLIP|CLOSE|NOOP (with a margin/leverage adjustment
//! folded in where needed) -> VERIFY -> DONE|FAIL. Operates only on the
//! frozen `AccountSnapshot` captured once per account per cycle -- it
//! never re-fetches equity or other symbols' positions mid-reconcile.

use crate::accounts::AccountAdapter;
use crate::backoff::{BackoffCalculator, BackoffConfig};
use crate::config::{CLOSE_THRESHOLD, MAX_RECONCILE_RETRIES, ORDER_TIMEOUT};
use crate::error::{AdapterError, ReconcileError};
use crate::model::{desired_margin_mode, AccountSnapshot, CanonicalSymbol, MarginMode, Position, SymbolSpec, TargetDepth, WeightEntry};
use crate::reconcile::quantize::{chunk_order, quantize};
use crate::spec_cache::SymbolSpecCache;
use std::future::Future;
use tracing::{debug, info, warn};

/// Transient I/O retry budget for a single venue call, independent of
/// `MAX_RECONCILE_RETRIES` (which bounds retries of the whole symbol, not
/// of one op).
const OP_RETRY_BUDGET: u32 = 3;

fn is_transient(error: &AdapterError) -> bool {
    matches!(error, AdapterError::Transport(_) | AdapterError::Io(_) | AdapterError::Timeout { .. })
}

/// Wraps one venue call with the per-order deadline and exponential
/// backoff: a transient failure (timeout, transport, io) is retried up to
/// `OP_RETRY_BUDGET` times before being treated as a local failure for this
/// symbol; a venue rejection is never retried here.
async fn call_with_backoff<T, F, Fut>(account_id: &str, op_name: &'static str, mut op: F) -> Result<T, AdapterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AdapterError>>,
{
    let mut backoff = BackoffCalculator::new(BackoffConfig::default());
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout(ORDER_TIMEOUT, op()).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Timeout { source_id: account_id.to_string(), millis: ORDER_TIMEOUT.as_millis() as u64 }),
        };
        match result {
            Ok(value) => return Ok(value),
            Err(e) if is_transient(&e) && attempt < OP_RETRY_BUDGET => {
                attempt += 1;
                let delay = backoff.next_backoff();
                warn!(account = account_id, op = op_name, attempt, delay_ms = delay.as_millis(), error = %e, "transient adapter error, retrying with backoff");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
enum Operation {
    Noop,
    Resize,
    Flip,
    Close,
}

fn desired_qty(depth: f64, leverage: u32, equity: f64, mark_price: f64, spec: &SymbolSpec) -> f64 {
    if mark_price <= 0.0 || spec.contract_multiplier <= 0.0 {
        return 0.0;
    }
    depth * equity * (leverage as f64) / (mark_price * spec.contract_multiplier)
}

/// Resolves the mark price used to convert a target depth into a contract
/// quantity: the contributing signal's own price, falling back to the
/// position's entry price, falling back to a venue ticker lookup.
async fn resolve_mark_price(
    account: &dyn AccountAdapter,
    account_id: &str,
    symbol: &CanonicalSymbol,
    target: &TargetDepth,
    position: &Position,
) -> Result<f64, AdapterError> {
    if target.price > 0.0 {
        return Ok(target.price);
    }
    if position.entry_price > 0.0 {
        return Ok(position.entry_price);
    }
    call_with_backoff(account_id, "get_mark_price", || account.get_mark_price(symbol)).await
}

fn classify(current_size: f64, target_qty: f64, size_step: f64) -> Operation {
    let target_is_flat = target_qty.abs() < f64::EPSILON;
    let current_is_flat = current_size.abs() < f64::EPSILON;
    let tolerance = size_step.max(f64::EPSILON);

    if target_is_flat && !current_is_flat {
        Operation::Close
    } else if !target_is_flat && !current_is_flat && current_size.signum() != target_qty.signum() {
        Operation::Flip
    } else if (target_qty - current_size).abs() < tolerance {
        Operation::Noop
    } else {
        Operation::Resize
    }
}

/// Applies whichever of margin mode / leverage differ from their targets.
/// Safe to call against a flat position or one already correct on both
/// counts (a no-op in that case).
async fn apply_settings(
    account: &dyn AccountAdapter,
    account_id: &str,
    symbol: &CanonicalSymbol,
    position: &Position,
    target_leverage: u32,
    target_mode: MarginMode,
    spec_cache: &SymbolSpecCache,
) -> Result<(), AdapterError> {
    if position.margin_mode != target_mode {
        call_with_backoff(account_id, "set_margin_mode", || account.set_margin_mode(symbol, target_mode)).await?;
        spec_cache.invalidate(account.account_id(), symbol);
    }
    if position.leverage != target_leverage {
        call_with_backoff(account_id, "set_leverage", || account.set_leverage(symbol, target_leverage)).await?;
        spec_cache.invalidate(account.account_id(), symbol);
    }
    Ok(())
}

/// Runs one symbol's reconciliation to convergence, retrying up to
/// `MAX_RECONCILE_RETRIES` times on a failed `VERIFY`. A failure at any
/// step aborts this symbol only -- the caller is responsible for isolating
/// it from the rest of the account's symbols.
pub async fn reconcile_symbol(
    account: &dyn AccountAdapter,
    snapshot: &AccountSnapshot,
    symbol: &CanonicalSymbol,
    weight_entry: &WeightEntry,
    target: &TargetDepth,
    spec_cache: &SymbolSpecCache,
) -> Result<(), ReconcileError> {
    let mut attempt = 0;
    loop {
        match try_reconcile_once(account, snapshot, symbol, weight_entry, target, spec_cache).await {
            Ok(()) => {
                info!(account = %account.account_id(), symbol = %symbol, "reconcile done");
                return Ok(());
            }
            Err(e) if attempt < MAX_RECONCILE_RETRIES => {
                attempt += 1;
                warn!(account = %account.account_id(), symbol = %symbol, attempt, error = %e, "reconcile attempt failed, retrying");
            }
            Err(e) => {
                warn!(account = %account.account_id(), symbol = %symbol, "reconcile failed after max retries");
                return Err(ReconcileError::Unconverged { attempts: attempt + 1, reason: e.to_string() });
            }
        }
    }
}

async fn try_reconcile_once(
    account: &dyn AccountAdapter,
    snapshot: &AccountSnapshot,
    symbol: &CanonicalSymbol,
    weight_entry: &WeightEntry,
    target: &TargetDepth,
    spec_cache: &SymbolSpecCache,
) -> Result<(), ReconcileError> {
    let account_id = account.account_id().as_str();

    // INSPECT
    let position = snapshot.position_for(symbol);
    let spec = match spec_cache.get(account.account_id(), symbol) {
        Some(spec) => spec,
        None => {
            let spec = call_with_backoff(account_id, "get_symbol_spec", || account.get_symbol_spec(symbol)).await?;
            spec_cache.put(account.account_id(), symbol, spec);
            spec
        }
    };

    let mark_price = resolve_mark_price(account, account_id, symbol, target, &position).await?;
    let target_qty = desired_qty(target.depth, weight_entry.leverage, snapshot.total_equity, mark_price, &spec);
    let quantized_target = quantize(target_qty, &spec);
    let qty_op = classify(position.size, quantized_target, spec.size_step);

    let target_mode = desired_margin_mode(&spec);
    let settings_match = position.leverage == weight_entry.leverage && position.margin_mode == target_mode;

    debug!(account = %account.account_id(), symbol = %symbol, ?qty_op, settings_match, current = position.size, target = quantized_target, "reconcile operation selected");

    // Already converged on quantity, leverage, and margin mode: nothing to do.
    if qty_op == Operation::Noop && settings_match {
        return Ok(());
    }

    match qty_op {
        Operation::Flip => {
            call_with_backoff(account_id, "close_position", || account.close_position(symbol)).await?;
            // Let the venue settle the close before opening the other side --
            // a flip that fires both legs back to back can have the open
            // race the close's own fill confirmation on some venues. The
            // position is flat here, so margin/leverage changes apply freely.
            apply_settings(account, account_id, symbol, &position, weight_entry.leverage, target_mode, spec_cache).await?;
            tokio::time::sleep(CLOSE_THRESHOLD).await;
            for chunk in chunk_order(quantized_target, &spec) {
                call_with_backoff(account_id, "place_market", || account.place_market(symbol, chunk)).await?;
            }
        }
        Operation::Close => {
            call_with_backoff(account_id, "close_position", || account.close_position(symbol)).await?;
            if !settings_match {
                apply_settings(account, account_id, symbol, &position, weight_entry.leverage, target_mode, spec_cache).await?;
            }
        }
        Operation::Noop | Operation::Resize => {
            if settings_match {
                let delta = quantized_target - position.size;
                for chunk in chunk_order(delta, &spec) {
                    call_with_backoff(account_id, "place_market", || account.place_market(symbol, chunk)).await?;
                }
            } else if spec.allows_change_while_open {
                apply_settings(account, account_id, symbol, &position, weight_entry.leverage, target_mode, spec_cache).await?;
                if qty_op == Operation::Resize {
                    let delta = quantized_target - position.size;
                    for chunk in chunk_order(delta, &spec) {
                        call_with_backoff(account_id, "place_market", || account.place_market(symbol, chunk)).await?;
                    }
                }
            } else {
                // Venue rejects margin/leverage changes on an open position:
                // close to flat first, apply the change, then resize from flat.
                call_with_backoff(account_id, "close_position", || account.close_position(symbol)).await?;
                apply_settings(account, account_id, symbol, &position, weight_entry.leverage, target_mode, spec_cache).await?;
                for chunk in chunk_order(quantized_target, &spec) {
                    call_with_backoff(account_id, "place_market", || account.place_market(symbol, chunk)).await?;
                }
            }
        }
    }

    // VERIFY
    let positions = call_with_backoff(account_id, "get_positions", || account.get_positions()).await?;
    let filled_size = positions.iter().find(|(s, _)| s == symbol).map(|(_, p)| p.size).unwrap_or(0.0);
    let tolerance = spec.size_step.max(f64::EPSILON);
    if (filled_size - quantized_target).abs() <= tolerance {
        Ok(())
    } else {
        Err(ReconcileError::Unconverged {
            attempts: 1,
            reason: format!("expected {quantized_target}, venue reports {filled_size}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::MockAccountAdapter;
    use crate::model::{AccountSnapshot, SourceWeight};
    use std::collections::HashMap;

    fn spec_cache() -> SymbolSpecCache {
        SymbolSpecCache::new()
    }

    fn weight_entry(leverage: u32) -> WeightEntry {
        WeightEntry {
            symbol: "BTCUSDT".into(),
            leverage,
            sources: vec![SourceWeight { source: "tv".into(), weight: 1.0 }],
        }
    }

    fn snapshot(equity: f64) -> AccountSnapshot {
        AccountSnapshot { total_equity: equity, positions: HashMap::new() }
    }

    #[tokio::test]
    async fn opens_from_flat() {
        let account = MockAccountAdapter::with_config(
            "bybit".into(),
            10_000.0,
            crate::accounts::MockAccountConfig { base_latency_ms: 0, latency_jitter_ms: 0, reject_prob: 0.0, reject_symbols: Default::default() },
        );
        let symbol: CanonicalSymbol = "BTCUSDT".into();
        let target = TargetDepth { depth: 0.05, price: 50_000.0, contributing_timestamps: vec![] };
        let entry = weight_entry(3);
        let snap = snapshot(10_000.0);
        let cache = spec_cache();

        reconcile_symbol(&account, &snap, &symbol, &entry, &target, &cache).await.unwrap();

        let positions = account.get_positions().await.unwrap();
        let (_, position) = positions.iter().find(|(s, _)| *s == symbol).unwrap();
        assert!(position.size > 0.0);
    }

    #[tokio::test]
    async fn noop_when_already_at_target() {
        let account = MockAccountAdapter::with_config(
            "bybit".into(),
            10_000.0,
            crate::accounts::MockAccountConfig { base_latency_ms: 0, latency_jitter_ms: 0, reject_prob: 0.0, reject_symbols: Default::default() },
        );
        let symbol: CanonicalSymbol = "BTCUSDT".into();
        let entry = weight_entry(3);
        let cache = spec_cache();
        let flat_target = TargetDepth { depth: 0.0, price: 50_000.0, contributing_timestamps: vec![] };
        let snap = snapshot(10_000.0);

        reconcile_symbol(&account, &snap, &symbol, &entry, &flat_target, &cache).await.unwrap();
    }

    #[test]
    fn classify_detects_flip() {
        assert_eq!(classify(1.0, -1.0, 0.001), Operation::Flip);
        assert_eq!(classify(0.0, 1.0, 0.001), Operation::Resize);
        assert_eq!(classify(1.0, 0.0, 0.001), Operation::Close);
        assert_eq!(classify(1.0, 1.0, 0.001), Operation::Noop);
    }

    #[test]
    fn classify_treats_sub_size_step_delta_as_noop() {
        // 0.0005 short of target is within a 0.001 size_step and should not
        // trigger a resize, even though it isn't bit-for-bit equal.
        assert_eq!(classify(1.0, 1.0005, 0.001), Operation::Noop);
        assert_eq!(classify(1.0, 1.002, 0.001), Operation::Resize);
    }

    #[tokio::test]
    async fn leverage_change_closes_first_when_venue_disallows_live_change() {
        // SymbolSpec::default() has allows_change_while_open = false, so a
        // leverage-only mismatch on an existing position must close to flat,
        // change leverage, then reopen -- never call set_leverage while open.
        let account = MockAccountAdapter::with_config(
            "bybit".into(),
            10_000.0,
            crate::accounts::MockAccountConfig { base_latency_ms: 0, latency_jitter_ms: 0, reject_prob: 0.0, reject_symbols: Default::default() },
        );
        let symbol: CanonicalSymbol = "BTCUSDT".into();
        account.place_market(&symbol, 0.03).await.unwrap();

        let target = TargetDepth { depth: 0.03, price: 50_000.0, contributing_timestamps: vec![] };
        let entry = weight_entry(5);
        let snap = AccountSnapshot { total_equity: 10_000.0, positions: account.get_positions().await.unwrap().into_iter().collect() };
        let cache = spec_cache();

        reconcile_symbol(&account, &snap, &symbol, &entry, &target, &cache).await.unwrap();

        let positions = account.get_positions().await.unwrap();
        let (_, position) = positions.iter().find(|(s, _)| *s == symbol).unwrap();
        assert_eq!(position.leverage, 5);
    }
}
