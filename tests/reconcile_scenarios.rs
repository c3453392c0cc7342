//! End-to-end reconciliation scenarios, mirroring the worked examples used
//! to design the state machine and quantization rule: a clean skip, an
//! open from flat, a long-to-short flip, a chunked large order, the
//! TradingView race-reorder case, and per-symbol failure isolation.

use signal_reconciler::accounts::{AccountAdapter, MockAccountAdapter, MockAccountConfig};
use signal_reconciler::cache::ExecutionCache;
use signal_reconciler::model::{CanonicalSymbol, SourceWeight, TargetDepth, WeightEntry};
use signal_reconciler::reconcile::{run_cycle, AccountJob};
use signal_reconciler::signals::tradingview::{latest_of, reorder_race_pairs};
use signal_reconciler::spec_cache::SymbolSpecCache;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

fn no_shutdown() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

fn instant_account(equity: f64) -> Arc<dyn AccountAdapter> {
    Arc::new(MockAccountAdapter::with_config(
        "bybit".into(),
        equity,
        MockAccountConfig { base_latency_ms: 0, latency_jitter_ms: 0, reject_prob: 0.0, reject_symbols: Default::default() },
    ))
}

fn single_symbol_job(
    account: Arc<dyn AccountAdapter>,
    cache_path: std::path::PathBuf,
    symbol: &str,
    leverage: u32,
    target_depth: f64,
    price: f64,
) -> AccountJob {
    let mut weights = HashMap::new();
    weights.insert(
        CanonicalSymbol::from(symbol),
        WeightEntry { symbol: symbol.into(), leverage, sources: vec![SourceWeight { source: "tv".into(), weight: 1.0 }] },
    );
    let mut targets = HashMap::new();
    targets.insert(CanonicalSymbol::from(symbol), TargetDepth { depth: target_depth, price, contributing_timestamps: vec![] });

    AccountJob {
        account,
        cache_path,
        weights: Arc::new(weights),
        targets: Arc::new(targets),
        spec_cache: Arc::new(SymbolSpecCache::new()),
    }
}

#[tokio::test]
async fn clean_symbol_is_never_touched() {
    // tv depth=0.5 @ weight 0.1, bt depth=0.5 @ weight 0.15 -> blended 0.125.
    let account = instant_account(10_000.0);
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("bybit.json");

    let target = TargetDepth { depth: 0.125, price: 50_000.0, contributing_timestamps: vec![] };
    {
        let mut seeded = ExecutionCache::load(cache_path.clone()).await;
        seeded.set("BTCUSDT".into(), target.clone());
        seeded.commit().await.unwrap();
    }

    let mut weights = HashMap::new();
    weights.insert(
        CanonicalSymbol::from("BTCUSDT"),
        WeightEntry {
            symbol: "BTCUSDT".into(),
            leverage: 3,
            sources: vec![SourceWeight { source: "tv".into(), weight: 0.1 }, SourceWeight { source: "bt".into(), weight: 0.15 }],
        },
    );
    let mut targets = HashMap::new();
    targets.insert(CanonicalSymbol::from("BTCUSDT"), target);

    let job = AccountJob {
        account: account.clone(),
        cache_path,
        weights: Arc::new(weights),
        targets: Arc::new(targets),
        spec_cache: Arc::new(SymbolSpecCache::new()),
    };
    run_cycle(vec![job], no_shutdown()).await;

    let positions = account.get_positions().await.unwrap();
    assert!(positions.is_empty(), "clean symbol must not place any order");
}

#[tokio::test]
async fn opens_position_from_flat() {
    let account = instant_account(10_000.0);
    let dir = tempfile::tempdir().unwrap();
    let job = single_symbol_job(account.clone(), dir.path().join("bybit.json"), "BTCUSDT", 3, 0.125, 50_000.0);
    run_cycle(vec![job], no_shutdown()).await;

    let positions = account.get_positions().await.unwrap();
    let (_, position) = positions.iter().find(|(s, _)| s.as_str() == "BTCUSDT").unwrap();
    // depth 0.125 * equity 10_000 * leverage 3 / price 50_000 = 0.075 BTC
    assert!((position.size - 0.075).abs() < 1e-6);
}

#[tokio::test(start_paused = true)]
async fn flips_long_to_short() {
    let account = instant_account(10_000.0);
    let btc: CanonicalSymbol = "BTCUSDT".into();
    account.place_market(&btc, 0.075).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    // Current +0.075 BTC, new target depth -0.125 -> close then reopen short.
    let job = single_symbol_job(account.clone(), dir.path().join("bybit.json"), "BTCUSDT", 3, -0.125, 50_000.0);
    run_cycle(vec![job], no_shutdown()).await;

    let positions = account.get_positions().await.unwrap();
    let (_, position) = positions.iter().find(|(s, _)| s.as_str() == "BTCUSDT").unwrap();
    assert!((position.size + 0.075).abs() < 1e-6, "position should have flipped to -0.075 BTC short");
}

#[tokio::test]
async fn chunks_a_large_order() {
    // equity 10,000,000 * depth 0.5 * leverage 5 / price 50,000 = 500 BTC,
    // split into five 100 BTC chunks at the default max_single_order_size.
    let account = instant_account(10_000_000.0);
    let dir = tempfile::tempdir().unwrap();
    let job = single_symbol_job(account.clone(), dir.path().join("bybit.json"), "BTCUSDT", 5, 0.5, 50_000.0);
    run_cycle(vec![job], no_shutdown()).await;

    let positions = account.get_positions().await.unwrap();
    let (_, position) = positions.iter().find(|(s, _)| s.as_str() == "BTCUSDT").unwrap();
    assert!((position.size - 500.0).abs() < 1e-6);
}

#[test]
fn race_reordered_signal_resolves_to_terminal_flat() {
    use chrono::{TimeZone, Utc};
    use signal_reconciler::model::RawSignal;

    let ts = |h: u32, m: u32, s: u32, millis: i64| Utc.with_ymd_and_hms(2026, 1, 1, h, m, s).unwrap() + chrono::Duration::milliseconds(millis);

    let signals = vec![
        RawSignal { source_symbol: "BTCUSDT".into(), depth: -1.0, price: 50_000.0, timestamp: ts(17, 32, 0, 883) + chrono::Duration::microseconds(979), leverage: None },
        RawSignal { source_symbol: "BTCUSDT".into(), depth: 0.0, price: 50_000.0, timestamp: ts(17, 32, 0, 890) + chrono::Duration::microseconds(186), leverage: None },
    ];

    let (reordered, adjustments) = reorder_race_pairs(&signals);
    assert_eq!(adjustments.len(), 1);
    let terminal = latest_of(&reordered).unwrap();
    assert_eq!(terminal.depth, 0.0);
}

#[tokio::test]
async fn per_symbol_failure_is_isolated() {
    // One account, two symbols: ETHUSDT is wired to always reject venue
    // calls while BTCUSDT is untouched, so a single cycle must produce a
    // mixed outcome within the same account's symbol fan-out -- BTCUSDT
    // reconciled, ETHUSDT failed and left out of the committed cache.
    let account: Arc<dyn AccountAdapter> = Arc::new(MockAccountAdapter::with_config(
        "bybit".into(),
        10_000.0,
        MockAccountConfig {
            base_latency_ms: 0,
            latency_jitter_ms: 0,
            reject_prob: 0.0,
            reject_symbols: [CanonicalSymbol::from("ETHUSDT")].into_iter().collect(),
        },
    ));

    let mut weights = HashMap::new();
    weights.insert(
        CanonicalSymbol::from("BTCUSDT"),
        WeightEntry { symbol: "BTCUSDT".into(), leverage: 3, sources: vec![SourceWeight { source: "tv".into(), weight: 1.0 }] },
    );
    weights.insert(
        CanonicalSymbol::from("ETHUSDT"),
        WeightEntry { symbol: "ETHUSDT".into(), leverage: 2, sources: vec![SourceWeight { source: "tv".into(), weight: 1.0 }] },
    );
    let mut targets = HashMap::new();
    targets.insert(CanonicalSymbol::from("BTCUSDT"), TargetDepth { depth: 0.025, price: 50_000.0, contributing_timestamps: vec![] });
    targets.insert(CanonicalSymbol::from("ETHUSDT"), TargetDepth { depth: 0.025, price: 3_000.0, contributing_timestamps: vec![] });

    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("bybit.json");
    let job = AccountJob {
        account: account.clone(),
        cache_path: cache_path.clone(),
        weights: Arc::new(weights),
        targets: Arc::new(targets),
        spec_cache: Arc::new(SymbolSpecCache::new()),
    };

    run_cycle(vec![job], no_shutdown()).await;

    let positions = account.get_positions().await.unwrap();
    assert!(positions.iter().any(|(s, p)| s.as_str() == "BTCUSDT" && p.size > 0.0), "BTCUSDT should have reconciled despite ETHUSDT failing");
    assert!(!positions.iter().any(|(s, _)| s.as_str() == "ETHUSDT"), "ETHUSDT failed and should not have placed an order");

    let final_cache = ExecutionCache::load(cache_path).await;
    assert!(final_cache.get(&CanonicalSymbol::from("BTCUSDT")).is_some());
    assert!(final_cache.get(&CanonicalSymbol::from("ETHUSDT")).is_none());
}
