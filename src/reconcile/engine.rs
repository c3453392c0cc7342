//! Three-level parallel reconciliation engine: accounts run unbounded in
//! parallel (L1), symbols within an account are bounded by a semaphore
//! (L2), and each symbol's own operations run strictly sequentially (L3,
//! inside `state_machine::reconcile_symbol`).
//!
//! Grounded on `vault/trade_executor.rs::process_signal`'s per-item
//! isolated error handling (one user's failure never aborts the others)
//! and on `src/main.rs`'s `DataSourceKillSwitch` posture of isolating
//! failures rather than taking the whole loop down.

use crate::accounts::AccountAdapter;
use crate::aggregator::is_dirty;
use crate::cache::ExecutionCache;
use crate::config::PER_ACCOUNT_SYMBOL_CONCURRENCY;
use crate::model::{AccountSnapshot, CanonicalSymbol, TargetDepth, WeightEntry};
use crate::reconcile::state_machine::reconcile_symbol;
use crate::spec_cache::SymbolSpecCache;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// One account's worth of everything the engine needs to reconcile it,
/// assembled by the cycle driver before fan-out.
pub struct AccountJob {
    pub account: Arc<dyn AccountAdapter>,
    pub cache_path: std::path::PathBuf,
    pub weights: Arc<HashMap<CanonicalSymbol, WeightEntry>>,
    pub targets: Arc<HashMap<CanonicalSymbol, TargetDepth>>,
    pub spec_cache: Arc<SymbolSpecCache>,
}

/// Runs every account's reconciliation concurrently (L1 unbounded), each
/// spawned as its own task so one account's panic or hang cannot stall
/// another's. `shutdown` is checked before dispatching each symbol: a
/// signal mid-cycle lets every already-dispatched symbol finish its own
/// VERIFY and commit, but stops new symbol work from starting.
pub async fn run_cycle(jobs: Vec<AccountJob>, shutdown: Arc<AtomicBool>) {
    let mut join_set = tokio::task::JoinSet::new();
    for job in jobs {
        let shutdown = shutdown.clone();
        join_set.spawn(async move { reconcile_account(job, shutdown).await });
    }

    while let Some(result) = join_set.join_next().await {
        if let Err(e) = result {
            error!(error = %e, "account reconciliation task panicked");
        }
    }
}

async fn reconcile_account(job: AccountJob, shutdown: Arc<AtomicBool>) {
    let account_id = job.account.account_id().clone();

    // L1 snapshot discipline: equity and positions are fetched exactly
    // once here, before any symbol task runs, and shared read-only.
    let snapshot = match fetch_snapshot(job.account.as_ref()).await {
        Ok(snapshot) => Arc::new(snapshot),
        Err(e) => {
            error!(account = %account_id, error = %e, "failed to snapshot account, skipping this cycle");
            return;
        }
    };

    let mut cache = ExecutionCache::load(job.cache_path.clone()).await;
    let semaphore = Arc::new(Semaphore::new(PER_ACCOUNT_SYMBOL_CONCURRENCY));
    let mut join_set = tokio::task::JoinSet::new();

    for (symbol, weight_entry) in job.weights.iter() {
        if shutdown.load(Ordering::SeqCst) {
            info!(account = %account_id, "shutdown requested, no further symbols dispatched this cycle");
            break;
        }

        let Some(target) = job.targets.get(symbol) else { continue };
        if !is_dirty(target, cache.get(symbol)) {
            continue;
        }

        let semaphore = semaphore.clone();
        let account = job.account.clone();
        let snapshot = snapshot.clone();
        let spec_cache = job.spec_cache.clone();
        let symbol = symbol.clone();
        let weight_entry = weight_entry.clone();
        let target = target.clone();

        join_set.spawn(async move {
            // L2: bounded by the per-account symbol concurrency semaphore.
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            let result = reconcile_symbol(account.as_ref(), &snapshot, &symbol, &weight_entry, &target, &spec_cache).await;
            (symbol, target, result)
        });
    }

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((symbol, target, Ok(()))) => {
                cache.set(symbol, target);
            }
            Ok((symbol, _target, Err(e))) => {
                warn!(account = %account_id, symbol = %symbol, error = %e, "symbol reconcile failed, isolated from rest of account");
            }
            Err(e) => {
                error!(account = %account_id, error = %e, "symbol reconcile task panicked");
            }
        }
    }

    if let Err(e) = cache.commit().await {
        error!(account = %account_id, error = %e, "failed to commit execution cache");
    } else {
        info!(account = %account_id, "cycle committed");
    }
}

async fn fetch_snapshot(account: &dyn AccountAdapter) -> Result<AccountSnapshot, crate::error::AdapterError> {
    let total_equity = account.get_total_equity().await?;
    let positions = account.get_positions().await?.into_iter().collect();
    Ok(AccountSnapshot { total_equity, positions })
}
