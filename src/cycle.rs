//! Cycle Driver: `while running { run_cycle(); sleep() }` with no
//! self-overlap -- a cycle that runs past `CYCLE_PERIOD` starts its next
//! run immediately rather than stacking up. SIGINT/SIGTERM stop the loop
//! after the symbol currently being verified finishes its VERIFY step;
//! already-dispatched work drains, nothing new is dispatched.
//!
//! Grounded on a background `interval`-driven polling loop, generalized to
//! one top-level cooperative loop plus a `tokio::signal` shutdown listener.

use crate::accounts::AccountAdapter;
use crate::aggregator::SignalAggregator;
use crate::asset_mapper::AssetMapper;
use crate::config::{Settings, CYCLE_PERIOD, CYCLE_SOFT_DEADLINE};
use crate::credentials::CredentialEntry;
use crate::reconcile::{run_cycle, AccountJob};
use crate::signals::SignalAdapter;
use crate::spec_cache::SymbolSpecCache;
use crate::weight_config::WeightConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub struct CycleDriver {
    pub settings: Settings,
    pub weight_config: Arc<WeightConfig>,
    pub asset_mapper: Arc<AssetMapper>,
    pub signal_adapters: Vec<Arc<dyn SignalAdapter>>,
    pub accounts: Vec<(CredentialEntry, Arc<dyn AccountAdapter>)>,
    pub spec_cache: Arc<SymbolSpecCache>,
}

impl CycleDriver {
    /// Runs cycles until `shutdown` is signalled. No self-overlap: if a
    /// cycle takes longer than `CYCLE_PERIOD`, the next one starts the
    /// instant the previous commits, with no extra sleep.
    pub async fn run(&self, shutdown: Arc<AtomicBool>) {
        while !shutdown.load(Ordering::SeqCst) {
            let started = tokio::time::Instant::now();
            self.run_one_cycle(shutdown.clone()).await;
            let elapsed = started.elapsed();

            if elapsed > CYCLE_SOFT_DEADLINE {
                warn!(elapsed_ms = elapsed.as_millis(), deadline_ms = CYCLE_SOFT_DEADLINE.as_millis(), "cycle exceeded soft deadline, continuing anyway");
            }

            if elapsed < CYCLE_PERIOD {
                tokio::select! {
                    _ = tokio::time::sleep(CYCLE_PERIOD - elapsed) => {}
                    _ = wait_for_shutdown(&shutdown) => {}
                }
            } else {
                warn!(elapsed_ms = elapsed.as_millis(), period_ms = CYCLE_PERIOD.as_millis(), "cycle exceeded period, starting next immediately");
            }
        }
        info!("cycle driver stopped");
    }

    async fn run_one_cycle(&self, shutdown: Arc<AtomicBool>) {
        if let Err(e) = self.asset_mapper.reload(&self.settings.asset_mapping_path()) {
            warn!(error = %e, "asset mapping reload failed this cycle, using last good copy");
        }
        if let Err(e) = self.weight_config.reload(&self.settings.weight_config_path()) {
            warn!(error = %e, "weight config reload failed this cycle, using last good copy");
        }

        let weights = self.weight_config.snapshot();
        let aggregator = SignalAggregator::new(self.signal_adapters.clone());
        let targets = Arc::new(aggregator.aggregate(&weights).await);

        let jobs: Vec<AccountJob> = self
            .accounts
            .iter()
            .filter(|(credentials, _)| credentials.enabled)
            .map(|(credentials, account)| AccountJob {
                account: account.clone(),
                cache_path: self.settings.execution_cache_path(credentials.account_id().as_str()),
                weights: weights.clone(),
                targets: targets.clone(),
                spec_cache: self.spec_cache.clone(),
            })
            .collect();

        info!(accounts = jobs.len(), symbols = weights.len(), "starting cycle");
        run_cycle(jobs, shutdown).await;
    }
}

async fn wait_for_shutdown(shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::SeqCst) {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}

/// Installs a SIGINT/SIGTERM listener that flips `shutdown` once. The
/// cycle driver observes this between cycles (or during its inter-cycle
/// sleep) and stops; it never interrupts a cycle already in flight.
pub fn spawn_shutdown_listener() -> Arc<AtomicBool> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = terminate.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        info!("shutdown signal received, will stop after current cycle");
        flag.store(true, Ordering::SeqCst);
    });
    shutdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn wait_for_shutdown_returns_once_flag_flips() {
        let flag = Arc::new(AtomicBool::new(false));
        let flag2 = flag.clone();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter2 = counter.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            counter2.fetch_add(1, Ordering::SeqCst);
            flag2.store(true, Ordering::SeqCst);
        });
        wait_for_shutdown(&flag).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
