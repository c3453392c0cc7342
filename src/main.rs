//! Entrypoint: loads configuration, builds adapters from `credentials.json`,
//! then hands off to the cycle driver until a shutdown signal arrives.

use clap::Parser;
use dotenv::dotenv;
use signal_reconciler::accounts::{AccountAdapter, GenericRestAccountAdapter, MockAccountAdapter};
use signal_reconciler::asset_mapper::AssetMapper;
use signal_reconciler::config::{Cli, Settings};
use signal_reconciler::credentials::{self, CredentialEntry};
use signal_reconciler::cycle::{spawn_shutdown_listener, CycleDriver};
use signal_reconciler::signals::{FileSignalAdapter, SignalAdapter};
use signal_reconciler::spec_cache::SymbolSpecCache;
use signal_reconciler::weight_config::WeightConfig;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv();
    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::from_cli(cli);

    let weight_config = Arc::new(WeightConfig::load(&settings.weight_config_path())?);
    let asset_mapper = Arc::new(AssetMapper::load(&settings.asset_mapping_path())?);
    let credential_entries = credentials::load(&settings.credentials_path())?;

    let signal_adapters = build_signal_adapters(&settings, &asset_mapper);
    let accounts = build_account_adapters(&credential_entries);

    info!(
        accounts = accounts.len(),
        signal_sources = signal_adapters.len(),
        config_dir = %settings.config_dir.display(),
        "signal reconciler starting"
    );

    let driver = CycleDriver {
        settings,
        weight_config,
        asset_mapper,
        signal_adapters,
        accounts,
        spec_cache: Arc::new(SymbolSpecCache::new()),
    };

    let shutdown = spawn_shutdown_listener();
    driver.run(shutdown).await;
    Ok(())
}

/// One file-backed adapter per raw-signal source directory.
/// Network-polled sources are wired in by operators that need them --
/// `NetworkSignalAdapter::spawn` requires a live endpoint this binary has
/// no generic default for.
fn build_signal_adapters(settings: &Settings, asset_mapper: &Arc<AssetMapper>) -> Vec<Arc<dyn SignalAdapter>> {
    const KNOWN_SOURCES: &[&str] = &["tradingview", "bittensor"];
    KNOWN_SOURCES
        .iter()
        .map(|source| {
            let dir = settings.raw_signals_dir(source);
            Arc::new(FileSignalAdapter::new((*source).into(), dir, asset_mapper.clone())) as Arc<dyn SignalAdapter>
        })
        .collect()
}

fn build_account_adapters(entries: &[CredentialEntry]) -> Vec<(CredentialEntry, Arc<dyn AccountAdapter>)> {
    let mut accounts = Vec::with_capacity(entries.len());
    for entry in entries {
        if !entry.enabled {
            warn!(exchange = %entry.exchange_name, "account disabled in credentials.json, skipping");
            continue;
        }
        let account_id = entry.account_id();
        let adapter: Arc<dyn AccountAdapter> = if entry.exchange_name == "paper" {
            Arc::new(MockAccountAdapter::new(account_id, 10_000.0))
        } else {
            let base_url = format!("https://api.{}.com", entry.exchange_name);
            Arc::new(GenericRestAccountAdapter::new(account_id, base_url, entry))
        };
        accounts.push((entry.clone(), adapter));
    }
    if accounts.is_empty() {
        error!("no enabled accounts in credentials.json -- nothing to reconcile");
    }
    accounts
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL")
                .unwrap_or_else(|_| "signal_reconciler=info,reconciler=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
