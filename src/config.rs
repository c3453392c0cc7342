//! Runtime settings. Nearly every knob here is a constant, not a
//! flag -- the only CLI surface is `--config-dir` (default `.`), following
//! the habit (seen in `models::Config::from_env`) of deriving a settings
//! struct even for a single binary.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Timing and concurrency knobs. All other configuration lives in JSON
/// files under `--config-dir` instead.
pub const CYCLE_PERIOD: Duration = Duration::from_secs(10);
pub const PER_ACCOUNT_SYMBOL_CONCURRENCY: usize = 10;
pub const MAX_RECONCILE_RETRIES: u32 = 2;
pub const CLOSE_THRESHOLD: Duration = Duration::from_secs(5);
pub const SPEC_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
pub const ADAPTER_FETCH_TIMEOUT: Duration = Duration::from_secs(5);
pub const ORDER_TIMEOUT: Duration = Duration::from_secs(15);
pub const CYCLE_SOFT_DEADLINE: Duration = Duration::from_secs(60);
pub const NETWORK_ADAPTER_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
#[command(name = "reconciler", about = "Signal-weighted futures reconciliation orchestrator")]
pub struct Cli {
    /// Directory holding signal_weight_config.json, asset_mapping_config.json,
    /// credentials.json, account_asset_depths.json, and raw_signals/.
    #[arg(long, env = "RECONCILER_CONFIG_DIR", default_value = ".")]
    pub config_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub config_dir: PathBuf,
}

impl Settings {
    pub fn from_cli(cli: Cli) -> Self {
        Self { config_dir: cli.config_dir }
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.config_dir.join(file_name)
    }

    pub fn weight_config_path(&self) -> PathBuf {
        self.path("signal_weight_config.json")
    }

    pub fn asset_mapping_path(&self) -> PathBuf {
        self.path("asset_mapping_config.json")
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.path("credentials.json")
    }

    pub fn execution_cache_path(&self, account: &str) -> PathBuf {
        self.config_dir
            .join("account_asset_depths")
            .join(format!("{account}.json"))
    }

    pub fn raw_signals_dir(&self, source: &str) -> PathBuf {
        self.config_dir.join("raw_signals").join(source)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self { config_dir: Path::new(".").to_path_buf() }
    }
}
