//! `credentials.json` is a list of per-venue generic-adapter entries. The
//! core treats everything beyond "is this account enabled" as opaque -- it
//! never inspects `api_key`/`api_secret` itself, those belong to whichever
//! `AccountAdapter` the entry selects.

use crate::error::ConfigError;
use crate::model::AccountId;
use serde::Deserialize;
use std::path::Path;

#[derive(Clone, Deserialize)]
pub struct CredentialEntry {
    pub exchange_name: String,
    pub api_key: String,
    pub api_secret: String,
    #[serde(default)]
    pub api_passphrase: Option<String>,
    #[serde(default)]
    pub leverage_override: Option<u32>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub copy_trading: bool,
}

fn default_true() -> bool {
    true
}

impl std::fmt::Debug for CredentialEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialEntry")
            .field("exchange_name", &self.exchange_name)
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .field("enabled", &self.enabled)
            .field("copy_trading", &self.copy_trading)
            .finish()
    }
}

impl CredentialEntry {
    /// Copy-trading sub-accounts get their own distinct `AccountId` rather
    /// than being multiplexed under the venue key.
    pub fn account_id(&self) -> AccountId {
        if self.copy_trading {
            AccountId::from(format!("{}:copy", self.exchange_name))
        } else {
            AccountId::from(self.exchange_name.clone())
        }
    }
}

pub fn load(path: &Path) -> Result<Vec<CredentialEntry>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let entries: Vec<CredentialEntry> = serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(entries)
}
