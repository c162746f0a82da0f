use kamino_accounts::{KLEND_PROGRAM, KVAULT_PROGRAM, SCOPE_PROGRAM};
use serde::Deserialize;
use solana_pubkey::Pubkey;
use std::{path::PathBuf, time::Duration};

#[derive(Deserialize, Clone, Debug)]
pub struct CacheConfig {
    /// Root of `reserves.json` and the `scope/` raw account directories.
    #[serde(default = "CacheConfig::default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "CacheConfig::default_klend", with = "utils::serde_bs58")]
    pub klend_program: Pubkey,
    #[serde(default = "CacheConfig::default_scope", with = "utils::serde_bs58")]
    pub scope_program: Pubkey,
    #[serde(default = "CacheConfig::default_kvault", with = "utils::serde_bs58")]
    pub kvault_program: Pubkey,
    /// Upper bound between two reconciliation cycles.
    #[serde(default = "CacheConfig::default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Lower bound between two reconciliation cycles.
    #[serde(default = "CacheConfig::default_min_poll_delay_secs")]
    pub min_poll_delay_secs: u64,
    /// Re-scan every reserve on each cycle, dropping the ones that are gone.
    #[serde(default = "CacheConfig::default_poll_reserves")]
    pub poll_reserves: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
            klend_program: Self::default_klend(),
            scope_program: Self::default_scope(),
            kvault_program: Self::default_kvault(),
            poll_interval_secs: Self::default_poll_interval_secs(),
            min_poll_delay_secs: Self::default_min_poll_delay_secs(),
            poll_reserves: Self::default_poll_reserves(),
        }
    }
}

impl CacheConfig {
    pub fn default_data_dir() -> PathBuf {
        PathBuf::from("./kamino")
    }

    pub fn default_klend() -> Pubkey {
        KLEND_PROGRAM
    }

    pub fn default_scope() -> Pubkey {
        SCOPE_PROGRAM
    }

    pub fn default_kvault() -> Pubkey {
        KVAULT_PROGRAM
    }

    pub fn default_poll_interval_secs() -> u64 {
        300
    }

    pub fn default_min_poll_delay_secs() -> u64 {
        5
    }

    pub fn default_poll_reserves() -> bool {
        true
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn min_poll_delay(&self) -> Duration {
        Duration::from_secs(self.min_poll_delay_secs.min(self.poll_interval_secs))
    }
}
