use scope_cache::CacheConfig;
use serde::Deserialize;
use solana_commitment_config::CommitmentConfig;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    #[serde(default = "Config::default_rpc_url")]
    pub rpc_url: String,
    /// Derived from `rpc_url` when absent.
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default = "Config::default_commitment")]
    pub commitment: CommitmentConfig,
    /// Events are only logged when unset.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Addresses per `getMultipleAccounts` request.
    #[serde(default = "Config::default_rpc_batch_size")]
    pub rpc_batch_size: usize,
    /// Delay before re-subscribing after a websocket drops.
    #[serde(default = "Config::default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: Self::default_rpc_url(),
            ws_url: None,
            commitment: Self::default_commitment(),
            webhook_url: None,
            rpc_batch_size: Self::default_rpc_batch_size(),
            reconnect_delay_secs: Self::default_reconnect_delay_secs(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    pub fn default_rpc_url() -> String {
        "https://api.mainnet-beta.solana.com".to_owned()
    }

    pub fn default_commitment() -> CommitmentConfig {
        CommitmentConfig::confirmed()
    }

    pub fn default_rpc_batch_size() -> usize {
        100
    }

    pub fn default_reconnect_delay_secs() -> u64 {
        5
    }

    pub fn get_config() -> Self {
        match std::env::args().nth(1) {
            Some(s) => if s == "-" {
                use std::io::Read;
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .map_err(|error| {
                        tracing::error!("Error reading STDIN: {}", error);
                    })
                    .map(move |_| buf)
            } else {
                std::fs::read_to_string(s).map_err(|error| {
                    tracing::error!("Error reading config: {}", error);
                })
            }
            .and_then(|s| {
                toml::from_str(&s).map_err(|error| {
                    tracing::error!("Error parsing config: {}", error);
                })
            })
            .map_err(|_| {
                tracing::warn!("Invalid config file, using default");
            })
            .unwrap_or_default(),
            None => {
                tracing::info!("No config specified, using default");
                Config::default()
            }
        }
    }

    pub fn ws_url(&self) -> String {
        match &self.ws_url {
            Some(url) => url.clone(),
            None => {
                let url = self.rpc_url.replacen("https://", "wss://", 1);
                url.replacen("http://", "ws://", 1)
            }
        }
    }
}
