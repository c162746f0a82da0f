//! Outbound change notifications.

use crate::{
    record::{ConfigurationRecord, ReserveRecord, SlotChangeRecord},
    reserve::ReserveChange,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use solana_pubkey::Pubkey;
use std::time::Duration;
use tokio::runtime::Handle;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    #[serde(rename = "Kamino Reserve Change")]
    ReserveChanged {
        previous: ReserveRecord,
        latest: ReserveRecord,
        changes: Vec<ReserveChange>,
    },
    #[serde(rename = "New Scope Configuration")]
    NewConfiguration { configuration: ConfigurationRecord },
    #[serde(rename = "Scope Configuration Change")]
    ConfigurationChanged {
        previous: ConfigurationRecord,
        latest: ConfigurationRecord,
    },
    #[serde(rename = "Scope Mappings Change")]
    MappingsChanged {
        #[serde(with = "utils::serde_bs58")]
        mappings: Pubkey,
        #[serde(with = "utils::serde_bs58")]
        price_feed: Pubkey,
        slot: u64,
        changes: Vec<SlotChangeRecord>,
    },
    #[serde(rename = "Scope Account Deleted")]
    AccountDeleted {
        #[serde(with = "utils::serde_bs58")]
        address: Pubkey,
        configuration: Option<ConfigurationRecord>,
    },
    #[serde(rename = "Kamino Reserve Deleted")]
    ReserveDeleted { reserve: ReserveRecord },
}

impl CacheEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CacheEvent::ReserveChanged { .. } => "Kamino Reserve Change",
            CacheEvent::NewConfiguration { .. } => "New Scope Configuration",
            CacheEvent::ConfigurationChanged { .. } => "Scope Configuration Change",
            CacheEvent::MappingsChanged { .. } => "Scope Mappings Change",
            CacheEvent::AccountDeleted { .. } => "Scope Account Deleted",
            CacheEvent::ReserveDeleted { .. } => "Kamino Reserve Deleted",
        }
    }
}

/// Delivery is fire-and-forget: `post` must not block and failures are the
/// notifier's own business.
pub trait Notifier: Send + Sync {
    fn post(&self, event: &CacheEvent);
}

/// Logs events instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn post(&self, event: &CacheEvent) {
        match serde_json::to_string(event) {
            Ok(json) => tracing::info!(event = event.name(), "{}", json),
            Err(error) => tracing::warn!(event = event.name(), "could not encode event: {}", error),
        }
    }
}

/// POSTs each event as JSON to a webhook, one attempt per event.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    runtime: Handle,
}

impl WebhookNotifier {
    pub const TIMEOUT: Duration = Duration::from_secs(10);

    /// Must be called from within a tokio runtime.
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(Self::TIMEOUT).build()?,
            url: url.into(),
            runtime: Handle::current(),
        })
    }
}

impl Notifier for WebhookNotifier {
    fn post(&self, event: &CacheEvent) {
        let request = self.client.post(&self.url).json(event);
        let name = event.name();
        self.runtime.spawn(async move {
            match request.send().await.and_then(|r| r.error_for_status()) {
                Ok(_) => tracing::debug!(event = name, "webhook delivered"),
                Err(error) => tracing::warn!(event = name, "webhook failed: {}", error),
            }
        });
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    events: Mutex<Vec<CacheEvent>>,
}

impl MemoryNotifier {
    pub fn events(&self) -> Vec<CacheEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<CacheEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl Notifier for MemoryNotifier {
    fn post(&self, event: &CacheEvent) {
        self.events.lock().push(event.clone());
    }
}
