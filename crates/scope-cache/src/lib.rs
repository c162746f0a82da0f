//! A consistent in-memory view of Kamino Lending reserves and the Scope
//! oracle feeds that price them.
//!
//! The cache is populated by [`bootstrap::bootstrap`], then kept current by
//! [`dispatch::run`] (push subscriptions) and [`reconcile::run`] (polling).
//! Readers query it through [`ScopeCache`] from any thread.

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod feed;
pub mod mapping;
pub mod metas;
pub mod notify;
pub mod persist;
pub mod reconcile;
pub mod record;
pub mod reserve;
pub mod rpc;
mod state;
pub mod vault;
pub mod watch;

#[cfg(test)]
mod fixtures;

pub use bootstrap::bootstrap;
pub use cache::ScopeCache;
pub use config::CacheConfig;
pub use error::{BootstrapError, Error, Result};
pub use feed::{FeedConfiguration, FeedIndexes};
pub use mapping::MappingSnapshot;
pub use notify::{CacheEvent, LogNotifier, MemoryNotifier, Notifier, WebhookNotifier};
pub use reserve::{PriceChains, ReserveChange, ReserveSnapshot};
pub use rpc::{AccountUpdate, LedgerRpc, ProgramScan, RpcError, Scanned};
pub use vault::VaultContext;
