//! Routes raw account updates to the matching cache handler.

use crate::{ScopeCache, rpc::AccountUpdate};
use futures::{Stream, StreamExt};
use kamino_accounts::{ConfigurationAccount, OracleMappings, ReserveAccount, VaultStateAccount};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    Reserve,
    Mappings,
    Configuration,
    VaultState,
}

impl AccountKind {
    /// Exact size plus discriminator. Configurations may be the full account
    /// or the 200-byte prefix returned by sliced scans.
    pub fn classify(data: &[u8]) -> Option<Self> {
        if ReserveAccount::is_reserve(data) {
            Some(Self::Reserve)
        } else if VaultStateAccount::is_vault_state(data) {
            Some(Self::VaultState)
        } else if OracleMappings::is_mappings(data) {
            Some(Self::Mappings)
        } else if ConfigurationAccount::is_configuration(data) {
            Some(Self::Configuration)
        } else {
            None
        }
    }
}

impl ScopeCache {
    /// Handle one account update from a subscription or a poll. Never blocks
    /// on the network.
    pub fn accept(&self, update: &AccountUpdate) {
        match AccountKind::classify(&update.data) {
            Some(AccountKind::Reserve) => {
                self.accept_reserve(update);
            }
            Some(AccountKind::Mappings) => self.accept_mappings(update),
            Some(AccountKind::Configuration) => self.accept_configuration(update),
            Some(AccountKind::VaultState) => self.accept_vault(update),
            None => tracing::warn!(
                address = %update.address,
                len = update.data.len(),
                "unhandled account"
            ),
        }
    }
}

/// Feed a subscription stream into the cache until it ends or `shutdown`
/// fires.
pub async fn run<S>(cache: Arc<ScopeCache>, updates: S, shutdown: CancellationToken)
where
    S: Stream<Item = AccountUpdate>,
{
    let mut updates = std::pin::pin!(updates);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            update = updates.next() => match update {
                Some(update) => cache.accept(&update),
                None => {
                    tracing::warn!("account stream ended");
                    break;
                }
            },
        }
    }
    tracing::info!("stopped dispatching account updates");
}
