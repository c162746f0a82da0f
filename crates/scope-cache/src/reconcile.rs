//! Periodic polling that catches what the subscriptions missed, including
//! deleted accounts.

use crate::{
    ScopeCache,
    rpc::{LedgerRpc, ProgramScan, fetch_chunked},
};
use hashbrown::HashSet;
use std::sync::Arc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    /// Accounts returned by the program scans.
    pub scanned: usize,
    /// Watched accounts that still exist.
    pub fetched: usize,
    /// Watched accounts found missing and removed.
    pub removed: usize,
    /// Reserves the reserve scan no longer returned.
    pub removed_reserves: usize,
    pub failed_requests: usize,
    pub persisted: bool,
}

/// One reconciliation pass. Request failures are logged and counted; the
/// parts that did succeed are still applied.
///
/// Watched configurations and mapping tables are applied first so that
/// scanned reserves resolve against current tables.
pub async fn reconcile_once(cache: &ScopeCache, rpc: &dyn LedgerRpc) -> CycleSummary {
    let config = cache.config();
    let vault_scan = ProgramScan::vault_states(config.kvault_program);
    let reserve_scan = config
        .poll_reserves
        .then(|| ProgramScan::reserves(config.klend_program));
    let watched = cache.watched();
    let (fetched, vaults, reserves) = tokio::join!(
        fetch_chunked(rpc, &watched),
        rpc.scan(&vault_scan),
        async {
            match &reserve_scan {
                Some(scan) => rpc.scan(scan).await.map(Some),
                None => Ok(None),
            }
        },
    );

    let mut summary = CycleSummary::default();
    match fetched {
        Ok(found) => {
            summary.fetched = found.len();
            for address in watched.iter() {
                match found.get(address) {
                    Some(update) => cache.accept(update),
                    None => {
                        cache.remove_account(address);
                        summary.removed += 1;
                    }
                }
            }
        }
        Err(error) => {
            warn!("watched account fetch failed: {}", error);
            summary.failed_requests += 1;
        }
    }
    match vaults {
        Ok(vaults) => {
            summary.scanned += vaults.accounts.len();
            for update in &vaults.accounts {
                cache.accept(update);
            }
        }
        Err(error) => {
            warn!("vault scan failed: {}", error);
            summary.failed_requests += 1;
        }
    }
    match reserves {
        Ok(Some(reserves)) => {
            summary.scanned += reserves.accounts.len();
            let mut present = HashSet::with_capacity(reserves.accounts.len());
            for update in &reserves.accounts {
                present.insert(update.address);
                cache.accept(update);
            }
            summary.removed_reserves = cache.retain_scanned_reserves(&present, reserves.slot);
        }
        Ok(None) => {}
        Err(error) => {
            warn!("reserve scan failed: {}", error);
            summary.failed_requests += 1;
        }
    }

    let pending = cache.take_pending();
    if pending > 0 {
        debug!(pending, "persisting reserves");
        summary.persisted = cache.persist_reserves();
    } else {
        info!("no changes");
    }
    summary
}

/// Sleep at least `min_poll_delay` and at most `poll_interval`, returning
/// early once changes are pending. `false` on shutdown.
pub async fn wait(cache: &ScopeCache, shutdown: &CancellationToken) -> bool {
    let start = Instant::now();
    let earliest = start + cache.config().min_poll_delay();
    let latest = start + cache.config().poll_interval();
    tokio::select! {
        _ = shutdown.cancelled() => return false,
        _ = sleep_until(earliest) => {}
    }
    loop {
        if cache.pending() > 0 {
            return true;
        }
        tokio::select! {
            _ = shutdown.cancelled() => return false,
            _ = sleep_until(latest) => return true,
            _ = cache.changed() => {}
        }
    }
}

pub async fn run(cache: Arc<ScopeCache>, rpc: Arc<dyn LedgerRpc>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            summary = reconcile_once(&cache, rpc.as_ref()) => {
                debug!(?summary, "reconciled");
            }
        }
        if !wait(&cache, &shutdown).await {
            break;
        }
    }
    info!("stopped reconciliation");
}
