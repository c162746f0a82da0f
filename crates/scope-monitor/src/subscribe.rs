//! Program subscriptions feeding [`scope_cache::dispatch::run`].

use crate::ledger::{keyed_update, program_config};
use futures::StreamExt;
use scope_cache::{CacheConfig, ProgramScan, ScopeCache, dispatch};
use solana_commitment_config::CommitmentConfig;
use solana_pubsub_client::nonblocking::pubsub_client::{PubsubClient, PubsubClientError};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Reserves, Scope configurations and mapping tables, vault states.
pub fn subscriptions(config: &CacheConfig) -> Vec<ProgramScan> {
    vec![
        ProgramScan::reserves(config.klend_program),
        ProgramScan::configurations(config.scope_program),
        ProgramScan::mappings(config.scope_program),
        ProgramScan::vault_states(config.kvault_program),
    ]
}

/// Keep the subscriptions alive until `shutdown`, reconnecting after
/// `reconnect_delay` whenever the websocket drops.
pub async fn run(
    cache: Arc<ScopeCache>,
    ws_url: String,
    commitment: CommitmentConfig,
    reconnect_delay: Duration,
    shutdown: CancellationToken,
) {
    loop {
        if let Err(error) = subscribe(&cache, &ws_url, commitment, &shutdown).await {
            warn!("subscription failed: {}", error);
        }
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(reconnect_delay) => info!(%ws_url, "reconnecting"),
        }
    }
    info!("stopped subscriptions");
}

async fn subscribe(
    cache: &Arc<ScopeCache>,
    ws_url: &str,
    commitment: CommitmentConfig,
    shutdown: &CancellationToken,
) -> Result<(), PubsubClientError> {
    let client = PubsubClient::new(ws_url).await?;
    let scans = subscriptions(cache.config());
    let mut streams = Vec::with_capacity(scans.len());
    let mut unsubscribes = Vec::with_capacity(scans.len());
    for scan in &scans {
        let (stream, unsubscribe) = client
            .program_subscribe(&scan.program, Some(program_config(scan, commitment)))
            .await?;
        streams.push(stream);
        unsubscribes.push(unsubscribe);
    }
    info!(subscriptions = streams.len(), "subscribed");

    let updates = futures::stream::select_all(streams).filter_map(|response| {
        futures::future::ready(keyed_update(&response.value, response.context.slot))
    });
    dispatch::run(cache.clone(), updates, shutdown.clone()).await;

    for unsubscribe in unsubscribes {
        unsubscribe().await;
    }
    client.shutdown().await
}
