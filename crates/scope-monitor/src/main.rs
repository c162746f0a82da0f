use scope_cache::{LogNotifier, Notifier, WebhookNotifier, bootstrap, reconcile};
use scope_monitor::{Config, ledger::SolanaLedger, subscribe};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::get_config();
    tracing::info!(rpc_url = %config.rpc_url, data_dir = ?config.cache.data_dir, "starting");

    let notifier: Arc<dyn Notifier> = match &config.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())?),
        None => {
            tracing::info!("No webhook configured, events are only logged");
            Arc::new(LogNotifier)
        }
    };

    let ledger = Arc::new(SolanaLedger::new(
        config.rpc_url.clone(),
        config.commitment,
        config.rpc_batch_size,
    ));
    let cache = bootstrap(config.cache.clone(), ledger.as_ref(), notifier).await?;

    let shutdown = CancellationToken::new();
    let subscriber = tokio::spawn(subscribe::run(
        cache.clone(),
        config.ws_url(),
        config.commitment,
        Duration::from_secs(config.reconnect_delay_secs),
        shutdown.clone(),
    ));
    let reconciler = tokio::spawn(reconcile::run(cache.clone(), ledger, shutdown.clone()));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    shutdown.cancel();
    let (subscriber, reconciler) = tokio::join!(subscriber, reconciler);
    subscriber?;
    reconciler?;

    if cache.pending() > 0 {
        cache.persist_reserves();
    }
    Ok(())
}
