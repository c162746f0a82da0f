mod common;

use common::*;
use kamino_accounts::testing::reserve_bytes;
use kamino_accounts::{KLEND_PROGRAM, KVAULT_PROGRAM};
use scope_cache::{
    CacheConfig, CacheEvent, LedgerRpc, MemoryNotifier, bootstrap,
    reconcile::{self, CycleSummary, reconcile_once},
};
use std::{
    sync::{Arc, atomic::Ordering},
    time::Duration,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_deleted_configuration_removes_feed() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger(3, &[(1, reserve_fixture(100, vec![3]))]);
    let (cache, notifier) = start(dir.path(), &ledger).await;
    let store = cache.store();
    assert!(store.configuration_path(&key(CONFIGURATION)).exists());

    ledger.remove(&key(CONFIGURATION));
    let summary = reconcile_once(&cache, &ledger).await;

    assert_eq!(summary.removed, 1);
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.failed_requests, 0);
    assert!(summary.persisted);
    assert_eq!(cache.feed_count(), 0);
    assert!(cache.watched().is_empty());
    assert!(!store.configuration_path(&key(CONFIGURATION)).exists());
    assert!(!store.mappings_path(&key(MAPPINGS)).exists());
    assert_eq!(cache.pending(), 0);

    let reserve = cache.reserve_context(&key(1)).unwrap();
    assert!(reserve.price_chains.is_none());

    let events = notifier.take();
    let [
        CacheEvent::AccountDeleted {
            address,
            configuration: Some(configuration),
        },
    ] = &events[..]
    else {
        panic!("unexpected events {:?}", events);
    };
    assert_eq!(*address, key(CONFIGURATION));
    assert_eq!(configuration.oracle_mappings, key(MAPPINGS));
}

#[tokio::test]
async fn test_fetch_failure_removes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger(3, &[(1, reserve_fixture(100, vec![3]))]);
    let (cache, notifier) = start(dir.path(), &ledger).await;

    ledger.remove(&key(CONFIGURATION));
    ledger.fail_fetch.store(true, Ordering::SeqCst);
    let summary = reconcile_once(&cache, &ledger).await;

    assert_eq!(
        summary,
        CycleSummary {
            scanned: 1,
            failed_requests: 1,
            ..CycleSummary::default()
        }
    );
    assert_eq!(cache.feed_count(), 1);
    assert_eq!(cache.watched().len(), 2);
    assert!(notifier.events().is_empty());
}

#[tokio::test]
async fn test_deleted_reserve_removed() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger(
        3,
        &[
            (1, reserve_fixture(100, vec![3])),
            (2, reserve_fixture(50, vec![3, 4])),
        ],
    );
    let (cache, notifier) = start(dir.path(), &ledger).await;

    ledger.remove(&key(1));
    let summary = reconcile_once(&cache, &ledger).await;
    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.removed, 0);
    assert_eq!(summary.removed_reserves, 1);
    assert!(summary.persisted);

    assert!(cache.reserve_context(&key(1)).is_none());
    assert_eq!(cache.reserve_count(), 1);
    assert_eq!(
        cache.reserves_at_index(&key(CONFIGURATION), 3),
        vec![key(2)]
    );
    let by_mint: Vec<_> = cache
        .reserves_by_mint(&key(MINT))
        .iter()
        .map(|r| r.address)
        .collect();
    assert_eq!(by_mint, vec![key(2)]);

    let persisted = cache.store().read_reserves().unwrap().unwrap();
    let addresses: Vec<_> = persisted[0].reserves.iter().map(|r| r.reserve).collect();
    assert_eq!(addresses, vec![key(2)]);

    let events = notifier.take();
    let [CacheEvent::ReserveDeleted { reserve }] = &events[..] else {
        panic!("unexpected events {:?}", events);
    };
    assert_eq!(reserve.reserve, key(1));
    assert_eq!(
        serde_json::to_value(&events[0]).unwrap()["event"],
        "Kamino Reserve Deleted"
    );

    // pushed after the scan's slot, so not yet visible to it
    cache.accept(&update(
        key(3),
        9,
        reserve_bytes(&reserve_fixture(1, vec![4])),
    ));
    let summary = reconcile_once(&cache, &ledger).await;
    assert_eq!(summary.removed_reserves, 0);
    assert!(cache.reserve_context(&key(3)).is_some());
}

#[tokio::test]
async fn test_collateral_change_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger(3, &[(1, reserve_fixture(1000, vec![3]))]);
    let (cache, notifier) = start(dir.path(), &ledger).await;

    let shrunk = reserve_bytes(&reserve_fixture(500, vec![3]));
    ledger.put(KLEND_PROGRAM, key(1), 9, shrunk.clone());
    cache.accept(&update(key(1), 9, shrunk));
    assert!(notifier.events().is_empty());
    assert_eq!(cache.pending(), 1);

    let summary = reconcile_once(&cache, &ledger).await;
    assert!(summary.persisted);
    assert_eq!(cache.pending(), 0);
    let persisted = cache.store().read_reserves().unwrap().unwrap();
    assert_eq!(persisted[0].reserves[0].total_collateral, 500);
    assert_eq!(persisted[0].reserves[0].slot, 9);
}

#[tokio::test]
async fn test_polled_reserves_applied() {
    tracing_subscriber::fmt::try_init().ok();
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger(3, &[(1, reserve_fixture(100, vec![3]))]);
    let config = CacheConfig {
        poll_reserves: true,
        ..config(dir.path())
    };
    let notifier = Arc::new(MemoryNotifier::default());
    let cache = bootstrap(config, &ledger, notifier.clone()).await.unwrap();

    ledger.put(
        KLEND_PROGRAM,
        key(1),
        4,
        reserve_bytes(&reserve_fixture(100, vec![4])),
    );
    let summary = reconcile_once(&cache, &ledger).await;
    assert_eq!(summary.scanned, 1);
    assert!(summary.persisted);
    // bootstrap plus one cycle
    assert_eq!(ledger.scans_of(KVAULT_PROGRAM), 2);
    assert_eq!(cache.reserve_context(&key(1)).unwrap().slot, 4);
    assert_eq!(notifier.take().len(), 1);

    let persisted = cache.store().read_reserves().unwrap().unwrap();
    assert_eq!(persisted[0].reserves[0].slot, 4);

    let summary = reconcile_once(&cache, &ledger).await;
    assert!(!summary.persisted);
}

#[tokio::test(start_paused = true)]
async fn test_wait_full_interval_when_idle() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger(3, &[]);
    let (cache, _) = start(dir.path(), &ledger).await;

    let begin = Instant::now();
    assert!(reconcile::wait(&cache, &CancellationToken::new()).await);
    assert_eq!(begin.elapsed(), Duration::from_secs(300));
}

#[tokio::test(start_paused = true)]
async fn test_wait_min_delay_when_pending() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger(3, &[(5, reserve_fixture(9, vec![3]))]);
    let (cache, _) = start(dir.path(), &ledger).await;
    cache.accept(&update(
        key(1),
        4,
        reserve_bytes(&reserve_fixture(1, vec![3])),
    ));
    assert_eq!(cache.pending(), 1);

    let begin = Instant::now();
    assert!(reconcile::wait(&cache, &CancellationToken::new()).await);
    assert_eq!(begin.elapsed(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_wait_wakes_on_change() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger(3, &[(5, reserve_fixture(9, vec![3]))]);
    let (cache, _) = start(dir.path(), &ledger).await;

    let writer = cache.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        writer.accept(&update(
            key(1),
            4,
            reserve_bytes(&reserve_fixture(1, vec![3])),
        ));
    });

    let begin = Instant::now();
    assert!(reconcile::wait(&cache, &CancellationToken::new()).await);
    assert_eq!(begin.elapsed(), Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_wait_returns_false_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger(3, &[]);
    let (cache, _) = start(dir.path(), &ledger).await;

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        trigger.cancel();
    });
    assert!(!reconcile::wait(&cache, &shutdown).await);
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(ledger(3, &[]));
    let (cache, _) = start(dir.path(), &ledger).await;

    let shutdown = CancellationToken::new();
    let before = ledger.scans_of(KVAULT_PROGRAM);
    let rpc: Arc<dyn LedgerRpc> = ledger.clone();
    let handle = tokio::spawn(reconcile::run(cache, rpc, shutdown.clone()));

    tokio::time::sleep(Duration::from_secs(700)).await;
    shutdown.cancel();
    handle.await.unwrap();
    // one scan per cycle, cycles at 0s, 300s and 600s
    assert_eq!(ledger.scans_of(KVAULT_PROGRAM) - before, 3);
}
