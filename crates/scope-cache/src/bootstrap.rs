//! Cold start: build fully populated registries before the cache exists.

use crate::{
    ScopeCache,
    config::CacheConfig,
    error::BootstrapError,
    feed::FeedConfiguration,
    mapping::MappingSnapshot,
    notify::Notifier,
    persist::Store,
    reserve::ReserveSnapshot,
    rpc::{LedgerRpc, ProgramScan, fetch_chunked},
    state::{CacheState, ReserveOutcome},
    vault::VaultContext,
};
use hashbrown::{HashMap, HashSet};
use kamino_accounts::{ReserveAccount, VaultStateAccount};
use solana_pubkey::Pubkey;
use std::sync::Arc;
use tracing::{info, warn};

type Result<T> = std::result::Result<T, BootstrapError>;

struct Loaded {
    reserves: Vec<ReserveSnapshot>,
    /// `reserves.json` must be rewritten from the scan.
    scanned: bool,
    /// Keyed by configuration address.
    feeds: HashMap<Pubkey, FeedConfiguration>,
    mappings: Vec<MappingSnapshot>,
}

/// Load reserves, Scope feeds, mapping tables and vaults, from disk where
/// possible and from the ledger otherwise.
///
/// Malformed ledger accounts and missing mapping tables abort; malformed
/// files on disk are skipped.
pub async fn bootstrap(
    config: CacheConfig,
    rpc: &dyn LedgerRpc,
    notifier: Arc<dyn Notifier>,
) -> Result<Arc<ScopeCache>> {
    let store = Store::new(&config.data_dir);
    store.create_dirs()?;

    let vault_scan = ProgramScan::vault_states(config.kvault_program);
    let (loaded, vaults) = tokio::join!(load(&config, &store, rpc), rpc.scan(&vault_scan));
    let loaded = loaded?;
    let vaults = vaults?.accounts;

    let mut state = CacheState::default();
    for mappings in loaded.mappings {
        state.install_mappings(mappings);
    }
    for feed in loaded.feeds.into_values() {
        state.install_feed(feed);
    }
    for reserve in loaded.reserves {
        let address = reserve.address;
        let price_feed = reserve.price_feed();
        if let ReserveOutcome::Discarded = state.apply_reserve(reserve) {
            warn!(%address, %price_feed, "reserve price feed has no configuration, holding it");
        }
    }
    for update in vaults {
        let account = VaultStateAccount::decode(&update.data).map_err(|source| {
            BootstrapError::Malformed {
                kind: "vault state",
                address: update.address,
                source,
            }
        })?;
        state.apply_vault(VaultContext::new(update.address, update.slot, account));
    }

    if loaded.scanned {
        if let Err(error) = store.write_reserves(&state.market_records()) {
            warn!("{}", error);
        }
    }

    let cache = ScopeCache::new(config, state, store, notifier);
    info!(
        reserves = cache.reserve_count(),
        feeds = cache.feed_count(),
        watched = cache.watched().len(),
        "scope cache ready"
    );
    Ok(Arc::new(cache))
}

async fn load(config: &CacheConfig, store: &Store, rpc: &dyn LedgerRpc) -> Result<Loaded> {
    let persisted = match store.read_reserves() {
        Ok(persisted) => persisted,
        Err(error) => {
            warn!("{}, scanning reserves", error);
            None
        }
    };
    let scanned = persisted.is_none();
    let reserves: Vec<ReserveSnapshot> = match persisted {
        Some(markets) => markets
            .iter()
            .flat_map(|m| m.reserves.iter().map(move |r| (m.market, r)))
            .filter_map(|(market, record)| match record.to_snapshot(market) {
                Ok(reserve) => Some(reserve),
                Err(error) => {
                    warn!(address = %record.reserve, "skipping persisted reserve: {}", error);
                    None
                }
            })
            .collect(),
        None => rpc
            .scan(&ProgramScan::reserves(config.klend_program))
            .await?
            .accounts
            .into_iter()
            .map(|update| {
                ReserveAccount::decode(&update.data)
                    .map(|account| ReserveSnapshot::new(update.address, update.slot, account))
                    .map_err(|source| BootstrapError::Malformed {
                        kind: "reserve",
                        address: update.address,
                        source,
                    })
            })
            .collect::<Result<Vec<_>>>()?,
    };
    let needed: HashSet<Pubkey> = reserves
        .iter()
        .filter(|r| r.has_feed())
        .map(|r| r.price_feed())
        .collect();

    let mut feeds = read_configurations(store)?;
    let covered: HashSet<Pubkey> = feeds.values().map(FeedConfiguration::price_feed).collect();
    if !needed.is_subset(&covered) {
        let scan = ProgramScan::configurations(config.scope_program);
        for update in rpc.scan(&scan).await?.accounts {
            let feed = FeedConfiguration::new(update.address, update.slot, &update.data).map_err(
                |source| BootstrapError::Malformed {
                    kind: "configuration",
                    address: update.address,
                    source,
                },
            )?;
            if feeds
                .get(&feed.configuration)
                .is_some_and(|known| known.raw_prefix == feed.raw_prefix)
            {
                continue;
            }
            if let Err(error) = store.write_configuration(&feed.configuration, &feed.raw_prefix) {
                warn!("{}", error);
            }
            feeds.insert(feed.configuration, feed);
        }
    }

    let referenced: HashSet<Pubkey> = feeds.values().map(FeedConfiguration::mappings).collect();
    let mut mappings = read_mappings(store, &referenced)?;
    let loaded: HashSet<Pubkey> = mappings.iter().map(|m| m.address).collect();
    let mut missing: Vec<Pubkey> = referenced.difference(&loaded).copied().collect();
    missing.sort();
    if !missing.is_empty() {
        let mut found = fetch_chunked(rpc, &missing).await?;
        for address in missing {
            let update = found.remove(&address).ok_or(BootstrapError::Missing {
                kind: "oracle mappings",
                address,
            })?;
            let snapshot = MappingSnapshot::decode(address, update.slot, &update.data).map_err(
                |source| BootstrapError::Malformed {
                    kind: "oracle mappings",
                    address,
                    source,
                },
            )?;
            if let Err(error) = store.write_mappings(&address, &snapshot.data) {
                warn!("{}", error);
            }
            mappings.push(snapshot);
        }
    }

    Ok(Loaded {
        reserves,
        scanned,
        feeds,
        mappings,
    })
}

fn read_configurations(store: &Store) -> Result<HashMap<Pubkey, FeedConfiguration>> {
    let mut feeds = HashMap::new();
    for (address, data) in store.read_configurations()? {
        match FeedConfiguration::new(address, 0, &data) {
            Ok(feed) => {
                feeds.insert(address, feed);
            }
            Err(error) => warn!(%address, "skipping persisted configuration: {}", error),
        }
    }
    Ok(feeds)
}

fn read_mappings(store: &Store, referenced: &HashSet<Pubkey>) -> Result<Vec<MappingSnapshot>> {
    let mut mappings = Vec::new();
    for (address, data) in store.read_mappings()? {
        if !referenced.contains(&address) {
            continue;
        }
        match MappingSnapshot::decode(address, 0, &data) {
            Ok(snapshot) => mappings.push(snapshot),
            Err(error) => warn!(%address, "skipping persisted mappings: {}", error),
        }
    }
    Ok(mappings)
}
