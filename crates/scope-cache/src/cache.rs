//! The consistency coordinator.

use crate::{
    config::CacheConfig,
    feed::{FeedConfiguration, FeedIndexes},
    mapping::MappingSnapshot,
    metas::AccountMetas,
    notify::{CacheEvent, Notifier},
    persist::Store,
    reserve::ReserveSnapshot,
    rpc::AccountUpdate,
    state::{CacheState, ConfigurationOutcome, MappingOutcome, Removal, ReserveOutcome},
    vault::VaultContext,
    watch::WatchSet,
};
use kamino_accounts::{OracleType, ReserveAccount, VaultStateAccount, is_null_key};
use hashbrown::HashSet;
use parking_lot::RwLock;
use solana_instruction::AccountMeta;
use solana_pubkey::Pubkey;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tokio::sync::{Notify, futures::Notified};
use tracing::{debug, error, info, warn};

/// Reserves, Scope feeds, mapping tables and vaults, indexed against each
/// other behind one lock.
///
/// Every mutation runs under the write lock; files and notifications are
/// written after the guard is released. Built by [`crate::bootstrap`].
pub struct ScopeCache {
    config: CacheConfig,
    state: RwLock<CacheState>,
    /// Indexed mutations since the last `reserves.json` write.
    pending: AtomicUsize,
    changed: Notify,
    watch: WatchSet,
    store: Store,
    notifier: Arc<dyn Notifier>,
    metas: AccountMetas,
}

impl ScopeCache {
    pub(crate) fn new(
        config: CacheConfig,
        state: CacheState,
        store: Store,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let watch = WatchSet::new(state.watch_keys());
        Self {
            config,
            state: RwLock::new(state),
            pending: AtomicUsize::new(0),
            changed: Notify::new(),
            watch,
            store,
            notifier,
            metas: AccountMetas::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub(crate) fn take_pending(&self) -> usize {
        self.pending.swap(0, Ordering::AcqRel)
    }

    /// Count a change for the next `reserves.json` write without waking the
    /// reconciliation loop.
    fn mark(&self, changes: usize) {
        self.pending.fetch_add(changes, Ordering::AcqRel);
    }

    fn signal(&self, changes: usize) {
        if changes > 0 {
            self.pending.fetch_add(changes, Ordering::AcqRel);
            self.changed.notify_one();
        }
    }

    /// Resolves after the next indexed mutation, or immediately if one
    /// happened since the last wait.
    pub(crate) fn changed(&self) -> Notified<'_> {
        self.changed.notified()
    }

    /// Addresses whose disappearance the reconciliation loop checks for.
    pub fn watched(&self) -> Arc<Vec<Pubkey>> {
        self.watch.snapshot()
    }

    pub fn reserve_count(&self) -> usize {
        self.state.read().reserves().count()
    }

    pub fn feed_count(&self) -> usize {
        self.state.read().feeds().count()
    }

    pub fn reserve_context(&self, address: &Pubkey) -> Option<Arc<ReserveSnapshot>> {
        self.state.read().reserve(address).cloned()
    }

    pub fn vault_for_share_mint(&self, shares_mint: &Pubkey) -> Option<Arc<VaultContext>> {
        self.state.read().vault(shares_mint).cloned()
    }

    pub fn mappings(&self, address: &Pubkey) -> Option<Arc<MappingSnapshot>> {
        self.state.read().mapping(address).cloned()
    }

    /// Reserves of `mint` across every feed, most collateral first.
    pub fn reserves_by_mint(&self, mint: &Pubkey) -> Vec<Arc<ReserveSnapshot>> {
        let mut reserves: Vec<_> = self
            .state
            .read()
            .feeds()
            .filter_map(|feed| feed.reserves_for_mint(mint))
            .flat_map(|reserves| reserves.to_vec())
            .collect();
        reserves.sort_by(|a, b| {
            b.total_collateral
                .cmp(&a.total_collateral)
                .then_with(|| a.address.cmp(&b.address))
        });
        reserves
    }

    /// Reserves whose chains read slot `index` of the feed identified by
    /// `key` (configuration, mapping or price feed address).
    pub fn reserves_at_index(&self, key: &Pubkey, index: u16) -> Vec<Pubkey> {
        self.state
            .read()
            .feed_for_key(key)
            .and_then(|feed| feed.reserves_for_index(index))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The feed whose reserves of `mint` read `oracle` as `oracle_type` and
    /// carry the most collateral.
    pub fn indexes(
        &self,
        mint: &Pubkey,
        oracle: &Pubkey,
        oracle_type: OracleType,
    ) -> Option<FeedIndexes> {
        let (price_feed, mappings, indexes, liquidity) = {
            let state = self.state.read();
            state
                .feeds()
                .filter_map(|feed| {
                    let (indexes, liquidity) = feed.indexes(mint, oracle, oracle_type)?;
                    Some((feed.price_feed(), feed.mappings(), indexes, liquidity))
                })
                .max_by(|a, b| a.3.cmp(&b.3).then_with(|| b.0.cmp(&a.0)))?
        };
        Some(FeedIndexes {
            price_feed: self.metas.readonly(&price_feed),
            oracle_mappings: self.metas.readonly(&mappings),
            indexes,
            liquidity,
        })
    }

    /// Accounts of a klend `refresh_reserve` instruction: reserve, market,
    /// then the pyth, switchboard price, switchboard twap and scope oracles,
    /// with the klend program in unused oracle positions. `None` if the
    /// reserve is unknown or has no oracle at all.
    pub fn refresh_reserve_accounts(&self, reserve: &Pubkey) -> Option<Vec<AccountMeta>> {
        let reserve = self.reserve_context(reserve)?;
        let info = &reserve.token_info;
        let none = || self.metas.readonly(&self.config.klend_program);
        let read = |key: &Pubkey| self.metas.readonly(key);
        let oracles = if reserve.has_feed() {
            [none(), none(), none(), read(&info.scope_price_feed)]
        } else if !is_null_key(&info.pyth_price) {
            [read(&info.pyth_price), none(), none(), none()]
        } else if !is_null_key(&info.switchboard_price) {
            [
                none(),
                read(&info.switchboard_price),
                read(&info.switchboard_twap),
                none(),
            ]
        } else {
            return None;
        };
        let mut accounts = Vec::with_capacity(6);
        accounts.push(self.metas.writable(&reserve.address));
        accounts.push(self.metas.writable(&reserve.market));
        accounts.extend(oracles);
        Some(accounts)
    }

    /// Decode and apply a reserve account. Returns the reserve as the cache
    /// holds it afterwards, `None` if the account is malformed or its price
    /// feed is unknown.
    pub fn accept_reserve(&self, update: &AccountUpdate) -> Option<Arc<ReserveSnapshot>> {
        let account = match ReserveAccount::decode(&update.data) {
            Ok(account) => account,
            Err(error) => {
                warn!(address = %update.address, "dropping reserve update: {}", error);
                return None;
            }
        };
        self.apply_reserve(ReserveSnapshot::new(update.address, update.slot, account))
    }

    pub(crate) fn apply_reserve(&self, candidate: ReserveSnapshot) -> Option<Arc<ReserveSnapshot>> {
        let address = candidate.address;
        let (outcome, event, current) = {
            let mut state = self.state.write();
            let outcome = state.apply_reserve(candidate);
            let event = match &outcome {
                ReserveOutcome::Reindexed {
                    previous,
                    latest,
                    changes,
                } => Some(CacheEvent::ReserveChanged {
                    previous: state.reserve_record(previous, false),
                    latest: state.reserve_record(latest, false),
                    changes: changes.clone(),
                }),
                _ => None,
            };
            (outcome, event, state.reserve(&address).cloned())
        };

        match outcome {
            ReserveOutcome::Inserted(reserve) => {
                debug!(%address, name = reserve.token_name(), "new reserve");
                self.signal(1);
            }
            ReserveOutcome::Reindexed { changes, .. } => {
                info!(%address, ?changes, "reserve changed");
                self.signal(1);
            }
            ReserveOutcome::Resorted(reserve) => {
                debug!(
                    %address,
                    liquidity = reserve.available_liquidity,
                    collateral = reserve.total_collateral,
                    "reserve resorted"
                );
                self.mark(1);
            }
            ReserveOutcome::Discarded => {
                debug!(%address, "reserve references an unknown price feed, holding it");
                return None;
            }
            ReserveOutcome::Unchanged | ReserveOutcome::Stale => {}
        }
        if let Some(event) = event {
            self.notifier.post(&event);
        }
        current
    }

    pub fn accept_mappings(&self, update: &AccountUpdate) {
        let candidate = match MappingSnapshot::decode(update.address, update.slot, &update.data) {
            Ok(mappings) => mappings,
            Err(error) => {
                warn!(address = %update.address, "dropping mappings update: {}", error);
                return;
            }
        };
        let outcome = self.state.write().apply_mappings(candidate);
        let MappingOutcome::Installed {
            latest,
            price_feed,
            reindexed,
            changes,
        } = outcome
        else {
            return;
        };

        if let Err(error) = self.store.write_mappings(&latest.address, &latest.data) {
            warn!("{}", error);
        }
        info!(
            address = %latest.address,
            slot = latest.slot,
            reindexed,
            affected_slots = changes.len(),
            "mappings changed"
        );
        self.signal(reindexed);
        if !changes.is_empty() {
            self.notifier.post(&CacheEvent::MappingsChanged {
                mappings: latest.address,
                price_feed,
                slot: latest.slot,
                changes,
            });
        }
    }

    pub fn accept_configuration(&self, update: &AccountUpdate) {
        let candidate = match FeedConfiguration::new(update.address, update.slot, &update.data) {
            Ok(feed) => feed,
            Err(error) => {
                warn!(address = %update.address, "dropping configuration update: {}", error);
                return;
            }
        };
        let address = candidate.configuration;
        let mappings = candidate.mappings();
        let prefix = candidate.raw_prefix.clone();
        let outcome = self.state.write().apply_configuration(candidate);

        let (event, adopted) = match outcome {
            ConfigurationOutcome::Unchanged => return,
            ConfigurationOutcome::Added {
                record: configuration,
                adopted,
            } => {
                info!(
                    %address,
                    price_feed = %configuration.oracle_prices,
                    adopted,
                    "new configuration"
                );
                (CacheEvent::NewConfiguration { configuration }, adopted)
            }
            ConfigurationOutcome::Changed {
                previous,
                latest,
                retired_mappings,
                adopted,
            } => {
                error!(
                    %address,
                    previous_mappings = %previous.oracle_mappings,
                    previous_price_feed = %previous.oracle_prices,
                    mappings = %latest.oracle_mappings,
                    price_feed = %latest.oracle_prices,
                    adopted,
                    "configuration changed"
                );
                if let Some(retired) = retired_mappings {
                    self.watch.remove(&retired);
                    if let Err(error) = self.store.delete_mappings(&retired) {
                        warn!("{}", error);
                    }
                }
                (CacheEvent::ConfigurationChanged { previous, latest }, adopted)
            }
        };
        self.watch.insert(address);
        self.watch.insert(mappings);
        if let Err(error) = self.store.write_configuration(&address, &prefix) {
            warn!("{}", error);
        }
        self.signal(1 + adopted);
        self.notifier.post(&event);
    }

    pub fn accept_vault(&self, update: &AccountUpdate) {
        let state = match VaultStateAccount::decode(&update.data) {
            Ok(state) => state,
            Err(error) => {
                warn!(address = %update.address, "dropping vault update: {}", error);
                return;
            }
        };
        let vault = VaultContext::new(update.address, update.slot, state);
        let (address, name) = (vault.address, vault.name.clone());
        if self.state.write().apply_vault(vault) {
            debug!(%address, name = %name, "vault updated");
        }
    }

    /// The account behind `address` no longer exists.
    pub fn remove_account(&self, address: &Pubkey) {
        let removal = self.state.write().remove_account(address);
        self.watch.remove(address);
        let configuration = match removal {
            Removal::Feed(removed) => {
                self.watch.remove(&removed.record.address);
                self.watch.remove(&removed.mappings);
                if let Err(error) = self.store.delete_configuration(&removed.record.address) {
                    warn!("{}", error);
                }
                if let Err(error) = self.store.delete_mappings(&removed.mappings) {
                    warn!("{}", error);
                }
                self.signal(1);
                Some(removed.record)
            }
            Removal::Mappings => {
                if let Err(error) = self.store.delete_mappings(address) {
                    warn!("{}", error);
                }
                None
            }
            Removal::NotTracked => {
                debug!(%address, "removed account was not tracked");
                return;
            }
        };
        warn!(%address, "account deleted");
        self.notifier.post(&CacheEvent::AccountDeleted {
            address: *address,
            configuration,
        });
    }

    /// Drop reserves a full reserve scan taken at `slot` no longer returns,
    /// unless they were updated at or after `slot`. Returns how many were
    /// removed.
    pub fn retain_scanned_reserves(&self, present: &HashSet<Pubkey>, slot: u64) -> usize {
        let removed: Vec<_> = {
            let mut state = self.state.write();
            let removed = state.retain_scanned_reserves(present, slot);
            removed
                .iter()
                .map(|reserve| state.reserve_record(reserve, false))
                .collect()
        };
        let count = removed.len();
        for reserve in removed {
            warn!(address = %reserve.reserve, name = %reserve.token_name, "reserve deleted");
            self.notifier.post(&CacheEvent::ReserveDeleted { reserve });
        }
        self.signal(count);
        count
    }

    /// Write `reserves.json` from a snapshot taken under the read lock.
    pub fn persist_reserves(&self) -> bool {
        let markets = self.state.read().market_records();
        match self.store.write_reserves(&markets) {
            Ok(()) => {
                info!(markets = markets.len(), "wrote reserves");
                true
            }
            Err(error) => {
                warn!("{}", error);
                false
            }
        }
    }
}
