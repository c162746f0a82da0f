//! The cross-referenced registries guarded by the cache's lock.
//!
//! Every method here is synchronous and performs no I/O; [`crate::ScopeCache`]
//! runs them under the write lock and turns the returned outcomes into
//! persistence, watch-set and notification side effects once the lock is
//! released.

use crate::{
    feed::FeedConfiguration,
    mapping::MappingSnapshot,
    record::{ConfigurationRecord, MarketRecord, ReserveRecord, SlotChangeRecord},
    reserve::{PriceChains, ReserveChange, ReserveSnapshot},
    vault::VaultContext,
};
use hashbrown::{HashMap, HashSet};
use kamino_accounts::ScopeEntry;
use solana_pubkey::Pubkey;
use std::{collections::BTreeMap, sync::Arc};

#[derive(Debug)]
pub(crate) enum ReserveOutcome {
    Inserted(Arc<ReserveSnapshot>),
    /// Only collateral moved; slot-index sets untouched.
    Resorted(Arc<ReserveSnapshot>),
    Reindexed {
        previous: Arc<ReserveSnapshot>,
        latest: Arc<ReserveSnapshot>,
        changes: Vec<ReserveChange>,
    },
    /// Newer slot, same content.
    Unchanged,
    Stale,
    /// The price feed it references is unknown; held until that feed's
    /// configuration shows up.
    Discarded,
}

#[derive(Debug)]
pub(crate) enum MappingOutcome {
    /// Not the mapping table of a known feed.
    Ignored,
    Stale,
    Unchanged,
    Installed {
        latest: Arc<MappingSnapshot>,
        price_feed: Pubkey,
        reindexed: usize,
        changes: Vec<SlotChangeRecord>,
    },
}

#[derive(Debug)]
pub(crate) struct RemovedFeed {
    pub record: ConfigurationRecord,
    pub mappings: Pubkey,
}

#[derive(Debug)]
pub(crate) enum ConfigurationOutcome {
    Unchanged,
    Added {
        record: ConfigurationRecord,
        /// Held-back reserves registered with the new feed.
        adopted: usize,
    },
    Changed {
        previous: ConfigurationRecord,
        latest: ConfigurationRecord,
        /// Mapping table no longer referenced by the new version.
        retired_mappings: Option<Pubkey>,
        adopted: usize,
    },
}

#[derive(Debug)]
pub(crate) enum Removal {
    Feed(RemovedFeed),
    Mappings,
    NotTracked,
}

#[derive(Debug, Default)]
pub(crate) struct CacheState {
    reserves: HashMap<Pubkey, Arc<ReserveSnapshot>>,
    /// Keyed by price feed (`oracle_prices`).
    feeds: HashMap<Pubkey, FeedConfiguration>,
    /// Configuration and mapping addresses to their price feed.
    feed_keys: HashMap<Pubkey, Pubkey>,
    mappings: HashMap<Pubkey, Arc<MappingSnapshot>>,
    /// Keyed by shares mint.
    vaults: HashMap<Pubkey, Arc<VaultContext>>,
    /// Reserves whose price feed has no configuration yet, by price feed.
    awaiting_feed: HashMap<Pubkey, HashMap<Pubkey, ReserveSnapshot>>,
}

impl CacheState {
    pub fn reserve(&self, address: &Pubkey) -> Option<&Arc<ReserveSnapshot>> {
        self.reserves.get(address)
    }

    pub fn reserves(&self) -> impl Iterator<Item = &Arc<ReserveSnapshot>> {
        self.reserves.values()
    }

    pub fn feed(&self, price_feed: &Pubkey) -> Option<&FeedConfiguration> {
        self.feeds.get(price_feed)
    }

    /// Look a feed up by configuration, mapping or price feed address.
    pub fn feed_for_key(&self, key: &Pubkey) -> Option<&FeedConfiguration> {
        let price_feed = self.feed_keys.get(key).unwrap_or(key);
        self.feeds.get(price_feed)
    }

    pub fn feeds(&self) -> impl Iterator<Item = &FeedConfiguration> {
        self.feeds.values()
    }

    pub fn mapping(&self, address: &Pubkey) -> Option<&Arc<MappingSnapshot>> {
        self.mappings.get(address)
    }

    pub fn vault(&self, shares_mint: &Pubkey) -> Option<&Arc<VaultContext>> {
        self.vaults.get(shares_mint)
    }

    /// Configuration and mapping addresses of every known feed.
    pub fn watch_keys(&self) -> Vec<Pubkey> {
        self.feeds
            .values()
            .flat_map(|f| [f.configuration, f.mappings()])
            .collect()
    }

    fn table_for(&self, price_feed: &Pubkey) -> Option<&[ScopeEntry]> {
        let feed = self.feeds.get(price_feed)?;
        self.mappings.get(&feed.mappings()).map(|m| &m.entries[..])
    }

    fn resolve(&self, reserve: ReserveSnapshot) -> ReserveSnapshot {
        let chains = if reserve.has_feed() {
            self.table_for(&reserve.price_feed())
                .and_then(|table| PriceChains::resolve(&reserve.token_info, table))
        } else {
            None
        };
        ReserveSnapshot {
            price_chains: chains,
            ..reserve
        }
    }

    fn index(&mut self, reserve: &Arc<ReserveSnapshot>) {
        if !reserve.has_feed() {
            return;
        }
        if let Some(feed) = self.feeds.get_mut(&reserve.price_feed()) {
            feed.index_reserve(reserve);
        }
    }

    fn unindex(&mut self, reserve: &ReserveSnapshot) {
        if !reserve.has_feed() {
            return;
        }
        if let Some(feed) = self.feeds.get_mut(&reserve.price_feed()) {
            feed.remove_reserve(reserve);
        }
    }

    fn missing_feed(&self, reserve: &ReserveSnapshot) -> bool {
        reserve.has_feed() && !self.feeds.contains_key(&reserve.price_feed())
    }

    /// Hold `reserve` until its price feed is installed. Only the newest
    /// version of each address is kept.
    fn hold(&mut self, reserve: ReserveSnapshot) {
        let held_slot = self
            .awaiting_feed
            .values()
            .find_map(|held| held.get(&reserve.address))
            .map(|held| held.slot);
        if held_slot.is_some_and(|slot| slot >= reserve.slot) {
            return;
        }
        self.release(&reserve.address);
        self.awaiting_feed
            .entry(reserve.price_feed())
            .or_default()
            .insert(reserve.address, reserve);
    }

    fn release(&mut self, address: &Pubkey) {
        self.awaiting_feed.retain(|_, held| {
            held.remove(address);
            !held.is_empty()
        });
    }

    /// Reserves held back for `price_feed`.
    #[cfg(test)]
    pub fn awaiting(&self, price_feed: &Pubkey) -> usize {
        self.awaiting_feed.get(price_feed).map_or(0, HashMap::len)
    }

    /// `candidate.price_chains` is ignored and re-resolved here.
    pub fn apply_reserve(&mut self, candidate: ReserveSnapshot) -> ReserveOutcome {
        let candidate = self.resolve(candidate);
        let Some(previous) = self.reserves.get(&candidate.address).cloned() else {
            if self.missing_feed(&candidate) {
                self.hold(candidate);
                return ReserveOutcome::Discarded;
            }
            self.release(&candidate.address);
            let reserve = Arc::new(candidate);
            self.index(&reserve);
            self.reserves.insert(reserve.address, reserve.clone());
            return ReserveOutcome::Inserted(reserve);
        };

        if candidate.slot <= previous.slot {
            return ReserveOutcome::Stale;
        }
        if self.missing_feed(&candidate) {
            self.hold(candidate);
            return ReserveOutcome::Discarded;
        }
        self.release(&candidate.address);
        let changes = previous.diff(&candidate);
        let reserve = Arc::new(candidate);
        if changes.is_empty() || ReserveSnapshot::balances_only(&changes) {
            if reserve.has_feed() {
                if let Some(feed) = self.feeds.get_mut(&reserve.price_feed()) {
                    feed.resort(&reserve);
                }
            }
            self.reserves.insert(reserve.address, reserve.clone());
            return if changes.is_empty() {
                ReserveOutcome::Unchanged
            } else {
                ReserveOutcome::Resorted(reserve)
            };
        }

        self.unindex(&previous);
        self.index(&reserve);
        self.reserves.insert(reserve.address, reserve.clone());
        ReserveOutcome::Reindexed {
            previous,
            latest: reserve,
            changes,
        }
    }

    /// Re-resolve and re-index every reserve priced through `price_feed`.
    /// Returns how many got different price chains.
    fn reindex_bound(&mut self, price_feed: Pubkey) -> usize {
        let bound: Vec<Arc<ReserveSnapshot>> = self
            .reserves
            .values()
            .filter(|r| r.has_feed() && r.price_feed() == price_feed)
            .cloned()
            .collect();
        let mut changed = 0;
        for reserve in bound {
            let chains = self
                .table_for(&price_feed)
                .and_then(|table| PriceChains::resolve(&reserve.token_info, table));
            let latest = if chains != reserve.price_chains {
                changed += 1;
                Arc::new(reserve.with_price_chains(chains))
            } else {
                reserve.clone()
            };
            if let Some(feed) = self.feeds.get_mut(&price_feed) {
                feed.remove_reserve(&reserve);
                feed.index_reserve(&latest);
            }
            self.reserves.insert(latest.address, latest);
        }
        changed
    }

    /// Register a feed, index the reserves bound to it and adopt the ones
    /// held back for it. Returns how many held reserves were registered.
    pub fn install_feed(&mut self, mut feed: FeedConfiguration) -> usize {
        let price_feed = feed.price_feed();
        if self.feeds.contains_key(&price_feed) {
            self.remove_feed(price_feed, false);
        }
        feed.clear_indices();
        self.feed_keys.insert(feed.configuration, price_feed);
        self.feed_keys.insert(feed.mappings(), price_feed);
        self.feeds.insert(price_feed, feed);
        self.reindex_bound(price_feed);

        let held = self.awaiting_feed.remove(&price_feed).unwrap_or_default();
        let mut adopted = 0;
        for reserve in held.into_values() {
            if let ReserveOutcome::Inserted(_) | ReserveOutcome::Reindexed { .. } =
                self.apply_reserve(reserve)
            {
                adopted += 1;
            }
        }
        adopted
    }

    /// Bootstrap only: no diffing, the owning feed may not be known yet.
    pub fn install_mappings(&mut self, mappings: MappingSnapshot) {
        self.mappings.insert(mappings.address, Arc::new(mappings));
    }

    fn remove_feed(&mut self, price_feed: Pubkey, drop_mappings: bool) -> Option<RemovedFeed> {
        let feed = self.feeds.remove(&price_feed)?;
        self.feed_keys.remove(&feed.configuration);
        self.feed_keys.remove(&feed.mappings());
        if drop_mappings {
            self.mappings.remove(&feed.mappings());
        }
        let orphaned: Vec<Arc<ReserveSnapshot>> = self
            .reserves
            .values()
            .filter(|r| r.has_feed() && r.price_feed() == price_feed && r.price_chains.is_some())
            .cloned()
            .collect();
        for reserve in orphaned {
            self.reserves
                .insert(reserve.address, Arc::new(reserve.with_price_chains(None)));
        }
        Some(RemovedFeed {
            record: ConfigurationRecord::from(&feed),
            mappings: feed.mappings(),
        })
    }

    pub fn apply_configuration(&mut self, candidate: FeedConfiguration) -> ConfigurationOutcome {
        let current = self
            .feed_keys
            .get(&candidate.configuration)
            .copied()
            .and_then(|price_feed| self.feeds.get_mut(&price_feed));
        let Some(current) = current else {
            let record = ConfigurationRecord::from(&candidate);
            let adopted = self.install_feed(candidate);
            return ConfigurationOutcome::Added { record, adopted };
        };
        if current.is_stale_or_unchanged(&candidate) {
            return ConfigurationOutcome::Unchanged;
        }

        let previous = ConfigurationRecord::from(&*current);
        let latest = ConfigurationRecord::from(&candidate);
        if current.same_accounts(&candidate) {
            current.update_account(candidate);
            return ConfigurationOutcome::Changed {
                previous,
                latest,
                retired_mappings: None,
                adopted: 0,
            };
        }

        let old_mappings = current.mappings();
        let drop_mappings = old_mappings != candidate.mappings();
        self.remove_feed(previous.oracle_prices, drop_mappings);
        let adopted = self.install_feed(candidate);
        ConfigurationOutcome::Changed {
            previous,
            latest,
            retired_mappings: drop_mappings.then_some(old_mappings),
            adopted,
        }
    }

    pub fn apply_mappings(&mut self, candidate: MappingSnapshot) -> MappingOutcome {
        let Some(price_feed) = self.feed_keys.get(&candidate.address).copied() else {
            return MappingOutcome::Ignored;
        };
        if self.feeds.get(&price_feed).map(FeedConfiguration::mappings) != Some(candidate.address) {
            return MappingOutcome::Ignored;
        }

        let previous = self.mappings.get(&candidate.address).cloned();
        if let Some(previous) = &previous {
            if candidate.slot <= previous.slot {
                return MappingOutcome::Stale;
            }
            if previous.data == candidate.data {
                self.mappings.insert(
                    candidate.address,
                    Arc::new(previous.with_slot(candidate.slot)),
                );
                return MappingOutcome::Unchanged;
            }
        }

        let latest = Arc::new(candidate);
        self.mappings.insert(latest.address, latest.clone());
        let reindexed = self.reindex_bound(price_feed);
        let changes = previous
            .map(|previous| self.slot_changes(&price_feed, &previous, &latest))
            .unwrap_or_default();
        MappingOutcome::Installed {
            latest,
            price_feed,
            reindexed,
            changes,
        }
    }

    /// Changed slots that at least one reserve currently uses.
    fn slot_changes(
        &self,
        price_feed: &Pubkey,
        previous: &MappingSnapshot,
        latest: &MappingSnapshot,
    ) -> Vec<SlotChangeRecord> {
        let Some(feed) = self.feeds.get(price_feed) else {
            return Vec::new();
        };
        previous
            .changed_indexes(latest)
            .filter_map(|index| {
                let reserves = feed.reserves_for_index(index)?;
                let i = usize::from(index);
                Some(SlotChangeRecord {
                    index,
                    previous: previous.entries.get(i)?.to_json(&previous.entries),
                    latest: latest.entries.get(i)?.to_json(&latest.entries),
                    reserves: reserves.iter().copied().collect(),
                })
            })
            .collect()
    }

    /// The backing account of `key` is gone from the ledger.
    pub fn remove_account(&mut self, key: &Pubkey) -> Removal {
        if let Some(price_feed) = self.feed_keys.get(key).copied() {
            if let Some(removed) = self.remove_feed(price_feed, true) {
                return Removal::Feed(removed);
            }
        }
        if self.mappings.remove(key).is_some() {
            return Removal::Mappings;
        }
        Removal::NotTracked
    }

    /// Drop every reserve last seen before `slot` that a reserve scan taken
    /// at `slot` did not return, held-back ones included. Returns the
    /// registered reserves removed.
    pub fn retain_scanned_reserves(
        &mut self,
        present: &HashSet<Pubkey>,
        slot: u64,
    ) -> Vec<Arc<ReserveSnapshot>> {
        let gone = |reserve: &ReserveSnapshot| {
            reserve.slot < slot && !present.contains(&reserve.address)
        };
        self.awaiting_feed.retain(|_, held| {
            held.retain(|_, reserve| !gone(reserve));
            !held.is_empty()
        });
        let missing: Vec<Pubkey> = self
            .reserves
            .values()
            .filter(|reserve| gone(reserve))
            .map(|reserve| reserve.address)
            .collect();
        let mut removed = Vec::with_capacity(missing.len());
        for address in missing {
            if let Some(reserve) = self.reserves.remove(&address) {
                self.unindex(&reserve);
                removed.push(reserve);
            }
        }
        removed
    }

    /// `true` if the vault was inserted or replaced.
    pub fn apply_vault(&mut self, vault: VaultContext) -> bool {
        if let Some(current) = self.vaults.get(&vault.shares_mint) {
            if vault.slot <= current.slot || !current.differs(&vault) {
                return false;
            }
        }
        self.vaults.insert(vault.shares_mint, Arc::new(vault));
        true
    }

    pub fn reserve_record(&self, reserve: &ReserveSnapshot, with_token_info: bool) -> ReserveRecord {
        let table = self.table_for(&reserve.price_feed()).unwrap_or(&[]);
        ReserveRecord::new(reserve, table, with_token_info)
    }

    /// Every reserve grouped by lending market, ordered by address.
    pub fn market_records(&self) -> Vec<MarketRecord> {
        let mut markets: BTreeMap<Pubkey, Vec<&Arc<ReserveSnapshot>>> = BTreeMap::new();
        for reserve in self.reserves.values() {
            markets.entry(reserve.market).or_default().push(reserve);
        }
        markets
            .into_iter()
            .map(|(market, mut reserves)| {
                reserves.sort_by_key(|r| r.address);
                MarketRecord {
                    market,
                    reserves: reserves
                        .into_iter()
                        .map(|r| self.reserve_record(r, true))
                        .collect(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use kamino_accounts::{
        NULL_KEY, OracleType,
        testing::{MappingFixture, ReserveFixture, configuration_bytes},
    };

    fn state() -> CacheState {
        let mut state = CacheState::default();
        state.install_mappings(mappings(1, &default_slots()));
        state.install_feed(feed(1));
        state
    }

    fn indexed(state: &CacheState, index: u16) -> Vec<Pubkey> {
        state
            .feed(&key(PRICE_FEED))
            .and_then(|f| f.reserves_for_index(index))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    fn by_mint(state: &CacheState) -> Vec<Pubkey> {
        state
            .feed(&key(PRICE_FEED))
            .and_then(|f| f.reserves_for_mint(&key(MINT)))
            .map(|r| r.iter().map(|r| r.address).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_insert_indexes_everywhere() {
        let mut state = state();
        let a = reserve(1, 3, &reserve_fixture(100, vec![3]));
        let b = reserve(2, 3, &reserve_fixture(900, vec![3, 4]));
        assert!(matches!(state.apply_reserve(a), ReserveOutcome::Inserted(_)));
        assert!(matches!(state.apply_reserve(b), ReserveOutcome::Inserted(_)));

        assert_eq!(indexed(&state, 3), vec![key(1), key(2)]);
        assert_eq!(indexed(&state, 4), vec![key(2)]);
        assert_eq!(by_mint(&state), vec![key(2), key(1)]);

        let chains = state.reserve(&key(2)).unwrap().price_chains.clone().unwrap();
        assert_eq!(chains.price.len(), 2);
        assert_eq!(chains.price[0].index(), 3);
    }

    #[test]
    fn test_idempotent_and_monotonic() {
        let mut state = state();
        let fixture = reserve_fixture(100, vec![3]);
        state.apply_reserve(reserve(1, 3, &fixture));
        assert!(matches!(
            state.apply_reserve(reserve(1, 3, &fixture)),
            ReserveOutcome::Stale
        ));
        assert!(matches!(
            state.apply_reserve(reserve(1, 2, &reserve_fixture(5, vec![4]))),
            ReserveOutcome::Stale
        ));
        assert!(matches!(
            state.apply_reserve(reserve(1, 4, &fixture)),
            ReserveOutcome::Unchanged
        ));
        assert_eq!(state.reserve(&key(1)).unwrap().slot, 4);
        assert_eq!(state.reserve(&key(1)).unwrap().total_collateral, 100);
        assert_eq!(indexed(&state, 3), vec![key(1)]);
        assert!(indexed(&state, 4).is_empty());
    }

    #[test]
    fn test_collateral_only_resorts() {
        let mut state = state();
        state.apply_reserve(reserve(1, 3, &reserve_fixture(1000, vec![3])));
        state.apply_reserve(reserve(2, 3, &reserve_fixture(700, vec![3])));
        assert_eq!(by_mint(&state), vec![key(1), key(2)]);

        let outcome = state.apply_reserve(reserve(1, 4, &reserve_fixture(500, vec![3])));
        assert!(matches!(outcome, ReserveOutcome::Resorted(_)));
        assert_eq!(by_mint(&state), vec![key(2), key(1)]);
        assert_eq!(indexed(&state, 3), vec![key(1), key(2)]);
        assert_eq!(state.reserve(&key(1)).unwrap().total_collateral, 500);
    }

    #[test]
    fn test_chain_change_reindexes() {
        let mut state = state();
        state.apply_reserve(reserve(1, 3, &reserve_fixture(100, vec![3])));
        let outcome = state.apply_reserve(reserve(1, 4, &reserve_fixture(100, vec![5])));
        let ReserveOutcome::Reindexed {
            previous,
            latest,
            changes,
        } = outcome
        else {
            panic!("expected a re-index");
        };
        assert_eq!(changes, vec![ReserveChange::PriceChain]);
        assert_eq!(previous.slot, 3);
        assert_eq!(latest.slot, 4);
        assert!(indexed(&state, 3).is_empty());
        assert_eq!(indexed(&state, 5), vec![key(1)]);
        assert_eq!(by_mint(&state), vec![key(1)]);
    }

    #[test]
    fn test_unknown_feed_discarded() {
        let mut state = state();
        let fixture = ReserveFixture {
            price_feed: key(0x99),
            ..reserve_fixture(100, vec![3])
        };
        assert!(matches!(
            state.apply_reserve(reserve(1, 3, &fixture)),
            ReserveOutcome::Discarded
        ));
        assert!(state.reserve(&key(1)).is_none());
        assert_eq!(state.awaiting(&key(0x99)), 1);

        state.apply_reserve(reserve(2, 3, &reserve_fixture(100, vec![3])));
        let moved = ReserveFixture {
            price_feed: key(0x99),
            ..reserve_fixture(100, vec![3])
        };
        assert!(matches!(
            state.apply_reserve(reserve(2, 4, &moved)),
            ReserveOutcome::Discarded
        ));
        assert_eq!(state.reserve(&key(2)).unwrap().slot, 3);
        assert_eq!(indexed(&state, 3), vec![key(2)]);
    }

    #[test]
    fn test_sentinel_feed_stored_unindexed() {
        let mut state = CacheState::default();
        for (address, feed) in [(1, NULL_KEY), (2, Pubkey::default())] {
            let fixture = ReserveFixture {
                price_feed: feed,
                ..reserve_fixture(100, vec![3])
            };
            assert!(matches!(
                state.apply_reserve(reserve(address, 3, &fixture)),
                ReserveOutcome::Inserted(_)
            ));
        }
        assert_eq!(state.reserves().count(), 2);
        assert!(state.reserve(&key(1)).unwrap().price_chains.is_none());
        assert_eq!(state.feeds().count(), 0);
    }

    #[test]
    fn test_mapping_change_reports_occupied_slots() {
        let mut state = state();
        state.apply_reserve(reserve(1, 3, &reserve_fixture(100, vec![3])));
        state.apply_reserve(reserve(2, 3, &reserve_fixture(200, vec![3])));

        let mut slots = default_slots();
        slots.push((9, MappingFixture::oracle(OracleType::PythPull, key(0x77))));
        let outcome = state.apply_mappings(mappings(5, &slots));
        let MappingOutcome::Installed {
            reindexed, changes, ..
        } = outcome
        else {
            panic!("expected new mappings");
        };
        assert_eq!(reindexed, 0);
        assert!(changes.is_empty());

        slots[0] = (3, MappingFixture::oracle(OracleType::RedStone, key(0x77)));
        let MappingOutcome::Installed {
            reindexed, changes, ..
        } = state.apply_mappings(mappings(6, &slots))
        else {
            panic!("expected new mappings");
        };
        assert_eq!(reindexed, 2);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].index, 3);
        assert_eq!(changes[0].reserves, vec![key(1), key(2)]);
        let chains = state.reserve(&key(1)).unwrap().price_chains.clone().unwrap();
        assert_eq!(
            chains.price[0].oracle().map(|o| o.oracle_type),
            Some(OracleType::RedStone)
        );

        assert!(matches!(
            state.apply_mappings(mappings(6, &slots)),
            MappingOutcome::Stale
        ));
        assert!(matches!(
            state.apply_mappings(mappings(7, &slots)),
            MappingOutcome::Unchanged
        ));
        assert_eq!(state.mapping(&key(MAPPINGS)).unwrap().slot, 7);
    }

    #[test]
    fn test_unknown_mappings_ignored() {
        let mut state = state();
        let other = MappingSnapshot::decode(
            key(0x21),
            9,
            &kamino_accounts::testing::mappings_bytes(&[]),
        )
        .unwrap();
        assert!(matches!(state.apply_mappings(other), MappingOutcome::Ignored));
    }

    #[test]
    fn test_configuration_lifecycle() {
        let mut state = CacheState::default();
        assert!(matches!(
            state.apply_configuration(feed(1)),
            ConfigurationOutcome::Added { adopted: 0, .. }
        ));
        assert!(matches!(
            state.apply_configuration(feed(2)),
            ConfigurationOutcome::Unchanged
        ));
        state.install_mappings(mappings(1, &default_slots()));
        state.apply_reserve(reserve(1, 3, &reserve_fixture(100, vec![3])));
        assert_eq!(indexed(&state, 3), vec![key(1)]);

        // reinstalling re-resolves bound reserves
        state.install_feed(feed(1));
        assert_eq!(indexed(&state, 3), vec![key(1)]);
        assert!(state.reserve(&key(1)).unwrap().price_chains.is_some());

        let moved = FeedConfiguration::new(
            key(CONFIGURATION),
            5,
            &configuration_bytes(key(0x22), key(PRICE_FEED)),
        )
        .unwrap();
        let ConfigurationOutcome::Changed {
            previous,
            latest,
            retired_mappings,
            ..
        } = state.apply_configuration(moved)
        else {
            panic!("expected a configuration change");
        };
        assert_eq!(previous.oracle_mappings, key(MAPPINGS));
        assert_eq!(latest.oracle_mappings, key(0x22));
        assert_eq!(retired_mappings, Some(key(MAPPINGS)));
        assert!(state.mapping(&key(MAPPINGS)).is_none());
        assert!(state.reserve(&key(1)).unwrap().price_chains.is_none());
        assert_eq!(indexed(&state, 3), vec![key(1)]);
        assert_eq!(
            state.feed_for_key(&key(0x22)).map(|f| f.configuration),
            Some(key(CONFIGURATION))
        );
        assert!(state.feed_for_key(&key(MAPPINGS)).is_none());
    }

    #[test]
    fn test_remove_feed() {
        let mut state = state();
        state.apply_reserve(reserve(1, 3, &reserve_fixture(100, vec![3])));
        let Removal::Feed(removed) = state.remove_account(&key(CONFIGURATION)) else {
            panic!("expected the feed to be removed");
        };
        assert_eq!(removed.record.address, key(CONFIGURATION));
        assert_eq!(removed.mappings, key(MAPPINGS));
        assert!(state.feed(&key(PRICE_FEED)).is_none());
        assert!(state.mapping(&key(MAPPINGS)).is_none());
        assert!(state.watch_keys().is_empty());

        let stored = state.reserve(&key(1)).unwrap();
        assert!(stored.price_chains.is_none());
        assert!(matches!(
            state.remove_account(&key(MAPPINGS)),
            Removal::NotTracked
        ));
    }

    #[test]
    fn test_remove_by_mapping_address() {
        let mut state = state();
        assert!(matches!(
            state.remove_account(&key(MAPPINGS)),
            Removal::Feed(_)
        ));
        assert_eq!(state.feeds().count(), 0);
    }

    #[test]
    fn test_held_reserve_adopted_by_new_feed() {
        let mut state = CacheState::default();
        let waiting = reserve(1, 3, &reserve_fixture(100, vec![3]));
        assert!(matches!(
            state.apply_reserve(waiting),
            ReserveOutcome::Discarded
        ));
        // an older replay does not replace the held version
        state.apply_reserve(reserve(1, 2, &reserve_fixture(5, vec![4])));
        assert_eq!(state.awaiting(&key(PRICE_FEED)), 1);

        state.install_mappings(mappings(1, &default_slots()));
        let ConfigurationOutcome::Added { adopted, .. } = state.apply_configuration(feed(1))
        else {
            panic!("expected a new configuration");
        };
        assert_eq!(adopted, 1);
        assert_eq!(state.awaiting(&key(PRICE_FEED)), 0);
        let adopted = state.reserve(&key(1)).unwrap();
        assert_eq!(adopted.slot, 3);
        assert!(adopted.price_chains.is_some());
        assert_eq!(indexed(&state, 3), vec![key(1)]);
        assert_eq!(by_mint(&state), vec![key(1)]);
    }

    #[test]
    fn test_liquidity_only_resorts() {
        let mut state = state();
        state.apply_reserve(reserve(1, 3, &reserve_fixture(100, vec![3])));
        let drained = ReserveFixture {
            available_amount: 40,
            ..reserve_fixture(90, vec![3])
        };
        let outcome = state.apply_reserve(reserve(1, 4, &drained));
        assert!(matches!(outcome, ReserveOutcome::Resorted(_)));
        assert_eq!(state.reserve(&key(1)).unwrap().available_liquidity, 40);
        assert_eq!(indexed(&state, 3), vec![key(1)]);
    }

    #[test]
    fn test_unscanned_reserves_removed() {
        let mut state = state();
        state.apply_reserve(reserve(1, 3, &reserve_fixture(100, vec![3])));
        state.apply_reserve(reserve(2, 3, &reserve_fixture(50, vec![3, 4])));
        state.apply_reserve(reserve(3, 8, &reserve_fixture(10, vec![4])));
        let elsewhere = ReserveFixture {
            price_feed: key(0x99),
            ..reserve_fixture(1, vec![3])
        };
        state.apply_reserve(reserve(4, 3, &elsewhere));

        let present: HashSet<Pubkey> = [key(2)].into_iter().collect();
        let removed = state.retain_scanned_reserves(&present, 5);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].address, key(1));
        assert!(state.reserve(&key(1)).is_none());
        // newer than the scan
        assert!(state.reserve(&key(3)).is_some());
        assert_eq!(state.awaiting(&key(0x99)), 0);

        assert_eq!(indexed(&state, 3), vec![key(2)]);
        assert_eq!(indexed(&state, 4), vec![key(2), key(3)]);
        assert_eq!(by_mint(&state), vec![key(2), key(3)]);
        assert_eq!(state.market_records()[0].reserves.len(), 2);
    }

    #[test]
    fn test_vault_updates() {
        use kamino_accounts::{
            VaultStateAccount,
            testing::{VaultFixture, vault_bytes},
        };
        let fixture = VaultFixture {
            shares_mint: key(0x70),
            token_mint: key(MINT),
            reserves: vec![key(1)],
            name: "vault".to_owned(),
            lookup_table: None,
        };
        let vault = |slot, fixture: &VaultFixture| {
            VaultContext::new(
                key(0x71),
                slot,
                VaultStateAccount::decode(&vault_bytes(fixture)).unwrap(),
            )
        };
        let mut state = CacheState::default();
        assert!(state.apply_vault(vault(2, &fixture)));
        assert!(!state.apply_vault(vault(3, &fixture)));
        let grown = VaultFixture {
            reserves: vec![key(1), key(2)],
            ..fixture.clone()
        };
        assert!(!state.apply_vault(vault(2, &grown)));
        assert!(state.apply_vault(vault(4, &grown)));
        assert_eq!(state.vault(&key(0x70)).unwrap().reserves.len(), 2);
    }

    #[test]
    fn test_market_records() {
        let mut state = state();
        state.apply_reserve(reserve(2, 3, &reserve_fixture(100, vec![3])));
        state.apply_reserve(reserve(1, 3, &reserve_fixture(100, vec![4])));
        let other_market = ReserveFixture {
            market: key(0x61),
            ..reserve_fixture(1, vec![5])
        };
        state.apply_reserve(reserve(3, 3, &other_market));

        let markets = state.market_records();
        assert_eq!(markets.len(), 2);
        assert_eq!(markets[0].market, key(0x60));
        let addresses: Vec<_> = markets[0].reserves.iter().map(|r| r.reserve).collect();
        assert_eq!(addresses, vec![key(1), key(2)]);
        assert_eq!(markets[0].reserves[0].token_info.len(), 384);
        assert_eq!(
            markets[1].reserves[0].price_chain.as_ref().map(Vec::len),
            Some(1)
        );
    }
}
