//! Scope feed configurations and the reserve indices derived from them.

use crate::reserve::ReserveSnapshot;
use hashbrown::HashMap;
use kamino_accounts::{ConfigurationAccount, NO_INDEX, OracleType};
use solana_instruction::AccountMeta;
use solana_pubkey::Pubkey;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

/// A Scope configuration plus the reserves priced through it.
///
/// `reserves_by_index` and `reserves_by_mint` always describe exactly the
/// registered reserves whose price feed is this configuration's
/// `oracle_prices` account.
#[derive(Debug, Clone)]
pub struct FeedConfiguration {
    pub slot: u64,
    pub configuration: Pubkey,
    pub account: ConfigurationAccount,
    pub raw_prefix: Box<[u8]>,
    reserves_by_index: BTreeMap<u16, BTreeSet<Pubkey>>,
    /// Sorted by total collateral, descending.
    reserves_by_mint: HashMap<Pubkey, Arc<[Arc<ReserveSnapshot>]>>,
}

impl FeedConfiguration {
    /// Accepts the full account or its pre-padding prefix.
    pub fn new(configuration: Pubkey, slot: u64, data: &[u8]) -> kamino_accounts::Result<Self> {
        let account = ConfigurationAccount::decode(data)?;
        Ok(Self {
            slot,
            configuration,
            account,
            raw_prefix: ConfigurationAccount::prefix(data).into(),
            reserves_by_index: BTreeMap::new(),
            reserves_by_mint: HashMap::new(),
        })
    }

    pub fn mappings(&self) -> Pubkey {
        self.account.oracle_mappings
    }

    pub fn price_feed(&self) -> Pubkey {
        self.account.oracle_prices
    }

    pub fn is_stale_or_unchanged(&self, latest: &FeedConfiguration) -> bool {
        latest.slot <= self.slot || latest.raw_prefix == self.raw_prefix
    }

    /// Same mapping table and price output, so the indices carry over.
    pub fn same_accounts(&self, latest: &FeedConfiguration) -> bool {
        self.mappings() == latest.mappings() && self.price_feed() == latest.price_feed()
    }

    /// Adopt a newer version of the account, keeping the indices.
    pub fn update_account(&mut self, latest: FeedConfiguration) {
        self.slot = latest.slot;
        self.account = latest.account;
        self.raw_prefix = latest.raw_prefix;
    }

    pub fn index_reserve(&mut self, reserve: &Arc<ReserveSnapshot>) {
        for index in reserve.slot_indexes() {
            self.reserves_by_index
                .entry(index)
                .or_default()
                .insert(reserve.address);
        }
        self.upsert_by_mint(reserve);
    }

    pub fn remove_reserve(&mut self, reserve: &ReserveSnapshot) {
        for index in reserve.slot_indexes() {
            if let Some(set) = self.reserves_by_index.get_mut(&index) {
                set.remove(&reserve.address);
                if set.is_empty() {
                    self.reserves_by_index.remove(&index);
                }
            }
        }
        let Some(current) = self.reserves_by_mint.get(&reserve.mint) else {
            return;
        };
        let remaining: Vec<_> = current
            .iter()
            .filter(|r| r.address != reserve.address)
            .cloned()
            .collect();
        if remaining.is_empty() {
            self.reserves_by_mint.remove(&reserve.mint);
        } else {
            self.reserves_by_mint.insert(reserve.mint, remaining.into());
        }
    }

    /// Swap in a snapshot whose slot indices did not change and re-sort its
    /// mint's liquidity order.
    pub fn resort(&mut self, reserve: &Arc<ReserveSnapshot>) {
        self.upsert_by_mint(reserve);
    }

    fn upsert_by_mint(&mut self, reserve: &Arc<ReserveSnapshot>) {
        let mut next: Vec<Arc<ReserveSnapshot>> = self
            .reserves_by_mint
            .get(&reserve.mint)
            .map(|current| {
                current
                    .iter()
                    .filter(|r| r.address != reserve.address)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        next.push(reserve.clone());
        next.sort_by(|a, b| {
            b.total_collateral
                .cmp(&a.total_collateral)
                .then_with(|| a.address.cmp(&b.address))
        });
        self.reserves_by_mint.insert(reserve.mint, next.into());
    }

    pub fn reserves_for_index(&self, index: u16) -> Option<&BTreeSet<Pubkey>> {
        self.reserves_by_index.get(&index)
    }

    pub fn reserves_for_mint(&self, mint: &Pubkey) -> Option<Arc<[Arc<ReserveSnapshot>]>> {
        self.reserves_by_mint.get(mint).cloned()
    }

    pub fn indexed_slots(&self) -> impl Iterator<Item = u16> + '_ {
        self.reserves_by_index.keys().copied()
    }

    pub fn clear_indices(&mut self) {
        self.reserves_by_index.clear();
        self.reserves_by_mint.clear();
    }

    /// Slots in `mint`'s reserves' price chains that read `oracle` with
    /// `oracle_type` directly, and the available liquidity of those
    /// reserves. Nested
    /// types such as `MostRecentOf` sources are not searched.
    pub fn indexes(
        &self,
        mint: &Pubkey,
        oracle: &Pubkey,
        oracle_type: OracleType,
    ) -> Option<([u16; 4], u128)> {
        let reserves = self.reserves_by_mint.get(mint)?;
        let mut indexes = [NO_INDEX; 4];
        let mut found = 0;
        let mut liquidity = 0u128;
        'reserves: for reserve in reserves.iter() {
            let Some(chains) = &reserve.price_chains else {
                continue;
            };
            let mut matched = false;
            for entry in &chains.price {
                let Some(source) = entry.oracle() else {
                    continue;
                };
                if source.oracle_type != oracle_type || source.oracle != *oracle {
                    continue;
                }
                matched = true;
                if indexes[..found].contains(&source.index) {
                    continue;
                }
                indexes[found] = source.index;
                found += 1;
                if found == indexes.len() {
                    liquidity += u128::from(reserve.available_liquidity);
                    break 'reserves;
                }
            }
            if matched {
                liquidity += u128::from(reserve.available_liquidity);
            }
        }
        (found > 0).then_some((indexes, liquidity))
    }
}

/// Where to read a price for an asset, and how much available liquidity
/// backs that choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedIndexes {
    pub price_feed: AccountMeta,
    pub oracle_mappings: AccountMeta,
    /// Unused positions hold [`NO_INDEX`].
    pub indexes: [u16; 4],
    pub liquidity: u128,
}

impl FeedIndexes {
    pub fn slot_indexes(&self) -> impl Iterator<Item = u16> + '_ {
        self.indexes.iter().copied().take_while(|i| *i != NO_INDEX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fixtures::*, reserve::PriceChains};
    use kamino_accounts::testing::ReserveFixture;

    fn resolved(address: u8, total_collateral: u64, chain: Vec<u16>) -> Arc<ReserveSnapshot> {
        let table = mappings(1, &default_slots());
        let fixture = ReserveFixture {
            available_amount: total_collateral / 10,
            ..reserve_fixture(total_collateral, chain)
        };
        let reserve = reserve(address, 1, &fixture);
        let chains = PriceChains::resolve(&reserve.token_info, &table.entries);
        Arc::new(reserve.with_price_chains(chains))
    }

    #[test]
    fn test_indexes_dedupe_and_sum() {
        let mut feed = feed(1);
        feed.index_reserve(&resolved(1, 100, vec![3, 4]));
        feed.index_reserve(&resolved(2, 50, vec![4, 3]));
        feed.index_reserve(&resolved(3, 70, vec![5]));

        let (indexes, liquidity) = feed
            .indexes(&key(MINT), &key(ORACLE), OracleType::PythPull)
            .unwrap();
        assert_eq!(indexes, [3, 4, NO_INDEX, NO_INDEX]);
        assert_eq!(liquidity, 15);

        let (indexes, liquidity) = feed
            .indexes(&key(MINT), &key(ORACLE), OracleType::RedStone)
            .unwrap();
        assert_eq!(indexes, [5, NO_INDEX, NO_INDEX, NO_INDEX]);
        assert_eq!(liquidity, 7);

        assert!(feed
            .indexes(&key(MINT), &key(0x99), OracleType::PythPull)
            .is_none());
        assert!(feed
            .indexes(&key(0x99), &key(ORACLE), OracleType::PythPull)
            .is_none());
    }

    #[test]
    fn test_remove_and_resort() {
        let mut feed = feed(1);
        let a = resolved(1, 100, vec![3]);
        let b = resolved(2, 50, vec![3, 5]);
        feed.index_reserve(&a);
        feed.index_reserve(&b);
        assert_eq!(feed.indexed_slots().collect::<Vec<_>>(), vec![3, 5]);

        let richer = Arc::new(ReserveSnapshot {
            total_collateral: 500,
            ..b.with_slot(2)
        });
        feed.resort(&richer);
        let order: Vec<_> = feed
            .reserves_for_mint(&key(MINT))
            .unwrap()
            .iter()
            .map(|r| (r.address, r.total_collateral))
            .collect();
        assert_eq!(order, vec![(key(2), 500), (key(1), 100)]);

        feed.remove_reserve(&richer);
        assert_eq!(feed.indexed_slots().collect::<Vec<_>>(), vec![3]);
        assert_eq!(feed.reserves_for_index(3).unwrap().len(), 1);
        feed.remove_reserve(&a);
        assert!(feed.reserves_for_mint(&key(MINT)).is_none());
        assert_eq!(feed.indexed_slots().count(), 0);
    }

    #[test]
    fn test_feed_indexes_slots() {
        let meta = AccountMeta::new_readonly(key(1), false);
        let indexes = FeedIndexes {
            price_feed: meta.clone(),
            oracle_mappings: meta,
            indexes: [7, 2, NO_INDEX, NO_INDEX],
            liquidity: 0,
        };
        assert_eq!(indexes.slot_indexes().collect::<Vec<_>>(), vec![7, 2]);
    }
}
