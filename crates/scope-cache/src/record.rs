//! JSON shapes shared by `reserves.json` and webhook events.

use crate::{feed::FeedConfiguration, reserve::ReserveSnapshot};
use kamino_accounts::ScopeEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use solana_pubkey::Pubkey;

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReserveRecord {
    #[serde(with = "utils::serde_bs58")]
    pub reserve: Pubkey,
    #[serde(default)]
    pub slot: u64,
    pub token_name: String,
    #[serde(with = "utils::serde_bs58")]
    pub mint: Pubkey,
    #[serde(default)]
    pub available_liquidity: u64,
    pub total_collateral: u64,
    #[serde(with = "utils::serde_bs58")]
    pub price_feed: Pubkey,
    pub max_age_price_seconds: u64,
    pub max_age_twap_seconds: u64,
    pub max_twap_divergence_bps: u64,
    #[serde(default)]
    pub price_chain: Option<Vec<Value>>,
    #[serde(default)]
    pub twap_chain: Option<Vec<Value>>,
    #[serde(
        with = "utils::serde_base64",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub token_info: Vec<u8>,
}

impl ReserveRecord {
    /// `table` is the feed's full mapping table, used to expand nested slot
    /// references when rendering the chains.
    pub fn new(reserve: &ReserveSnapshot, table: &[ScopeEntry], with_token_info: bool) -> Self {
        let (price_chain, twap_chain) = match &reserve.price_chains {
            Some(chains) => {
                let (price, twap) = chains.render(table);
                (Some(price), Some(twap))
            }
            None => (None, None),
        };
        Self {
            reserve: reserve.address,
            slot: reserve.slot,
            token_name: reserve.token_name().to_owned(),
            mint: reserve.mint,
            available_liquidity: reserve.available_liquidity,
            total_collateral: reserve.total_collateral,
            price_feed: reserve.price_feed(),
            max_age_price_seconds: reserve.token_info.max_age_price_seconds,
            max_age_twap_seconds: reserve.token_info.max_age_twap_seconds,
            max_twap_divergence_bps: reserve.token_info.max_twap_divergence_bps,
            price_chain,
            twap_chain,
            token_info: if with_token_info {
                reserve.token_info_raw.to_vec()
            } else {
                Vec::new()
            },
        }
    }

    pub fn to_snapshot(&self, market: Pubkey) -> Result<ReserveSnapshot, kamino_accounts::Error> {
        ReserveSnapshot::from_parts(
            self.reserve,
            self.slot,
            market,
            self.mint,
            self.available_liquidity,
            self.total_collateral,
            self.token_info.clone().into_boxed_slice(),
        )
    }
}

/// One lending market's reserves, the unit of `reserves.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MarketRecord {
    #[serde(with = "utils::serde_bs58")]
    pub market: Pubkey,
    pub reserves: Vec<ReserveRecord>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationRecord {
    pub slot: u64,
    #[serde(with = "utils::serde_bs58")]
    pub address: Pubkey,
    #[serde(with = "utils::serde_bs58")]
    pub admin: Pubkey,
    #[serde(with = "utils::serde_bs58")]
    pub oracle_mappings: Pubkey,
    #[serde(with = "utils::serde_bs58")]
    pub oracle_prices: Pubkey,
    #[serde(with = "utils::serde_bs58")]
    pub tokens_metadata: Pubkey,
    #[serde(with = "utils::serde_bs58")]
    pub oracle_twaps: Pubkey,
    #[serde(with = "utils::serde_bs58")]
    pub admin_cached: Pubkey,
}

impl From<&FeedConfiguration> for ConfigurationRecord {
    fn from(feed: &FeedConfiguration) -> Self {
        let account = &feed.account;
        Self {
            slot: feed.slot,
            address: feed.configuration,
            admin: account.admin,
            oracle_mappings: account.oracle_mappings,
            oracle_prices: account.oracle_prices,
            tokens_metadata: account.tokens_metadata,
            oracle_twaps: account.oracle_twaps,
            admin_cached: account.admin_cached,
        }
    }
}

/// One mapping slot that changed while reserves were using it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SlotChangeRecord {
    pub index: u16,
    pub previous: Value,
    pub latest: Value,
    #[serde(with = "utils::serde_bs58::vec")]
    pub reserves: Vec<Pubkey>,
}
