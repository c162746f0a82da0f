use kamino_accounts::{ReserveAccount, ScopeEntry, TokenInfo};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use solana_pubkey::Pubkey;

/// The entries a reserve's price and twap chains resolve to in its feed's
/// mapping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceChains {
    pub price: Vec<ScopeEntry>,
    pub twap: Vec<ScopeEntry>,
}

impl PriceChains {
    /// `None` if any index falls outside the table.
    pub fn resolve(info: &TokenInfo, entries: &[ScopeEntry]) -> Option<Self> {
        let lookup = |chain: &[u16]| -> Option<Vec<ScopeEntry>> {
            chain
                .iter()
                .map(|i| entries.get(usize::from(*i)).cloned())
                .collect()
        };
        Some(Self {
            price: lookup(&info.price_chain)?,
            twap: lookup(&info.twap_chain)?,
        })
    }

    pub fn render(&self, table: &[ScopeEntry]) -> (Vec<Value>, Vec<Value>) {
        let render = |chain: &[ScopeEntry]| -> Vec<Value> {
            chain.iter().map(|e| e.to_json(table)).collect()
        };
        (render(&self.price), render(&self.twap))
    }
}

/// Field of a reserve that differs between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReserveChange {
    Market,
    Mint,
    TokenName,
    AvailableLiquidity,
    TotalCollateral,
    MaxAgePriceSeconds,
    MaxAgeTwapSeconds,
    MaxTwapDivergenceBps,
    PriceFeed,
    PriceChain,
    TwapChain,
}

/// Immutable view of one reserve at a slot. Replaced wholesale on change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveSnapshot {
    pub slot: u64,
    pub address: Pubkey,
    pub market: Pubkey,
    pub mint: Pubkey,
    pub available_liquidity: u64,
    pub total_collateral: u64,
    pub token_info: TokenInfo,
    pub token_info_raw: Box<[u8]>,
    pub price_chains: Option<PriceChains>,
}

impl ReserveSnapshot {
    pub fn new(address: Pubkey, slot: u64, account: ReserveAccount) -> Self {
        Self {
            slot,
            address,
            market: account.lending_market,
            mint: account.liquidity_mint,
            available_liquidity: account.available_amount,
            total_collateral: account.collateral_total_supply,
            token_info: account.token_info,
            token_info_raw: account.token_info_raw,
            price_chains: None,
        }
    }

    /// Rebuild from persisted fields and the raw `TokenInfo` block.
    pub fn from_parts(
        address: Pubkey,
        slot: u64,
        market: Pubkey,
        mint: Pubkey,
        available_liquidity: u64,
        total_collateral: u64,
        token_info_raw: Box<[u8]>,
    ) -> Result<Self, kamino_accounts::Error> {
        Ok(Self {
            slot,
            address,
            market,
            mint,
            available_liquidity,
            total_collateral,
            token_info: TokenInfo::decode(&token_info_raw)?,
            token_info_raw,
            price_chains: None,
        })
    }

    pub fn token_name(&self) -> &str {
        &self.token_info.name
    }

    pub fn price_feed(&self) -> Pubkey {
        self.token_info.scope_price_feed
    }

    /// `false` when the feed reference is one of the null sentinels.
    pub fn has_feed(&self) -> bool {
        self.token_info.has_scope_feed()
    }

    /// Distinct mapping slots referenced by either chain.
    pub fn slot_indexes(&self) -> impl Iterator<Item = u16> + '_ {
        let price = &self.token_info.price_chain;
        let twap = &self.token_info.twap_chain;
        price
            .iter()
            .chain(twap.iter().filter(move |i| !price.contains(*i)))
            .copied()
    }

    pub fn with_price_chains(&self, price_chains: Option<PriceChains>) -> Self {
        Self {
            price_chains,
            ..self.clone()
        }
    }

    pub fn with_slot(&self, slot: u64) -> Self {
        Self {
            slot,
            ..self.clone()
        }
    }

    /// Nothing but available liquidity or collateral moved.
    pub fn balances_only(changes: &[ReserveChange]) -> bool {
        !changes.is_empty()
            && changes.iter().all(|c| {
                matches!(
                    c,
                    ReserveChange::AvailableLiquidity | ReserveChange::TotalCollateral
                )
            })
    }

    /// Fields that differ from `latest`, in declaration order.
    pub fn diff(&self, latest: &Self) -> Vec<ReserveChange> {
        let (a, b) = (&self.token_info, &latest.token_info);
        let chain = |f: fn(&PriceChains) -> &Vec<ScopeEntry>| {
            self.price_chains.as_ref().map(f) != latest.price_chains.as_ref().map(f)
        };
        [
            (ReserveChange::Market, self.market != latest.market),
            (ReserveChange::Mint, self.mint != latest.mint),
            (ReserveChange::TokenName, a.name != b.name),
            (
                ReserveChange::AvailableLiquidity,
                self.available_liquidity != latest.available_liquidity,
            ),
            (
                ReserveChange::TotalCollateral,
                self.total_collateral != latest.total_collateral,
            ),
            (
                ReserveChange::MaxAgePriceSeconds,
                a.max_age_price_seconds != b.max_age_price_seconds,
            ),
            (
                ReserveChange::MaxAgeTwapSeconds,
                a.max_age_twap_seconds != b.max_age_twap_seconds,
            ),
            (
                ReserveChange::MaxTwapDivergenceBps,
                a.max_twap_divergence_bps != b.max_twap_divergence_bps,
            ),
            (
                ReserveChange::PriceFeed,
                a.scope_price_feed != b.scope_price_feed,
            ),
            (
                ReserveChange::PriceChain,
                a.price_chain != b.price_chain || chain(|c| &c.price),
            ),
            (
                ReserveChange::TwapChain,
                a.twap_chain != b.twap_chain || chain(|c| &c.twap),
            ),
        ]
        .into_iter()
        .filter_map(|(change, differs)| differs.then_some(change))
        .collect()
    }
}
