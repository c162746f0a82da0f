//! Kamino Lending `Reserve` account.

use crate::{
    RESERVE_DISCRIMINATOR, Result, chain_at, check, is_null_key, name_at, pubkey_at, u8_at,
    u64_at,
};
use solana_pubkey::Pubkey;

pub const BYTES: usize = 8624;

pub const LAST_UPDATE_SLOT_OFFSET: usize = 16;
pub const LENDING_MARKET_OFFSET: usize = 32;

pub const LIQUIDITY_OFFSET: usize = 128;
pub const LIQUIDITY_MINT_OFFSET: usize = LIQUIDITY_OFFSET;
pub const LIQUIDITY_SUPPLY_VAULT_OFFSET: usize = LIQUIDITY_OFFSET + 32;
pub const LIQUIDITY_AVAILABLE_AMOUNT_OFFSET: usize = LIQUIDITY_OFFSET + 96;

pub const COLLATERAL_OFFSET: usize = 2560;
pub const COLLATERAL_MINT_OFFSET: usize = COLLATERAL_OFFSET;
pub const COLLATERAL_MINT_TOTAL_SUPPLY_OFFSET: usize = COLLATERAL_OFFSET + 32;

pub const CONFIG_OFFSET: usize = 4856;
pub const TOKEN_INFO_OFFSET: usize = CONFIG_OFFSET + 96;

/// `TokenInfo` block embedded in the reserve config.
pub mod token_info {
    pub const BYTES: usize = 384;

    pub const NAME_OFFSET: usize = 0;
    pub const NAME_LEN: usize = 32;
    pub const HEURISTIC_OFFSET: usize = 32;
    pub const MAX_TWAP_DIVERGENCE_BPS_OFFSET: usize = 56;
    pub const MAX_AGE_PRICE_SECONDS_OFFSET: usize = 64;
    pub const MAX_AGE_TWAP_SECONDS_OFFSET: usize = 72;

    pub const SCOPE_PRICE_FEED_OFFSET: usize = 80;
    pub const SCOPE_PRICE_CHAIN_OFFSET: usize = 112;
    pub const SCOPE_TWAP_CHAIN_OFFSET: usize = 120;

    pub const SWITCHBOARD_PRICE_OFFSET: usize = 128;
    pub const SWITCHBOARD_TWAP_OFFSET: usize = 160;
    pub const PYTH_PRICE_OFFSET: usize = 192;
    pub const BLOCK_PRICE_USAGE_OFFSET: usize = 224;
}

/// Decoded view of a reserve's oracle configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub name: String,
    pub max_twap_divergence_bps: u64,
    pub max_age_price_seconds: u64,
    pub max_age_twap_seconds: u64,
    pub scope_price_feed: Pubkey,
    pub price_chain: Vec<u16>,
    pub twap_chain: Vec<u16>,
    pub switchboard_price: Pubkey,
    pub switchboard_twap: Pubkey,
    pub pyth_price: Pubkey,
    pub block_price_usage: bool,
}

impl TokenInfo {
    pub fn decode(raw: &[u8]) -> Result<Self> {
        use token_info::*;
        if raw.len() != BYTES {
            return Err(crate::Error::Size {
                kind: "TokenInfo",
                expected: BYTES,
                got: raw.len(),
            });
        }
        Ok(Self {
            name: name_at(raw, NAME_OFFSET, NAME_LEN)?,
            max_twap_divergence_bps: u64_at(raw, MAX_TWAP_DIVERGENCE_BPS_OFFSET)?,
            max_age_price_seconds: u64_at(raw, MAX_AGE_PRICE_SECONDS_OFFSET)?,
            max_age_twap_seconds: u64_at(raw, MAX_AGE_TWAP_SECONDS_OFFSET)?,
            scope_price_feed: pubkey_at(raw, SCOPE_PRICE_FEED_OFFSET)?,
            price_chain: chain_at(raw, SCOPE_PRICE_CHAIN_OFFSET)?,
            twap_chain: chain_at(raw, SCOPE_TWAP_CHAIN_OFFSET)?,
            switchboard_price: pubkey_at(raw, SWITCHBOARD_PRICE_OFFSET)?,
            switchboard_twap: pubkey_at(raw, SWITCHBOARD_TWAP_OFFSET)?,
            pyth_price: pubkey_at(raw, PYTH_PRICE_OFFSET)?,
            block_price_usage: u8_at(raw, BLOCK_PRICE_USAGE_OFFSET)? != 0,
        })
    }

    /// The reserve is priced by Scope.
    pub fn has_scope_feed(&self) -> bool {
        !is_null_key(&self.scope_price_feed)
    }
}

/// The fields of a reserve account the cache tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveAccount {
    pub lending_market: Pubkey,
    pub liquidity_mint: Pubkey,
    pub available_amount: u64,
    pub collateral_mint: Pubkey,
    pub collateral_total_supply: u64,
    pub token_info_raw: Box<[u8]>,
    pub token_info: TokenInfo,
}

impl ReserveAccount {
    pub fn is_reserve(data: &[u8]) -> bool {
        crate::is_account(data, &RESERVE_DISCRIMINATOR, BYTES)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        check("Reserve", data, &RESERVE_DISCRIMINATOR, &[BYTES])?;
        let token_info_raw: Box<[u8]> =
            data[TOKEN_INFO_OFFSET..TOKEN_INFO_OFFSET + token_info::BYTES].into();
        Ok(Self {
            lending_market: pubkey_at(data, LENDING_MARKET_OFFSET)?,
            liquidity_mint: pubkey_at(data, LIQUIDITY_MINT_OFFSET)?,
            available_amount: u64_at(data, LIQUIDITY_AVAILABLE_AMOUNT_OFFSET)?,
            collateral_mint: pubkey_at(data, COLLATERAL_MINT_OFFSET)?,
            collateral_total_supply: u64_at(data, COLLATERAL_MINT_TOTAL_SUPPLY_OFFSET)?,
            token_info: TokenInfo::decode(&token_info_raw)?,
            token_info_raw,
        })
    }
}
