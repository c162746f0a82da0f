//! Account byte builders for tests.

use crate::{
    CONFIGURATION_DISCRIMINATOR, NO_INDEX, ORACLE_MAPPINGS_DISCRIMINATOR, OracleType,
    RESERVE_DISCRIMINATOR, VAULT_STATE_DISCRIMINATOR, reserve, scope, vault,
};
use solana_pubkey::Pubkey;

fn put(data: &mut [u8], offset: usize, bytes: &[u8]) {
    data[offset..offset + bytes.len()].copy_from_slice(bytes);
}

fn put_chain(data: &mut [u8], offset: usize, chain: &[u16]) {
    for i in 0..4 {
        let index = chain.get(i).copied().unwrap_or(NO_INDEX);
        put(data, offset + i * 2, &index.to_le_bytes());
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReserveFixture {
    pub market: Pubkey,
    pub mint: Pubkey,
    pub name: String,
    pub total_collateral: u64,
    pub available_amount: u64,
    pub price_feed: Pubkey,
    pub price_chain: Vec<u16>,
    pub twap_chain: Vec<u16>,
    pub max_age_price_seconds: u64,
    pub max_age_twap_seconds: u64,
    pub max_twap_divergence_bps: u64,
    pub pyth_price: Pubkey,
    pub switchboard_price: Pubkey,
    pub switchboard_twap: Pubkey,
}

pub fn reserve_bytes(f: &ReserveFixture) -> Vec<u8> {
    use reserve::token_info::*;
    let mut data = vec![0u8; reserve::BYTES];
    put(&mut data, 0, &*RESERVE_DISCRIMINATOR);
    put(&mut data, reserve::LENDING_MARKET_OFFSET, f.market.as_ref());
    put(&mut data, reserve::LIQUIDITY_MINT_OFFSET, f.mint.as_ref());
    put(
        &mut data,
        reserve::LIQUIDITY_AVAILABLE_AMOUNT_OFFSET,
        &f.available_amount.to_le_bytes(),
    );
    put(
        &mut data,
        reserve::COLLATERAL_MINT_TOTAL_SUPPLY_OFFSET,
        &f.total_collateral.to_le_bytes(),
    );

    let ti = reserve::TOKEN_INFO_OFFSET;
    let name = f.name.as_bytes();
    put(&mut data, ti + NAME_OFFSET, &name[..name.len().min(NAME_LEN)]);
    put(
        &mut data,
        ti + MAX_TWAP_DIVERGENCE_BPS_OFFSET,
        &f.max_twap_divergence_bps.to_le_bytes(),
    );
    put(
        &mut data,
        ti + MAX_AGE_PRICE_SECONDS_OFFSET,
        &f.max_age_price_seconds.to_le_bytes(),
    );
    put(
        &mut data,
        ti + MAX_AGE_TWAP_SECONDS_OFFSET,
        &f.max_age_twap_seconds.to_le_bytes(),
    );
    put(&mut data, ti + SCOPE_PRICE_FEED_OFFSET, f.price_feed.as_ref());
    put_chain(&mut data, ti + SCOPE_PRICE_CHAIN_OFFSET, &f.price_chain);
    put_chain(&mut data, ti + SCOPE_TWAP_CHAIN_OFFSET, &f.twap_chain);
    put(&mut data, ti + SWITCHBOARD_PRICE_OFFSET, f.switchboard_price.as_ref());
    put(&mut data, ti + SWITCHBOARD_TWAP_OFFSET, f.switchboard_twap.as_ref());
    put(&mut data, ti + PYTH_PRICE_OFFSET, f.pyth_price.as_ref());
    data
}

pub fn configuration_bytes(oracle_mappings: Pubkey, oracle_prices: Pubkey) -> Vec<u8> {
    use scope::configuration::*;
    let mut data = vec![0u8; BYTES];
    put(&mut data, 0, &*CONFIGURATION_DISCRIMINATOR);
    put(&mut data, ADMIN_OFFSET, Pubkey::new_from_array([0xad; 32]).as_ref());
    put(&mut data, ORACLE_MAPPINGS_OFFSET, oracle_mappings.as_ref());
    put(&mut data, ORACLE_PRICES_OFFSET, oracle_prices.as_ref());
    data
}

#[derive(Debug, Clone)]
pub struct MappingFixture {
    pub price_type: u8,
    pub price_account: Pubkey,
    pub twap_source: u16,
    pub twap_enabled: u8,
    pub ref_price: u16,
    pub generic: [u8; scope::entry::GENERIC_LEN],
}

impl MappingFixture {
    pub fn oracle(oracle_type: OracleType, price_account: Pubkey) -> Self {
        Self {
            price_type: oracle_type as u8,
            price_account,
            twap_source: NO_INDEX,
            twap_enabled: 0,
            ref_price: NO_INDEX,
            generic: [0; scope::entry::GENERIC_LEN],
        }
    }
}

pub fn mappings_bytes(slots: &[(usize, MappingFixture)]) -> Vec<u8> {
    use scope::entry::GENERIC_LEN;
    use scope::mappings::*;
    let mut data = vec![0u8; BYTES];
    put(&mut data, 0, &*ORACLE_MAPPINGS_DISCRIMINATOR);
    for i in 0..MAX_ENTRIES {
        put(&mut data, TWAP_SOURCE_OFFSET + i * 2, &NO_INDEX.to_le_bytes());
        put(&mut data, REF_PRICE_OFFSET + i * 2, &NO_INDEX.to_le_bytes());
    }
    for (i, slot) in slots {
        let i = *i;
        put(
            &mut data,
            PRICE_INFO_ACCOUNTS_OFFSET + i * 32,
            slot.price_account.as_ref(),
        );
        data[PRICE_TYPES_OFFSET + i] = slot.price_type;
        put(&mut data, TWAP_SOURCE_OFFSET + i * 2, &slot.twap_source.to_le_bytes());
        data[TWAP_ENABLED_OFFSET + i] = slot.twap_enabled;
        put(&mut data, REF_PRICE_OFFSET + i * 2, &slot.ref_price.to_le_bytes());
        put(&mut data, GENERIC_OFFSET + i * GENERIC_LEN, &slot.generic);
    }
    data
}

#[derive(Debug, Clone, Default)]
pub struct VaultFixture {
    pub shares_mint: Pubkey,
    pub token_mint: Pubkey,
    pub reserves: Vec<Pubkey>,
    pub name: String,
    pub lookup_table: Option<Pubkey>,
}

pub fn vault_bytes(f: &VaultFixture) -> Vec<u8> {
    use vault::*;
    let mut data = vec![0u8; BYTES];
    put(&mut data, 0, &*VAULT_STATE_DISCRIMINATOR);
    put(&mut data, TOKEN_MINT_OFFSET, f.token_mint.as_ref());
    put(&mut data, TOKEN_MINT_DECIMALS_OFFSET, &6u64.to_le_bytes());
    put(&mut data, SHARES_MINT_OFFSET, f.shares_mint.as_ref());
    put(&mut data, SHARES_MINT_DECIMALS_OFFSET, &6u64.to_le_bytes());
    for (i, reserve) in f.reserves.iter().take(MAX_RESERVES).enumerate() {
        put(&mut data, ALLOCATIONS_OFFSET + i * ALLOCATION_LEN, reserve.as_ref());
    }
    let name = f.name.as_bytes();
    put(&mut data, NAME_OFFSET, &name[..name.len().min(NAME_LEN)]);
    if let Some(table) = f.lookup_table {
        put(&mut data, LOOKUP_TABLE_OFFSET, table.as_ref());
    }
    data
}
