//! Kamino vault (`kvault`) `VaultState` account.

use crate::{VAULT_STATE_DISCRIMINATOR, Result, check, is_null_key, name_at, pubkey_at, u64_at};
use solana_pubkey::Pubkey;

pub const BYTES: usize = 62552;

pub const TOKEN_MINT_OFFSET: usize = 80;
pub const TOKEN_MINT_DECIMALS_OFFSET: usize = 112;
pub const TOKEN_PROGRAM_OFFSET: usize = 152;
pub const SHARES_MINT_OFFSET: usize = 184;
pub const SHARES_MINT_DECIMALS_OFFSET: usize = 216;

pub const ALLOCATIONS_OFFSET: usize = 312;
pub const ALLOCATION_LEN: usize = 2160;
pub const MAX_RESERVES: usize = 25;

pub const NAME_OFFSET: usize = 54416;
pub const NAME_LEN: usize = 40;
pub const LOOKUP_TABLE_OFFSET: usize = 54456;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultStateAccount {
    pub token_mint: Pubkey,
    pub token_mint_decimals: u8,
    pub token_program: Pubkey,
    pub shares_mint: Pubkey,
    pub shares_mint_decimals: u8,
    /// Allocated reserves, empty allocation slots skipped.
    pub reserves: Vec<Pubkey>,
    pub name: String,
    pub lookup_table: Option<Pubkey>,
}

impl VaultStateAccount {
    pub fn is_vault_state(data: &[u8]) -> bool {
        crate::is_account(data, &VAULT_STATE_DISCRIMINATOR, BYTES)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        check("VaultState", data, &VAULT_STATE_DISCRIMINATOR, &[BYTES])?;
        let mut reserves = Vec::new();
        for i in 0..MAX_RESERVES {
            let reserve = pubkey_at(data, ALLOCATIONS_OFFSET + i * ALLOCATION_LEN)?;
            if !is_null_key(&reserve) {
                reserves.push(reserve);
            }
        }
        let lookup_table = pubkey_at(data, LOOKUP_TABLE_OFFSET)?;
        Ok(Self {
            token_mint: pubkey_at(data, TOKEN_MINT_OFFSET)?,
            token_mint_decimals: u64_at(data, TOKEN_MINT_DECIMALS_OFFSET)? as u8,
            token_program: pubkey_at(data, TOKEN_PROGRAM_OFFSET)?,
            shares_mint: pubkey_at(data, SHARES_MINT_OFFSET)?,
            shares_mint_decimals: u64_at(data, SHARES_MINT_DECIMALS_OFFSET)? as u8,
            reserves,
            name: name_at(data, NAME_OFFSET, NAME_LEN)?,
            lookup_table: (!is_null_key(&lookup_table)).then_some(lookup_table),
        })
    }
}
