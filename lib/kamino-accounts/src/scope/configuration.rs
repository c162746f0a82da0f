//! Scope `Configuration` account.
//!
//! Everything the cache needs lives before the padding, so only the first
//! [`PADDING_OFFSET`] bytes are fetched at bootstrap and persisted to disk.

use crate::{CONFIGURATION_DISCRIMINATOR, Result, check, pubkey_at};
use solana_pubkey::Pubkey;

pub const BYTES: usize = 10240;

pub const ADMIN_OFFSET: usize = 8;
pub const ORACLE_MAPPINGS_OFFSET: usize = 40;
pub const ORACLE_PRICES_OFFSET: usize = 72;
pub const TOKENS_METADATA_OFFSET: usize = 104;
pub const ORACLE_TWAPS_OFFSET: usize = 136;
pub const ADMIN_CACHED_OFFSET: usize = 168;
pub const PADDING_OFFSET: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationAccount {
    pub admin: Pubkey,
    pub oracle_mappings: Pubkey,
    pub oracle_prices: Pubkey,
    pub tokens_metadata: Pubkey,
    pub oracle_twaps: Pubkey,
    pub admin_cached: Pubkey,
}

impl ConfigurationAccount {
    /// Full account as delivered by a subscription.
    pub fn is_full(data: &[u8]) -> bool {
        crate::is_account(data, &CONFIGURATION_DISCRIMINATOR, BYTES)
    }

    /// Either the full account or its pre-padding prefix.
    pub fn is_configuration(data: &[u8]) -> bool {
        Self::is_full(data) || crate::is_account(data, &CONFIGURATION_DISCRIMINATOR, PADDING_OFFSET)
    }

    /// Accepts the full account or the prefix.
    pub fn decode(data: &[u8]) -> Result<Self> {
        check(
            "Configuration",
            data,
            &CONFIGURATION_DISCRIMINATOR,
            &[BYTES, PADDING_OFFSET],
        )?;
        Ok(Self {
            admin: pubkey_at(data, ADMIN_OFFSET)?,
            oracle_mappings: pubkey_at(data, ORACLE_MAPPINGS_OFFSET)?,
            oracle_prices: pubkey_at(data, ORACLE_PRICES_OFFSET)?,
            tokens_metadata: pubkey_at(data, TOKENS_METADATA_OFFSET)?,
            oracle_twaps: pubkey_at(data, ORACLE_TWAPS_OFFSET)?,
            admin_cached: pubkey_at(data, ADMIN_CACHED_OFFSET)?,
        })
    }

    /// The meaningful prefix of either representation.
    pub fn prefix(data: &[u8]) -> &[u8] {
        &data[..data.len().min(PADDING_OFFSET)]
    }
}
