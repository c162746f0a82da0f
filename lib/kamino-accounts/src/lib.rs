//! Byte layouts of the on-chain accounts the scope cache tracks: Kamino Lending
//! reserves, Kamino vault states, and Scope configuration / oracle mapping
//! accounts.
//!
//! Decoders never panic on short input; every accessor validates the account
//! length against the layout first.

use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use solana_pubkey::{Pubkey, pubkey};
use thiserror::Error as ThisError;

pub mod reserve;
pub mod scope;
pub mod vault;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use reserve::{ReserveAccount, TokenInfo};
pub use scope::{
    configuration::ConfigurationAccount,
    entry::{EmaType, EmaTypes, MarketStatusBehavior, OracleEntry, ScopeEntry},
    mappings::OracleMappings,
    oracle_type::OracleType,
};
pub use vault::VaultStateAccount;

pub const KLEND_PROGRAM: Pubkey = pubkey!("KLend2g3cP87fffoy8q1mQqGKjrxjC8boSyAYavgmjD");
pub const SCOPE_PROGRAM: Pubkey = pubkey!("HFn8GnPADiny6XqUoWE8uRPPxb29ikn4yTuPa9MF2fWJ");
pub const KVAULT_PROGRAM: Pubkey = pubkey!("KvauGMspG5k6rtzrqqn7WNn3oZdyKqLKwK2XWQ8FLjd");

/// Kamino marks an absent oracle with this key.
pub const NULL_KEY: Pubkey = pubkey!("nu11111111111111111111111111111111111111111");

/// Chain slots past the last used one hold this index.
pub const NO_INDEX: u16 = u16::MAX;

pub const DISCRIMINATOR_LEN: usize = 8;

pub type Discriminator = [u8; DISCRIMINATOR_LEN];

/// Anchor account discriminator: first 8 bytes of `sha256("account:<Name>")`.
pub fn account_discriminator(name: &str) -> Discriminator {
    let hash = Sha256::new()
        .chain_update(b"account:")
        .chain_update(name.as_bytes())
        .finalize();
    let mut out = [0u8; DISCRIMINATOR_LEN];
    out.copy_from_slice(&hash[..DISCRIMINATOR_LEN]);
    out
}

pub static RESERVE_DISCRIMINATOR: Lazy<Discriminator> =
    Lazy::new(|| account_discriminator("Reserve"));
pub static CONFIGURATION_DISCRIMINATOR: Lazy<Discriminator> =
    Lazy::new(|| account_discriminator("Configuration"));
pub static ORACLE_MAPPINGS_DISCRIMINATOR: Lazy<Discriminator> =
    Lazy::new(|| account_discriminator("OracleMappings"));
pub static VAULT_STATE_DISCRIMINATOR: Lazy<Discriminator> =
    Lazy::new(|| account_discriminator("VaultState"));

/// `true` for either of the two keys meaning "no feed".
pub fn is_null_key(key: &Pubkey) -> bool {
    *key == NULL_KEY || *key == Pubkey::default()
}

/// `true` if `data` is exactly `len` bytes and starts with `discriminator`.
pub fn is_account(data: &[u8], discriminator: &Discriminator, len: usize) -> bool {
    data.len() == len && data.starts_with(discriminator)
}

#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{kind}: expected {expected} bytes, got {got}")]
    Size {
        kind: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("{kind}: discriminator mismatch")]
    Discriminator { kind: &'static str },
    #[error("read out of bounds at offset {offset}")]
    OutOfBounds { offset: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn check(
    kind: &'static str,
    data: &[u8],
    discriminator: &Discriminator,
    sizes: &[usize],
) -> Result<()> {
    if !sizes.contains(&data.len()) {
        return Err(Error::Size {
            kind,
            expected: sizes[0],
            got: data.len(),
        });
    }
    if !data.starts_with(discriminator) {
        return Err(Error::Discriminator { kind });
    }
    Ok(())
}

pub(crate) fn array_at<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N]> {
    data.get(offset..offset + N)
        .and_then(|s| s.try_into().ok())
        .ok_or(Error::OutOfBounds { offset })
}

pub(crate) fn pubkey_at(data: &[u8], offset: usize) -> Result<Pubkey> {
    array_at::<32>(data, offset).map(Pubkey::new_from_array)
}

pub(crate) fn u8_at(data: &[u8], offset: usize) -> Result<u8> {
    data.get(offset).copied().ok_or(Error::OutOfBounds { offset })
}

pub(crate) fn u16_at(data: &[u8], offset: usize) -> Result<u16> {
    array_at(data, offset).map(u16::from_le_bytes)
}

pub(crate) fn u32_at(data: &[u8], offset: usize) -> Result<u32> {
    array_at(data, offset).map(u32::from_le_bytes)
}

pub(crate) fn u64_at(data: &[u8], offset: usize) -> Result<u64> {
    array_at(data, offset).map(u64::from_le_bytes)
}

pub(crate) fn i64_at(data: &[u8], offset: usize) -> Result<i64> {
    array_at(data, offset).map(i64::from_le_bytes)
}

/// Fixed-width, zero padded UTF-8 name field.
pub(crate) fn name_at(data: &[u8], offset: usize, len: usize) -> Result<String> {
    let raw = data
        .get(offset..offset + len)
        .ok_or(Error::OutOfBounds { offset })?;
    let end = raw.iter().position(|b| *b == 0).unwrap_or(len);
    Ok(String::from_utf8_lossy(&raw[..end]).trim().to_owned())
}

/// Reads a chain of up to four slot indices, stopping at the first [`NO_INDEX`].
pub(crate) fn chain_at(data: &[u8], offset: usize) -> Result<Vec<u16>> {
    let mut chain = Vec::with_capacity(4);
    for i in 0..4 {
        let index = u16_at(data, offset + i * 2)?;
        if index == NO_INDEX {
            break;
        }
        chain.push(index);
    }
    Ok(chain)
}
