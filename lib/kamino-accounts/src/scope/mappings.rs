//! Scope `OracleMappings` account: 512 slots stored as parallel arrays.

use super::entry::{GENERIC_LEN, RawSlot, ScopeEntry};
use crate::{ORACLE_MAPPINGS_DISCRIMINATOR, Result, array_at, check, pubkey_at, u8_at, u16_at};

pub const MAX_ENTRIES: usize = 512;

pub const PRICE_INFO_ACCOUNTS_OFFSET: usize = 8;
pub const PRICE_TYPES_OFFSET: usize = PRICE_INFO_ACCOUNTS_OFFSET + 32 * MAX_ENTRIES;
pub const TWAP_SOURCE_OFFSET: usize = PRICE_TYPES_OFFSET + MAX_ENTRIES;
pub const TWAP_ENABLED_OFFSET: usize = TWAP_SOURCE_OFFSET + 2 * MAX_ENTRIES;
pub const REF_PRICE_OFFSET: usize = TWAP_ENABLED_OFFSET + MAX_ENTRIES;
pub const GENERIC_OFFSET: usize = REF_PRICE_OFFSET + 2 * MAX_ENTRIES;
pub const BYTES: usize = GENERIC_OFFSET + GENERIC_LEN * MAX_ENTRIES;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleMappings {
    pub entries: Vec<ScopeEntry>,
}

impl OracleMappings {
    pub fn is_mappings(data: &[u8]) -> bool {
        crate::is_account(data, &ORACLE_MAPPINGS_DISCRIMINATOR, BYTES)
    }

    pub fn raw_slot(data: &[u8], index: usize) -> Result<RawSlot> {
        Ok(RawSlot {
            price_account: pubkey_at(data, PRICE_INFO_ACCOUNTS_OFFSET + index * 32)?,
            price_type: u8_at(data, PRICE_TYPES_OFFSET + index)?,
            twap_source: u16_at(data, TWAP_SOURCE_OFFSET + index * 2)?,
            twap_enabled: u8_at(data, TWAP_ENABLED_OFFSET + index)?,
            ref_price: u16_at(data, REF_PRICE_OFFSET + index * 2)?,
            generic: array_at(data, GENERIC_OFFSET + index * GENERIC_LEN)?,
        })
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        check(
            "OracleMappings",
            data,
            &ORACLE_MAPPINGS_DISCRIMINATOR,
            &[BYTES],
        )?;
        let entries = (0..MAX_ENTRIES)
            .map(|i| Ok(ScopeEntry::decode(i as u16, &Self::raw_slot(data, i)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        OracleType,
        testing::{MappingFixture, mappings_bytes},
    };
    use solana_pubkey::Pubkey;

    #[test]
    fn test_layout_size() {
        assert_eq!(BYTES, 29704);
    }

    #[test]
    fn test_decode() {
        let oracle = Pubkey::new_from_array([4; 32]);
        let data = mappings_bytes(&[
            (3, MappingFixture::oracle(OracleType::PythPull, oracle)),
            (
                5,
                MappingFixture::oracle(OracleType::SwitchboardOnDemand, oracle),
            ),
        ]);
        assert!(OracleMappings::is_mappings(&data));

        let mappings = OracleMappings::decode(&data).unwrap();
        assert_eq!(mappings.entries.len(), MAX_ENTRIES);
        assert_eq!(mappings.entries[0], ScopeEntry::Unused { index: 0 });
        let entry = mappings.entries[3].oracle().unwrap();
        assert_eq!(entry.oracle_type, OracleType::PythPull);
        assert_eq!(entry.oracle, oracle);
        assert_eq!(mappings.entries[5].index(), 5);
    }
}
