use kamino_accounts::{OracleMappings, ScopeEntry};
use solana_pubkey::Pubkey;
use std::sync::Arc;

/// Decoded oracle mapping table at a slot. The raw bytes are kept for
/// change detection and persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingSnapshot {
    pub address: Pubkey,
    pub slot: u64,
    pub data: Arc<[u8]>,
    pub entries: Arc<[ScopeEntry]>,
}

impl MappingSnapshot {
    pub fn decode(address: Pubkey, slot: u64, data: &[u8]) -> kamino_accounts::Result<Self> {
        let mappings = OracleMappings::decode(data)?;
        Ok(Self {
            address,
            slot,
            data: data.into(),
            entries: mappings.entries.into(),
        })
    }

    pub fn with_slot(&self, slot: u64) -> Self {
        Self {
            slot,
            ..self.clone()
        }
    }

    /// Slot indices whose entry differs from `latest`.
    pub fn changed_indexes<'a>(&'a self, latest: &'a Self) -> impl Iterator<Item = u16> + 'a {
        self.entries
            .iter()
            .zip(latest.entries.iter())
            .filter(|(a, b)| a != b)
            .map(|(_, b)| b.index())
    }
}
