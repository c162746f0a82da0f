use hashbrown::HashMap;
use parking_lot::RwLock;
use solana_instruction::AccountMeta;
use solana_pubkey::Pubkey;

/// Memoized account metas, one table per access mode. Populated lazily and
/// never evicted; the account universe is bounded by the cached reserves.
#[derive(Debug, Default)]
pub struct AccountMetas {
    readonly: RwLock<HashMap<Pubkey, AccountMeta>>,
    writable: RwLock<HashMap<Pubkey, AccountMeta>>,
}

impl AccountMetas {
    pub fn readonly(&self, key: &Pubkey) -> AccountMeta {
        Self::get_or_insert(&self.readonly, key, AccountMeta::new_readonly)
    }

    pub fn writable(&self, key: &Pubkey) -> AccountMeta {
        Self::get_or_insert(&self.writable, key, AccountMeta::new)
    }

    pub fn len(&self) -> usize {
        self.readonly.read().len() + self.writable.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_or_insert(
        table: &RwLock<HashMap<Pubkey, AccountMeta>>,
        key: &Pubkey,
        new: fn(Pubkey, bool) -> AccountMeta,
    ) -> AccountMeta {
        if let Some(meta) = table.read().get(key) {
            return meta.clone();
        }
        table
            .write()
            .entry(*key)
            .or_insert_with(|| new(*key, false))
            .clone()
    }
}
