use arc_swap::ArcSwap;
use solana_pubkey::Pubkey;
use std::sync::Arc;

/// Addresses the reconciliation loop must batch-read every cycle.
///
/// Readers take a snapshot without locking; writers publish a new sorted
/// vector with compare-and-swap and retry when another writer won.
#[derive(Debug)]
pub struct WatchSet {
    keys: ArcSwap<Vec<Pubkey>>,
}

impl Default for WatchSet {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl WatchSet {
    pub fn new(mut keys: Vec<Pubkey>) -> Self {
        keys.sort();
        keys.dedup();
        Self {
            keys: ArcSwap::from_pointee(keys),
        }
    }

    pub fn snapshot(&self) -> Arc<Vec<Pubkey>> {
        self.keys.load_full()
    }

    pub fn contains(&self, key: &Pubkey) -> bool {
        self.keys.load().binary_search(key).is_ok()
    }

    pub fn len(&self) -> usize {
        self.keys.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.load().is_empty()
    }

    /// Returns `false` if already present.
    pub fn insert(&self, key: Pubkey) -> bool {
        self.update(|keys| {
            let at = keys.binary_search(&key).err()?;
            let mut next = Vec::with_capacity(keys.len() + 1);
            next.extend_from_slice(&keys[..at]);
            next.push(key);
            next.extend_from_slice(&keys[at..]);
            Some(next)
        })
    }

    /// Returns `false` if absent.
    pub fn remove(&self, key: &Pubkey) -> bool {
        self.update(|keys| {
            let at = keys.binary_search(key).ok()?;
            let mut next = keys.to_vec();
            next.remove(at);
            Some(next)
        })
    }

    /// `f` returns `None` when there is nothing to change.
    fn update<F>(&self, f: F) -> bool
    where
        F: Fn(&[Pubkey]) -> Option<Vec<Pubkey>>,
    {
        let mut current = self.keys.load();
        loop {
            let Some(next) = f(&current) else {
                return false;
            };
            let previous = self.keys.compare_and_swap(&*current, Arc::new(next));
            if Arc::ptr_eq(&*previous, &*current) {
                return true;
            }
            current = previous;
        }
    }
}
