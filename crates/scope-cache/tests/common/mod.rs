#![allow(dead_code)]

use async_trait::async_trait;
use kamino_accounts::{
    KLEND_PROGRAM, KVAULT_PROGRAM, OracleType, SCOPE_PROGRAM,
    testing::{MappingFixture, ReserveFixture, configuration_bytes, mappings_bytes, reserve_bytes},
};
use parking_lot::Mutex;
use scope_cache::{
    AccountUpdate, CacheConfig, LedgerRpc, MemoryNotifier, ProgramScan, RpcError, Scanned,
    ScopeCache, bootstrap,
};
use solana_pubkey::Pubkey;
use std::{
    collections::BTreeMap,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};

pub fn key(i: u8) -> Pubkey {
    Pubkey::new_from_array([i; 32])
}

pub const CONFIGURATION: u8 = 0x10;
pub const MAPPINGS: u8 = 0x20;
pub const PRICE_FEED: u8 = 0x30;
pub const MINT: u8 = 0x40;
pub const ORACLE: u8 = 0x50;
pub const MARKET: u8 = 0x60;

/// Accounts by address, each owned by a program. Scans answer at the
/// highest slot written so far; a removal advances it by one.
#[derive(Default)]
pub struct FakeLedger {
    accounts: Mutex<BTreeMap<Pubkey, (Pubkey, AccountUpdate)>>,
    slot: AtomicU64,
    pub scans: Mutex<Vec<ProgramScan>>,
    pub fetches: AtomicUsize,
    pub fail_fetch: AtomicBool,
}

impl FakeLedger {
    pub fn put(&self, owner: Pubkey, address: Pubkey, slot: u64, data: Vec<u8>) {
        self.slot.fetch_max(slot, Ordering::SeqCst);
        self.accounts.lock().insert(
            address,
            (
                owner,
                AccountUpdate {
                    address,
                    slot,
                    data,
                },
            ),
        );
    }

    pub fn remove(&self, address: &Pubkey) {
        self.slot.fetch_add(1, Ordering::SeqCst);
        self.accounts.lock().remove(address);
    }

    pub fn get(&self, address: &Pubkey) -> Option<AccountUpdate> {
        self.accounts.lock().get(address).map(|(_, u)| u.clone())
    }

    pub fn scans_of(&self, program: Pubkey) -> usize {
        self.scans
            .lock()
            .iter()
            .filter(|s| s.program == program)
            .count()
    }
}

#[async_trait]
impl LedgerRpc for FakeLedger {
    async fn scan(&self, scan: &ProgramScan) -> Result<Scanned, RpcError> {
        self.scans.lock().push(scan.clone());
        let accounts = self
            .accounts
            .lock()
            .values()
            .filter(|(owner, update)| {
                *owner == scan.program
                    && update.data.len() as u64 == scan.data_size
                    && update.data.starts_with(&scan.discriminator)
            })
            .map(|(_, update)| {
                let mut update = update.clone();
                if let Some((offset, length)) = scan.data_slice {
                    update.data = update.data[offset..offset + length].to_vec();
                }
                update
            })
            .collect();
        Ok(Scanned {
            slot: self.slot.load(Ordering::SeqCst),
            accounts,
        })
    }

    async fn fetch(&self, addresses: &[Pubkey]) -> Result<Vec<Option<AccountUpdate>>, RpcError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(RpcError::Request {
                method: "getMultipleAccounts",
                source: "unavailable".into(),
            });
        }
        let accounts = self.accounts.lock();
        Ok(addresses
            .iter()
            .map(|a| accounts.get(a).map(|(_, u)| u.clone()))
            .collect())
    }

    fn max_batch_size(&self) -> usize {
        2
    }
}

pub fn config(dir: &Path) -> CacheConfig {
    CacheConfig {
        data_dir: dir.to_path_buf(),
        ..CacheConfig::default()
    }
}

pub fn reserve_fixture(total_collateral: u64, price_chain: Vec<u16>) -> ReserveFixture {
    ReserveFixture {
        market: key(MARKET),
        mint: key(MINT),
        name: "SOL".to_owned(),
        total_collateral,
        price_feed: key(PRICE_FEED),
        price_chain,
        max_age_price_seconds: 120,
        ..Default::default()
    }
}

/// Slots 3 and 4 read `ORACLE` as pyth pull.
pub fn default_slots() -> Vec<(usize, MappingFixture)> {
    vec![
        (3, MappingFixture::oracle(OracleType::PythPull, key(ORACLE))),
        (4, MappingFixture::oracle(OracleType::PythPull, key(ORACLE))),
    ]
}

/// One feed, its mapping table and `reserves` as `(address, fixture)`.
pub fn ledger(slot: u64, reserves: &[(u8, ReserveFixture)]) -> FakeLedger {
    let ledger = FakeLedger::default();
    ledger.put(
        SCOPE_PROGRAM,
        key(CONFIGURATION),
        slot,
        configuration_bytes(key(MAPPINGS), key(PRICE_FEED)),
    );
    ledger.put(
        SCOPE_PROGRAM,
        key(MAPPINGS),
        slot,
        mappings_bytes(&default_slots()),
    );
    for (address, fixture) in reserves {
        ledger.put(KLEND_PROGRAM, key(*address), slot, reserve_bytes(fixture));
    }
    ledger
}

pub fn update(address: Pubkey, slot: u64, data: Vec<u8>) -> AccountUpdate {
    AccountUpdate {
        address,
        slot,
        data,
    }
}

pub async fn start(dir: &Path, ledger: &FakeLedger) -> (Arc<ScopeCache>, Arc<MemoryNotifier>) {
    tracing_subscriber::fmt::try_init().ok();
    let notifier = Arc::new(MemoryNotifier::default());
    let cache = bootstrap(config(dir), ledger, notifier.clone())
        .await
        .unwrap();
    (cache, notifier)
}

pub fn vault_program() -> Pubkey {
    KVAULT_PROGRAM
}
