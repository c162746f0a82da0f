use crate::{
    feed::FeedConfiguration, mapping::MappingSnapshot, reserve::ReserveSnapshot,
    rpc::AccountUpdate,
};
use kamino_accounts::{
    OracleType, ReserveAccount,
    testing::{MappingFixture, ReserveFixture, configuration_bytes, mappings_bytes, reserve_bytes},
};
use solana_pubkey::Pubkey;

pub fn key(i: u8) -> Pubkey {
    Pubkey::new_from_array([i; 32])
}

pub const CONFIGURATION: u8 = 0x10;
pub const MAPPINGS: u8 = 0x20;
pub const PRICE_FEED: u8 = 0x30;
pub const MINT: u8 = 0x40;
pub const ORACLE: u8 = 0x50;

pub fn feed(slot: u64) -> FeedConfiguration {
    FeedConfiguration::new(
        key(CONFIGURATION),
        slot,
        &configuration_bytes(key(MAPPINGS), key(PRICE_FEED)),
    )
    .unwrap()
}

/// Slots 3 and 4 read `ORACLE` as pyth pull; 5 as redstone.
pub fn default_slots() -> Vec<(usize, MappingFixture)> {
    vec![
        (3, MappingFixture::oracle(OracleType::PythPull, key(ORACLE))),
        (4, MappingFixture::oracle(OracleType::PythPull, key(ORACLE))),
        (5, MappingFixture::oracle(OracleType::RedStone, key(ORACLE))),
    ]
}

pub fn mappings(slot: u64, slots: &[(usize, MappingFixture)]) -> MappingSnapshot {
    MappingSnapshot::decode(key(MAPPINGS), slot, &mappings_bytes(slots)).unwrap()
}

pub fn reserve_fixture(total_collateral: u64, price_chain: Vec<u16>) -> ReserveFixture {
    ReserveFixture {
        market: key(0x60),
        mint: key(MINT),
        name: "SOL".to_owned(),
        total_collateral,
        price_feed: key(PRICE_FEED),
        price_chain,
        twap_chain: vec![],
        ..Default::default()
    }
}

pub fn reserve(address: u8, slot: u64, fixture: &ReserveFixture) -> ReserveSnapshot {
    let account = ReserveAccount::decode(&reserve_bytes(fixture)).unwrap();
    ReserveSnapshot::new(key(address), slot, account)
}

pub fn update(address: Pubkey, slot: u64, data: Vec<u8>) -> AccountUpdate {
    AccountUpdate {
        address,
        slot,
        data,
    }
}
