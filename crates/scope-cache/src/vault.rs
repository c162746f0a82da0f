use kamino_accounts::VaultStateAccount;
use solana_pubkey::Pubkey;

/// A Kamino vault, keyed in the cache by its shares mint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultContext {
    pub slot: u64,
    pub address: Pubkey,
    pub token_mint: Pubkey,
    pub token_mint_decimals: u8,
    pub token_program: Pubkey,
    pub shares_mint: Pubkey,
    pub shares_mint_decimals: u8,
    pub reserves: Vec<Pubkey>,
    pub name: String,
    pub lookup_table: Option<Pubkey>,
}

impl VaultContext {
    pub fn new(address: Pubkey, slot: u64, state: VaultStateAccount) -> Self {
        Self {
            slot,
            address,
            token_mint: state.token_mint,
            token_mint_decimals: state.token_mint_decimals,
            token_program: state.token_program,
            shares_mint: state.shares_mint,
            shares_mint_decimals: state.shares_mint_decimals,
            reserves: state.reserves,
            name: state.name,
            lookup_table: state.lookup_table,
        }
    }

    /// Only the allocation set and the lookup table matter downstream.
    pub fn differs(&self, latest: &Self) -> bool {
        self.reserves != latest.reserves || self.lookup_table != latest.lookup_table
    }
}
