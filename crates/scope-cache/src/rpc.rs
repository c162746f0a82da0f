//! What the cache needs from the ledger: filtered program scans and batched
//! point reads. Transport lives behind [`LedgerRpc`].

use async_trait::async_trait;
use futures::future::try_join_all;
use hashbrown::HashMap;
use kamino_accounts::{
    CONFIGURATION_DISCRIMINATOR, Discriminator, ORACLE_MAPPINGS_DISCRIMINATOR,
    RESERVE_DISCRIMINATOR, VAULT_STATE_DISCRIMINATOR, reserve,
    scope::{configuration, mappings},
    vault,
};
use solana_pubkey::Pubkey;
use thiserror::Error as ThisError;

/// An account observed at a slot, from a push notification, scan or batch read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountUpdate {
    pub address: Pubkey,
    pub slot: u64,
    pub data: Vec<u8>,
}

/// Accounts returned by a [`ProgramScan`] and the slot the ledger answered
/// at. `slot` is 0 when the node reports no context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scanned {
    pub slot: u64,
    pub accounts: Vec<AccountUpdate>,
}

/// A program-account scan filtered by exact size and discriminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramScan {
    pub program: Pubkey,
    pub data_size: u64,
    pub discriminator: Discriminator,
    /// `(offset, length)` of the data returned per account.
    pub data_slice: Option<(usize, usize)>,
}

impl ProgramScan {
    pub fn reserves(program: Pubkey) -> Self {
        Self {
            program,
            data_size: reserve::BYTES as u64,
            discriminator: *RESERVE_DISCRIMINATOR,
            data_slice: None,
        }
    }

    /// Only the pre-padding prefix of each configuration is requested.
    pub fn configurations(program: Pubkey) -> Self {
        Self {
            program,
            data_size: configuration::BYTES as u64,
            discriminator: *CONFIGURATION_DISCRIMINATOR,
            data_slice: Some((0, configuration::PADDING_OFFSET)),
        }
    }

    pub fn mappings(program: Pubkey) -> Self {
        Self {
            program,
            data_size: mappings::BYTES as u64,
            discriminator: *ORACLE_MAPPINGS_DISCRIMINATOR,
            data_slice: None,
        }
    }

    pub fn vault_states(program: Pubkey) -> Self {
        Self {
            program,
            data_size: vault::BYTES as u64,
            discriminator: *VAULT_STATE_DISCRIMINATOR,
            data_slice: None,
        }
    }
}

#[derive(Debug, ThisError)]
pub enum RpcError {
    #[error("{method} failed: {source}")]
    Request {
        method: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("{method}: expected {expected} accounts, got {got}")]
    Length {
        method: &'static str,
        expected: usize,
        got: usize,
    },
}

#[async_trait]
pub trait LedgerRpc: Send + Sync {
    async fn scan(&self, scan: &ProgramScan) -> Result<Scanned, RpcError>;

    /// One batch read; `addresses.len()` never exceeds [`Self::max_batch_size`].
    /// The result is positional, `None` for accounts that do not exist.
    async fn fetch(&self, addresses: &[Pubkey]) -> Result<Vec<Option<AccountUpdate>>, RpcError>;

    fn max_batch_size(&self) -> usize {
        100
    }
}

/// Batch-read any number of accounts, split into concurrent requests of at
/// most [`LedgerRpc::max_batch_size`] addresses. Missing accounts are absent
/// from the result.
pub async fn fetch_chunked(
    rpc: &dyn LedgerRpc,
    addresses: &[Pubkey],
) -> Result<HashMap<Pubkey, AccountUpdate>, RpcError> {
    let size = rpc.max_batch_size().max(1);
    let batches = try_join_all(addresses.chunks(size).map(|chunk| async move {
        let accounts = rpc.fetch(chunk).await?;
        if accounts.len() != chunk.len() {
            return Err(RpcError::Length {
                method: "getMultipleAccounts",
                expected: chunk.len(),
                got: accounts.len(),
            });
        }
        Ok(accounts)
    }))
    .await?;
    Ok(batches
        .into_iter()
        .flatten()
        .flatten()
        .map(|update| (update.address, update))
        .collect())
}
