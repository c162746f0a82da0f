//! [`LedgerRpc`] over Solana JSON-RPC.

use async_trait::async_trait;
use scope_cache::{AccountUpdate, LedgerRpc, ProgramScan, RpcError, Scanned};
use solana_account_decoder::{UiAccountEncoding, UiDataSliceConfig};
use solana_commitment_config::CommitmentConfig;
use solana_pubkey::Pubkey;
use solana_rpc_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client_api::{
    config::{RpcAccountInfoConfig, RpcProgramAccountsConfig},
    filter::{Memcmp, RpcFilterType},
    request::RpcRequest,
    response::{OptionalContext, RpcKeyedAccount},
};

pub struct SolanaLedger {
    client: RpcClient,
    commitment: CommitmentConfig,
    batch_size: usize,
}

impl SolanaLedger {
    pub fn new(url: String, commitment: CommitmentConfig, batch_size: usize) -> Self {
        Self {
            client: RpcClient::new_with_commitment(url, commitment),
            commitment,
            batch_size,
        }
    }
}

/// Exact size and discriminator filters, base64 data, optional slice.
/// Shared by scans and program subscriptions.
pub fn program_config(scan: &ProgramScan, commitment: CommitmentConfig) -> RpcProgramAccountsConfig {
    RpcProgramAccountsConfig {
        filters: Some(vec![
            RpcFilterType::DataSize(scan.data_size),
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(0, scan.discriminator.to_vec())),
        ]),
        account_config: RpcAccountInfoConfig {
            encoding: Some(UiAccountEncoding::Base64),
            data_slice: scan
                .data_slice
                .map(|(offset, length)| UiDataSliceConfig { offset, length }),
            commitment: Some(commitment),
            min_context_slot: None,
        },
        with_context: Some(true),
        ..Default::default()
    }
}

/// `None` if the key or the data cannot be decoded.
pub fn keyed_update(keyed: &RpcKeyedAccount, slot: u64) -> Option<AccountUpdate> {
    let address = match utils::parse_pubkey(&keyed.pubkey) {
        Ok(address) => address,
        Err(error) => {
            tracing::warn!(pubkey = %keyed.pubkey, "invalid account key: {}", error);
            return None;
        }
    };
    let Some(data) = keyed.account.data.decode() else {
        tracing::warn!(%address, "undecodable account data");
        return None;
    };
    Some(AccountUpdate {
        address,
        slot,
        data,
    })
}

fn request(method: &'static str) -> impl FnOnce(solana_rpc_client_api::client_error::Error) -> RpcError {
    move |error| RpcError::Request {
        method,
        source: Box::new(error),
    }
}

#[async_trait]
impl LedgerRpc for SolanaLedger {
    async fn scan(&self, scan: &ProgramScan) -> Result<Scanned, RpcError> {
        let params = serde_json::json!([
            scan.program.to_string(),
            program_config(scan, self.commitment)
        ]);
        let response: OptionalContext<Vec<RpcKeyedAccount>> = self
            .client
            .send(RpcRequest::GetProgramAccounts, params)
            .await
            .map_err(request("getProgramAccounts"))?;
        let (slot, accounts) = match response {
            OptionalContext::Context(response) => (response.context.slot, response.value),
            OptionalContext::NoContext(accounts) => (0, accounts),
        };
        tracing::debug!(program = %scan.program, slot, count = accounts.len(), "scanned");
        Ok(Scanned {
            slot,
            accounts: accounts
                .iter()
                .filter_map(|keyed| keyed_update(keyed, slot))
                .collect(),
        })
    }

    async fn fetch(&self, addresses: &[Pubkey]) -> Result<Vec<Option<AccountUpdate>>, RpcError> {
        let response = self
            .client
            .get_multiple_accounts_with_commitment(addresses, self.commitment)
            .await
            .map_err(request("getMultipleAccounts"))?;
        let slot = response.context.slot;
        Ok(addresses
            .iter()
            .zip(response.value)
            .map(|(address, account)| {
                account.map(|account| AccountUpdate {
                    address: *address,
                    slot,
                    data: account.data,
                })
            })
            .collect())
    }

    fn max_batch_size(&self) -> usize {
        self.batch_size
    }
}
