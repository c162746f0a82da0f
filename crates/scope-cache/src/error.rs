use crate::rpc::RpcError;
use solana_pubkey::Pubkey;
use std::path::PathBuf;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid json in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Account(#[from] kamino_accounts::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Error::Io { path, source }
    }
}

/// Startup failures. Any of these aborts the service.
#[derive(Debug, ThisError)]
pub enum BootstrapError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Store(#[from] Error),
    #[error("malformed {kind} account {address}: {source}")]
    Malformed {
        kind: &'static str,
        address: Pubkey,
        #[source]
        source: kamino_accounts::Error,
    },
    #[error("{kind} account {address} does not exist")]
    Missing { kind: &'static str, address: Pubkey },
}
