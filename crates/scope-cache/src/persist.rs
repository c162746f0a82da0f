//! On-disk cache layout under the data directory:
//!
//! ```text
//! <root>/reserves.json
//! <root>/scope/configurations/<base58>.dat   200-byte configuration prefix
//! <root>/scope/mappings/<base58>.dat         full mapping account
//! ```

use crate::{
    error::{Error, Result},
    record::MarketRecord,
};
use solana_pubkey::Pubkey;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

const CONFIGURATIONS: &str = "scope/configurations";
const MAPPINGS: &str = "scope/mappings";
const RESERVES: &str = "reserves.json";
const EXTENSION: &str = "dat";

#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn create_dirs(&self) -> Result<()> {
        for dir in [CONFIGURATIONS, MAPPINGS] {
            let path = self.root.join(dir);
            std::fs::create_dir_all(&path).map_err(Error::io(path))?;
        }
        Ok(())
    }

    fn account_path(&self, dir: &str, address: &Pubkey) -> PathBuf {
        self.root
            .join(dir)
            .join(format!("{}.{}", address, EXTENSION))
    }

    pub fn configuration_path(&self, address: &Pubkey) -> PathBuf {
        self.account_path(CONFIGURATIONS, address)
    }

    pub fn mappings_path(&self, address: &Pubkey) -> PathBuf {
        self.account_path(MAPPINGS, address)
    }

    pub fn reserves_path(&self) -> PathBuf {
        self.root.join(RESERVES)
    }

    pub fn write_configuration(&self, address: &Pubkey, prefix: &[u8]) -> Result<()> {
        write(self.configuration_path(address), prefix)
    }

    pub fn write_mappings(&self, address: &Pubkey, data: &[u8]) -> Result<()> {
        write(self.mappings_path(address), data)
    }

    pub fn delete_configuration(&self, address: &Pubkey) -> Result<()> {
        delete(self.configuration_path(address))
    }

    pub fn delete_mappings(&self, address: &Pubkey) -> Result<()> {
        delete(self.mappings_path(address))
    }

    pub fn read_configurations(&self) -> Result<Vec<(Pubkey, Vec<u8>)>> {
        read_dir(&self.root.join(CONFIGURATIONS))
    }

    pub fn read_mappings(&self) -> Result<Vec<(Pubkey, Vec<u8>)>> {
        read_dir(&self.root.join(MAPPINGS))
    }

    pub fn write_reserves(&self, markets: &[MarketRecord]) -> Result<()> {
        let path = self.reserves_path();
        let json = serde_json::to_vec_pretty(markets).map_err(|source| Error::Json {
            path: path.clone(),
            source,
        })?;
        write(path, &json)
    }

    /// `None` when the file does not exist.
    pub fn read_reserves(&self) -> Result<Option<Vec<MarketRecord>>> {
        let path = self.reserves_path();
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(Error::io(path)(error)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| Error::Json { path, source })
    }
}

fn write(path: PathBuf, data: &[u8]) -> Result<()> {
    std::fs::write(&path, data).map_err(Error::io(path))
}

fn delete(path: PathBuf) -> Result<()> {
    match std::fs::remove_file(&path) {
        Err(error) if error.kind() != ErrorKind::NotFound => Err(Error::io(path)(error)),
        _ => Ok(()),
    }
}

/// Files named `<base58>.dat`; anything else is skipped.
fn read_dir(dir: &Path) -> Result<Vec<(Pubkey, Vec<u8>)>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(Error::io(dir)(error)),
    };
    let mut accounts = Vec::new();
    for entry in entries {
        let path = entry.map_err(Error::io(dir))?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
            continue;
        }
        let Some(address) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| utils::parse_pubkey(s).ok())
        else {
            tracing::warn!("skipping {}", path.display());
            continue;
        };
        let data = std::fs::read(&path).map_err(Error::io(&path))?;
        accounts.push((address, data));
    }
    accounts.sort_by_key(|(address, _)| *address);
    Ok(accounts)
}
