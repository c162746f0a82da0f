pub mod config;
pub mod ledger;
pub mod subscribe;

pub use config::Config;
