//! Scope oracle program accounts.

pub mod configuration;
pub mod entry;
pub mod mappings;
pub mod oracle_type;
