//! Command implementations for the `sbx` CLI.

pub mod config;

pub use config::{ConfigAction, PoolAction, Toggle, WhitelistAction, run_config};
