//! `sbx config`: inspect and edit the isolation boundary document.

use std::io::Write;

use anyhow::Context;
use clap::{Subcommand, ValueEnum};
use sbx_common::{BoundaryConfigStore, PoolMetadata, Settings};

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Print the configuration, fixed lists and warnings as JSON
    Show,

    /// Route shell tool calls through the execution pool
    Enable,

    /// Run shell tool calls locally
    Disable,

    /// Merge files returned by the pool back into the data root
    Sync {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Set the execution pool endpoint
    Endpoint { url: String },

    /// Edit the list of paths allowed to cross the boundary
    Whitelist {
        #[command(subcommand)]
        action: WhitelistAction,
    },

    /// Record or forget a provisioned execution pool
    Pool {
        #[command(subcommand)]
        action: PoolAction,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Debug, Clone, Subcommand)]
pub enum WhitelistAction {
    /// Replace the whitelist (blacklisted items are dropped)
    Set { items: Vec<String> },

    /// Add one top-level path
    Add { item: String },

    /// Remove one path
    Remove { item: String },

    /// Restore the built-in default whitelist
    Reset,
}

#[derive(Debug, Clone, Subcommand)]
pub enum PoolAction {
    /// Record pool metadata and its endpoint
    Set {
        #[arg(long)]
        resource_group: String,
        #[arg(long)]
        location: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        id: String,
        #[arg(long)]
        endpoint: String,
    },

    /// Clear pool metadata and the endpoint
    Clear,
}

/// Apply `action` to the document named by `settings`, reporting to `out`.
pub fn run_config(action: ConfigAction, settings: &Settings, out: &mut impl Write) -> anyhow::Result<()> {
    let mut store = BoundaryConfigStore::load(&settings.config_path);

    match action {
        ConfigAction::Show => {
            let view = store.admin_view(&settings.data_dir);
            writeln!(out, "{}", serde_json::to_string_pretty(&view)?)?;
        }
        ConfigAction::Enable => {
            store.set_enabled(true)?;
            writeln!(out, "Isolation enabled")?;
            if store.config().remote_endpoint.is_empty() {
                writeln!(out, "Warning: no execution pool endpoint is configured")?;
            }
        }
        ConfigAction::Disable => {
            store.set_enabled(false)?;
            writeln!(out, "Isolation disabled")?;
        }
        ConfigAction::Sync { state } => {
            let on = state == Toggle::On;
            store.set_sync_data(on)?;
            writeln!(out, "Data sync {}", if on { "on" } else { "off" })?;
        }
        ConfigAction::Endpoint { url } => {
            store.set_remote_endpoint(&url)?;
            writeln!(out, "Endpoint set to {}", store.config().remote_endpoint)?;
        }
        ConfigAction::Whitelist { action } => run_whitelist(action, &mut store, out)?,
        ConfigAction::Pool { action } => match action {
            PoolAction::Set {
                resource_group,
                location,
                name,
                id,
                endpoint,
            } => {
                let pool = PoolMetadata {
                    resource_group,
                    location,
                    pool_name: name,
                    pool_id: id,
                };
                store.set_pool_metadata(pool, &endpoint)?;
                writeln!(out, "Pool {} recorded", store.config().pool.pool_name)?;
            }
            PoolAction::Clear => {
                store.clear_pool_metadata()?;
                writeln!(out, "Pool cleared")?;
            }
        },
    }
    Ok(())
}

fn run_whitelist(
    action: WhitelistAction,
    store: &mut BoundaryConfigStore,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match action {
        WhitelistAction::Set { items } => {
            let requested = items.len();
            store.set_whitelist(items)?;
            let kept = store.config().whitelist.len();
            writeln!(out, "Whitelist set ({kept} items)")?;
            if kept < requested {
                writeln!(out, "Dropped {} blacklisted or invalid item(s)", requested - kept)?;
            }
        }
        WhitelistAction::Add { item } => {
            let added = store
                .add_whitelist_item(&item)
                .with_context(|| format!("cannot whitelist {item}"))?;
            if added {
                writeln!(out, "Added {item}")?;
            } else {
                writeln!(out, "{item} is already whitelisted")?;
            }
        }
        WhitelistAction::Remove { item } => {
            if store.remove_whitelist_item(&item)? {
                writeln!(out, "Removed {item}")?;
            } else {
                writeln!(out, "{item} was not whitelisted")?;
            }
        }
        WhitelistAction::Reset => {
            store.reset_whitelist()?;
            writeln!(out, "Whitelist reset to defaults")?;
        }
    }
    Ok(())
}
