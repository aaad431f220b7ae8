//! Persisted isolation boundary configuration.
//!
//! The document lives at `<data root>/sandbox.json`. Every setter saves
//! immediately with an atomic temp-file rename, so concurrent readers see
//! either the previous or the new document.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bundle::is_top_level_name;
use crate::types::{
    BLACKLIST, BoundaryConfig, DEFAULT_WHITELIST, PoolMetadata, default_whitelist, is_blacklisted,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{0:?} is blacklisted and cannot be whitelisted")]
    Blacklisted(String),

    #[error("{0:?} is not a single top-level name under the data root")]
    InvalidItem(String),
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPatch {
    pub enabled: Option<bool>,
    pub sync_data: Option<bool>,
    pub remote_endpoint: Option<String>,
    pub whitelist: Option<Vec<String>>,
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.sync_data.is_none()
            && self.remote_endpoint.is_none()
            && self.whitelist.is_none()
    }
}

/// Read-only view rendered by `sbx config show`.
#[derive(Debug, Clone, Serialize)]
pub struct AdminView {
    #[serde(flatten)]
    pub config: BoundaryConfig,
    pub blacklist: Vec<&'static str>,
    pub default_whitelist: Vec<&'static str>,
    pub is_provisioned: bool,
    pub excluded_tools: Vec<&'static str>,
    pub warnings: Vec<String>,
}

/// File-backed owner of the [`BoundaryConfig`] document.
#[derive(Debug, Clone)]
pub struct BoundaryConfigStore {
    path: PathBuf,
    config: BoundaryConfig,
}

impl BoundaryConfigStore {
    /// Load the document at `path`.
    ///
    /// Never fails: a missing file yields defaults silently, an unreadable
    /// or malformed one yields defaults with a warning.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = read_config(&path);
        Self { path, config }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &BoundaryConfig {
        &self.config
    }

    /// Owned copy of the current document.
    pub fn snapshot(&self) -> BoundaryConfig {
        self.config.clone()
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Result<(), ConfigError> {
        self.config.enabled = enabled;
        self.save()
    }

    pub fn set_sync_data(&mut self, sync_data: bool) -> Result<(), ConfigError> {
        self.config.sync_data = sync_data;
        self.save()
    }

    pub fn set_remote_endpoint(&mut self, endpoint: &str) -> Result<(), ConfigError> {
        self.config.remote_endpoint = normalize_endpoint(endpoint);
        self.save()
    }

    /// Replace the whitelist. Blacklisted, nested and duplicate items are
    /// dropped.
    pub fn set_whitelist<I, S>(&mut self, items: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.whitelist = sanitize_whitelist(items);
        self.save()
    }

    /// Append `item` unless it is already present.
    ///
    /// Returns `Ok(false)` when the item was already whitelisted.
    pub fn add_whitelist_item(&mut self, item: &str) -> Result<bool, ConfigError> {
        let item = canonical_item(item)?;
        if self.config.is_whitelisted(&item) {
            return Ok(false);
        }
        self.config.whitelist.push(item);
        self.save()?;
        Ok(true)
    }

    /// Returns `Ok(false)` when `item` was not whitelisted.
    pub fn remove_whitelist_item(&mut self, item: &str) -> Result<bool, ConfigError> {
        let item = trim_item(item);
        let before = self.config.whitelist.len();
        self.config.whitelist.retain(|w| w != item);
        if self.config.whitelist.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    pub fn reset_whitelist(&mut self) -> Result<(), ConfigError> {
        self.config.whitelist = default_whitelist();
        self.save()
    }

    /// Record a provisioned pool together with its endpoint.
    pub fn set_pool_metadata(
        &mut self,
        pool: PoolMetadata,
        endpoint: &str,
    ) -> Result<(), ConfigError> {
        info!(pool = %pool.pool_name, "Recording execution pool");
        self.config.pool = pool;
        self.config.remote_endpoint = normalize_endpoint(endpoint);
        self.save()
    }

    /// Forget the pool, including its endpoint.
    pub fn clear_pool_metadata(&mut self) -> Result<(), ConfigError> {
        self.config.pool = PoolMetadata::default();
        self.config.remote_endpoint.clear();
        self.save()
    }

    /// Apply every present field of `patch` through the setters' rules,
    /// then save once.
    pub fn apply(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(enabled) = patch.enabled {
            self.config.enabled = enabled;
        }
        if let Some(sync_data) = patch.sync_data {
            self.config.sync_data = sync_data;
        }
        if let Some(endpoint) = patch.remote_endpoint {
            self.config.remote_endpoint = normalize_endpoint(&endpoint);
        }
        if let Some(whitelist) = patch.whitelist {
            self.config.whitelist = sanitize_whitelist(whitelist);
        }
        self.save()
    }

    /// One warning per whitelisted path missing under `data_root`.
    pub fn warnings(&self, data_root: &Path) -> Vec<String> {
        self.config
            .whitelist
            .iter()
            .filter(|item| !data_root.join(item.as_str()).exists())
            .map(|item| format!("whitelisted path does not exist: {item}"))
            .collect()
    }

    pub fn admin_view(&self, data_root: &Path) -> AdminView {
        AdminView {
            config: self.snapshot(),
            blacklist: BLACKLIST.to_vec(),
            default_whitelist: DEFAULT_WHITELIST.to_vec(),
            is_provisioned: self.config.is_provisioned(),
            excluded_tools: self.config.excluded_tools().to_vec(),
            warnings: self.warnings(data_root),
        }
    }

    fn save(&self) -> Result<(), ConfigError> {
        let mut content = serde_json::to_string_pretty(&self.config)?;
        content.push('\n');
        atomic_write(&self.path, content.as_bytes()).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "Saved boundary configuration");
        Ok(())
    }
}

fn read_config(path: &Path) -> BoundaryConfig {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BoundaryConfig::default(),
        Err(e) => {
            warn!("Failed to read boundary config from {}: {}", path.display(), e);
            return BoundaryConfig::default();
        }
    };
    match serde_json::from_str::<BoundaryConfig>(&content) {
        Ok(mut config) => {
            config.whitelist = sanitize_whitelist(config.whitelist);
            config
        }
        Err(e) => {
            warn!("Failed to parse boundary config from {}: {}", path.display(), e);
            BoundaryConfig::default()
        }
    }
}

fn normalize_endpoint(endpoint: &str) -> String {
    endpoint.trim().trim_end_matches('/').to_string()
}

fn trim_item(item: &str) -> &str {
    item.trim().trim_end_matches(['/', '\\'])
}

/// Canonical form of a whitelist item: one top-level name, outside the
/// blacklist. Trailing separators are dropped.
fn canonical_item(item: &str) -> Result<String, ConfigError> {
    let trimmed = trim_item(item);
    if is_blacklisted(trimmed) {
        return Err(ConfigError::Blacklisted(item.to_string()));
    }
    if !is_top_level_name(trimmed) {
        return Err(ConfigError::InvalidItem(item.to_string()));
    }
    Ok(trimmed.to_string())
}

fn sanitize_whitelist<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut kept: Vec<String> = Vec::new();
    for item in items {
        let item: String = item.into();
        match canonical_item(&item) {
            Ok(item) if !kept.contains(&item) => kept.push(item),
            Ok(_) => {}
            Err(e) => warn!("Dropping whitelist item: {}", e),
        }
    }
    kept
}

/// Write via a sibling temp file and rename.
fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;
    let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));

    let result = (|| {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}
