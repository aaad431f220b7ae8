//! Process settings read from `SBX_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use super::env::{EnvError, EnvParser};

/// File name of the boundary document inside the data root.
pub const CONFIG_FILE_NAME: &str = "sandbox.json";

pub const DEFAULT_DISPATCH_TIMEOUT_SECS: u64 = 60;
const MIN_DISPATCH_TIMEOUT_SECS: u64 = 1;
const MAX_DISPATCH_TIMEOUT_SECS: u64 = 600;

/// Runtime settings for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Local agent data root (`SBX_DATA_DIR`, default `~/.sbx`).
    pub data_dir: PathBuf,
    /// Boundary document (`SBX_CONFIG_PATH`, default `<data_dir>/sandbox.json`).
    pub config_path: PathBuf,
    /// Upper bound on a single dispatch (`SBX_DISPATCH_TIMEOUT_SECS`).
    pub dispatch_timeout: Duration,
    /// Bearer token for the pool (`SBX_POOL_TOKEN`).
    pub pool_token: Option<String>,
}

impl Settings {
    /// Settings rooted at `data_dir` with everything else defaulted.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            config_path: data_dir.join(CONFIG_FILE_NAME),
            data_dir,
            dispatch_timeout: Duration::from_secs(DEFAULT_DISPATCH_TIMEOUT_SECS),
            pool_token: None,
        }
    }

    /// Read settings from the environment.
    ///
    /// Invalid values are logged and replaced by defaults.
    pub fn from_env() -> Self {
        let (settings, errors) = Self::parse_env();
        for error in &errors {
            warn!("{}", error);
        }
        settings
    }

    /// Like [`Settings::from_env`] but hands back the collected errors.
    pub fn parse_env() -> (Self, Vec<EnvError>) {
        let mut parser = EnvParser::new();
        let data_dir = parser
            .get_optional_path("DATA_DIR")
            .unwrap_or_else(default_data_dir);
        let config_path = parser
            .get_optional_path("CONFIG_PATH")
            .unwrap_or_else(|| data_dir.join(CONFIG_FILE_NAME));
        let timeout_secs = parser.get_u64_range(
            "DISPATCH_TIMEOUT_SECS",
            DEFAULT_DISPATCH_TIMEOUT_SECS,
            MIN_DISPATCH_TIMEOUT_SECS,
            MAX_DISPATCH_TIMEOUT_SECS,
        );
        let pool_token = parser.get_optional_string("POOL_TOKEN");

        let settings = Self {
            data_dir,
            config_path,
            dispatch_timeout: Duration::from_secs(timeout_secs),
            pool_token,
        };
        (settings, parser.take_errors())
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".sbx"))
        .unwrap_or_else(|| PathBuf::from(".sbx"))
}
