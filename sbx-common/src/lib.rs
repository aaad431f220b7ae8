//! Shared types and pure functions for the sandbox execution bridge.
//!
//! Everything in this crate is free of network I/O so the pieces of the
//! remote round trip can be tested on their own: classification and argument
//! decoding, the data bundle protocol, bootstrap script synthesis and replay
//! command construction.

pub mod bootstrap;
pub mod bundle;
pub mod classify;
pub mod config;
pub mod logging;
pub mod protocol;
pub mod replay;
pub mod types;
pub mod util;

pub use bootstrap::{DATA_ARCHIVE_NAME, REMOTE_DATA_DIR, build_bootstrap};
pub use bundle::{BundleError, DataBundle, build_bundle, merge_bundle};
pub use classify::{
    ToolArgs, command_key, decode_args, extract_command, extract_env, is_shell_tool,
    replace_command,
};
pub use config::{AdminView, BoundaryConfigStore, ConfigError, ConfigPatch, EnvError, EnvParser, Settings};
pub use logging::{LogConfig, LoggingGuards, init_logging};
pub use protocol::{HookInput, HookOutput, WireArchive, WireRequest, WireResponse};
pub use replay::build_replay;
pub use types::{
    BLACKLIST, BoundaryConfig, DEFAULT_WHITELIST, EXCLUDED_LOCAL_TOOLS, ExecutionRequest,
    ExecutionResult, PoolMetadata, is_blacklisted,
};
pub use util::{elapsed_ms, mask_sensitive_command};
