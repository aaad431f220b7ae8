//! Common types used across sandbox bridge components.

use serde::{Deserialize, Serialize};

/// Paths eligible to cross the isolation boundary on a fresh install.
pub const DEFAULT_WHITELIST: &[&str] = &[
    "media",
    "memory",
    "notes",
    "sessions",
    "skills",
    ".copilot",
    ".env",
    ".workiq.json",
    "agent_profile.json",
    "conversation_refs.json",
    "infra.json",
    "interaction_log.json",
    "mcp_servers.json",
    "plugins.json",
    "scheduler.json",
    "skill_usage.json",
    "SOUL.md",
];

/// Paths that can never be whitelisted (credential and tool caches).
///
/// Not persisted: this is a build-time constant.
pub const BLACKLIST: &[&str] = &[
    ".azure",
    ".cache",
    ".config",
    ".IdentityService",
    ".net",
    ".npm",
    ".pki",
];

/// Local file tools that must not be offered to the agent while isolation
/// is enabled, since they would read or write the data root directly.
pub const EXCLUDED_LOCAL_TOOLS: &[&str] = &["create", "view", "edit", "grep", "glob"];

/// First meaningful segment of a relative path (`./` and empty segments
/// skipped, either separator).
pub fn top_level_segment(item: &str) -> Option<&str> {
    item.split(['/', '\\'])
        .find(|segment| !segment.is_empty() && *segment != ".")
}

/// Returns true if `item`, or the top-level directory it lives under, is in
/// the fixed blacklist.
pub fn is_blacklisted(item: &str) -> bool {
    top_level_segment(item).is_some_and(|segment| BLACKLIST.contains(&segment))
}

/// Provisioning identity of the remote execution pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMetadata {
    #[serde(default)]
    pub resource_group: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub pool_name: String,
    #[serde(default)]
    pub pool_id: String,
}

/// Persisted isolation boundary configuration.
///
/// Only [`crate::config::BoundaryConfigStore`] mutates this record, so the
/// blacklist invariant is checked on every write path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryConfig {
    /// Whether shell tool calls are intercepted at all.
    #[serde(default)]
    pub enabled: bool,
    /// Whether files returned by the pool are merged back into the data root.
    #[serde(default = "default_true")]
    pub sync_data: bool,
    /// Base URL of the execution pool. Empty means not provisioned.
    #[serde(default, alias = "session_pool_endpoint")]
    pub remote_endpoint: String,
    /// Top-level names under the data root that may cross the boundary.
    #[serde(default = "default_whitelist")]
    pub whitelist: Vec<String>,
    #[serde(flatten)]
    pub pool: PoolMetadata,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sync_data: true,
            remote_endpoint: String::new(),
            whitelist: default_whitelist(),
            pool: PoolMetadata::default(),
        }
    }
}

impl BoundaryConfig {
    /// A pool is usable once it has both a name and an endpoint.
    pub fn is_provisioned(&self) -> bool {
        !self.pool.pool_name.is_empty() && !self.remote_endpoint.is_empty()
    }

    /// Tools to withhold from the agent session under the current settings.
    pub fn excluded_tools(&self) -> &'static [&'static str] {
        if self.enabled { EXCLUDED_LOCAL_TOOLS } else { &[] }
    }

    /// Returns true if `segment` is a whitelisted top-level name.
    pub fn is_whitelisted(&self, segment: &str) -> bool {
        self.whitelist.iter().any(|w| w == segment)
    }
}

fn default_true() -> bool {
    true
}

pub fn default_whitelist() -> Vec<String> {
    DEFAULT_WHITELIST.iter().map(|s| s.to_string()).collect()
}

/// A single command headed for the execution pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub command: String,
    /// Exported in the bootstrap script in this order.
    pub env: Vec<(String, String)>,
    /// Whether a data bundle accompanies the request.
    pub has_data: bool,
}

impl ExecutionRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }
}

/// Outcome of one intercepted call, successful or not.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub session_id: String,
    /// Present only when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Remote exit status; absent when the command never ran remotely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<i32>,
    /// Number of archive entries merged back into the data root.
    pub synced_files: usize,
}

impl ExecutionResult {
    /// A call that failed before or during dispatch.
    pub fn failed(error: impl Into<String>, session_id: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            session_id: session_id.into(),
            duration_ms,
            ..Self::default()
        }
    }

    /// A call that reached the pool and ran to completion.
    pub fn completed(
        exit_status: i32,
        stdout: String,
        stderr: String,
        session_id: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        let success = exit_status == 0;
        Self {
            success,
            stdout,
            stderr,
            duration_ms,
            session_id: session_id.into(),
            error: (!success).then(|| format!("command exited with status {exit_status}")),
            exit_status: Some(exit_status),
            synced_files: 0,
        }
    }
}
