//! Execution bridge: intercepts shell-like tool calls and runs them in the
//! remote pool.
//!
//! The agent's dispatch loop calls [`ToolUseHooks::pre_tool_use`] before each
//! tool and [`ToolUseHooks::post_tool_use`] after it. A shell call under an
//! enabled boundary becomes one remote round trip:
//!
//! 1. Bundle the whitelisted data (blocking pool)
//! 2. Synthesize the bootstrap script
//! 3. Dispatch under a timeout, racing the turn's cancellation
//! 4. Merge the returned archive when `sync_data` is on (blocking pool)
//! 5. Hand back a replay command that reproduces the remote output

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use sbx_common::protocol::{WireArchive, WireRequest, WireResponse};
use sbx_common::{
    BoundaryConfig, BoundaryConfigStore, DataBundle, ExecutionRequest, ExecutionResult, Settings,
    ToolArgs, build_bootstrap, build_bundle, build_replay, elapsed_ms, extract_command,
    extract_env, is_shell_tool, mask_sensitive_command, merge_bundle,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::transport::{RemotePool, TransportError};

/// One tool invocation as seen by the dispatch loop.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: String,
    pub args: ToolArgs,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: impl Into<ToolArgs>) -> Self {
        Self {
            name: name.into(),
            args: args.into(),
        }
    }
}

/// Decision returned before a tool runs.
#[derive(Debug, Clone)]
pub enum PreToolUse {
    /// Run the tool locally and unchanged.
    PassThrough,
    /// The command already ran remotely; run `replay_command` instead.
    Intercepted {
        result: ExecutionResult,
        replay_command: String,
    },
}

impl PreToolUse {
    pub fn is_intercepted(&self) -> bool {
        matches!(self, Self::Intercepted { .. })
    }
}

/// Hooks the dispatch loop invokes around every tool call.
pub trait ToolUseHooks: Send + Sync {
    fn pre_tool_use(
        &self,
        call: &ToolCall,
        cancel: &TurnCancel,
    ) -> impl Future<Output = PreToolUse> + Send;

    fn post_tool_use(&self, call: &ToolCall, result: Option<&ExecutionResult>);

    /// Local tools that must not be offered to the session.
    fn excluded_tools(&self) -> &'static [&'static str];
}

/// Cancellation signal for one agent turn.
#[derive(Debug, Clone)]
pub struct TurnCancel {
    rx: watch::Receiver<bool>,
}

/// Owner side of a [`TurnCancel`].
#[derive(Debug)]
pub struct TurnCancelHandle {
    tx: watch::Sender<bool>,
}

/// Create a linked handle and signal.
pub fn turn_cancel() -> (TurnCancelHandle, TurnCancel) {
    let (tx, rx) = watch::channel(false);
    (TurnCancelHandle { tx }, TurnCancel { rx })
}

impl TurnCancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl TurnCancel {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the turn is cancelled. Pends forever if the handle is
    /// dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            let fired = *rx.borrow_and_update();
            if fired {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for TurnCancel {
    fn default() -> Self {
        Self::never()
    }
}

/// Why a dispatch produced no response.
#[derive(Debug)]
enum DispatchFailure {
    Transport(TransportError),
    TimedOut(Duration),
    Cancelled,
}

impl std::fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "{e}"),
            Self::TimedOut(limit) => {
                write!(f, "remote execution timed out after {}s", limit.as_secs())
            }
            Self::Cancelled => write!(f, "remote execution cancelled"),
        }
    }
}

/// Interceptor that runs shell tool calls in a [`RemotePool`].
///
/// Holds no mutable state; the boundary document is re-read from disk on
/// every call.
#[derive(Debug, Clone)]
pub struct ExecutionBridge<P> {
    pool: P,
    config_path: PathBuf,
    data_root: PathBuf,
    timeout: Duration,
}

impl<P: RemotePool> ExecutionBridge<P> {
    pub fn new(pool: P, settings: &Settings) -> Self {
        Self {
            pool,
            config_path: settings.config_path.clone(),
            data_root: settings.data_dir.clone(),
            timeout: settings.dispatch_timeout,
        }
    }

    /// Bridge over `data_root` using the default document location.
    pub fn with_data_root(pool: P, data_root: impl Into<PathBuf>) -> Self {
        Self::new(pool, &Settings::with_data_dir(data_root))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Fresh snapshot of the boundary document.
    pub fn load_config(&self) -> BoundaryConfig {
        BoundaryConfigStore::load(&self.config_path).snapshot()
    }

    /// Run `request` remotely if the boundary is enabled.
    ///
    /// Returns `None` when isolation is off; the caller decides how to run
    /// the command locally.
    pub async fn execute(
        &self,
        request: ExecutionRequest,
        cancel: &TurnCancel,
    ) -> Option<ExecutionResult> {
        let config = self.load_config();
        if !config.enabled {
            debug!("Boundary disabled, not dispatching");
            return None;
        }
        Some(self.round_trip(&config, request, cancel).await)
    }

    async fn round_trip(
        &self,
        config: &BoundaryConfig,
        mut request: ExecutionRequest,
        cancel: &TurnCancel,
    ) -> ExecutionResult {
        let start = Instant::now();
        let session_id = Uuid::new_v4().to_string();
        info!(
            session = %session_id,
            command = %mask_sensitive_command(&request.command),
            "Intercepting command for remote execution"
        );

        if config.remote_endpoint.is_empty() {
            warn!("Boundary enabled but no remote endpoint configured");
            return ExecutionResult::failed(
                "no remote execution endpoint configured",
                session_id,
                elapsed_ms(start),
            );
        }

        let bundle = match self.bundle_data(config.whitelist.clone()).await {
            Ok(bundle) => bundle,
            Err(error) => {
                warn!(session = %session_id, "{}", error);
                return ExecutionResult::failed(error, session_id, elapsed_ms(start));
            }
        };
        request.has_data = bundle.is_some();
        if let Some(bundle) = &bundle {
            debug!(session = %session_id, bytes = bundle.len(), "Bundled agent data");
        }

        let wire = WireRequest {
            session_id: session_id.clone(),
            script: build_bootstrap(&request.command, request.has_data, &request.env),
            archive: bundle.as_ref().map(WireArchive::from_bundle),
        };

        let response = match self.dispatch(&config.remote_endpoint, &wire, cancel).await {
            Ok(response) => response,
            Err(failure) => {
                warn!(session = %session_id, "Remote execution failed: {}", failure);
                return ExecutionResult::failed(failure.to_string(), session_id, elapsed_ms(start));
            }
        };

        let returned = match response.decode_archive() {
            Ok(returned) => returned,
            Err(e) => {
                warn!(session = %session_id, "Discarding undecodable returned archive: {}", e);
                None
            }
        };
        let synced_files = match (returned, config.sync_data) {
            (Some(bundle), true) => self.merge_data(bundle, config.whitelist.clone()).await,
            (Some(_), false) => {
                debug!(session = %session_id, "Data sync off, discarding returned archive");
                0
            }
            (None, _) => 0,
        };

        let mut result = ExecutionResult::completed(
            response.exit_status,
            response.stdout,
            response.stderr,
            session_id,
            elapsed_ms(start),
        );
        result.synced_files = synced_files;
        info!(
            session = %result.session_id,
            exit_status = response.exit_status,
            duration_ms = result.duration_ms,
            synced_files,
            "Remote execution finished"
        );
        result
    }

    async fn dispatch(
        &self,
        endpoint: &str,
        request: &WireRequest,
        cancel: &TurnCancel,
    ) -> Result<WireResponse, DispatchFailure> {
        if cancel.is_cancelled() {
            return Err(DispatchFailure::Cancelled);
        }
        tokio::select! {
            outcome = tokio::time::timeout(self.timeout, self.pool.execute(endpoint, request)) => {
                match outcome {
                    Ok(Ok(response)) => Ok(response),
                    Ok(Err(e)) => Err(DispatchFailure::Transport(e)),
                    Err(_) => Err(DispatchFailure::TimedOut(self.timeout)),
                }
            }
            _ = cancel.cancelled() => Err(DispatchFailure::Cancelled),
        }
    }

    async fn bundle_data(&self, whitelist: Vec<String>) -> Result<Option<DataBundle>, String> {
        let root = self.data_root.clone();
        match tokio::task::spawn_blocking(move || build_bundle(&root, &whitelist)).await {
            Ok(Ok(bundle)) => Ok(bundle),
            Ok(Err(e)) => Err(format!("failed to bundle agent data: {e}")),
            Err(e) => Err(format!("bundling task failed: {e}")),
        }
    }

    /// Merge errors are logged and count as zero synced files.
    async fn merge_data(&self, bundle: DataBundle, whitelist: Vec<String>) -> usize {
        let root = self.data_root.clone();
        let merged = tokio::task::spawn_blocking(move || {
            merge_bundle(bundle.as_bytes(), &root, &whitelist)
        })
        .await;
        match merged {
            Ok(Ok(count)) => count,
            Ok(Err(e)) => {
                warn!("Failed to merge returned data: {}", e);
                0
            }
            Err(e) => {
                warn!("Merge task failed: {}", e);
                0
            }
        }
    }
}

impl<P: RemotePool> ToolUseHooks for ExecutionBridge<P> {
    async fn pre_tool_use(&self, call: &ToolCall, cancel: &TurnCancel) -> PreToolUse {
        if !is_shell_tool(&call.name) {
            return PreToolUse::PassThrough;
        }
        let config = self.load_config();
        if !config.enabled {
            return PreToolUse::PassThrough;
        }
        let command = extract_command(&call.args);
        if command.trim().is_empty() {
            debug!(tool = %call.name, "Shell tool call without a command");
            return PreToolUse::PassThrough;
        }

        let request = ExecutionRequest::new(command).with_env(extract_env(&call.args));
        let result = self.round_trip(&config, request, cancel).await;
        let replay_command = build_replay(&result.stdout, &result.stderr, result.success);
        PreToolUse::Intercepted {
            result,
            replay_command,
        }
    }

    fn post_tool_use(&self, call: &ToolCall, result: Option<&ExecutionResult>) {
        match result {
            Some(result) => info!(
                tool = %call.name,
                session = %result.session_id,
                success = result.success,
                duration_ms = result.duration_ms,
                error = result.error.as_deref().unwrap_or(""),
                "Tool call completed remotely"
            ),
            None => debug!(tool = %call.name, "Tool call completed locally"),
        }
    }

    fn excluded_tools(&self) -> &'static [&'static str] {
        self.load_config().excluded_tools()
    }
}
