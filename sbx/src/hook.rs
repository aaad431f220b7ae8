//! PreToolUse hook and direct execution entry points.
//!
//! `sbx hook` reads one tool invocation from stdin and answers on stdout:
//! nothing to let the tool run unchanged, or an "allow with modified
//! command" document carrying the replay of a remote run. Any problem with
//! the input fails open.

use std::io::{self, Write};

use sbx_common::{ExecutionRequest, HookInput, HookOutput, replace_command};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::bridge::{ExecutionBridge, PreToolUse, ToolCall, ToolUseHooks, TurnCancel, turn_cancel};
use crate::transport::RemotePool;

/// Upper bound on hook input read from stdin.
const MAX_HOOK_INPUT: u64 = 10 * 1024 * 1024;

const PRE_TOOL_USE_EVENT: &str = "PreToolUse";

/// Run the hook, reading from stdin and writing to stdout.
pub async fn run_hook<P: RemotePool>(bridge: &ExecutionBridge<P>) -> anyhow::Result<()> {
    let mut input = String::new();
    tokio::io::stdin()
        .take(MAX_HOOK_INPUT)
        .read_to_string(&mut input)
        .await?;

    let input = input.trim();
    if input.is_empty() {
        return Ok(());
    }

    let hook_input: HookInput = match serde_json::from_str(input) {
        Ok(hi) => hi,
        Err(e) => {
            warn!("Failed to parse hook input: {}", e);
            return Ok(());
        }
    };

    let output = process_hook(bridge, hook_input, &TurnCancel::never()).await;

    // Empty stdout means allow unchanged
    if output.is_unchanged() {
        return Ok(());
    }
    let json = serde_json::to_string(&output)?;
    let mut stdout = io::stdout();
    writeln!(stdout, "{}", json)?;
    stdout.flush()?;
    Ok(())
}

/// Decide what the agent should run for one hook invocation.
pub async fn process_hook<P: RemotePool>(
    bridge: &ExecutionBridge<P>,
    input: HookInput,
    cancel: &TurnCancel,
) -> HookOutput {
    if let Some(event) = input.hook_event_name.as_deref()
        && event != PRE_TOOL_USE_EVENT
    {
        debug!(event, "Ignoring non-PreToolUse hook event");
        return HookOutput::allow();
    }

    let call = ToolCall::new(input.tool_name.clone(), input.args());
    match bridge.pre_tool_use(&call, cancel).await {
        PreToolUse::PassThrough => HookOutput::allow(),
        PreToolUse::Intercepted {
            result,
            replay_command,
        } => {
            bridge.post_tool_use(&call, Some(&result));
            HookOutput::allow_with_updated_input(replace_command(&call.args, &replay_command))
        }
    }
}

/// Execute a command through the bridge, bypassing tool classification.
///
/// Remote output is copied to the local streams. Returns the exit code the
/// process should end with. With the boundary disabled the command runs
/// locally through `sh -c`.
pub async fn run_exec<P: RemotePool>(
    bridge: &ExecutionBridge<P>,
    command_parts: Vec<String>,
) -> anyhow::Result<i32> {
    let command = command_parts.join(" ");
    if command.trim().is_empty() {
        anyhow::bail!("No command provided to exec");
    }

    let (handle, cancel) = turn_cancel();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling remote execution");
            handle.cancel();
        }
    });

    let outcome = bridge.execute(ExecutionRequest::new(command.as_str()), &cancel).await;
    interrupt.abort();

    let Some(result) = outcome else {
        debug!("Boundary disabled, running locally");
        let status = Command::new("sh").arg("-c").arg(&command).status().await?;
        return Ok(status.code().unwrap_or(1));
    };

    let mut stdout = tokio::io::stdout();
    stdout.write_all(result.stdout.as_bytes()).await?;
    stdout.flush().await?;
    let mut stderr = tokio::io::stderr();
    stderr.write_all(result.stderr.as_bytes()).await?;
    if result.exit_status.is_none()
        && let Some(error) = &result.error
    {
        stderr.write_all(format!("sbx: {error}\n").as_bytes()).await?;
    }
    stderr.flush().await?;

    Ok(match result.exit_status {
        Some(code) => code,
        None if result.success => 0,
        None => 1,
    })
}
