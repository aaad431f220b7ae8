//! Protocol definitions.
//!
//! Two JSON contracts live here: the agent tool-use hook (input on stdin,
//! decision on stdout) and the request/response exchanged with the remote
//! execution pool.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::bootstrap::DATA_ARCHIVE_NAME;
use crate::bundle::DataBundle;
use crate::classify::ToolArgs;

/// Input received from the agent's tool-use hook.
#[derive(Debug, Clone, Deserialize)]
pub struct HookInput {
    /// The tool being invoked (e.g., "run_in_terminal", "read_file").
    pub tool_name: String,
    /// Tool-specific arguments in whatever shape the producer used.
    #[serde(default)]
    pub tool_input: Value,
    /// Optional session ID.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Hook event name ("PreToolUse" when present).
    #[serde(default)]
    pub hook_event_name: Option<String>,
}

impl HookInput {
    pub fn args(&self) -> ToolArgs {
        ToolArgs::from_value(&self.tool_input)
    }
}

/// Output sent back to the agent from the pre-tool-use hook.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum HookOutput {
    /// Allow the command to proceed (empty object or no output).
    Allow(AllowOutput),
    /// Allow with the command replaced by a replay of the remote result.
    AllowWithModifiedCommand(AllowWithModifiedCommandOutput),
}

/// Empty output to allow command execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AllowOutput {}

/// Output to allow with a modified command.
#[derive(Debug, Clone, Serialize)]
pub struct AllowWithModifiedCommandOutput {
    #[serde(rename = "hookSpecificOutput")]
    pub hook_specific_output: AllowWithModifiedHookSpecificOutput,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllowWithModifiedHookSpecificOutput {
    #[serde(rename = "hookEventName")]
    pub hook_event_name: String,
    #[serde(rename = "permissionDecision")]
    pub permission_decision: String,
    /// Full tool input to substitute, not just the command.
    #[serde(rename = "updatedInput")]
    pub updated_input: Map<String, Value>,
}

impl HookOutput {
    /// Create an allow output (command proceeds normally).
    pub fn allow() -> Self {
        Self::Allow(AllowOutput {})
    }

    /// Allow the tool call but run it with `updated_input`.
    ///
    /// Used after a remote run: the input carries a replay of the captured
    /// output so the command is not executed twice.
    pub fn allow_with_updated_input(updated_input: Map<String, Value>) -> Self {
        Self::AllowWithModifiedCommand(AllowWithModifiedCommandOutput {
            hook_specific_output: AllowWithModifiedHookSpecificOutput {
                hook_event_name: "PreToolUse".to_string(),
                permission_decision: "allow".to_string(),
                updated_input,
            },
        })
    }

    /// True when the tool call runs exactly as the agent issued it.
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Allow(_))
    }
}

/// A named archive attached to a pool request, base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireArchive {
    pub name: String,
    pub content: String,
}

impl WireArchive {
    pub fn from_bundle(bundle: &DataBundle) -> Self {
        Self {
            name: DATA_ARCHIVE_NAME.to_string(),
            content: STANDARD.encode(bundle.as_bytes()),
        }
    }
}

/// Request body sent to the execution pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRequest {
    pub session_id: String,
    pub script: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<WireArchive>,
}

/// Response body returned by the execution pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireResponse {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    pub exit_status: i32,
    /// Remote-side duration, informational only.
    #[serde(default)]
    pub duration_ms: Option<u64>,
    /// Base64 zip archive of the whitelisted data after the run.
    #[serde(default)]
    pub archive: Option<String>,
}

impl WireResponse {
    /// Decode the returned archive, if any.
    pub fn decode_archive(&self) -> Result<Option<DataBundle>, base64::DecodeError> {
        match self.archive.as_deref() {
            None | Some("") => Ok(None),
            Some(encoded) => STANDARD
                .decode(encoded)
                .map(|bytes| Some(DataBundle::from_bytes(bytes))),
        }
    }
}
