//! Shell tool classification and tool argument decoding.
//!
//! Tool producers disagree about how a command is passed: some send a
//! structured object, some a JSON-encoded string, some the bare command text.
//! [`ToolArgs`] captures that shape once at the boundary; every function in
//! this module is total and never fails.

use serde_json::{Map, Value};

/// Substrings that mark a tool as shell-like (matched case-insensitively).
const SHELL_KEYWORDS: &[&str] = &["terminal", "shell", "bash", "command"];

/// Argument keys that may carry the command, in priority order.
const COMMAND_KEYS: &[&str] = &["command", "cmd", "input", "script"];

/// Returns true if the tool name looks like a shell execution tool.
pub fn is_shell_tool(name: &str) -> bool {
    let lower = name.to_lowercase();
    SHELL_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Raw tool arguments, tagged by how the producer encoded them.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ToolArgs {
    /// Already a key/value mapping.
    Object(Map<String, Value>),
    /// Text: either JSON-encoded object or the command itself.
    Text(String),
    /// Anything else (null, numbers, arrays, missing).
    #[default]
    Absent,
}

impl ToolArgs {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self::Object(map.clone()),
            Value::String(s) => Self::Text(s.clone()),
            _ => Self::Absent,
        }
    }
}

impl From<Value> for ToolArgs {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Object(map),
            Value::String(s) => Self::Text(s),
            _ => Self::Absent,
        }
    }
}

impl From<&str> for ToolArgs {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Decode arguments into a mapping.
///
/// Text that is not a JSON object (arrays, scalars, malformed input) and
/// absent arguments decode to an empty mapping.
pub fn decode_args(args: &ToolArgs) -> Map<String, Value> {
    match args {
        ToolArgs::Object(map) => map.clone(),
        ToolArgs::Text(text) => parse_object(text).unwrap_or_default(),
        ToolArgs::Absent => Map::new(),
    }
}

fn command_entry(map: &Map<String, Value>) -> Option<(&'static str, &Value)> {
    COMMAND_KEYS
        .iter()
        .filter_map(|key| map.get(*key).map(|value| (*key, value)))
        .find(|(_, value)| !value.is_null())
}

fn command_from_map(map: &Map<String, Value>) -> String {
    command_entry(map)
        .map(|(_, value)| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}

/// The argument key [`extract_command`] takes the command from, if any.
pub fn command_key(args: &ToolArgs) -> Option<&'static str> {
    command_entry(&decode_args(args)).map(|(key, _)| key)
}

/// Decoded arguments with the command swapped for `replacement`.
///
/// Only the key the command came from changes; every other field is kept.
/// Bare command text and arguments without a command key put the
/// replacement under `command`.
pub fn replace_command(args: &ToolArgs, replacement: &str) -> Map<String, Value> {
    let mut map = decode_args(args);
    let key = command_entry(&map).map_or(COMMAND_KEYS[0], |(key, _)| key);
    map.insert(key.to_string(), Value::String(replacement.to_string()));
    map
}

/// Extract the command string from tool arguments.
///
/// Keys are tried in the order `command`, `cmd`, `input`, `script`. Text that
/// does not decode to a JSON object is treated as the command itself.
pub fn extract_command(args: &ToolArgs) -> String {
    match args {
        ToolArgs::Object(map) => command_from_map(map),
        ToolArgs::Text(text) => match parse_object(text) {
            Some(map) => command_from_map(&map),
            None => text.clone(),
        },
        ToolArgs::Absent => String::new(),
    }
}

/// Environment variables requested by the tool call, in mapping order.
///
/// Only string values of an `env` object are used.
pub fn extract_env(args: &ToolArgs) -> Vec<(String, String)> {
    let map = decode_args(args);
    match map.get("env") {
        Some(Value::Object(env)) => env
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
            .collect(),
        _ => Vec::new(),
    }
}
