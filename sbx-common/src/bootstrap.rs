//! Bootstrap script synthesis for the remote environment.

use std::borrow::Cow;

use tracing::debug;

/// Name under which the data bundle is staged in the remote environment.
pub const DATA_ARCHIVE_NAME: &str = "agent_data.zip";

/// Remote directory the data bundle is staged in and unpacked into.
pub const REMOTE_DATA_DIR: &str = "/mnt/data";

fn is_shell_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Build the script that sets up the remote environment and runs `command`.
///
/// The script stops on the first failing step. The command always runs in
/// [`REMOTE_DATA_DIR`]; when `has_data` is set, the staged archive is
/// unpacked there before anything else runs. Environment values
/// are single-quoted; names that are not valid shell identifiers are dropped.
/// The command is appended verbatim and is the caller's to quote.
pub fn build_bootstrap(command: &str, has_data: bool, env: &[(String, String)]) -> String {
    let mut lines: Vec<String> = vec!["#!/bin/bash".to_string(), "set -e".to_string()];

    lines.push(format!("mkdir -p {REMOTE_DATA_DIR}"));
    lines.push(format!("cd {REMOTE_DATA_DIR}"));
    if has_data {
        lines.push(format!("unzip -o -q {DATA_ARCHIVE_NAME}"));
        lines.push(format!("rm -f {DATA_ARCHIVE_NAME}"));
    }

    for (name, value) in env {
        if !is_shell_identifier(name) {
            debug!("Dropping env var with invalid name {:?}", name);
            continue;
        }
        let quoted = shell_escape::unix::escape(Cow::Borrowed(value.as_str()));
        lines.push(format!("export {name}={quoted}"));
    }

    lines.push(command.to_string());
    let mut script = lines.join("\n");
    script.push('\n');
    script
}
