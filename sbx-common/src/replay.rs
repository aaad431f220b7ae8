//! Replay commands for remote results.
//!
//! The agent's tool pipeline expects every shell call to run a local
//! process. After a command ran remotely, the hook swaps the original command
//! for one that prints the captured streams and exits with the same outcome.

use std::borrow::Cow;

/// Command that does nothing and succeeds.
pub const NOOP_COMMAND: &str = "true";

const FAILURE_DIRECTIVE: &str = "exit 1";

fn quote(text: &str) -> Cow<'_, str> {
    shell_escape::unix::escape(Cow::Borrowed(text))
}

/// Build a command that reproduces `stdout`, `stderr` and the exit outcome.
///
/// Never returns an empty string: with nothing to print and success the
/// result is `true`.
pub fn build_replay(stdout: &str, stderr: &str, success: bool) -> String {
    let mut parts = Vec::with_capacity(3);
    if !stdout.is_empty() {
        parts.push(format!("printf '%s' {}", quote(stdout)));
    }
    if !stderr.is_empty() {
        parts.push(format!("printf '%s' {} >&2", quote(stderr)));
    }
    if !success {
        parts.push(FAILURE_DIRECTIVE.to_string());
    }

    if parts.is_empty() {
        NOOP_COMMAND.to_string()
    } else {
        parts.join("; ")
    }
}
