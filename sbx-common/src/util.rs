//! Shared utilities for the sandbox bridge.

use std::time::Instant;

/// Key/flag prefixes whose values are masked before a command is logged.
const SENSITIVE_PREFIXES: &[&str] = &[
    "GITHUB_TOKEN=",
    "GH_TOKEN=",
    "COPILOT_TOKEN=",
    "AZURE_CLIENT_SECRET=",
    "AZURE_STORAGE_KEY=",
    "SBX_POOL_TOKEN=",
    "DATABASE_URL=",
    "API_KEY=",
    "SECRET_KEY=",
    "SECRET=",
    "PASSWORD=",
    "TOKEN=",
    "ACCESS_TOKEN=",
    "PRIVATE_KEY=",
    "AWS_SECRET_ACCESS_KEY=",
    "OPENAI_API_KEY=",
    "ANTHROPIC_API_KEY=",
    "--token ",
    "--token=",
    "--password ",
    "--password=",
    "--api-key ",
    "--api-key=",
    "--secret ",
    "--secret=",
];

/// Byte length of the shell word at the start of `s`, honoring quotes and
/// backslash escapes.
fn find_value_end(s: &str) -> usize {
    let mut end = 0;
    let mut in_quote = None;
    let mut escaped = false;

    for c in s.chars() {
        let char_len = c.len_utf8();
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if let Some(q) = in_quote {
            if c == q {
                in_quote = None;
            }
        } else if c == '"' || c == '\'' {
            in_quote = Some(c);
        } else if c.is_whitespace() {
            break;
        }
        end += char_len;
    }
    end
}

/// Mask secrets in a command string before logging.
///
/// The key or flag is kept and its value replaced with `***`.
pub fn mask_sensitive_command(cmd: &str) -> String {
    let mut result = cmd.to_string();
    for prefix in SENSITIVE_PREFIXES {
        let replacement = format!("{prefix}***");
        let mut search_start = 0;
        while search_start < result.len() {
            let Some(offset) = result[search_start..].find(prefix) else {
                break;
            };
            let abs_start = search_start + offset;
            let value_start = abs_start + prefix.len();
            let value_end = value_start + find_value_end(&result[value_start..]);

            result = format!("{}{}{}", &result[..abs_start], replacement, &result[value_end..]);
            // replacement contains the prefix; skip past it
            search_start = abs_start + replacement.len();
        }
    }
    result
}

/// Wall-clock milliseconds since `start`.
pub fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Truncate `text` to at most `max` bytes on a char boundary, for log lines
/// and error messages.
pub fn truncate_for_log(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
