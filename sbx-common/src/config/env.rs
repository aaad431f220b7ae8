//! Environment variable parsing with type safety.
//!
//! Errors are collected rather than returned so every bad variable can be
//! reported at once; each getter falls back to its default.

use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during environment variable parsing.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("Invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    #[error("Value out of range for {var}: {value} (valid: {min}..={max})")]
    OutOfRange {
        var: String,
        value: String,
        min: String,
        max: String,
    },
}

/// Type-safe environment variable parser for `SBX_` variables.
pub struct EnvParser {
    prefix: &'static str,
    errors: Vec<EnvError>,
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvParser {
    pub fn new() -> Self {
        Self {
            prefix: "SBX_",
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[EnvError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Get a string value with default.
    pub fn get_string(&mut self, name: &str, default: &str) -> String {
        env::var(self.var_name(name)).unwrap_or_else(|_| default.to_string())
    }

    /// Get a non-empty string value, if set.
    pub fn get_optional_string(&mut self, name: &str) -> Option<String> {
        env::var(self.var_name(name)).ok().filter(|v| !v.is_empty())
    }

    /// Get a boolean value with default.
    ///
    /// Accepts: 1, true, yes, on (for true)
    ///          0, false, no, off, "" (for false)
    pub fn get_bool(&mut self, name: &str, default: bool) -> bool {
        let var_name = self.var_name(name);
        let Ok(value) = env::var(&var_name) else {
            return default;
        };
        match value.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" | "" => false,
            _ => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: "boolean (true/false/1/0/yes/no)".to_string(),
                    value,
                });
                default
            }
        }
    }

    /// Get a u64 value with default and range validation.
    pub fn get_u64_range(&mut self, name: &str, default: u64, min: u64, max: u64) -> u64 {
        let var_name = self.var_name(name);
        let Ok(value) = env::var(&var_name) else {
            return default;
        };
        match value.parse::<u64>() {
            Ok(n) if (min..=max).contains(&n) => n,
            Ok(n) => {
                self.errors.push(EnvError::OutOfRange {
                    var: var_name,
                    value: n.to_string(),
                    min: min.to_string(),
                    max: max.to_string(),
                });
                default
            }
            Err(_) => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: "unsigned 64-bit integer".to_string(),
                    value,
                });
                default
            }
        }
    }

    /// Get a path value with ~ expansion, if set.
    pub fn get_optional_path(&mut self, name: &str) -> Option<PathBuf> {
        self.get_optional_string(name).map(|v| expand_home(&v))
    }
}

fn expand_home(value: &str) -> PathBuf {
    match value.strip_prefix("~/") {
        Some(stripped) => match dirs::home_dir() {
            Some(home) => home.join(stripped),
            None => PathBuf::from(value),
        },
        None => PathBuf::from(value),
    }
}
