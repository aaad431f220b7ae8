//! Configuration for the sandbox bridge.
//!
//! - Environment variable parsing with type safety
//! - Process settings derived from the environment
//! - The persisted isolation boundary document and its setters

pub mod env;
pub mod settings;
pub mod store;

pub use env::{EnvError, EnvParser};
pub use settings::Settings;
pub use store::{AdminView, BoundaryConfigStore, ConfigError, ConfigPatch};

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
