use std::fs;
use std::path::{Path, PathBuf};

use sbx_common::{BoundaryConfigStore, Settings};
use tempfile::TempDir;

/// A throwaway agent data root with a few whitelisted files.
pub struct TestDataRoot {
    pub dir: TempDir,
    pub notes: PathBuf,
}

impl TestDataRoot {
    pub fn new() -> Self {
        crate::test_log!("FIXTURE: Creating agent data root");

        let dir = TempDir::new().expect("Failed to create temp dir");
        let notes = dir.path().join("notes");
        fs::create_dir_all(&notes).expect("Failed to create notes dir");
        fs::write(notes.join("todo.md"), "- ship it\n").expect("Failed to write notes/todo.md");
        fs::write(dir.path().join("SOUL.md"), "calm\n").expect("Failed to write SOUL.md");
        fs::create_dir_all(dir.path().join(".azure")).expect("Failed to create .azure");
        fs::write(dir.path().join(".azure/token"), "secret").expect("Failed to write token");

        Self { dir, notes }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn settings(&self) -> Settings {
        Settings::with_data_dir(self.path())
    }

    pub fn store(&self) -> BoundaryConfigStore {
        BoundaryConfigStore::load(self.settings().config_path)
    }

    /// Enable isolation against `endpoint`.
    pub fn enable(&self, endpoint: &str) {
        let mut store = self.store();
        store.set_remote_endpoint(endpoint).expect("Failed to set endpoint");
        store.set_enabled(true).expect("Failed to enable");
    }
}
