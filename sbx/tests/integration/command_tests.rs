use std::process::Command;

use serde_json::Value;

use crate::common::{TestDataRoot, assert_contains, init_test_logging};

fn sbx(root: &TestDataRoot) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sbx"));
    cmd.env("SBX_DATA_DIR", root.path())
        .env_remove("SBX_CONFIG_PATH")
        .env_remove("SBX_POOL_TOKEN");
    cmd
}

#[test]
fn test_sbx_help_includes_description() {
    init_test_logging();
    crate::test_log!("TEST START: test_sbx_help_includes_description");

    let output = Command::new(env!("CARGO_BIN_EXE_sbx"))
        .arg("--help")
        .output()
        .expect("Failed to run sbx --help");

    assert!(output.status.success(), "sbx --help failed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains(&stdout, "Sandbox bridge");
    crate::test_log!("TEST PASS: test_sbx_help_includes_description");
}

#[test]
fn test_config_enable_then_show() {
    init_test_logging();
    let root = TestDataRoot::new();

    let output = sbx(&root)
        .args(["config", "endpoint", "https://pool.example/"])
        .output()
        .expect("Failed to run sbx config endpoint");
    assert!(output.status.success());

    let output = sbx(&root)
        .args(["config", "enable"])
        .output()
        .expect("Failed to run sbx config enable");
    assert!(output.status.success());
    assert_contains(&String::from_utf8_lossy(&output.stdout), "Isolation enabled");

    let output = sbx(&root)
        .args(["config", "show"])
        .output()
        .expect("Failed to run sbx config show");
    assert!(output.status.success());
    let view: Value = serde_json::from_slice(&output.stdout).expect("show prints JSON");
    assert_eq!(view["enabled"], true);
    assert_eq!(view["remote_endpoint"], "https://pool.example");
    assert_eq!(view["excluded_tools"].as_array().unwrap().len(), 5);
    assert!(
        view["warnings"]
            .as_array()
            .unwrap()
            .iter()
            .any(|w| w.as_str().unwrap().contains("memory"))
    );
}

#[test]
fn test_config_rejects_blacklisted_whitelist_item() {
    init_test_logging();
    let root = TestDataRoot::new();

    for item in [".azure", ".azure/", ".azure/creds"] {
        let output = sbx(&root)
            .args(["config", "whitelist", "add", item])
            .output()
            .expect("Failed to run sbx config whitelist add");
        assert!(!output.status.success(), "{item:?} accepted");
        assert_contains(&String::from_utf8_lossy(&output.stderr), "blacklisted");
    }
    let whitelist = root.store().snapshot().whitelist;
    assert!(whitelist.iter().all(|w| !w.starts_with(".azure")));
}

#[test]
fn test_exec_runs_locally_when_disabled() {
    init_test_logging();
    let root = TestDataRoot::new();

    let output = sbx(&root)
        .args(["exec", "--", "sh", "-c", "'exit 4'"])
        .output()
        .expect("Failed to run sbx exec");
    assert_eq!(output.status.code(), Some(4));
}
