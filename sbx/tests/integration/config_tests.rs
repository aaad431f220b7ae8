use sbx_common::{BoundaryConfig, DEFAULT_WHITELIST, EXCLUDED_LOCAL_TOOLS};

use crate::common::{TestDataRoot, init_test_logging};

#[test]
fn test_default_config_disabled() {
    init_test_logging();
    crate::test_log!("TEST START: test_default_config_disabled");

    let config = BoundaryConfig::default();
    assert!(!config.enabled, "Expected isolation to be disabled by default");
    assert!(config.excluded_tools().is_empty());

    crate::test_log!("TEST PASS: test_default_config_disabled");
}

#[test]
fn test_enabled_config_excludes_local_file_tools() {
    init_test_logging();
    let root = TestDataRoot::new();
    root.enable("https://pool");

    let config = root.store().snapshot();
    assert_eq!(config.excluded_tools(), EXCLUDED_LOCAL_TOOLS);
    assert_eq!(config.whitelist.len(), DEFAULT_WHITELIST.len());
}

#[test]
fn test_store_changes_visible_to_fresh_loads() {
    init_test_logging();
    let root = TestDataRoot::new();

    let mut writer = root.store();
    writer.set_whitelist(["notes", ".cache"]).unwrap();
    writer.add_whitelist_item("media").unwrap();

    let reader = root.store();
    assert_eq!(reader.config().whitelist, vec!["notes", "media"]);
}
