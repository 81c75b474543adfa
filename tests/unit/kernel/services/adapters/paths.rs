use super::*;

#[test]
fn test_log_dir_is_app_scoped() {
    let Some(dir) = get_log_dir() else {
        return;
    };
    let text = dir.to_string_lossy();
    assert!(text.contains(APP_NAME));
    assert!(text.ends_with(LOG_DIR));
}

#[test]
fn test_config_dir_is_app_scoped() {
    if let Some(dir) = get_config_dir() {
        assert_eq!(dir.file_name().and_then(|n| n.to_str()), Some(APP_NAME));
    }
}
