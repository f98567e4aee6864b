use keel_core::{AppContext, KeelConfig};
use tempfile::TempDir;

#[test]
fn app_defaults_to_directory_name() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path().join("storefront");
    std::fs::create_dir(&project).unwrap();

    let ctx = AppContext::resolve(&project, &KeelConfig::default(), None, None).unwrap();

    assert_eq!(ctx.app, "storefront");
    assert_eq!(ctx.rack, "keel");
}

#[test]
fn config_app_name_beats_directory() {
    let tmp = TempDir::new().unwrap();
    let mut config = KeelConfig::default();
    config.app.name = Some("billing".to_owned());

    let ctx = AppContext::resolve(tmp.path(), &config, None, None).unwrap();
    assert_eq!(ctx.app, "billing");
}

#[test]
fn flags_beat_config() {
    let tmp = TempDir::new().unwrap();
    let mut config = KeelConfig::default();
    config.app.name = Some("billing".to_owned());
    config.rack.name = "staging".to_owned();

    let ctx = AppContext::resolve(tmp.path(), &config, Some("web"), Some("production")).unwrap();

    assert_eq!(ctx, AppContext::new("production", "web"));
}

#[test]
fn missing_directory_is_an_error_only_without_app_name() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("does-not-exist");

    assert!(AppContext::resolve(&missing, &KeelConfig::default(), None, None).is_err());
    assert!(AppContext::resolve(&missing, &KeelConfig::default(), Some("web"), None).is_ok());
}

#[test]
fn derived_resource_names() {
    let ctx = AppContext::new("production", "web");

    assert_eq!(ctx.releases_table(), "production-web-releases");
    assert_eq!(ctx.stack_name(), "production-web");
    assert_eq!(ctx.with_app("worker").stack_name(), "production-worker");
}
