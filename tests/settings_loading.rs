//! Settings loaded from files and environment overrides.

use deepwatch::prelude::*;
use std::env;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_file_then_env_precedence() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().join("watch.yaml");
    let local = temp_dir.path().join("watch.local.toml");

    fs::write(
        &base,
        r#"
poll_interval_ms: 500
equality: loose
max_depth: 32
"#,
    )
    .unwrap();
    fs::write(&local, "poll_interval_ms = 250\n").unwrap();

    unsafe {
        env::set_var("TEST_DEEPWATCH_PRECEDENCE_MAX_DEPTH", "8");
    }

    let settings = WatcherSettings::loader()
        .with_file(&base)
        .with_file(&local)
        .with_env_overrides("TEST_DEEPWATCH_PRECEDENCE", "__")
        .load()
        .unwrap();

    assert_eq!(settings.poll_interval(), Duration::from_millis(250)); // From local file
    assert_eq!(settings.equality, Equality::Loose); // From base file
    assert_eq!(settings.max_depth, 8); // From env

    unsafe {
        env::remove_var("TEST_DEEPWATCH_PRECEDENCE_MAX_DEPTH");
    }
}

#[test]
fn test_env_only() {
    unsafe {
        env::set_var("TEST_DEEPWATCH_ENV_ONLY_POLL_INTERVAL_MS", "40");
        env::set_var("TEST_DEEPWATCH_ENV_ONLY_EQUALITY", "loose");
    }

    let settings = WatcherSettings::loader()
        .with_env_overrides("TEST_DEEPWATCH_ENV_ONLY", "__")
        .load()
        .unwrap();

    assert_eq!(settings.poll_interval_ms, Some(40));
    assert_eq!(settings.equality, Equality::Loose);

    unsafe {
        env::remove_var("TEST_DEEPWATCH_ENV_ONLY_POLL_INTERVAL_MS");
        env::remove_var("TEST_DEEPWATCH_ENV_ONLY_EQUALITY");
    }
}

#[test]
fn test_invalid_env_value_is_rejected() {
    unsafe {
        env::set_var("TEST_DEEPWATCH_INVALID_MAX_DEPTH", "0");
    }

    let result = WatcherSettings::loader()
        .with_env_overrides("TEST_DEEPWATCH_INVALID", "__")
        .load();
    assert!(matches!(result, Err(WatchError::InvalidArgument(_))));

    unsafe {
        env::remove_var("TEST_DEEPWATCH_INVALID_MAX_DEPTH");
    }
}

#[test]
fn test_loaded_settings_build_a_watcher() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("watch.json");
    fs::write(&path, r#"{ "poll_interval_ms": 1000, "equality": "strict" }"#).unwrap();

    let settings = WatcherSettings::loader().with_file(&path).load().unwrap();
    let watcher = Watcher::builder().with_settings(&settings).build().unwrap();

    assert_eq!(watcher.poll_interval(), Duration::from_secs(1));
    assert_eq!(watcher.equality(), Equality::Strict);
    assert_eq!(watcher.max_depth(), deepwatch::value::DEFAULT_MAX_DEPTH);
}
