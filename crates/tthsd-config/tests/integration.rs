use std::fs;
use std::path::Path;

use anyhow::Result;
use tempfile::TempDir;
use tthsd_config::{
    BindingConfig, ConfigError, LIBRARY_PATH_ENV, PAUSE_CAPABILITY_ENV, PauseCapability,
};

#[test]
fn config_file_round_trips_through_loader() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("binding.json");
    fs::write(
        &path,
        serde_json::json!({
            "library_path": "/opt/engine/TTHSD.so",
            "pause_capability": "destructive",
            "session": {
                "thread_count": 16,
                "chunk_size_mb": 4,
                "user_agent": "tthsd-tests/1.0",
                "use_callback_url": true,
                "remote_callback_url": "wss://events.example.com/hook",
                "use_socket": false,
                "is_multiple": true
            }
        })
        .to_string(),
    )?;

    let config = BindingConfig::from_path(&path)?;
    assert_eq!(
        config.library_path.as_deref(),
        Some(Path::new("/opt/engine/TTHSD.so"))
    );
    assert_eq!(config.pause_capability, PauseCapability::Destructive);
    assert_eq!(config.session.thread_count, 16);
    assert_eq!(config.session.chunk_size_mb, 4);
    assert_eq!(config.session.user_agent.as_deref(), Some("tthsd-tests/1.0"));
    assert_eq!(config.session.is_multiple, Some(true));

    let overridden = config.with_env_overrides(|key| match key {
        LIBRARY_PATH_ENV => Some("/srv/TTHSD.so".to_string()),
        PAUSE_CAPABILITY_ENV => Some("resumable".to_string()),
        _ => None,
    })?;
    assert_eq!(
        overridden.library_path.as_deref(),
        Some(Path::new("/srv/TTHSD.so"))
    );
    assert_eq!(overridden.pause_capability, PauseCapability::Resumable);
    Ok(())
}

#[test]
fn missing_file_reports_io_error_with_path() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("absent.json");
    match BindingConfig::from_path(&path) {
        Err(ConfigError::Io { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected io error, got {other:?}"),
    }
}

#[test]
fn invalid_values_in_file_fail_validation() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("binding.json");
    fs::write(&path, r#"{"session":{"thread_count":0}}"#)?;

    match BindingConfig::from_path(&path) {
        Err(ConfigError::InvalidField { field, .. }) => assert_eq!(field, "thread_count"),
        other => panic!("expected validation failure, got {other:?}"),
    }
    Ok(())
}
