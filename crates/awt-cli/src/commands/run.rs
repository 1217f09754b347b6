//! Sync run handler

use std::path::PathBuf;

use anyhow::Result;

use awt_core::{AwtClient, Config, Storage, SyncEngine, SyncError, SyncSettings};

use crate::output::Output;

/// Run one sync
///
/// Credentials are validated before any network or storage access. Errors
/// are returned as `SyncError` so the caller can name the failed step.
pub async fn run(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config = Config::load_with_cli_override(config_path).map_err(SyncError::from)?;
    let credentials = config.api_credentials().map_err(SyncError::from)?;
    let client = AwtClient::new(credentials, config.request_timeout()).map_err(SyncError::from)?;

    let storage = Storage::connect(&config).await;
    if let Some(reason) = storage.unavailable_reason() {
        output.warning(&format!("Storage disabled: {}", reason));
    }

    let engine =
        SyncEngine::new(client, storage).with_settings(SyncSettings::from_config(&config));
    let report = engine.run().await?;

    output.print_report(&report);
    output.success("Sync complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use awt_core::ConfigError;
    use std::env;
    use tempfile::TempDir;

    const CREDENTIAL_VARS: &[&str] = &[
        "AWT_USERNAME",
        "AWT_PASSWORD",
        "AWT_API_KEY",
        "AWT_STORAGE_DIR",
    ];

    #[tokio::test]
    async fn test_missing_credentials_fail_before_storage() {
        for name in CREDENTIAL_VARS {
            env::remove_var(name);
        }

        let temp_dir = TempDir::new().unwrap();
        let storage_dir = temp_dir.path().join("bucket");
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            format!("storage_dir = {:?}\n", storage_dir.display().to_string()),
        )
        .unwrap();

        let output = Output::new(OutputFormat::Quiet);
        let err = run(Some(&config_path), &output).await.unwrap_err();

        let sync_err = err.downcast_ref::<SyncError>().unwrap();
        assert_eq!(sync_err.step(), "configuration");
        assert!(matches!(
            sync_err,
            SyncError::Config(ConfigError::MissingCredentials { .. })
        ));
        assert!(!storage_dir.exists());
    }
}
