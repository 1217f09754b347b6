//! Config command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};

use awt_core::Config;

use crate::output::{Output, OutputFormat};

const NOT_SET: &str = "(not set)";
const REDACTED: &str = "<redacted>";

/// Show effective configuration with secrets redacted
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!("{}", redacted_json(&config));
        }
        OutputFormat::Quiet => {
            println!("{}", config.base_url);
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  base_url:                   {}", config.base_url);
            println!(
                "  username:                   {}",
                config.username.as_deref().unwrap_or(NOT_SET)
            );
            println!("  password:                   {}", secret(&config.password));
            println!("  api_key:                    {}", secret(&config.api_key));
            println!(
                "  gcs_bucket:                 {}",
                config.gcs_bucket.as_deref().unwrap_or(NOT_SET)
            );
            println!(
                "  gcs_project_id:             {}",
                config.gcs_project_id.as_deref().unwrap_or(NOT_SET)
            );
            println!(
                "  storage_dir:                {}",
                config
                    .storage_dir
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| NOT_SET.to_string())
            );
            println!("  request_timeout_secs:       {}", config.request_timeout_secs);
            println!("  initial_window_days:        {}", config.initial_window_days);
            println!(
                "  incremental_fallback_hours: {}",
                config.incremental_fallback_hours
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

fn secret(value: &Option<String>) -> &'static str {
    if value.is_some() {
        REDACTED
    } else {
        NOT_SET
    }
}

fn redacted_json(config: &Config) -> serde_json::Value {
    serde_json::json!({
        "base_url": config.base_url,
        "username": config.username,
        "password": config.password.as_ref().map(|_| REDACTED),
        "api_key": config.api_key.as_ref().map(|_| REDACTED),
        "gcs_bucket": config.gcs_bucket,
        "gcs_project_id": config.gcs_project_id,
        "storage_dir": config.storage_dir,
        "request_timeout_secs": config.request_timeout_secs,
        "initial_window_days": config.initial_window_days,
        "incremental_fallback_hours": config.incremental_fallback_hours,
    })
}
