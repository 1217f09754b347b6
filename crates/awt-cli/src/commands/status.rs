//! Status command handler

use std::path::PathBuf;

use anyhow::{Context, Result};

use awt_core::sync::inspect;
use awt_core::{Config, Storage};

use crate::output::Output;

/// Show persisted sync state without running a sync
pub async fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    let storage = Storage::connect(&config).await;
    let status = inspect(&storage).await;

    output.print_status(&status);
    Ok(())
}
