//! Newman API collection runner

use super::{OutputMode, ToolCommand, ToolOutput};
use crate::error::{AuditError, Result};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ApiOptions {
    pub collection: PathBuf,
    pub environment: Option<PathBuf>,
}

pub fn api_command(opts: &ApiOptions) -> ToolCommand {
    let mut cmd = ToolCommand::new("npx")
        .args(["newman", "run"])
        .arg(opts.collection.display().to_string())
        .args(["--reporters", "cli"]);
    if let Some(env) = &opts.environment {
        cmd = cmd.arg("-e").arg(env.display().to_string());
    }
    cmd
}

/// Runs the collection; any failed request fails the run through newman's exit code
pub async fn run_api(opts: &ApiOptions, mode: OutputMode) -> Result<ToolOutput> {
    if !opts.collection.exists() {
        return Err(AuditError::InvalidRequest(format!(
            "Collection not found: {}",
            opts.collection.display()
        )));
    }
    match &opts.environment {
        Some(env) => info!(
            "Running Newman on collection: {} with env: {}",
            opts.collection.display(),
            env.display()
        ),
        None => info!("Running Newman on collection: {}", opts.collection.display()),
    }

    let output = api_command(opts).run(mode).await?;
    info!("API tests passed.");
    Ok(output)
}
