//! One-time environment setup

use super::{OutputMode, ToolCommand};
use crate::error::Result;
use tracing::info;

pub fn setup_command() -> ToolCommand {
    ToolCommand::new("npx").args(["playwright", "install"])
}

/// Installs the Playwright browsers (chromium, firefox, webkit)
pub async fn run_setup(browsers: bool) -> Result<()> {
    info!("UTC setup starting...");
    if browsers {
        info!("Installing Playwright browsers (chromium, firefox, webkit)...");
        setup_command().run(OutputMode::Inherit).await?;
    }
    info!("Setup complete.");
    Ok(())
}
