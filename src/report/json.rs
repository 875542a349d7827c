//! JSON summary export

use crate::error::Result;
use crate::models::AuditSummary;
use std::path::Path;
use tracing::info;

/// Exports an audit summary as a JSON file
pub fn export(summary: &AuditSummary, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(output_path, json)?;
    info!("JSON summary saved to {}", output_path.display());
    Ok(())
}

/// Loads an AuditSummary from a JSON file
pub fn load(input_path: &Path) -> Result<AuditSummary> {
    let content = std::fs::read_to_string(input_path)?;
    let summary: AuditSummary = serde_json::from_str(&content)?;
    Ok(summary)
}
