//! Report export for audit summaries

pub mod console;
pub mod json;
