//! Lighthouse performance runner

use super::{parse_target, OutputMode, ToolCommand, ToolOutput};
use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct PerfOptions {
    pub url: String,
    pub desktop: bool,
    pub output_dir: PathBuf,
}

/// File name of the Lighthouse report for a preset
pub fn report_name(desktop: bool) -> &'static str {
    if desktop {
        "lighthouse-desktop.html"
    } else {
        "lighthouse-mobile.html"
    }
}

pub fn perf_command(opts: &PerfOptions, report_path: &Path) -> ToolCommand {
    let mut cmd = ToolCommand::new("npx").args([
        "lighthouse".to_string(),
        opts.url.clone(),
        "--output=html".to_string(),
        format!("--output-path={}", report_path.display()),
        "--quiet".to_string(),
    ]);
    if opts.desktop {
        cmd = cmd.arg("--preset=desktop");
    }
    cmd
}

pub async fn run_perf(opts: &PerfOptions, mode: OutputMode) -> Result<ToolOutput> {
    parse_target(&opts.url)?;
    info!(
        "Running Lighthouse on {} ({}) ...",
        opts.url,
        if opts.desktop { "desktop" } else { "mobile" }
    );

    tokio::fs::create_dir_all(&opts.output_dir).await?;
    let report_path = opts.output_dir.join(report_name(opts.desktop));
    let output = perf_command(opts, &report_path).run(mode).await?;
    info!("Lighthouse report saved to {}", report_path.display());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mobile_is_the_default_preset() {
        let opts = PerfOptions {
            url: "https://example.com".to_string(),
            desktop: false,
            output_dir: PathBuf::from("reports"),
        };
        let path = opts.output_dir.join(report_name(opts.desktop));
        let cmd = perf_command(&opts, &path);
        assert_eq!(
            cmd.get_args(),
            [
                "lighthouse",
                "https://example.com",
                "--output=html",
                "--output-path=reports/lighthouse-mobile.html",
                "--quiet",
            ]
        );
    }

    #[test]
    fn desktop_adds_preset() {
        let opts = PerfOptions {
            url: "https://example.com".to_string(),
            desktop: true,
            output_dir: PathBuf::from("reports"),
        };
        let cmd = perf_command(&opts, &opts.output_dir.join(report_name(true)));
        assert_eq!(cmd.get_args().last().map(String::as_str), Some("--preset=desktop"));
        assert!(cmd.display().contains("lighthouse-desktop.html"));
    }
}
