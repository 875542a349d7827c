//! Playwright web test runner

use super::{parse_target, OutputMode, ToolCommand, ToolOutput};
use crate::error::Result;
use tracing::info;

#[derive(Debug, Clone)]
pub struct WebOptions {
    pub url: String,
    pub a11y: bool,
    pub a11y_strict: bool,
    pub lenient: bool,
    pub grep: Option<String>,
}

impl Default for WebOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            a11y: true,
            a11y_strict: false,
            lenient: false,
            grep: None,
        }
    }
}

fn flag(on: bool) -> &'static str {
    if on {
        "1"
    } else {
        "0"
    }
}

/// `npx playwright test --reporter=list [-g <grep>]` with the target in the environment
pub fn web_command(opts: &WebOptions) -> ToolCommand {
    let mut cmd = ToolCommand::new("npx")
        .args(["playwright", "test", "--reporter=list"])
        .env("TARGET_URL", opts.url.clone())
        .env("A11Y_ENABLED", flag(opts.a11y))
        .env("A11Y_STRICT", flag(opts.a11y_strict))
        .env("LENIENT", flag(opts.lenient));
    if let Some(grep) = opts.grep.as_deref().filter(|g| !g.is_empty()) {
        cmd = cmd.arg("-g").arg(grep);
    }
    cmd
}

pub async fn run_web(opts: &WebOptions, mode: OutputMode) -> Result<ToolOutput> {
    parse_target(&opts.url)?;
    info!("Running web tests on {} ...", opts.url);
    web_command(opts).run(mode).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_flags_follow_options() {
        let cmd = web_command(&WebOptions {
            url: "https://example.com".to_string(),
            lenient: true,
            ..WebOptions::default()
        });

        assert_eq!(cmd.get_args(), ["playwright", "test", "--reporter=list"]);
        assert_eq!(cmd.get_env("TARGET_URL"), Some("https://example.com"));
        assert_eq!(cmd.get_env("A11Y_ENABLED"), Some("1"));
        assert_eq!(cmd.get_env("A11Y_STRICT"), Some("0"));
        assert_eq!(cmd.get_env("LENIENT"), Some("1"));
    }

    #[test]
    fn grep_is_passed_through() {
        let cmd = web_command(&WebOptions {
            url: "https://example.com".to_string(),
            grep: Some("smoke".to_string()),
            ..WebOptions::default()
        });
        assert_eq!(
            cmd.get_args(),
            ["playwright", "test", "--reporter=list", "-g", "smoke"]
        );
    }
}
