//! UTC - Universal Test Catalog CLI

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use utc::config;
use utc::models::{AuditRequest, AuditSummary, EnabledChecks};
use utc::report;
use utc::runners::api::{run_api, ApiOptions};
use utc::runners::perf::{run_perf, PerfOptions};
use utc::runners::setup::run_setup;
use utc::runners::web::{run_web, WebOptions};
use utc::runners::{run_quick, OutputMode};
use utc::scanner::{AuditEngine, RunContext};
use utc::server::{resolve_port, AppState, UiServer};

/// UTC - run web, performance, API and security tests against a target
#[derive(Parser)]
#[command(name = "utc", version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run network security suite (headers, TLS, HAR; optional ZAP)
    Security {
        /// Target website URL, e.g. https://example.com
        #[arg(short, long)]
        url: String,

        /// Skip HTTP security headers audit
        #[arg(long)]
        no_headers: bool,

        /// Skip SSL Labs TLS scan
        #[arg(long)]
        no_tls: bool,

        /// Skip capturing HAR network traffic
        #[arg(long)]
        no_har: bool,

        /// Run OWASP ZAP Baseline scan (requires Docker)
        #[arg(long)]
        zap: bool,

        /// Run checks concurrently instead of in fixed order
        #[arg(long)]
        concurrent: bool,

        /// Cancel unfinished checks after this many seconds
        #[arg(long)]
        deadline: Option<u64>,

        /// Directory receiving artifacts (default: reports)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// HTTP/HTTPS proxy URL
        #[arg(long)]
        proxy: Option<String>,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Exit with code 1 when any check ends with an error
        #[arg(long)]
        fail_on_error: bool,
    },

    /// List the security checks
    Checks,

    /// Run Playwright web tests (smoke + accessibility)
    Web {
        /// Target website URL
        #[arg(short, long)]
        url: String,

        /// Disable accessibility checks (default enabled, warn-only)
        #[arg(long)]
        no_a11y: bool,

        /// Fail on accessibility violations
        #[arg(long)]
        a11y_strict: bool,

        /// Do not fail on non-critical issues
        #[arg(long)]
        lenient: bool,

        /// Only run tests matching this pattern
        #[arg(short, long)]
        grep: Option<String>,
    },

    /// Run a Lighthouse performance audit
    Perf {
        /// Target website URL
        #[arg(short, long)]
        url: String,

        /// Use the desktop preset instead of mobile
        #[arg(long)]
        desktop: bool,

        /// Directory receiving the report (default: reports)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Run a Postman collection with Newman
    Api {
        /// Path to Postman collection JSON file
        #[arg(short, long)]
        collection: PathBuf,

        /// Path to Postman environment JSON file
        #[arg(short, long)]
        env: Option<PathBuf>,
    },

    /// Install Playwright browsers and perform initial setup
    Setup,

    /// Run a quick suite: web (lenient) then performance audit
    Quick {
        /// Target website URL
        #[arg(short, long)]
        url: String,

        /// Disable accessibility checks
        #[arg(long)]
        no_a11y: bool,

        /// Fail on accessibility violations
        #[arg(long)]
        a11y_strict: bool,
    },

    /// Start the local web UI
    Serve {
        /// Port to listen on (default: $PORT, then config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show a previously written security summary
    Report {
        /// Path to the summary JSON file
        #[arg(short, long, default_value = "reports/security-summary.json")]
        input: PathBuf,

        /// Also write a copy of the summary here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "utc=debug" } else { "utc=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();
}

fn print_banner() {
    let banner = r#"
    ╔═══════════════════════════════════════╗
    ║  UTC - Universal Test Catalog         ║
    ║  web · performance · api · security   ║
    ╚═══════════════════════════════════════╝
    "#;
    println!("{}", banner.cyan());
}

fn print_summary(summary: &AuditSummary) {
    println!("\n{}", "  Security Summary".bold());
    println!("  {}", "─".repeat(35));
    println!("{}", report::console::summary_table(summary));

    let ok = summary.results.values().filter(|r| r.is_ok()).count();
    let warnings = summary.results.values().filter(|r| r.is_warning()).count();
    let errors = summary.results.values().filter(|r| r.is_error()).count();
    println!(
        "\n  {} {} {}",
        format!("{ok} Ok").green(),
        format!("{warnings} Warning").yellow(),
        format!("{errors} Error").red().bold(),
    );
}

fn fail(context: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("  {} {err}", format!("{context}:").red().bold());
    std::process::exit(1);
}

/// Cancels the token on Ctrl+C so in-flight checks end as `Cancelled`
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling unfinished checks...");
            on_signal.cancel();
        }
    });
    token
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Security {
            url,
            no_headers,
            no_tls,
            no_har,
            zap,
            concurrent,
            deadline,
            output_dir,
            timeout,
            proxy,
            config: config_path,
            fail_on_error,
        } => {
            init_tracing(cli.verbose);
            print_banner();

            let mut audit_config = config::resolve_config(config_path.as_deref())?;
            config::merge_cli_args(
                &mut audit_config,
                output_dir,
                timeout,
                proxy,
                concurrent,
                deadline,
            );

            let checks = EnabledChecks::new(!no_headers, !no_tls, !no_har, zap);
            let request = match AuditRequest::new(&url, checks) {
                Ok(request) => request,
                Err(e) => fail("Security suite failed", e),
            };

            println!("  {} {}", "Target:".bold(), request.target_str().green());
            println!(
                "  {} {}",
                "Checks:".bold(),
                request
                    .checks()
                    .iter()
                    .map(|k| k.name())
                    .collect::<Vec<_>>()
                    .join(", ")
                    .cyan()
            );
            println!(
                "  {} {}\n",
                "Reports:".bold(),
                audit_config.output_dir.display().to_string().cyan()
            );

            let ctx = RunContext::from_config(audit_config)?
                .with_cancel(cancel_on_ctrl_c())
                .with_progress(!cli.verbose);
            let engine = AuditEngine::with_defaults();
            let summary = match engine.run(&request, &ctx).await {
                Ok(summary) => summary,
                Err(e) => fail("Security suite failed", e),
            };

            print_summary(&summary);

            if fail_on_error && summary.has_failures() {
                println!(
                    "\n  {} {} check(s) ended with an error.",
                    "FAIL:".red().bold(),
                    summary.failed_checks().len()
                );
                std::process::exit(1);
            }
        }

        Commands::Checks => {
            print_banner();
            let engine = AuditEngine::with_defaults();

            println!("  {}\n", "Available Security Checks:".bold());
            for (name, description) in engine.list_checks() {
                println!("    {} {}", format!("{name:10}").cyan().bold(), description);
            }
            println!();
        }

        Commands::Web {
            url,
            no_a11y,
            a11y_strict,
            lenient,
            grep,
        } => {
            init_tracing(cli.verbose);
            let opts = WebOptions {
                url,
                a11y: !no_a11y,
                a11y_strict,
                lenient,
                grep,
            };
            if let Err(e) = run_web(&opts, OutputMode::Inherit).await {
                fail("Web tests failed", e);
            }
        }

        Commands::Perf {
            url,
            desktop,
            output_dir,
        } => {
            init_tracing(cli.verbose);
            let output_dir = match output_dir {
                Some(dir) => dir,
                None => config::resolve_config(None)?.output_dir,
            };
            let opts = PerfOptions {
                url,
                desktop,
                output_dir,
            };
            if let Err(e) = run_perf(&opts, OutputMode::Inherit).await {
                fail("Performance run failed", e);
            }
        }

        Commands::Api { collection, env } => {
            init_tracing(cli.verbose);
            let opts = ApiOptions {
                collection,
                environment: env,
            };
            if let Err(e) = run_api(&opts, OutputMode::Inherit).await {
                fail("API tests failed", e);
            }
        }

        Commands::Setup => {
            init_tracing(cli.verbose);
            if let Err(e) = run_setup(true).await {
                fail("Setup failed", e);
            }
        }

        Commands::Quick {
            url,
            no_a11y,
            a11y_strict,
        } => {
            init_tracing(cli.verbose);
            let output_dir = config::resolve_config(None)?.output_dir;
            let outcome =
                run_quick(&url, !no_a11y, a11y_strict, &output_dir, OutputMode::Inherit).await;
            if outcome.failed() {
                std::process::exit(1);
            }
        }

        Commands::Serve {
            port,
            config: config_path,
        } => {
            init_tracing(cli.verbose);
            print_banner();

            let audit_config = config::resolve_config(config_path.as_deref())?;
            let env_port = std::env::var("PORT").ok();
            let port = resolve_port(port, env_port.as_deref(), audit_config.server_port);

            let state = AppState::new(
                AuditEngine::with_defaults(),
                RunContext::from_config(audit_config)?,
            );
            if let Err(e) = UiServer::new(port, state).start().await {
                error!("UI server stopped: {e}");
                fail("Server failed", e);
            }
        }

        Commands::Report { input, output } => {
            init_tracing(cli.verbose);
            let summary = report::json::load(&input)?;
            println!("  {} {}", "Target:".bold(), summary.url.green());
            println!("  {} {}", "Run at:".bold(), summary.timestamp.to_rfc3339());
            print_summary(&summary);

            if let Some(path) = output {
                report::json::export(&summary, &path)?;
                println!("\n  {} {}", "Summary saved to:".bold(), path.display().to_string().green());
            }
        }
    }

    Ok(())
}
