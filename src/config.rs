//! Configuration management for utc

use crate::error::{AuditError, Result};
use crate::models::AuditConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File-based configuration structure matching config/default.toml
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    audit: Option<AuditSection>,
    tls: Option<TlsSection>,
    har: Option<HarSection>,
    zap: Option<ZapSection>,
    server: Option<ServerSection>,
}

#[derive(Debug, Deserialize)]
struct AuditSection {
    timeout_secs: Option<u64>,
    user_agent: Option<String>,
    follow_redirects: Option<bool>,
    proxy: Option<String>,
    output_dir: Option<PathBuf>,
    concurrent: Option<bool>,
    deadline_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TlsSection {
    endpoint: Option<String>,
    poll_interval_secs: Option<u64>,
    max_attempts: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct HarSection {
    navigation_timeout_secs: Option<u64>,
    settle_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ZapSection {
    docker_bin: Option<String>,
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    port: Option<u16>,
}

/// Loads configuration from a TOML file and merges with defaults
pub fn load_config(path: &Path) -> Result<AuditConfig> {
    let content = std::fs::read_to_string(path).map_err(AuditError::IoError)?;
    parse_config(&content)
}

/// Parses TOML configuration text on top of the defaults
pub fn parse_config(content: &str) -> Result<AuditConfig> {
    let file_config: FileConfig = toml::from_str(content)?;
    let mut config = AuditConfig::default();

    if let Some(audit) = file_config.audit {
        if let Some(timeout) = audit.timeout_secs {
            config.timeout_secs = timeout;
        }
        if let Some(ua) = audit.user_agent {
            config.user_agent = ua;
        }
        if let Some(follow) = audit.follow_redirects {
            config.follow_redirects = follow;
        }
        if let Some(proxy) = audit.proxy {
            config.proxy = Some(proxy);
        }
        if let Some(dir) = audit.output_dir {
            config.output_dir = dir;
        }
        if let Some(concurrent) = audit.concurrent {
            config.concurrent = concurrent;
        }
        if let Some(deadline) = audit.deadline_secs {
            config.deadline_secs = Some(deadline);
        }
    }

    if let Some(tls) = file_config.tls {
        if let Some(endpoint) = tls.endpoint {
            config.tls_endpoint = endpoint;
        }
        if let Some(interval) = tls.poll_interval_secs {
            config.tls_poll_interval_secs = interval;
        }
        if let Some(attempts) = tls.max_attempts {
            if attempts == 0 {
                return Err(AuditError::ConfigError(
                    "tls.max_attempts must be at least 1".to_string(),
                ));
            }
            config.tls_max_attempts = attempts;
        }
    }

    if let Some(har) = file_config.har {
        if let Some(timeout) = har.navigation_timeout_secs {
            config.navigation_timeout_secs = timeout;
        }
        if let Some(settle) = har.settle_ms {
            config.settle_ms = settle;
        }
    }

    if let Some(zap) = file_config.zap {
        if let Some(bin) = zap.docker_bin {
            config.docker_bin = bin;
        }
        if let Some(image) = zap.image {
            config.zap_image = image;
        }
    }

    if let Some(server) = file_config.server {
        if let Some(port) = server.port {
            config.server_port = port;
        }
    }

    Ok(config)
}

/// Loads `path` if given, else `config/default.toml` when it exists, else defaults
pub fn resolve_config(path: Option<&Path>) -> Result<AuditConfig> {
    match path {
        Some(p) => load_config(p),
        None => {
            let default_path = Path::new("config/default.toml");
            if default_path.exists() {
                load_config(default_path)
            } else {
                Ok(AuditConfig::default())
            }
        }
    }
}

/// Merges CLI arguments into an existing AuditConfig
pub fn merge_cli_args(
    config: &mut AuditConfig,
    output_dir: Option<PathBuf>,
    timeout: Option<u64>,
    proxy: Option<String>,
    concurrent: bool,
    deadline: Option<u64>,
) {
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    if let Some(t) = timeout {
        config.timeout_secs = t;
    }
    if let Some(p) = proxy {
        config.proxy = Some(p);
    }
    if concurrent {
        config.concurrent = true;
    }
    if let Some(d) = deadline {
        config.deadline_secs = Some(d);
    }
}
