//! # Configuration
//!
//! The development server is configured from a single TOML file that is read
//! once at startup:
//!
//! - `integrations`: names of build-tool integrations to register
//! - `server`: listener address and the optional static directory
//! - `proxy`: one `[[proxy]]` table per forwarding rule
//! - `http_client`: upstream timeouts and pool settings (optional)
//!
//! `${VAR}` and `${VAR:-default}` references are expanded from the
//! environment before parsing.
//!
//! ```rust,no_run
//! use devproxy::config::Config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_file_with_env("devproxy.toml").await?;
//! println!("listening on {}", config.server.bind);
//! # Ok(())
//! # }
//! ```

pub mod http_client;
pub mod proxy;
pub mod server;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{DevProxyError, DevProxyResult};
use crate::proxy::ProxyRules;

pub use http_client::HttpClientConfig;
pub use proxy::{parse_target_origin, ProxyRuleConfig};
pub use server::ServerConfig;

/// Root configuration of the development server
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Integrations registered with the server at startup
    #[serde(default)]
    pub integrations: Vec<String>,
    #[serde(default)]
    pub server: ServerConfig,
    /// Forwarding rules, in declaration order
    #[serde(default)]
    pub proxy: Vec<ProxyRuleConfig>,
    pub http_client: Option<HttpClientConfig>,
}

impl Config {
    /// Load configuration from file with environment variable expansion
    pub async fn from_file_with_env<P: AsRef<Path>>(path: P) -> DevProxyResult<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await.map_err(|e| {
            DevProxyError::config(format!(
                "Failed to read config {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config = Self::from_str_with_env(&content)?;
        info!("Configuration loaded from {:?}", path.as_ref());
        Ok(config)
    }

    /// Parse, default and validate configuration text
    pub fn from_str_with_env(content: &str) -> DevProxyResult<Self> {
        let expanded = expand_env_vars(content);
        let mut config: Config = toml::from_str(&expanded)?;
        config.apply_defaults();
        config.validate()?;
        Ok(config)
    }

    fn apply_defaults(&mut self) {
        if self.http_client.is_none() {
            self.http_client = Some(HttpClientConfig::default());
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> DevProxyResult<()> {
        self.server.validate()?;

        if let Some(http_client) = &self.http_client {
            http_client.validate()?;
        }

        let rules = ProxyRules::from_configs(&self.proxy)?;
        if rules.is_empty() {
            warn!("No proxy rules configured - every request will be served locally");
        }
        for rule in rules.iter().filter(|r| r.is_https() && !r.secure()) {
            warn!(
                prefix = rule.path_prefix(),
                target = %rule.target_origin(),
                "Upstream certificate verification disabled"
            );
        }

        let mut names = HashSet::new();
        for name in &self.integrations {
            if name.trim().is_empty() {
                return Err(DevProxyError::config("integration names must not be empty"));
            }
            if !names.insert(name.as_str()) {
                return Err(DevProxyError::config(format!(
                    "integration '{}' listed more than once",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Effective upstream client settings
    pub fn http_client(&self) -> HttpClientConfig {
        self.http_client.clone().unwrap_or_default()
    }
}

/// Expand environment variables in configuration content.
/// Supports `${VAR}` and `${VAR:-default}`.
fn expand_env_vars(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break; // unterminated ${ is kept verbatim
        };

        result.push_str(&rest[..start]);
        let expr = &rest[start + 2..start + len];
        let value = match expr.split_once(":-") {
            Some((name, default)) => env::var(name).unwrap_or_else(|_| default.to_string()),
            None => env::var(expr).unwrap_or_else(|_| {
                warn!(
                    "Environment variable '{}' not found, using empty string",
                    expr
                );
                String::new()
            }),
        };
        result.push_str(&value);
        rest = &rest[start + len + 1..];
    }

    result.push_str(rest);
    result
}
