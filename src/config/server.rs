use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DevProxyError, DevProxyResult};

/// Listener configuration for the development server
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    /// Directory served for requests that no proxy rule claims
    pub static_dir: Option<PathBuf>,
    pub shutdown_timeout: Option<u64>, // seconds
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 4321))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            static_dir: None,
            shutdown_timeout: None,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> DevProxyResult<()> {
        if let Some(dir) = &self.static_dir {
            if !dir.is_dir() {
                return Err(DevProxyError::config(format!(
                    "server.static_dir {} is not a directory",
                    dir.display()
                )));
            }
        }

        if self.shutdown_timeout == Some(0) {
            return Err(DevProxyError::config(
                "server.shutdown_timeout must be greater than 0",
            ));
        }

        Ok(())
    }

    pub fn get_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout.unwrap_or(5))
    }
}
