use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{DevProxyError, DevProxyResult};

/// HTTP client configuration for upstream requests
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpClientConfig {
    pub pool_max_idle_per_host: Option<usize>,
    pub pool_idle_timeout: Option<u64>, // seconds
    pub connect_timeout: Option<u64>,   // seconds
    pub request_timeout: Option<u64>,   // seconds
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: Some(8),
            pool_idle_timeout: Some(90),
            connect_timeout: Some(10),
            request_timeout: Some(60),
        }
    }
}

impl HttpClientConfig {
    /// Validate HTTP client configuration
    pub fn validate(&self) -> DevProxyResult<()> {
        let checks = [
            ("pool_max_idle_per_host", self.pool_max_idle_per_host.map(|v| v as u64)),
            ("pool_idle_timeout", self.pool_idle_timeout),
            ("connect_timeout", self.connect_timeout),
            ("request_timeout", self.request_timeout),
        ];

        for (name, value) in checks {
            if value == Some(0) {
                return Err(DevProxyError::config(format!(
                    "http_client.{} must be greater than 0",
                    name
                )));
            }
        }

        Ok(())
    }

    pub fn get_pool_max_idle_per_host(&self) -> usize {
        self.pool_max_idle_per_host.unwrap_or(8)
    }

    pub fn get_pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout.unwrap_or(90))
    }

    pub fn get_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout.unwrap_or(10))
    }

    /// Upper bound on waiting for upstream response headers
    pub fn get_request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.unwrap_or(60))
    }
}
