use hyper::StatusCode;
use thiserror::Error;
use tokio::time::Duration;

/// Main error type for the development proxy
#[derive(Error, Debug, Clone)]
pub enum DevProxyError {
    /// Configuration related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Network errors while talking to an upstream
    #[error("Network error: {message}")]
    Network { message: String },

    /// Timeout errors
    #[error("Operation timed out after {duration:?}: {operation}")]
    Timeout {
        duration: Duration,
        operation: String,
    },

    /// TLS/SSL related errors
    #[error("TLS error: {message}")]
    Tls { message: String },

    /// IO related errors
    #[error("IO error: {message}")]
    Io { message: String },

    /// Integration registration errors
    #[error("Integration error: {name}: {message}")]
    Integration { name: String, message: String },

    /// Internal server errors
    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl DevProxyError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(duration: Duration, operation: S) -> Self {
        Self::Timeout {
            duration,
            operation: operation.into(),
        }
    }

    /// Create a TLS error
    pub fn tls<S: Into<String>>(message: S) -> Self {
        Self::Tls {
            message: message.into(),
        }
    }

    /// Create an IO error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create an integration error
    pub fn integration<N: Into<String>, S: Into<String>>(name: N, message: S) -> Self {
        Self::Integration {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the failure happened on the upstream side of a forwarded request
    pub fn is_gateway_failure(&self) -> bool {
        matches!(
            self,
            DevProxyError::Network { .. } | DevProxyError::Timeout { .. } | DevProxyError::Tls { .. }
        )
    }

    /// Status code reported to the client when this error ends a request
    pub fn status_code(&self) -> StatusCode {
        match self {
            DevProxyError::Network { .. } | DevProxyError::Tls { .. } => StatusCode::BAD_GATEWAY,
            DevProxyError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Result type alias for proxy operations
pub type DevProxyResult<T> = Result<T, DevProxyError>;

impl From<std::io::Error> for DevProxyError {
    fn from(err: std::io::Error) -> Self {
        DevProxyError::io(err.to_string())
    }
}

impl From<hyper::Error> for DevProxyError {
    fn from(err: hyper::Error) -> Self {
        if let Some(tls_err) = find_tls_cause(&err) {
            return DevProxyError::tls(format!("Upstream handshake failed: {}", tls_err));
        }
        if err.is_connect() {
            DevProxyError::network(format!("Connection error: {}", err))
        } else {
            DevProxyError::network(format!("HTTP error: {}", err))
        }
    }
}

impl From<toml::de::Error> for DevProxyError {
    fn from(err: toml::de::Error) -> Self {
        DevProxyError::config(format!("TOML parsing error: {}", err))
    }
}

impl From<hyper::http::uri::InvalidUri> for DevProxyError {
    fn from(err: hyper::http::uri::InvalidUri) -> Self {
        DevProxyError::config(format!("Invalid URI: {}", err))
    }
}

impl From<hyper::http::Error> for DevProxyError {
    fn from(err: hyper::http::Error) -> Self {
        DevProxyError::internal(format!("HTTP error: {}", err))
    }
}

/// rustls errors reach hyper wrapped in the connector's `io::Error`
fn find_tls_cause<'a>(err: &'a (dyn std::error::Error + 'static)) -> Option<&'a rustls::Error> {
    let mut current = err.source();
    while let Some(e) = current {
        if let Some(tls_err) = e.downcast_ref::<rustls::Error>() {
            return Some(tls_err);
        }
        if let Some(inner) = e
            .downcast_ref::<std::io::Error>()
            .and_then(|io_err| io_err.get_ref())
        {
            if let Some(tls_err) = inner.downcast_ref::<rustls::Error>() {
                return Some(tls_err);
            }
        }
        current = e.source();
    }
    None
}
