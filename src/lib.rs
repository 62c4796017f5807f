//! # devproxy
//!
//! A development server for front-end projects. Requests whose path starts
//! with a configured prefix (typically `/api`) are forwarded to a backend
//! origin; everything else is served from a local static directory.
//!
//! Per rule, the forwarded request can have its `Host`/`Origin` rewritten to
//! the backend (`change_origin`), can skip upstream certificate verification
//! (`secure = false`) and can drop the matched prefix (`strip_prefix`).
//! Upstream failures come back as `502 Bad Gateway` or `504 Gateway Timeout`.

pub mod config;
pub mod error;
pub mod integrations;
pub mod proxy;
pub mod static_files;
pub mod tls;

pub use config::{Config, ProxyRuleConfig};
pub use error::{DevProxyError, DevProxyResult};
pub use integrations::{Integration, IntegrationRegistry, NamedIntegration};
pub use proxy::{DevServer, ProxyRule, ProxyRules, RunningServer};
pub use static_files::LocalHandler;
