//! # Proxy
//!
//! Forwarding of requests whose path starts with a configured prefix:
//!
//! - `ProxyRule` / `ProxyRules`: validated rules and longest-prefix lookup
//! - `UpstreamClients`: pooled hyper clients, one per certificate policy
//! - `ProxyHandler`: per-request dispatch to the upstream or the local handler
//! - `DevServer`: listener, connection handling and graceful shutdown
//!
//! ```rust,no_run
//! use devproxy::config::Config;
//! use devproxy::integrations::IntegrationRegistry;
//! use devproxy::proxy::DevServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_file_with_env("devproxy.toml").await?;
//! let server = DevServer::new(config, &IntegrationRegistry::with_builtin())?;
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

pub mod handler;
pub mod http_client;
pub mod rule;
pub mod server;

pub use handler::ProxyHandler;
pub use http_client::UpstreamClients;
pub use rule::{ProxyRule, ProxyRules};
pub use server::{DevServer, RunningServer};
