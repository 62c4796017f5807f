use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Server};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::handler::ProxyHandler;
use super::http_client::UpstreamClients;
use super::rule::ProxyRules;
use crate::config::Config;
use crate::error::{DevProxyError, DevProxyResult};
use crate::integrations::{Integration, IntegrationRegistry};
use crate::static_files::LocalHandler;

/// Development server: proxy rules in front of the local handler
pub struct DevServer {
    pub bind_addr: SocketAddr,
    config: Config,
    handler: ProxyHandler,
    integrations: Vec<Arc<dyn Integration>>,
}

impl DevServer {
    /// Build the server from validated configuration.
    /// Integrations run their startup hooks here.
    pub fn new(config: Config, registry: &IntegrationRegistry) -> DevProxyResult<Self> {
        config.validate()?;
        let integrations = registry.activate(&config)?;

        let rules = Arc::new(ProxyRules::from_configs(&config.proxy)?);
        info!(rules = rules.len(), "Proxy rules loaded");
        for rule in rules.iter() {
            info!(
                prefix = rule.path_prefix(),
                target = %rule.target_origin(),
                change_origin = rule.change_origin(),
                secure = rule.secure(),
                strip_prefix = rule.strip_prefix(),
                "Proxy rule"
            );
        }

        let clients = UpstreamClients::new(&config.http_client());
        let local = Arc::new(LocalHandler::new(config.server.static_dir.clone()));

        Ok(Self {
            bind_addr: config.server.bind,
            handler: ProxyHandler::new(rules, clients, local),
            config,
            integrations,
        })
    }

    /// Override the configured listen address
    pub fn with_bind_addr(mut self, bind_addr: SocketAddr) -> Self {
        self.bind_addr = bind_addr;
        self
    }

    pub fn integration_names(&self) -> Vec<&str> {
        self.integrations.iter().map(|i| i.name()).collect()
    }

    /// Bind the listener and serve in a background task until `signal` resolves
    pub fn start<F>(self, signal: F) -> DevProxyResult<RunningServer>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handler = self.handler.clone();
        let make_service = make_service_fn(move |conn: &AddrStream| {
            let handler = handler.clone();
            let remote = conn.remote_addr();
            async move {
                Ok::<_, Infallible>(service_fn(move |mut req: Request<Body>| {
                    let handler = handler.clone();
                    // Attach remote addr to request extensions
                    req.extensions_mut().insert(remote);
                    async move { handler.handle_request(req).await }
                }))
            }
        });

        let server = Server::try_bind(&self.bind_addr)
            .map_err(|e| DevProxyError::io(format!("Failed to bind {}: {}", self.bind_addr, e)))?
            .serve(make_service);
        let local_addr = server.local_addr();
        info!("Dev server listening on http://{}", local_addr);

        let drain_timeout = self.config.server.get_shutdown_timeout();
        let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
        let graceful = server.with_graceful_shutdown(async move {
            signal.await;
            let _ = signalled_tx.send(());
        });

        let handle = tokio::spawn(async move {
            tokio::pin!(graceful);
            let drain_deadline = async move {
                if signalled_rx.await.is_err() {
                    std::future::pending::<()>().await;
                }
                tokio::time::sleep(drain_timeout).await;
            };

            tokio::select! {
                result = &mut graceful => {
                    if let Err(e) = &result {
                        error!("HTTP server error: {}", e);
                    }
                    result.map_err(DevProxyError::from)
                }
                _ = drain_deadline => {
                    warn!(
                        timeout = ?drain_timeout,
                        "Connections still open after shutdown timeout, closing"
                    );
                    Ok(())
                }
            }
        });

        Ok(RunningServer { local_addr, handle })
    }

    /// Serve in the current task until `signal` resolves
    pub async fn run_until<F>(self, signal: F) -> DevProxyResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.start(signal)?.wait().await
    }
}

/// Handle to a server started with [`DevServer::start`]
pub struct RunningServer {
    local_addr: SocketAddr,
    handle: JoinHandle<DevProxyResult<()>>,
}

impl RunningServer {
    /// Address actually bound; differs from the configured one for port 0
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the server task to finish
    pub async fn wait(self) -> DevProxyResult<()> {
        self.handle
            .await
            .map_err(|e| DevProxyError::internal(format!("Server task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyRuleConfig;

    fn test_config() -> Config {
        let mut config = Config::from_str_with_env("").unwrap();
        config.server.bind = "127.0.0.1:0".parse().unwrap();
        config.proxy.push(ProxyRuleConfig::new("/api", "http://127.0.0.1:8080"));
        config
    }

    #[tokio::test]
    async fn test_dev_server_creation() {
        let mut config = test_config();
        config.integrations = vec!["react".to_string()];

        let server = DevServer::new(config, &IntegrationRegistry::with_builtin()).unwrap();
        assert_eq!(server.bind_addr, "127.0.0.1:0".parse().unwrap());
        assert_eq!(server.integration_names(), vec!["react"]);
    }

    #[tokio::test]
    async fn test_unknown_integration_fails_startup() {
        let mut config = test_config();
        config.integrations = vec!["angular".to_string()];
        assert!(DevServer::new(config, &IntegrationRegistry::with_builtin()).is_err());
    }

    #[tokio::test]
    async fn test_duplicate_prefixes_fail_startup() {
        let mut config = test_config();
        config
            .proxy
            .push(ProxyRuleConfig::new("/api", "http://127.0.0.1:9000"));

        let result = DevServer::new(config, &IntegrationRegistry::new());
        assert!(matches!(result, Err(DevProxyError::Config { .. })));
    }

    #[tokio::test]
    async fn test_missing_static_dir_fails_startup() {
        let mut config = test_config();
        config.server.static_dir = Some("/nonexistent/devproxy-static".into());

        let result = DevServer::new(config, &IntegrationRegistry::new());
        assert!(matches!(result, Err(DevProxyError::Config { .. })));
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let server = DevServer::new(test_config(), &IntegrationRegistry::new()).unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let running = server
            .start(async move {
                let _ = rx.await;
            })
            .unwrap();
        assert_ne!(running.local_addr().port(), 0);

        tx.send(()).unwrap();
        running.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let server = DevServer::new(test_config(), &IntegrationRegistry::new())
            .unwrap()
            .with_bind_addr(taken.local_addr().unwrap());

        let result = server.start(std::future::pending::<()>());
        assert!(matches!(result, Err(DevProxyError::Io { .. })));
    }
}
