use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Body, Request, Response, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::http_client::UpstreamClients;
use super::rule::ProxyRules;
use crate::error::DevProxyError;
use crate::static_files::LocalHandler;

/// Per-request dispatcher: matching rule → upstream, anything else → local handler
#[derive(Clone)]
pub struct ProxyHandler {
    rules: Arc<ProxyRules>,
    clients: UpstreamClients,
    local: Arc<LocalHandler>,
}

impl ProxyHandler {
    pub fn new(rules: Arc<ProxyRules>, clients: UpstreamClients, local: Arc<LocalHandler>) -> Self {
        Self {
            rules,
            clients,
            local,
        }
    }

    pub async fn handle_request(&self, req: Request<Body>) -> Result<Response<Body>, Infallible> {
        let request_id = Uuid::new_v4();
        let start = Instant::now();
        let client_addr = req.extensions().get::<SocketAddr>().copied();
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let Some(rule) = self.rules.find(&path) else {
            debug!(%request_id, %method, %path, "No proxy rule matched, serving locally");
            return Ok(self.local.serve(req).await);
        };

        let host = req
            .headers()
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        debug!(%request_id, %host, prefix = rule.path_prefix(), "Proxy rule matched");

        match self.clients.forward(req, rule, client_addr).await {
            Ok(response) => {
                info!(
                    %request_id,
                    %method,
                    %path,
                    target = %rule.authority(),
                    status = response.status().as_u16(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Proxied request"
                );
                Ok(response)
            }
            Err(e) if e.is_gateway_failure() => {
                warn!(
                    %request_id,
                    %method,
                    %path,
                    target = %rule.authority(),
                    error = %e,
                    "Upstream request failed"
                );
                Ok(error_response(&e))
            }
            Err(e) => {
                error!(%request_id, %method, %path, error = %e, "Failed to forward request");
                Ok(error_response(&e))
            }
        }
    }
}

/// Plain-text response for a request that could not be completed
pub fn error_response(err: &DevProxyError) -> Response<Body> {
    let status = err.status_code();
    let reason = status.canonical_reason().unwrap_or("Error");
    let mut response = Response::new(Body::from(format!("{}: {}", reason, err)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Plain-text response with just a status line body
pub fn status_response(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::from(
        status.canonical_reason().unwrap_or("Error").to_string(),
    ));
    *response.status_mut() = status;
    response
}
