use hyper::client::HttpConnector;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION, HOST, ORIGIN};
use hyper::body::HttpBody;
use hyper::{Body, Client, Request, Response, Version};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, warn};

use super::rule::ProxyRule;
use crate::config::HttpClientConfig;
use crate::error::{DevProxyError, DevProxyResult};
use crate::tls::{insecure_client_config, UpstreamTls};

type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Hop-by-hop headers (RFC 7230 section 6.1)
const HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Pooled upstream clients, one per certificate policy.
///
/// - HTTP and HTTPS targets share the same client
/// - Request and response bodies are streamed, never buffered
/// - Every wait on the upstream is bounded by the request timeout: the
///   response headers, then each chunk of the response body
#[derive(Clone)]
pub struct UpstreamClients {
    verified: UpstreamClient,
    insecure: UpstreamClient,
    request_timeout: Duration,
}

impl UpstreamClients {
    pub fn new(config: &HttpClientConfig) -> Self {
        let verified = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(tcp_connector(config));

        let insecure = HttpsConnectorBuilder::new()
            .with_tls_config(insecure_client_config())
            .https_or_http()
            .enable_http1()
            .wrap_connector(tcp_connector(config));

        Self {
            verified: build_client(config, verified),
            insecure: build_client(config, insecure),
            request_timeout: config.get_request_timeout(),
        }
    }

    fn client(&self, tls: UpstreamTls) -> &UpstreamClient {
        match tls {
            UpstreamTls::Verified => &self.verified,
            UpstreamTls::Insecure => &self.insecure,
        }
    }

    /// Forward `req` through `rule` and hand back the upstream response
    pub async fn forward(
        &self,
        req: Request<Body>,
        rule: &ProxyRule,
        client_addr: Option<SocketAddr>,
    ) -> DevProxyResult<Response<Body>> {
        let upstream_req = build_upstream_request(req, rule, client_addr)?;
        debug!(uri = %upstream_req.uri(), "Sending upstream request");

        let client = self.client(UpstreamTls::from_secure(rule.secure()));
        let upstream_res = tokio::time::timeout(self.request_timeout, client.request(upstream_req))
            .await
            .map_err(|_| {
                DevProxyError::timeout(
                    self.request_timeout,
                    format!("upstream request to {}", rule.authority()),
                )
            })??;

        let idle_timeout = self.request_timeout;
        let authority = rule.authority().to_string();
        Ok(build_downstream_response(upstream_res)
            .map(|body| relay_body(body, idle_timeout, authority)))
    }
}

/// Stream `upstream` to the client, aborting when a chunk takes longer than
/// `idle_timeout`. An aborted body closes the client connection early.
fn relay_body(upstream: Body, idle_timeout: Duration, authority: String) -> Body {
    if upstream.is_end_stream() {
        return upstream;
    }

    let (mut sender, relayed) = Body::channel();
    tokio::spawn(async move {
        let mut upstream = upstream;
        loop {
            match tokio::time::timeout(idle_timeout, upstream.data()).await {
                Ok(Some(Ok(chunk))) => {
                    if sender.send_data(chunk).await.is_err() {
                        debug!(upstream = %authority, "Client went away during response body");
                        return;
                    }
                }
                Ok(Some(Err(e))) => {
                    warn!(upstream = %authority, error = %e, "Upstream response body failed");
                    sender.abort();
                    return;
                }
                Ok(None) => {
                    if let Ok(Some(trailers)) = upstream.trailers().await {
                        let _ = sender.send_trailers(trailers).await;
                    }
                    return;
                }
                Err(_) => {
                    warn!(
                        upstream = %authority,
                        timeout = ?idle_timeout,
                        "Upstream response body stalled, aborting"
                    );
                    sender.abort();
                    return;
                }
            }
        }
    });
    relayed
}

fn tcp_connector(config: &HttpClientConfig) -> HttpConnector {
    let mut http = HttpConnector::new();
    http.enforce_http(false); // https URIs go through the TLS wrapper
    http.set_nodelay(true);
    http.set_connect_timeout(Some(config.get_connect_timeout()));
    http
}

fn build_client(
    config: &HttpClientConfig,
    connector: HttpsConnector<HttpConnector>,
) -> UpstreamClient {
    Client::builder()
        .pool_idle_timeout(config.get_pool_idle_timeout())
        .pool_max_idle_per_host(config.get_pool_max_idle_per_host())
        .build::<_, Body>(connector)
}

pub(crate) fn build_upstream_request(
    req: Request<Body>,
    rule: &ProxyRule,
    client_addr: Option<SocketAddr>,
) -> DevProxyResult<Request<Body>> {
    let (mut parts, body) = req.into_parts();

    let original_host = parts.headers.get(HOST).cloned();
    parts.uri = rule.upstream_uri(&parts.uri)?;
    parts.version = Version::HTTP_11;

    strip_hop_by_hop_headers(&mut parts.headers);

    if rule.change_origin() {
        let authority = HeaderValue::from_str(rule.authority().as_str())
            .map_err(|e| DevProxyError::internal(format!("Invalid target host: {}", e)))?;
        parts.headers.insert(HOST, authority);

        if parts.headers.contains_key(ORIGIN) {
            let origin = HeaderValue::from_str(&rule.target_origin())
                .map_err(|e| DevProxyError::internal(format!("Invalid target origin: {}", e)))?;
            parts.headers.insert(ORIGIN, origin);
        }
    }

    if rule.xfwd() {
        add_forwarded_headers(&mut parts.headers, client_addr, original_host);
    }

    Ok(Request::from_parts(parts, body))
}

// Added, never overwritten
fn add_forwarded_headers(
    headers: &mut HeaderMap,
    client_addr: Option<SocketAddr>,
    original_host: Option<HeaderValue>,
) {
    if let Some(addr) = client_addr {
        if let Ok(value) = HeaderValue::from_str(&addr.ip().to_string()) {
            headers.entry("x-forwarded-for").or_insert(value);
        }
    }
    if let Some(host) = original_host {
        headers.entry("x-forwarded-host").or_insert(host);
    }
    headers
        .entry("x-forwarded-proto")
        .or_insert_with(|| HeaderValue::from_static("http"));
}

pub(crate) fn build_downstream_response(upstream: Response<Body>) -> Response<Body> {
    let (mut parts, body) = upstream.into_parts();
    strip_hop_by_hop_headers(&mut parts.headers);
    Response::from_parts(parts, body)
}

#[cfg(test)]
fn is_hop_by_hop_header(name: &str) -> bool {
    HOP_HEADERS.iter().any(|hop| hop.eq_ignore_ascii_case(name))
}

fn strip_hop_by_hop_headers(headers: &mut HeaderMap) {
    // Headers named by Connection are connection-scoped as well
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_HEADERS {
        headers.remove(*name);
    }
}
