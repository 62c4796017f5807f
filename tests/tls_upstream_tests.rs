use devproxy::config::{Config, HttpClientConfig, ProxyRuleConfig};
use devproxy::integrations::IntegrationRegistry;
use devproxy::proxy::DevServer;
use hyper::header::HOST;
use hyper::server::conn::Http;
use hyper::service::service_fn;
use hyper::{Body, Client, Request, Response, StatusCode};
use rcgen::CertifiedKey;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_rustls::TlsAcceptor;

/// HTTPS upstream presenting a freshly generated self-signed certificate
async fn start_self_signed_upstream() -> SocketAddr {
    let CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_chain = vec![rustls::Certificate(cert.der().to_vec())];
    let key = rustls::PrivateKey(key_pair.serialize_der());

    let server_config = rustls::ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(server_config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let Ok(tls_stream) = acceptor.accept(stream).await else {
                    return;
                };
                let service = service_fn(|req: Request<Body>| async move {
                    let host = req
                        .headers()
                        .get(HOST)
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    Ok::<_, Infallible>(Response::new(Body::from(format!(
                        "{} via {}",
                        req.uri().path(),
                        host
                    ))))
                });
                let _ = Http::new().serve_connection(tls_stream, service).await;
            });
        }
    });

    addr
}

async fn proxy_get(rule: ProxyRuleConfig, path: &str) -> (StatusCode, String) {
    let mut config = Config::from_str_with_env("").unwrap();
    config.server.bind = "127.0.0.1:0".parse().unwrap();
    config.proxy.push(rule);
    config.http_client = Some(HttpClientConfig {
        connect_timeout: Some(2),
        request_timeout: Some(5),
        ..Default::default()
    });

    let server = DevServer::new(config, &IntegrationRegistry::new()).unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    let running = server
        .start(async move {
            let _ = rx.await;
        })
        .unwrap();

    let url = format!("http://{}{}", running.local_addr(), path);
    let res = Client::new()
        .request(Request::get(url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = res.status();
    let bytes = hyper::body::to_bytes(res.into_body()).await.unwrap();

    let _ = tx.send(());
    running.wait().await.unwrap();

    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_insecure_rule_accepts_self_signed_upstream() {
    let upstream = start_self_signed_upstream().await;

    let mut rule = ProxyRuleConfig::new("/api", format!("https://{}", upstream));
    rule.secure = false;
    rule.change_origin = true;

    let (status, body) = proxy_get(rule, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, format!("/api/health via {}", upstream));
}

#[tokio::test]
async fn test_secure_rule_rejects_self_signed_upstream() {
    let upstream = start_self_signed_upstream().await;

    let mut rule = ProxyRuleConfig::new("/api", format!("https://{}", upstream));
    rule.secure = true;

    let (status, _) = proxy_get(rule, "/api/health").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_insecure_flag_is_harmless_for_plain_http() {
    let backend = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::path("/api/plain"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("plain"))
        .mount(&backend)
        .await;

    let mut rule = ProxyRuleConfig::new("/api", backend.uri());
    rule.secure = false;

    let (status, body) = proxy_get(rule, "/api/plain").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "plain");
}
