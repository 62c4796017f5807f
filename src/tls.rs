//! Upstream TLS settings.
//!
//! Each rule talks to its upstream through one of two client configurations:
//! the default one trusts the bundled web PKI roots, and the one used for
//! rules with `secure = false` accepts any certificate the upstream presents.

use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ClientConfig, ServerName};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// Upstream certificate policy of a forwarding rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamTls {
    /// Verify the certificate chain and host name
    Verified,
    /// Accept self-signed, expired or mismatched certificates
    Insecure,
}

impl UpstreamTls {
    pub fn from_secure(secure: bool) -> Self {
        if secure {
            UpstreamTls::Verified
        } else {
            UpstreamTls::Insecure
        }
    }
}

/// Verifier that accepts every server certificate.
/// Handshake signatures are still checked by rustls.
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        debug!(?server_name, "Skipping upstream certificate verification");
        Ok(ServerCertVerified::assertion())
    }
}

/// Client configuration that skips certificate verification
pub fn insecure_client_config() -> ClientConfig {
    ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
        .with_no_client_auth()
}
