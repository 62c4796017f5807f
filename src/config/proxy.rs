use hyper::Uri;
use serde::{Deserialize, Serialize};

use crate::error::{DevProxyError, DevProxyResult};

/// One `[[proxy]]` table from the configuration file
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ProxyRuleConfig {
    /// Requests whose path starts with this prefix are forwarded
    pub path_prefix: String,
    /// Upstream origin, e.g. `http://127.0.0.1:8080`
    pub target: String,
    /// Rewrite `Host` and `Origin` to the target before forwarding
    #[serde(default)]
    pub change_origin: bool,
    /// Verify the upstream TLS certificate
    #[serde(default = "default_secure")]
    pub secure: bool,
    /// Remove `path_prefix` from the forwarded path
    #[serde(default)]
    pub strip_prefix: bool,
    /// Add `X-Forwarded-For`, `X-Forwarded-Host` and `X-Forwarded-Proto`
    #[serde(default)]
    pub xfwd: bool,
}

fn default_secure() -> bool {
    true
}

impl ProxyRuleConfig {
    pub fn new<P: Into<String>, T: Into<String>>(path_prefix: P, target: T) -> Self {
        Self {
            path_prefix: path_prefix.into(),
            target: target.into(),
            change_origin: false,
            secure: true,
            strip_prefix: false,
            xfwd: false,
        }
    }

    /// Check the prefix shape and parse the target origin
    pub fn validate(&self) -> DevProxyResult<Uri> {
        let prefix = &self.path_prefix;
        if prefix.is_empty() {
            return Err(DevProxyError::config("proxy path_prefix must not be empty"));
        }
        if !prefix.starts_with('/') {
            return Err(DevProxyError::config(format!(
                "proxy path_prefix '{}' must start with '/'",
                prefix
            )));
        }
        if prefix.contains(['?', '#']) {
            return Err(DevProxyError::config(format!(
                "proxy path_prefix '{}' must be a bare path",
                prefix
            )));
        }

        parse_target_origin(&self.target)
    }
}

/// Parse an upstream origin. Only scheme, host and port are accepted.
pub fn parse_target_origin(target: &str) -> DevProxyResult<Uri> {
    let uri: Uri = target
        .parse()
        .map_err(|e| DevProxyError::config(format!("Invalid proxy target '{}': {}", target, e)))?;

    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        Some(other) => {
            return Err(DevProxyError::config(format!(
                "proxy target '{}' uses unsupported scheme '{}'",
                target, other
            )))
        }
        None => {
            return Err(DevProxyError::config(format!(
                "proxy target '{}' is missing a scheme",
                target
            )))
        }
    }

    let has_host = uri.authority().is_some_and(|a| !a.host().is_empty());
    if !has_host {
        return Err(DevProxyError::config(format!(
            "proxy target '{}' is missing a host",
            target
        )));
    }

    if let Some(pq) = uri.path_and_query() {
        if (pq.path() != "/" && !pq.path().is_empty()) || pq.query().is_some() {
            return Err(DevProxyError::config(format!(
                "proxy target '{}' must be an origin without a path or query",
                target
            )));
        }
    }

    Ok(uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_rule() {
        let rule = ProxyRuleConfig::new("/api", "http://127.0.0.1:8080");
        let uri = rule.validate().unwrap();
        assert_eq!(uri.scheme_str(), Some("http"));
        assert_eq!(uri.authority().unwrap().as_str(), "127.0.0.1:8080");

        let rule = ProxyRuleConfig::new("/api", "https://backend.test/");
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn test_bad_prefixes_rejected() {
        for prefix in ["", "api", "/api?x=1", "/api#top"] {
            let rule = ProxyRuleConfig::new(prefix, "http://127.0.0.1:8080");
            assert!(rule.validate().is_err(), "prefix {:?} should fail", prefix);
        }
    }

    #[test]
    fn test_bad_targets_rejected() {
        for target in [
            "127.0.0.1:8080",
            "ftp://127.0.0.1",
            "/relative",
            "http://127.0.0.1:8080/base",
            "http://127.0.0.1:8080/?a=b",
            "not a uri",
        ] {
            assert!(
                parse_target_origin(target).is_err(),
                "target {:?} should fail",
                target
            );
        }
    }

    #[test]
    fn test_serde_defaults() {
        let rule: ProxyRuleConfig = toml::from_str(
            r#"
path_prefix = "/api"
target = "http://127.0.0.1:8080"
"#,
        )
        .unwrap();
        assert!(!rule.change_origin);
        assert!(rule.secure);
        assert!(!rule.strip_prefix);
        assert!(!rule.xfwd);
    }
}
