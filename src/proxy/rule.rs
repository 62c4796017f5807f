use hyper::http::uri::{Authority, PathAndQuery, Scheme};
use hyper::Uri;

use crate::config::ProxyRuleConfig;
use crate::error::{DevProxyError, DevProxyResult};

/// A validated forwarding rule. Immutable once built.
#[derive(Debug, Clone)]
pub struct ProxyRule {
    path_prefix: String,
    scheme: Scheme,
    authority: Authority,
    change_origin: bool,
    secure: bool,
    strip_prefix: bool,
    xfwd: bool,
}

impl ProxyRule {
    pub fn from_config(config: &ProxyRuleConfig) -> DevProxyResult<Self> {
        let target = config.validate()?;
        let parts = target.into_parts();

        let scheme = parts
            .scheme
            .ok_or_else(|| DevProxyError::config("proxy target is missing a scheme"))?;
        let authority = parts
            .authority
            .ok_or_else(|| DevProxyError::config("proxy target is missing a host"))?;

        Ok(Self {
            path_prefix: config.path_prefix.clone(),
            scheme,
            authority,
            change_origin: config.change_origin,
            secure: config.secure,
            strip_prefix: config.strip_prefix,
            xfwd: config.xfwd,
        })
    }

    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn change_origin(&self) -> bool {
        self.change_origin
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn strip_prefix(&self) -> bool {
        self.strip_prefix
    }

    pub fn xfwd(&self) -> bool {
        self.xfwd
    }

    pub fn is_https(&self) -> bool {
        self.scheme == Scheme::HTTPS
    }

    /// `scheme://authority`, the value written to `Origin` when rewriting
    pub fn target_origin(&self) -> String {
        format!("{}://{}", self.scheme, self.authority)
    }

    /// Literal prefix test on the path. Query and fragment never take part.
    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.path_prefix)
    }

    /// Absolute upstream URI for an incoming request URI
    pub fn upstream_uri(&self, incoming: &Uri) -> DevProxyResult<Uri> {
        let path = incoming.path();
        let path = if self.strip_prefix {
            match path.strip_prefix(self.path_prefix.as_str()) {
                Some(rest) if rest.starts_with('/') => rest,
                Some(rest) if rest.is_empty() => "/",
                Some(rest) => return self.join_stripped(rest, incoming.query()),
                None => path,
            }
        } else {
            path
        };

        let path_and_query = match incoming.query() {
            Some(query) => format!("{}?{}", path, query),
            None => path.to_string(),
        };

        self.build_uri(&path_and_query)
    }

    // A prefix that ends mid-segment (`/api` on `/apix`) leaves a relative remainder
    fn join_stripped(&self, rest: &str, query: Option<&str>) -> DevProxyResult<Uri> {
        let path_and_query = match query {
            Some(query) => format!("/{}?{}", rest, query),
            None => format!("/{}", rest),
        };
        self.build_uri(&path_and_query)
    }

    fn build_uri(&self, path_and_query: &str) -> DevProxyResult<Uri> {
        let path_and_query: PathAndQuery = path_and_query
            .parse()
            .map_err(|e| DevProxyError::internal(format!("Invalid upstream path: {}", e)))?;

        Ok(Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()?)
    }
}

/// Ordered set of rules consulted for every request
#[derive(Debug, Clone, Default)]
pub struct ProxyRules {
    rules: Vec<ProxyRule>,
}

impl ProxyRules {
    /// Validate every rule. A prefix may appear only once.
    pub fn from_configs(configs: &[ProxyRuleConfig]) -> DevProxyResult<Self> {
        let mut rules: Vec<ProxyRule> = Vec::with_capacity(configs.len());
        for config in configs {
            let rule = ProxyRule::from_config(config)?;
            if rules.iter().any(|r| r.path_prefix == rule.path_prefix) {
                return Err(DevProxyError::config(format!(
                    "duplicate proxy path_prefix '{}'",
                    rule.path_prefix
                )));
            }
            rules.push(rule);
        }
        Ok(Self { rules })
    }

    /// Longest matching prefix wins. On a tie the earlier rule wins.
    pub fn find(&self, path: &str) -> Option<&ProxyRule> {
        self.rules
            .iter()
            .filter(|rule| rule.matches(path))
            .fold(None, |best: Option<&ProxyRule>, rule| match best {
                Some(b) if b.path_prefix.len() >= rule.path_prefix.len() => Some(b),
                _ => Some(rule),
            })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProxyRule> {
        self.rules.iter()
    }
}
