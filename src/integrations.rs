//! Build-tool integrations.
//!
//! An integration is an extension point the dev server calls once at
//! startup. Integrations are looked up by the names listed in the
//! `integrations` configuration key; the behavior behind a name belongs to
//! the integration itself.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::error::{DevProxyError, DevProxyResult};

/// Capability interface for a build-tool integration
pub trait Integration: Send + Sync {
    fn name(&self) -> &str;

    /// Called once, after configuration is loaded and before the listener binds
    fn on_startup(&self, _config: &Config) -> DevProxyResult<()> {
        Ok(())
    }
}

/// Integration that only records its registration
#[derive(Debug, Clone)]
pub struct NamedIntegration {
    name: String,
}

impl NamedIntegration {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

impl Integration for NamedIntegration {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Known integrations, keyed by name
#[derive(Clone, Default)]
pub struct IntegrationRegistry {
    known: BTreeMap<String, Arc<dyn Integration>>,
}

impl IntegrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the UI framework names the dev server accepts
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for name in ["react", "preact", "vue", "svelte", "solid-js"] {
            registry.register(Arc::new(NamedIntegration::new(name)));
        }
        registry
    }

    /// Add or replace an integration
    pub fn register(&mut self, integration: Arc<dyn Integration>) {
        self.known.insert(integration.name().to_string(), integration);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Integration>> {
        self.known.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.known.keys().map(String::as_str)
    }

    /// Resolve the configured names and run their startup hooks in order
    pub fn activate(&self, config: &Config) -> DevProxyResult<Vec<Arc<dyn Integration>>> {
        let mut active = Vec::with_capacity(config.integrations.len());

        for name in &config.integrations {
            let integration = self.get(name).ok_or_else(|| {
                let known: Vec<&str> = self.names().collect();
                DevProxyError::integration(
                    name.as_str(),
                    format!("not registered (known: {})", known.join(", ")),
                )
            })?;
            integration.on_startup(config)?;
            info!(integration = %name, "Integration registered");
            active.push(integration);
        }

        Ok(active)
    }
}
