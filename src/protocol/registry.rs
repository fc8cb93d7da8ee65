//! Registry of protocol providers, keyed by id

use super::file::FileProvider;
use super::http::{HttpPullProvider, HttpStreamProvider};
use super::traits::{Protocol, ProtocolDescriptor, ProtocolError, ProtocolProvider};
use crate::config::HttpSettings;
use crate::format::{Format, Parser};
use crate::model::{ConfigurationError, ProtocolConfig};
use std::collections::HashSet;
use std::sync::Arc;

/// Known protocols, in registration order.
///
/// Providers are deduplicated by `id()`: the first registration wins.
#[derive(Clone)]
pub struct ProtocolRegistry {
    providers: Vec<Arc<dyn ProtocolProvider>>,
}

impl ProtocolRegistry {
    /// Create a registry with the given providers, deduplicated by id.
    pub fn new(providers: Vec<Arc<dyn ProtocolProvider>>) -> Self {
        let mut seen = HashSet::new();
        let providers = providers
            .into_iter()
            .filter(|p| seen.insert(p.id().to_string()))
            .collect();
        Self { providers }
    }

    pub fn empty() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// `http`, `http_stream`, and `file`.
    pub fn with_defaults(http: &HttpSettings) -> Result<Self, ProtocolError> {
        Ok(Self::new(vec![
            Arc::new(HttpPullProvider::new(http)?),
            Arc::new(HttpStreamProvider::new(http)?),
            Arc::new(FileProvider),
        ]))
    }

    /// Add a provider unless one with the same id is already registered.
    pub fn register(&mut self, provider: Arc<dyn ProtocolProvider>) -> bool {
        if self.get(provider.id()).is_some() {
            return false;
        }
        self.providers.push(provider);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn ProtocolProvider>> {
        self.providers.iter().find(|p| p.id() == id)
    }

    pub fn declared_models(&self) -> Vec<ProtocolDescriptor> {
        self.providers.iter().map(|p| p.declare_model()).collect()
    }

    /// Resolve the provider named by `config` and build an instance.
    pub fn instantiate(
        &self,
        config: &ProtocolConfig,
        parser: Arc<dyn Parser>,
        format: Arc<dyn Format>,
    ) -> Result<Arc<dyn Protocol>, ConfigurationError> {
        let provider = self
            .get(&config.id)
            .ok_or_else(|| ConfigurationError::UnknownProtocol(config.id.clone()))?;
        provider.get_instance(config, parser, format)
    }
}
