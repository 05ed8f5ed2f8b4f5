//! Ordered list of sources consulted by the orchestrator.

use super::catalog::StructuredCatalogAdapter;
use super::field_scrape::{FieldScrapeProfile, SingleFieldScrapeAdapter};
use super::image_search::GenericImageSearchAdapter;
use super::search_scrape::SearchScrapeAdapter;
use super::SourceAdapter;
use bridge_traits::http::HttpClient;
use core_library::MetadataField;
use core_runtime::config::ResolverConfig;
use std::sync::Arc;
use tracing::{info, warn};

/// Sources in priority order. For every field, the first registered source
/// supporting it is consulted first.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the default source order from configuration.
    ///
    /// The catalog is skipped without an API key. Sources disabled in
    /// configuration are never registered.
    pub fn from_config(http: Arc<dyn HttpClient>, config: &ResolverConfig) -> Self {
        let mut registry = Self::new();

        if let Some(adapter) = StructuredCatalogAdapter::from_config(http.clone(), config) {
            registry.register_enabled(config, Arc::new(adapter));
        }

        registry.register_enabled(
            config,
            Arc::new(SearchScrapeAdapter::from_config(http.clone(), config)),
        );

        match GenericImageSearchAdapter::from_config(http.clone(), config) {
            Ok(adapter) => registry.register_enabled(config, Arc::new(adapter)),
            Err(e) => warn!(error = %e, "Image search source unavailable"),
        }

        for profile in [FieldScrapeProfile::metacritic(), FieldScrapeProfile::pricecharting()] {
            registry.register_enabled(
                config,
                Arc::new(SingleFieldScrapeAdapter::from_config(http.clone(), config, profile)),
            );
        }

        info!(sources = ?registry.ids(), "Source registry ready");
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.push(adapter);
    }

    pub fn with_source(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.register(adapter);
        self
    }

    fn register_enabled(&mut self, config: &ResolverConfig, adapter: Arc<dyn SourceAdapter>) {
        if config.is_source_enabled(adapter.id()) {
            self.register(adapter);
        } else {
            info!(source = adapter.id(), "Source disabled by configuration");
        }
    }

    /// Sources able to produce `field`, in priority order.
    pub fn sources_for(&self, field: MetadataField) -> Vec<Arc<dyn SourceAdapter>> {
        self.adapters
            .iter()
            .filter(|adapter| adapter.supports(field))
            .cloned()
            .collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
