//! # Resolver Configuration
//!
//! Settings that drive the metadata resolution engine.
//!
//! ## Overview
//!
//! The configuration uses a builder pattern to construct a [`ResolverConfig`]
//! and validates it before handing it out, so a misconfigured run fails at
//! startup rather than halfway through a batch. Values can also be loaded
//! from `GAMEMETA_*` environment variables with [`ResolverConfig::from_env`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{ResolverConfig, SourceTuning};
//! use std::time::Duration;
//!
//! let config = ResolverConfig::builder()
//!     .user_agent("gamemeta/0.1 (collection tracker)")
//!     .request_timeout(Duration::from_secs(15))
//!     .catalog_api_key("your_api_key")
//!     .source("bing-images", SourceTuning::disabled())
//!     .build()?;
//! ```
//!
//! ## Security Note
//!
//! API keys are never hardcoded. Load them from the environment or a host
//! secret store. The `Debug` output of every config type redacts them.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Shortest per-request timeout accepted.
pub const MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// Longest per-request timeout accepted.
pub const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_CATALOG_BASE_URL: &str = "https://api.thegamesdb.net";
const MAX_DELAY_MS: u64 = 60_000;

/// Connection settings for the structured catalog API.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CatalogApiConfig {
    /// API key; the catalog source is skipped when absent
    pub api_key: Option<String>,
    /// Base URL without trailing slash
    pub base_url: String,
}

impl CatalogApiConfig {
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_CATALOG_BASE_URL.to_string(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Checks if an API key is configured
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl fmt::Debug for CatalogApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogApiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Per-source overrides. `None` keeps the source's built-in default.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTuning {
    pub enabled: bool,
    /// Upper bound on title variants tried against this source
    pub max_variants: Option<usize>,
    /// Minimum score a candidate needs to be accepted
    pub acceptance_threshold: Option<f64>,
    /// Minimum spacing between two requests to this source
    pub min_delay_ms: Option<u64>,
}

impl Default for SourceTuning {
    fn default() -> Self {
        Self {
            enabled: true,
            max_variants: None,
            acceptance_threshold: None,
            min_delay_ms: None,
        }
    }
}

impl SourceTuning {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_max_variants(mut self, max_variants: usize) -> Self {
        self.max_variants = Some(max_variants);
        self
    }

    pub fn with_acceptance_threshold(mut self, threshold: f64) -> Self {
        self.acceptance_threshold = Some(threshold);
        self
    }

    pub fn with_min_delay_ms(mut self, delay_ms: u64) -> Self {
        self.min_delay_ms = Some(delay_ms);
        self
    }
}

/// Settings for one resolver instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    /// Identifying client string sent with every request
    pub user_agent: String,

    /// Per-request timeout, between 5 and 30 seconds
    pub request_timeout: Duration,

    /// Minimum spacing between two requests to the same source
    pub inter_request_delay_ms: u64,

    /// Delay before retrying after a transient failure
    pub transient_backoff_ms: u64,

    /// Pause between two records in batch mode
    pub inter_query_delay_ms: u64,

    /// Rate-limit responses tolerated from a source before it is disabled for the run
    pub rate_limit_strikes: u32,

    /// Structured catalog API settings
    pub catalog: CatalogApiConfig,

    /// Overrides keyed by source id
    pub sources: HashMap<String, SourceTuning>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("gamemeta/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout: Duration::from_secs(15),
            inter_request_delay_ms: 1000,
            transient_backoff_ms: 3000,
            inter_query_delay_ms: 1500,
            rate_limit_strikes: 2,
            catalog: CatalogApiConfig::new(),
            sources: HashMap::new(),
        }
    }
}

impl ResolverConfig {
    /// Creates a new builder for constructing a `ResolverConfig`.
    pub fn builder() -> ResolverConfigBuilder {
        ResolverConfigBuilder::default()
    }

    /// Builds a config from `GAMEMETA_*` environment variables.
    ///
    /// Recognized variables:
    /// - `GAMEMETA_CATALOG_API_KEY`
    /// - `GAMEMETA_CATALOG_BASE_URL`
    /// - `GAMEMETA_USER_AGENT`
    /// - `GAMEMETA_REQUEST_TIMEOUT_SECS`
    /// - `GAMEMETA_REQUEST_DELAY_MS`
    /// - `GAMEMETA_INTER_QUERY_DELAY_MS`
    /// - `GAMEMETA_DISABLED_SOURCES` (comma separated source ids)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(key) = lookup("GAMEMETA_CATALOG_API_KEY").filter(|v| !v.trim().is_empty()) {
            builder = builder.catalog_api_key(key);
        }
        if let Some(url) = lookup("GAMEMETA_CATALOG_BASE_URL") {
            builder = builder.catalog_base_url(url);
        }
        if let Some(ua) = lookup("GAMEMETA_USER_AGENT") {
            builder = builder.user_agent(ua);
        }
        if let Some(secs) = lookup("GAMEMETA_REQUEST_TIMEOUT_SECS") {
            let secs = parse_number("GAMEMETA_REQUEST_TIMEOUT_SECS", &secs)?;
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(ms) = lookup("GAMEMETA_REQUEST_DELAY_MS") {
            builder = builder.inter_request_delay_ms(parse_number("GAMEMETA_REQUEST_DELAY_MS", &ms)?);
        }
        if let Some(ms) = lookup("GAMEMETA_INTER_QUERY_DELAY_MS") {
            builder =
                builder.inter_query_delay_ms(parse_number("GAMEMETA_INTER_QUERY_DELAY_MS", &ms)?);
        }
        if let Some(list) = lookup("GAMEMETA_DISABLED_SOURCES") {
            for id in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                builder = builder.source(id, SourceTuning::disabled());
            }
        }

        builder.build()
    }

    /// Tuning for a source, falling back to an all-default entry.
    pub fn tuning(&self, source_id: &str) -> SourceTuning {
        self.sources.get(source_id).cloned().unwrap_or_default()
    }

    /// Whether the source has not been switched off.
    pub fn is_source_enabled(&self, source_id: &str) -> bool {
        self.sources.get(source_id).map_or(true, |t| t.enabled)
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - User agent is not empty
    /// - Request timeout lies within 5..=30 seconds
    /// - Delays are below one minute and the transient backoff is not
    ///   shorter than the regular spacing
    /// - At least one rate-limit strike is allowed
    /// - Per-source overrides are sane
    pub fn validate(&self) -> Result<()> {
        if self.user_agent.trim().is_empty() {
            return Err(Error::Config("User agent cannot be empty".to_string()));
        }

        if self.request_timeout < MIN_REQUEST_TIMEOUT || self.request_timeout > MAX_REQUEST_TIMEOUT {
            return Err(Error::Config(format!(
                "Request timeout must be between {}s and {}s, got {}s",
                MIN_REQUEST_TIMEOUT.as_secs(),
                MAX_REQUEST_TIMEOUT.as_secs(),
                self.request_timeout.as_secs_f32()
            )));
        }

        for (name, value) in [
            ("Inter-request delay", self.inter_request_delay_ms),
            ("Transient backoff", self.transient_backoff_ms),
            ("Inter-query delay", self.inter_query_delay_ms),
        ] {
            if value > MAX_DELAY_MS {
                return Err(Error::Config(format!(
                    "{} exceeds maximum of 60 seconds (60,000ms)",
                    name
                )));
            }
        }

        if self.transient_backoff_ms < self.inter_request_delay_ms {
            return Err(Error::Config(
                "Transient backoff must be at least the inter-request delay".to_string(),
            ));
        }

        if self.rate_limit_strikes == 0 {
            return Err(Error::Config(
                "Rate limit strikes must be at least 1".to_string(),
            ));
        }

        if self.catalog.base_url.trim().is_empty() {
            return Err(Error::Config("Catalog base URL cannot be empty".to_string()));
        }

        for (id, tuning) in &self.sources {
            if tuning.max_variants == Some(0) {
                return Err(Error::Config(format!(
                    "Source '{}' must allow at least one title variant",
                    id
                )));
            }
            if let Some(threshold) = tuning.acceptance_threshold {
                if !threshold.is_finite() || threshold < 0.0 {
                    return Err(Error::Config(format!(
                        "Source '{}' acceptance threshold must be a non-negative number",
                        id
                    )));
                }
            }
            if tuning.min_delay_ms.is_some_and(|ms| ms > MAX_DELAY_MS) {
                return Err(Error::Config(format!(
                    "Source '{}' delay exceeds maximum of 60 seconds",
                    id
                )));
            }
        }

        Ok(())
    }
}

fn parse_number(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{} must be a whole number, got '{}'", name, raw)))
}

/// Builder for [`ResolverConfig`].
#[derive(Default)]
pub struct ResolverConfigBuilder {
    config: Option<ResolverConfig>,
}

impl ResolverConfigBuilder {
    fn inner(&mut self) -> &mut ResolverConfig {
        self.config.get_or_insert_with(ResolverConfig::default)
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.inner().user_agent = user_agent.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.inner().request_timeout = timeout;
        self
    }

    pub fn inter_request_delay_ms(mut self, delay_ms: u64) -> Self {
        self.inner().inter_request_delay_ms = delay_ms;
        self
    }

    pub fn transient_backoff_ms(mut self, delay_ms: u64) -> Self {
        self.inner().transient_backoff_ms = delay_ms;
        self
    }

    pub fn inter_query_delay_ms(mut self, delay_ms: u64) -> Self {
        self.inner().inter_query_delay_ms = delay_ms;
        self
    }

    pub fn rate_limit_strikes(mut self, strikes: u32) -> Self {
        self.inner().rate_limit_strikes = strikes;
        self
    }

    /// Zero out every delay. Intended for tests and dry runs against fixtures.
    pub fn without_delays(mut self) -> Self {
        let config = self.inner();
        config.inter_request_delay_ms = 0;
        config.transient_backoff_ms = 0;
        config.inter_query_delay_ms = 0;
        self
    }

    pub fn catalog(mut self, catalog: CatalogApiConfig) -> Self {
        self.inner().catalog = catalog;
        self
    }

    pub fn catalog_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.inner().catalog.api_key = Some(api_key.into());
        self
    }

    pub fn catalog_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.inner().catalog.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override tuning for one source id.
    pub fn source(mut self, source_id: impl Into<String>, tuning: SourceTuning) -> Self {
        self.inner().sources.insert(source_id.into(), tuning);
        self
    }

    /// Builds and validates the final `ResolverConfig`.
    pub fn build(mut self) -> Result<ResolverConfig> {
        let config = self.config.take().unwrap_or_default();
        config.validate()?;
        Ok(config)
    }
}
