//! Metadata sources.
//!
//! Every external site sits behind [`SourceAdapter`]. The orchestrator only
//! sees candidates and classified failures; URLs, payload shapes and HTML
//! selectors stay inside the adapter and its profile.
//!
//! ## Sources
//!
//! - [`catalog::StructuredCatalogAdapter`] - JSON catalog API (search + detail)
//! - [`search_scrape::SearchScrapeAdapter`] - HTML search page, detail page asset
//! - [`image_search::GenericImageSearchAdapter`] - first image of an image search
//! - [`field_scrape::SingleFieldScrapeAdapter`] - one value scraped from a page

pub mod catalog;
pub mod field_scrape;
pub mod html;
pub mod image_search;
pub mod registry;
pub mod release_date;
pub mod search_scrape;
pub mod transport;

use crate::platform::PlatformNamespace;
use crate::query::Candidate;
use async_trait::async_trait;
use bridge_traits::error::BridgeError;
use bridge_traits::http::HttpResponse;
use core_library::MetadataField;
use core_runtime::config::ResolverConfig;
use core_runtime::logging::redact_url_secrets;
use std::time::Duration;
use thiserror::Error;

pub use registry::SourceRegistry;
pub use transport::SourceTransport;

/// Why a source call produced no candidates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceFailure {
    /// Timeout, connection failure or 5xx; worth one retry
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },

    /// The account allowance is used up for the rest of the run
    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("authorization rejected: {0}")]
    Auth(String),

    #[error("no match")]
    NoMatch,

    /// Unexpected payload; logged and treated like no match
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl SourceFailure {
    /// The source should not be called again during this run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SourceFailure::Auth(_) | SourceFailure::QuotaExhausted(_))
    }
}

/// Bridge messages may quote the request URL; query credentials are masked
/// before the failure is logged or surfaced.
impl From<BridgeError> for SourceFailure {
    fn from(err: BridgeError) -> Self {
        let message = redact_url_secrets(&err.to_string());
        if err.is_transient() {
            SourceFailure::Transient(message)
        } else {
            SourceFailure::Malformed(message)
        }
    }
}

/// Map a non-success HTTP status to a failure. `Ok(())` for 2xx.
///
/// 401/403 are reported as [`SourceFailure::Auth`]; sources that can tell a
/// quota payload apart inspect the body before calling this.
pub fn classify_status(response: &HttpResponse) -> Result<(), SourceFailure> {
    match response.status {
        200..=299 => Ok(()),
        404 | 410 => Err(SourceFailure::NoMatch),
        429 => Err(SourceFailure::RateLimited {
            retry_after: parse_retry_after(response),
        }),
        401 | 403 => Err(SourceFailure::Auth(format!("HTTP {}", response.status))),
        408 | 500..=599 => Err(SourceFailure::Transient(format!(
            "HTTP {}",
            response.status
        ))),
        status => Err(SourceFailure::Malformed(format!("unexpected HTTP {}", status))),
    }
}

/// `Retry-After` in delta-seconds form.
pub fn parse_retry_after(response: &HttpResponse) -> Option<Duration> {
    response
        .header("Retry-After")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    StructuredCatalog,
    SearchScrape,
    ImageSearch,
    FieldScrape,
}

/// Which title variant list a source is fed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantStyle {
    /// [`crate::normalizer::variants`]
    Catalog,
    /// [`crate::normalizer::scrape_variants`]
    Scrape,
}

/// The platform of a query as seen by one source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlatformTarget {
    /// Canonical platform name when the free text was recognized
    pub canonical: Option<&'static str>,
    /// Id or slug in the source's own namespace
    pub id: Option<String>,
}

/// Per-source limits, merged from built-in defaults and configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    pub max_variants: usize,
    /// `None` accepts the first candidate unconditionally
    pub acceptance_threshold: Option<f64>,
    pub min_delay: Duration,
    pub transient_backoff: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl SourceSettings {
    pub fn new(max_variants: usize, acceptance_threshold: Option<f64>) -> Self {
        Self {
            max_variants,
            acceptance_threshold,
            min_delay: Duration::ZERO,
            transient_backoff: Duration::ZERO,
            request_timeout: Duration::from_secs(15),
            user_agent: concat!("gamemeta/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Apply global settings and the per-source override for `source_id`.
    pub fn from_config(
        config: &ResolverConfig,
        source_id: &str,
        max_variants: usize,
        acceptance_threshold: Option<f64>,
    ) -> Self {
        let tuning = config.tuning(source_id);
        Self {
            max_variants: tuning.max_variants.unwrap_or(max_variants),
            acceptance_threshold: tuning.acceptance_threshold.or(acceptance_threshold),
            min_delay: Duration::from_millis(
                tuning.min_delay_ms.unwrap_or(config.inter_request_delay_ms),
            ),
            transient_backoff: Duration::from_millis(config.transient_backoff_ms),
            request_timeout: config.request_timeout,
            user_agent: config.user_agent.clone(),
        }
    }

    pub fn with_min_delay(mut self, delay: Duration) -> Self {
        self.min_delay = delay;
        self
    }

    pub fn with_transient_backoff(mut self, delay: Duration) -> Self {
        self.transient_backoff = delay;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// One external metadata source.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable id used in configuration, logs and results
    fn id(&self) -> &str;

    fn kind(&self) -> SourceKind;

    fn supports(&self, field: MetadataField) -> bool;

    fn variant_style(&self) -> VariantStyle;

    /// How many title variants the orchestrator may try
    fn max_variants(&self) -> usize;

    /// Minimum score for a candidate; `None` accepts the first candidate
    fn acceptance_threshold(&self) -> Option<f64>;

    /// Namespace for [`PlatformTarget::id`]; `None` when platforms are ignored
    fn platform_namespace(&self) -> Option<PlatformNamespace>;

    /// Search the source for one title variant.
    async fn attempt(
        &self,
        variant: &str,
        platform: &PlatformTarget,
        field: MetadataField,
    ) -> Result<Vec<Candidate>, SourceFailure>;

    /// Fetch the field value for a selected candidate.
    ///
    /// The default returns the value the search step already extracted.
    async fn complete(
        &self,
        candidate: &Candidate,
        _field: MetadataField,
    ) -> Result<Option<String>, SourceFailure> {
        Ok(candidate.extracted_value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::collections::HashMap;

    fn response(status: u16, headers: &[(&str, &str)]) -> HttpResponse {
        HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            body: Bytes::new(),
        }
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(&response(200, &[])), Ok(()));
        assert_eq!(
            classify_status(&response(404, &[])),
            Err(SourceFailure::NoMatch)
        );
        assert!(matches!(
            classify_status(&response(403, &[])),
            Err(SourceFailure::Auth(_))
        ));
        assert!(matches!(
            classify_status(&response(503, &[])),
            Err(SourceFailure::Transient(_))
        ));
        assert!(matches!(
            classify_status(&response(400, &[])),
            Err(SourceFailure::Malformed(_))
        ));
    }

    #[test]
    fn test_rate_limit_reads_retry_after() {
        assert_eq!(
            classify_status(&response(429, &[("retry-after", "7")])),
            Err(SourceFailure::RateLimited {
                retry_after: Some(Duration::from_secs(7))
            })
        );
        assert_eq!(
            classify_status(&response(429, &[("Retry-After", "Wed, 21 Oct 2015 07:28:00 GMT")])),
            Err(SourceFailure::RateLimited { retry_after: None })
        );
    }

    #[test]
    fn test_terminal_failures() {
        assert!(SourceFailure::Auth("401".into()).is_terminal());
        assert!(SourceFailure::QuotaExhausted("0 left".into()).is_terminal());
        assert!(!SourceFailure::RateLimited { retry_after: None }.is_terminal());
        assert!(!SourceFailure::Transient("timeout".into()).is_terminal());
        assert!(!SourceFailure::NoMatch.is_terminal());
    }

    #[test]
    fn test_bridge_errors_map_by_transience() {
        let timeout: SourceFailure = BridgeError::Timeout("15s".into()).into();
        assert!(matches!(timeout, SourceFailure::Transient(_)));

        let tls: SourceFailure = BridgeError::TlsVerification {
            host: "example.com".into(),
            message: "bad cert".into(),
        }
        .into();
        assert!(matches!(tls, SourceFailure::Transient(_)));

        let other: SourceFailure = BridgeError::OperationFailed("bad url".into()).into();
        assert!(matches!(other, SourceFailure::Malformed(_)));
    }

    #[test]
    fn test_settings_follow_config_overrides() {
        use core_runtime::config::SourceTuning;

        let config = ResolverConfig::builder()
            .without_delays()
            .source(
                "bing-images",
                SourceTuning::default().with_max_variants(1).with_min_delay_ms(250),
            )
            .build()
            .unwrap();

        let settings = SourceSettings::from_config(&config, "bing-images", 2, None);
        assert_eq!(settings.max_variants, 1);
        assert_eq!(settings.acceptance_threshold, None);
        assert_eq!(settings.min_delay, Duration::from_millis(250));

        let defaults = SourceSettings::from_config(&config, "thegamesdb", 4, Some(12.0));
        assert_eq!(defaults.max_variants, 4);
        assert_eq!(defaults.acceptance_threshold, Some(12.0));
        assert_eq!(defaults.min_delay, Duration::ZERO);
    }
}
