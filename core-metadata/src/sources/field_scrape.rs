//! One field scraped from a search page, optionally via the detail page.
//!
//! Used for critic ratings and market prices. Numeric values must parse and
//! fall inside the profile's bounds, otherwise the page counts as no match.

use super::html::{extract_results, first_text, ResultSelectors};
use super::transport::SourceTransport;
use super::{
    PlatformTarget, SourceAdapter, SourceFailure, SourceKind, SourceSettings, VariantStyle,
};
use crate::platform::PlatformNamespace;
use crate::query::Candidate;
use async_trait::async_trait;
use bridge_traits::http::HttpClient;
use core_library::MetadataField;
use core_runtime::config::ResolverConfig;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::debug;

pub const METACRITIC_ID: &str = "metacritic";
pub const PRICECHARTING_ID: &str = "pricecharting";
pub const DEFAULT_MAX_VARIANTS: usize = 4;
pub const DEFAULT_ACCEPTANCE_THRESHOLD: f64 = 10.0;

static RE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d[\d,]*(?:\.\d+)?").expect("Invalid regex"));

#[derive(Debug, Clone, PartialEq)]
pub struct FieldScrapeProfile {
    pub id: String,
    pub field: MetadataField,
    /// Template with a `{query}` placeholder
    pub search_url: String,
    /// Appended when the platform is known; `{platform}` placeholder
    pub platform_param: Option<String>,
    pub namespace: PlatformNamespace,
    pub results: ResultSelectors,
    /// Value selector on the detail page; `None` reads search rows only
    pub detail_value_selector: Option<String>,
    /// Title on a page the search redirected straight to
    pub direct_title_selector: Option<String>,
    /// Inclusive range for numeric fields
    pub bounds: Option<(f64, f64)>,
}

impl FieldScrapeProfile {
    pub fn metacritic() -> Self {
        Self {
            id: METACRITIC_ID.to_string(),
            field: MetadataField::CriticRating,
            search_url: "https://www.metacritic.com/search/{query}/?category=13".to_string(),
            platform_param: None,
            namespace: PlatformNamespace::Metacritic,
            results: ResultSelectors {
                item: "a[href*='/game/']".to_string(),
                link: None,
                title: Some("[data-testid='product-title'], .c-pageSiteSearch-results-item-title, p".to_string()),
                value: Some("[data-testid='product-metascore'], .c-siteReviewScore span".to_string()),
            },
            detail_value_selector: Some(
                ".c-productScoreInfo_scoreNumber span, .c-siteReviewScore span, .metascore_w span"
                    .to_string(),
            ),
            direct_title_selector: None,
            bounds: Some((0.0, 100.0)),
        }
    }

    pub fn pricecharting() -> Self {
        Self {
            id: PRICECHARTING_ID.to_string(),
            field: MetadataField::MarketPrice,
            search_url: "https://www.pricecharting.com/search-products?q={query}&type=prices"
                .to_string(),
            platform_param: None,
            namespace: PlatformNamespace::PriceCharting,
            results: ResultSelectors {
                item: "table#games_table tr".to_string(),
                link: Some("td.title a".to_string()),
                title: None,
                value: Some("td.used_price span.js-price".to_string()),
            },
            detail_value_selector: Some("#used_price .price".to_string()),
            direct_title_selector: Some("h1#product_name".to_string()),
            bounds: Some((0.0, 100_000.0)),
        }
    }
}

pub struct SingleFieldScrapeAdapter {
    profile: FieldScrapeProfile,
    settings: SourceSettings,
    transport: SourceTransport,
}

impl SingleFieldScrapeAdapter {
    pub fn new(
        http: Arc<dyn HttpClient>,
        profile: FieldScrapeProfile,
        settings: SourceSettings,
    ) -> Self {
        let transport = SourceTransport::new(profile.id.clone(), http, &settings);
        Self {
            profile,
            settings,
            transport,
        }
    }

    /// Adapter for `profile` with settings taken from configuration.
    pub fn from_config(
        http: Arc<dyn HttpClient>,
        config: &ResolverConfig,
        profile: FieldScrapeProfile,
    ) -> Self {
        let settings = SourceSettings::from_config(
            config,
            &profile.id,
            DEFAULT_MAX_VARIANTS,
            Some(DEFAULT_ACCEPTANCE_THRESHOLD),
        );
        Self::new(http, profile, settings)
    }

    fn search_url(&self, variant: &str, platform: &PlatformTarget) -> String {
        let mut url = self
            .profile
            .search_url
            .replace("{query}", &urlencoding::encode(variant));
        if let (Some(param), Some(id)) = (&self.profile.platform_param, &platform.id) {
            url.push_str(&param.replace("{platform}", &urlencoding::encode(id)));
        }
        url
    }

    fn checked(&self, raw: &str) -> Option<String> {
        clean_value(self.profile.field, raw, self.profile.bounds)
    }
}

#[async_trait]
impl SourceAdapter for SingleFieldScrapeAdapter {
    fn id(&self) -> &str {
        &self.profile.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::FieldScrape
    }

    fn supports(&self, field: MetadataField) -> bool {
        field == self.profile.field
    }

    fn variant_style(&self) -> VariantStyle {
        VariantStyle::Scrape
    }

    fn max_variants(&self) -> usize {
        self.settings.max_variants
    }

    fn acceptance_threshold(&self) -> Option<f64> {
        self.settings.acceptance_threshold
    }

    fn platform_namespace(&self) -> Option<PlatformNamespace> {
        Some(self.profile.namespace)
    }

    async fn attempt(
        &self,
        variant: &str,
        platform: &PlatformTarget,
        _field: MetadataField,
    ) -> Result<Vec<Candidate>, SourceFailure> {
        let url = self.search_url(variant, platform);
        let page = self.transport.get_text(&url).await?;
        let rows = extract_results(&page, &self.profile.results, &url)?;
        let follows_detail = self.profile.detail_value_selector.is_some();

        let mut candidates = Vec::new();
        for row in rows {
            let value = row.value.as_deref().and_then(|raw| self.checked(raw));
            if value.is_none() && !follows_detail {
                continue;
            }
            let mut candidate = Candidate::new(&self.profile.id, row.url, row.title);
            candidate.extracted_value = value;
            candidates.push(candidate);
        }

        // Single hits redirect straight to the product page.
        if candidates.is_empty() {
            if let (Some(title_sel), Some(value_sel)) = (
                &self.profile.direct_title_selector,
                &self.profile.detail_value_selector,
            ) {
                let title = first_text(&page, title_sel)?;
                let value = first_text(&page, value_sel)?.and_then(|raw| self.checked(&raw));
                if let (Some(title), Some(value)) = (title, value) {
                    candidates.push(Candidate::new(&self.profile.id, url, title).with_value(value));
                }
            }
        }

        debug!(
            source = %self.profile.id,
            variant,
            count = candidates.len(),
            "Field search parsed"
        );
        Ok(candidates)
    }

    async fn complete(
        &self,
        candidate: &Candidate,
        _field: MetadataField,
    ) -> Result<Option<String>, SourceFailure> {
        if candidate.extracted_value.is_some() {
            return Ok(candidate.extracted_value.clone());
        }
        let Some(selector) = &self.profile.detail_value_selector else {
            return Ok(None);
        };

        let page = self.transport.get_text(&candidate.external_id).await?;
        match first_text(&page, selector)? {
            Some(raw) => self.checked(&raw).map(Some).ok_or(SourceFailure::NoMatch),
            None => Ok(None),
        }
    }
}

/// Validate a scraped value for `field`.
///
/// Ratings come back as whole numbers, prices with two decimals. Values that
/// do not parse or fall outside `bounds` yield `None`.
pub fn clean_value(field: MetadataField, raw: &str, bounds: Option<(f64, f64)>) -> Option<String> {
    let raw = raw.trim();
    match field {
        MetadataField::CriticRating | MetadataField::MarketPrice => {
            let number: f64 = RE_NUMBER.find(raw)?.as_str().replace(',', "").parse().ok()?;
            if let Some((min, max)) = bounds {
                if !(min..=max).contains(&number) {
                    return None;
                }
            }
            Some(if field == MetadataField::CriticRating {
                format!("{}", number.round() as i64)
            } else {
                format!("{:.2}", number)
            })
        }
        _ => (!raw.is_empty()).then(|| raw.to_string()),
    }
}
