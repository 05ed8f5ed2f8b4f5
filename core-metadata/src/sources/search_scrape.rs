//! Cover art from an HTML search site, with a thumbnail CDN fast path.
//!
//! 1. **CDN fast path** - the libretro thumbnail server stores box art under
//!    a path derived from the system and the title. A HEAD request tells
//!    whether it exists.
//! 2. **Search scrape** - the search page yields `(link, title)` pairs that
//!    the orchestrator scores; the chosen detail page is then scanned for the
//!    largest content image that is not navigation chrome.

use super::html::{asset_urls, extract_results, pick_asset, ResultSelectors};
use super::transport::SourceTransport;
use super::{
    PlatformTarget, SourceAdapter, SourceFailure, SourceKind, SourceSettings, VariantStyle,
};
use crate::platform::{PlatformNamespace, PlatformResolver};
use crate::query::Candidate;
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod};
use core_library::MetadataField;
use core_runtime::config::ResolverConfig;
use std::sync::Arc;
use tracing::debug;
use url::Url;

pub const SOURCE_ID: &str = "libretro-mobygames";
pub const DEFAULT_MAX_VARIANTS: usize = 8;
pub const DEFAULT_ACCEPTANCE_THRESHOLD: f64 = 10.0;

/// Deterministic box-art location on a thumbnail CDN.
#[derive(Debug, Clone, PartialEq)]
pub struct CdnProfile {
    /// Template with `{system}` and `{title}` placeholders
    pub url_template: String,
    pub namespace: PlatformNamespace,
    /// Region tags appended to the title, tried in order
    pub title_suffixes: Vec<String>,
}

impl CdnProfile {
    pub fn libretro() -> Self {
        Self {
            url_template: "https://thumbnails.libretro.com/{system}/Named_Boxarts/{title}.png"
                .to_string(),
            namespace: PlatformNamespace::Libretro,
            title_suffixes: vec![" (USA)".to_string()],
        }
    }

    /// CDN URL for one title on one system.
    pub fn url_for(&self, system: &str, title: &str) -> String {
        self.url_template
            .replace("{system}", &urlencoding::encode(system))
            .replace("{title}", &urlencoding::encode(&cdn_file_name(title)))
    }
}

/// Everything site-specific about the search scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeSiteProfile {
    pub id: String,
    /// Template with a `{query}` placeholder
    pub search_url: String,
    /// Appended to the search URL when the platform is known; `{platform}` placeholder
    pub platform_param: Option<String>,
    pub namespace: PlatformNamespace,
    pub results: ResultSelectors,
    /// Appended to a result URL to reach the page holding the asset
    pub detail_suffix: String,
    pub asset_selector: String,
    /// URL fragments of navigation chrome, logos and icons
    pub excluded_patterns: Vec<String>,
    /// URL fragments marking reduced-size copies
    pub thumbnail_patterns: Vec<String>,
    pub cdn: Option<CdnProfile>,
}

impl ScrapeSiteProfile {
    pub fn mobygames() -> Self {
        Self {
            id: SOURCE_ID.to_string(),
            search_url: "https://www.mobygames.com/search/?q={query}&type=game".to_string(),
            platform_param: Some("&platform={platform}".to_string()),
            namespace: PlatformNamespace::MobyGames,
            results: ResultSelectors {
                item: "a[href*='/game/']".to_string(),
                link: None,
                title: None,
                value: None,
            },
            detail_suffix: "covers/".to_string(),
            asset_selector: "img".to_string(),
            excluded_patterns: ["logo", "icon", "avatar", "sprite", "badge", "banner", "/static/"]
                .map(String::from)
                .to_vec(),
            thumbnail_patterns: ["/thumbnail/", "/small/", "_thumb", "-thumb", "/s/", "150x"]
                .map(String::from)
                .to_vec(),
            cdn: Some(CdnProfile::libretro()),
        }
    }
}

pub struct SearchScrapeAdapter {
    profile: ScrapeSiteProfile,
    settings: SourceSettings,
    transport: SourceTransport,
    platforms: PlatformResolver,
}

impl SearchScrapeAdapter {
    pub fn new(
        http: Arc<dyn HttpClient>,
        profile: ScrapeSiteProfile,
        settings: SourceSettings,
    ) -> Self {
        let transport = SourceTransport::new(profile.id.clone(), http, &settings);
        Self {
            profile,
            settings,
            transport,
            platforms: PlatformResolver::new(),
        }
    }

    pub fn from_config(http: Arc<dyn HttpClient>, config: &ResolverConfig) -> Self {
        let settings = SourceSettings::from_config(
            config,
            SOURCE_ID,
            DEFAULT_MAX_VARIANTS,
            Some(DEFAULT_ACCEPTANCE_THRESHOLD),
        );
        Self::new(http, ScrapeSiteProfile::mobygames(), settings)
    }

    /// HEAD the CDN location; a hit becomes a ready-made candidate.
    async fn try_cdn(&self, variant: &str, platform: &PlatformTarget) -> Option<Candidate> {
        let cdn = self.profile.cdn.as_ref()?;
        // Slug-style variants never match CDN file names.
        if !variant.chars().any(char::is_uppercase) {
            return None;
        }
        let system = platform
            .canonical
            .and_then(|name| self.platforms.resolve(name, cdn.namespace))?;

        for suffix in &cdn.title_suffixes {
            let url = cdn.url_for(&system, &format!("{}{}", variant, suffix));
            match self.transport.send(HttpMethod::Head, &url, "image/*").await {
                Ok(response) if response.is_success() => {
                    let is_image = response
                        .header("Content-Type")
                        .map_or(true, |ct| ct.starts_with("image/"));
                    if is_image {
                        debug!(source = %self.profile.id, %url, "CDN fast path hit");
                        return Some(
                            Candidate::new(&self.profile.id, url.clone(), variant).with_value(url),
                        );
                    }
                }
                Ok(_) => {}
                // The CDN is optional; scraping still decides the outcome.
                Err(e) => debug!(source = %self.profile.id, error = %e, "CDN lookup failed"),
            }
        }
        None
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
}

#[async_trait]
impl SourceAdapter for SearchScrapeAdapter {
    fn id(&self) -> &str {
        &self.profile.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::SearchScrape
    }

    fn supports(&self, field: MetadataField) -> bool {
        field == MetadataField::CoverImage
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
        if let Some(hit) = self.try_cdn(variant, platform).await {
            return Ok(vec![hit]);
        }

        let url = self.search_url(variant, platform);
        let page = self.transport.get_text(&url).await?;
        let rows = extract_results(&page, &self.profile.results, &url)?;

        let mut seen = Vec::new();
        let candidates: Vec<Candidate> = rows
            .into_iter()
            .filter(|row| {
                let fresh = !seen.contains(&row.url);
                if fresh {
                    seen.push(row.url.clone());
                }
                fresh
            })
            .map(|row| Candidate::new(&self.profile.id, row.url, row.title))
            .collect();

        debug!(
            source = %self.profile.id,
            variant,
            count = candidates.len(),
            "Search page parsed"
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

        let detail_url = join_url(&candidate.external_id, &self.profile.detail_suffix)?;
        let page = self.transport.get_text(&detail_url).await?;
        let urls = asset_urls(&page, &self.profile.asset_selector, &detail_url)?;
        let asset = pick_asset(
            &urls,
            &self.profile.excluded_patterns,
            &self.profile.thumbnail_patterns,
        );

        debug!(
            source = %self.profile.id,
            url = %detail_url,
            scanned = urls.len(),
            found = asset.is_some(),
            "Detail page scanned"
        );
        Ok(asset)
    }
}

/// File name the libretro thumbnail server uses for a title.
pub fn cdn_file_name(title: &str) -> String {
    title
        .chars()
        .map(|c| match c {
            '&' | '*' | '/' | ':' | '`' | '<' | '>' | '?' | '\\' | '|' | '"' => '_',
            other => other,
        })
        .collect()
}

/// Append `suffix` as path segments of `base`, keeping its query.
fn join_url(base: &str, suffix: &str) -> Result<String, SourceFailure> {
    let mut url = Url::parse(base)
        .map_err(|e| SourceFailure::Malformed(format!("bad detail url '{}': {}", base, e)))?;
    if suffix.is_empty() {
        return Ok(url.to_string());
    }
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| SourceFailure::Malformed(format!("detail url '{}' has no path", base)))?;
        segments
            .pop_if_empty()
            .extend(suffix.split('/').filter(|s| !s.is_empty()));
        if suffix.ends_with('/') {
            segments.push("");
        }
    }
    Ok(url.to_string())
}
