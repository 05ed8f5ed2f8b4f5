//! Last-resort cover art from a general web image search.
//!
//! One request per variant; the first image URL embedded in the result page
//! is accepted without scoring.

use super::html::unescape_entities;
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
use std::sync::Arc;
use tracing::debug;

pub const SOURCE_ID: &str = "bing-images";
pub const DEFAULT_MAX_VARIANTS: usize = 2;

#[derive(Debug, Clone)]
pub struct ImageSearchProfile {
    pub id: String,
    /// Template with a `{query}` placeholder
    pub search_url: String,
    /// Appended to the title before searching
    pub query_suffix: String,
    /// First capture group is the image URL
    pub url_pattern: Regex,
    /// URL fragments never accepted as a cover
    pub excluded_patterns: Vec<String>,
}

impl ImageSearchProfile {
    pub fn bing() -> Result<Self, SourceFailure> {
        let url_pattern = Regex::new(r#"murl&quot;:&quot;(.*?)&quot;"#)
            .map_err(|e| SourceFailure::Malformed(e.to_string()))?;
        Ok(Self {
            id: SOURCE_ID.to_string(),
            search_url: "https://www.bing.com/images/search?q={query}&form=HDRSC2&first=1"
                .to_string(),
            query_suffix: "box art".to_string(),
            url_pattern,
            excluded_patterns: ["logo", "icon", "avatar", "favicon"].map(String::from).to_vec(),
        })
    }
}

pub struct GenericImageSearchAdapter {
    profile: ImageSearchProfile,
    settings: SourceSettings,
    transport: SourceTransport,
}

impl GenericImageSearchAdapter {
    pub fn new(
        http: Arc<dyn HttpClient>,
        profile: ImageSearchProfile,
        settings: SourceSettings,
    ) -> Self {
        let transport = SourceTransport::new(profile.id.clone(), http, &settings);
        Self {
            profile,
            settings,
            transport,
        }
    }

    pub fn from_config(
        http: Arc<dyn HttpClient>,
        config: &ResolverConfig,
    ) -> Result<Self, SourceFailure> {
        let settings = SourceSettings::from_config(config, SOURCE_ID, DEFAULT_MAX_VARIANTS, None);
        Ok(Self::new(http, ImageSearchProfile::bing()?, settings))
    }

    fn query_for(&self, variant: &str, platform: &PlatformTarget) -> String {
        [Some(variant), platform.canonical, Some(self.profile.query_suffix.as_str())]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// First usable image URL in a result page.
    fn first_image(&self, page: &str) -> Option<String> {
        self.profile
            .url_pattern
            .captures_iter(page)
            .filter_map(|caps| caps.get(1))
            .map(|m| unescape_entities(m.as_str()))
            .filter(|url| url.starts_with("http://") || url.starts_with("https://"))
            .find(|url| {
                let lowered = url.to_lowercase();
                !self
                    .profile
                    .excluded_patterns
                    .iter()
                    .any(|p| lowered.contains(p.as_str()))
            })
    }
}

#[async_trait]
impl SourceAdapter for GenericImageSearchAdapter {
    fn id(&self) -> &str {
        &self.profile.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::ImageSearch
    }

    fn supports(&self, field: MetadataField) -> bool {
        field == MetadataField::CoverImage
    }

    fn variant_style(&self) -> VariantStyle {
        VariantStyle::Catalog
    }

    fn max_variants(&self) -> usize {
        self.settings.max_variants
    }

    fn acceptance_threshold(&self) -> Option<f64> {
        None
    }

    fn platform_namespace(&self) -> Option<PlatformNamespace> {
        None
    }

    async fn attempt(
        &self,
        variant: &str,
        platform: &PlatformTarget,
        _field: MetadataField,
    ) -> Result<Vec<Candidate>, SourceFailure> {
        let query = self.query_for(variant, platform);
        let url = self
            .profile
            .search_url
            .replace("{query}", &urlencoding::encode(&query));
        let page = self.transport.get_text(&url).await?;

        let image = self.first_image(&page);
        debug!(source = %self.profile.id, %query, found = image.is_some(), "Image search");

        Ok(image
            .map(|image| vec![Candidate::new(&self.profile.id, image.clone(), variant).with_value(image)])
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::{HttpRequest, HttpResponse};

    struct Offline;

    #[async_trait]
    impl HttpClient for Offline {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Err(BridgeError::NotAvailable("offline".into()))
        }
    }

    fn adapter() -> GenericImageSearchAdapter {
        GenericImageSearchAdapter::new(
            Arc::new(Offline),
            ImageSearchProfile::bing().unwrap(),
            SourceSettings::new(DEFAULT_MAX_VARIANTS, None),
        )
    }

    #[test]
    fn test_first_image_skips_logos() {
        let page = concat!(
            r#"<a m="{&quot;murl&quot;:&quot;https://img.example/site-logo.png&quot;}">"#,
            r#"<a m="{&quot;murl&quot;:&quot;https://img.example/halo2-front.jpg?w=600&amp;h=800&quot;}">"#,
        );
        assert_eq!(
            adapter().first_image(page).as_deref(),
            Some("https://img.example/halo2-front.jpg?w=600&h=800")
        );
        assert_eq!(adapter().first_image("<html>no results</html>"), None);
    }

    #[test]
    fn test_query_includes_platform() {
        let target = PlatformTarget {
            canonical: Some("Xbox"),
            id: None,
        };
        assert_eq!(adapter().query_for("Halo 2", &target), "Halo 2 Xbox box art");
        assert_eq!(
            adapter().query_for("Halo 2", &PlatformTarget::default()),
            "Halo 2 box art"
        );
    }

    #[test]
    fn test_accepts_unconditionally() {
        assert_eq!(adapter().acceptance_threshold(), None);
        assert!(adapter().supports(MetadataField::CoverImage));
        assert!(!adapter().supports(MetadataField::Genre));
    }
}
