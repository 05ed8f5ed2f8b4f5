//! Structured catalog API source (TheGamesDB v1 shape).
//!
//! ## Endpoints
//!
//! - **Search**: `{base}/v1.1/Games/ByGameName?apikey=..&name=..&filter[platform]=..`
//! - **Detail**: `{base}/v1/Games/ByGameID?apikey=..&id=..&fields=genres,overview&include=boxart`
//! - **Genres**: `{base}/v1/Genres?apikey=..` (id to name side lookup)
//!
//! ## Payload quirks
//!
//! Key casing varies between endpoints (`game_title`, `GameTitle`), genres
//! arrive as names, ids or `{name}` objects, and release dates may be a
//! single string or a region map. Every read goes through the tolerant
//! helpers below.
//!
//! An exhausted monthly allowance is reported as 401/403 with
//! `remaining_monthly_allowance: 0`; that is classified as
//! [`SourceFailure::QuotaExhausted`] so the run stops calling the API.

use super::release_date::pick_release_date;
use super::transport::SourceTransport;
use super::{
    classify_status, PlatformTarget, SourceAdapter, SourceFailure, SourceKind, SourceSettings,
    VariantStyle,
};
use crate::platform::PlatformNamespace;
use crate::query::Candidate;
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpResponse};
use core_library::MetadataField;
use core_runtime::config::ResolverConfig;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const SOURCE_ID: &str = "thegamesdb";
pub const DEFAULT_MAX_VARIANTS: usize = 4;
pub const DEFAULT_ACCEPTANCE_THRESHOLD: f64 = 12.0;

const SUPPORTED_FIELDS: &[MetadataField] = &[
    MetadataField::CoverImage,
    MetadataField::ReleaseDate,
    MetadataField::Genre,
    MetadataField::Description,
];

/// Where and how to reach the catalog.
#[derive(Clone)]
pub struct CatalogProfile {
    pub id: String,
    pub base_url: String,
    pub api_key: String,
}

impl std::fmt::Debug for CatalogProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogProfile")
            .field("id", &self.id)
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .finish()
    }
}

impl CatalogProfile {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            id: SOURCE_ID.to_string(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

pub struct StructuredCatalogAdapter {
    profile: CatalogProfile,
    settings: SourceSettings,
    transport: SourceTransport,
    /// Genre id to name, loaded on first use
    genres: Mutex<Option<HashMap<String, String>>>,
}

impl StructuredCatalogAdapter {
    pub fn new(http: Arc<dyn HttpClient>, profile: CatalogProfile, settings: SourceSettings) -> Self {
        let transport = SourceTransport::new(profile.id.clone(), http, &settings);
        Self {
            profile,
            settings,
            transport,
            genres: Mutex::new(None),
        }
    }

    /// Catalog adapter from configuration; `None` without an API key.
    pub fn from_config(http: Arc<dyn HttpClient>, config: &ResolverConfig) -> Option<Self> {
        let Some(api_key) = config.catalog.api_key.clone() else {
            info!(source = SOURCE_ID, "No catalog API key configured, source disabled");
            return None;
        };
        let profile = CatalogProfile::new(config.catalog.base_url.clone(), api_key);
        let settings = SourceSettings::from_config(
            config,
            SOURCE_ID,
            DEFAULT_MAX_VARIANTS,
            Some(DEFAULT_ACCEPTANCE_THRESHOLD),
        );
        Some(Self::new(http, profile, settings))
    }

    fn api_url(&self, path: &str, params: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}{}?apikey={}",
            self.profile.base_url,
            path,
            urlencoding::encode(&self.profile.api_key)
        );
        for (key, value) in params {
            url.push('&');
            url.push_str(&urlencoding::encode(key));
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    async fn get_json(&self, url: &str) -> Result<Value, SourceFailure> {
        let response = self
            .transport
            .send(HttpMethod::Get, url, "application/json")
            .await?;
        classify_catalog_response(&response)?;
        serde_json::from_slice(&response.body)
            .map_err(|e| SourceFailure::Malformed(format!("invalid JSON: {}", e)))
    }

    /// Read `field` from one game object of a search or detail payload.
    async fn field_value(
        &self,
        game: &Value,
        root: &Value,
        field: MetadataField,
    ) -> Result<Option<String>, SourceFailure> {
        let value = match field {
            MetadataField::Description => first_string(game, &["overview", "description"]),
            MetadataField::ReleaseDate => ["release_date", "releasedate", "release_dates"]
                .iter()
                .find_map(|key| get_ci(game, key))
                .and_then(pick_release_date),
            MetadataField::Genre => match get_ci(game, "genres").or_else(|| get_ci(game, "genre")) {
                Some(genres) => self.genre_names(genres).await?,
                None => None,
            },
            MetadataField::CoverImage => game_id(game).and_then(|id| front_boxart(root, &id)),
            MetadataField::CriticRating | MetadataField::MarketPrice => None,
        };
        Ok(value.filter(|v| !v.trim().is_empty()))
    }

    async fn genre_names(&self, genres: &Value) -> Result<Option<String>, SourceFailure> {
        let items: Vec<&Value> = match genres {
            Value::Array(items) => items.iter().collect(),
            Value::Null => return Ok(None),
            other => vec![other],
        };

        let mut names = Vec::new();
        for item in items {
            let name = match item {
                Value::Number(n) => self.genre_name(&n.to_string()).await?,
                Value::String(s) if s.chars().all(|c| c.is_ascii_digit()) && !s.is_empty() => {
                    self.genre_name(s).await?
                }
                Value::String(s) => Some(s.trim().to_string()),
                Value::Object(_) => first_string(item, &["name", "genre"]),
                _ => None,
            };
            if let Some(name) = name.filter(|n| !n.is_empty()) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        Ok((!names.is_empty()).then(|| names.join(", ")))
    }

    async fn genre_name(&self, id: &str) -> Result<Option<String>, SourceFailure> {
        let mut cache = self.genres.lock().await;
        if cache.is_none() {
            let root = self.get_json(&self.api_url("/v1/Genres", &[])).await?;
            let table = parse_genre_table(&root);
            debug!(source = %self.profile.id, count = table.len(), "Loaded genre table");
            *cache = Some(table);
        }
        Ok(cache.as_ref().and_then(|table| table.get(id).cloned()))
    }
}

#[async_trait]
impl SourceAdapter for StructuredCatalogAdapter {
    fn id(&self) -> &str {
        &self.profile.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::StructuredCatalog
    }

    fn supports(&self, field: MetadataField) -> bool {
        SUPPORTED_FIELDS.contains(&field)
    }

    fn variant_style(&self) -> VariantStyle {
        VariantStyle::Catalog
    }

    fn max_variants(&self) -> usize {
        self.settings.max_variants
    }

    fn acceptance_threshold(&self) -> Option<f64> {
        self.settings.acceptance_threshold
    }

    fn platform_namespace(&self) -> Option<PlatformNamespace> {
        Some(PlatformNamespace::TheGamesDb)
    }

    async fn attempt(
        &self,
        variant: &str,
        platform: &PlatformTarget,
        field: MetadataField,
    ) -> Result<Vec<Candidate>, SourceFailure> {
        let mut params = vec![("name", variant)];
        if let Some(platform_id) = platform.id.as_deref() {
            params.push(("filter[platform]", platform_id));
        }
        let root = self
            .get_json(&self.api_url("/v1.1/Games/ByGameName", &params))
            .await?;

        let games = games_of(&root)?;
        let mut candidates = Vec::with_capacity(games.len());
        for game in games {
            let title = first_string(game, &["game_title", "title", "name"]);
            let (Some(id), Some(title)) = (game_id(game), title) else {
                continue;
            };
            let mut candidate = Candidate::new(&self.profile.id, id, title);
            // Search payloads carry some fields (release date) already.
            if let Some(value) = self.field_value(game, &root, field).await? {
                candidate = candidate.with_value(value);
            }
            candidates.push(candidate);
        }

        debug!(
            source = %self.profile.id,
            variant,
            count = candidates.len(),
            "Catalog search returned candidates"
        );
        Ok(candidates)
    }

    async fn complete(
        &self,
        candidate: &Candidate,
        field: MetadataField,
    ) -> Result<Option<String>, SourceFailure> {
        if candidate.extracted_value.is_some() {
            return Ok(candidate.extracted_value.clone());
        }

        let url = self.api_url(
            "/v1/Games/ByGameID",
            &[
                ("id", candidate.external_id.as_str()),
                ("fields", "genres,overview"),
                ("include", "boxart"),
            ],
        );
        let root = self.get_json(&url).await?;
        let games = games_of(&root)?;
        let game = games
            .iter()
            .copied()
            .find(|g| game_id(g).as_deref() == Some(candidate.external_id.as_str()))
            .or_else(|| games.first().copied());
        let Some(game) = game else {
            return Ok(None);
        };

        self.field_value(game, &root, field).await
    }
}

/// Status classification with quota detection on 401/403.
fn classify_catalog_response(response: &HttpResponse) -> Result<(), SourceFailure> {
    let body: Option<Value> = serde_json::from_slice(&response.body).ok();

    let payload_code = body
        .as_ref()
        .and_then(|b| get_ci(b, "code"))
        .and_then(Value::as_u64);
    let denied = matches!(response.status, 401 | 403) || matches!(payload_code, Some(401 | 403));
    if !denied {
        return classify_status(response);
    }

    let remaining = body
        .as_ref()
        .and_then(|b| get_ci(b, "remaining_monthly_allowance"))
        .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())));
    // The message text is only consulted when no allowance count is reported.
    let exhausted = match remaining {
        Some(left) => left <= 0,
        None => {
            let text = String::from_utf8_lossy(&response.body).to_lowercase();
            text.contains("allowance") || text.contains("quota")
        }
    };

    if exhausted {
        warn!(status = response.status, "Catalog allowance exhausted");
        Err(SourceFailure::QuotaExhausted(format!(
            "HTTP {}, monthly allowance used up",
            response.status
        )))
    } else {
        Err(SourceFailure::Auth(format!(
            "HTTP {}, API key rejected",
            response.status
        )))
    }
}

/// `data.games`, tolerating key casing.
fn games_of(root: &Value) -> Result<Vec<&Value>, SourceFailure> {
    let games = get_ci(root, "data")
        .and_then(|data| get_ci(data, "games"))
        .ok_or_else(|| SourceFailure::Malformed("payload has no data.games".to_string()))?;
    match games {
        Value::Array(items) => Ok(items.iter().collect()),
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(map.values().collect()),
        _ => Err(SourceFailure::Malformed("data.games is not a list".to_string())),
    }
}

/// Front box art URL from the `include.boxart` block.
fn front_boxart(root: &Value, game_id: &str) -> Option<String> {
    let boxart = get_ci(root, "include").and_then(|inc| get_ci(inc, "boxart"))?;
    let base = get_ci(boxart, "base_url")
        .and_then(|b| first_string(b, &["original", "large", "medium"]))
        .unwrap_or_default();
    let images = get_ci(boxart, "data").and_then(|d| get_ci(d, game_id))?.as_array()?;

    let is_front = |img: &&Value| {
        first_string(img, &["type"]).is_some_and(|t| t.eq_ignore_ascii_case("boxart"))
            && first_string(img, &["side"]).map_or(true, |s| s.eq_ignore_ascii_case("front"))
    };
    let image = images.iter().find(is_front).or_else(|| images.first())?;
    let filename = first_string(image, &["filename"])?;

    if filename.starts_with("http://") || filename.starts_with("https://") {
        Some(filename)
    } else {
        Some(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            filename.trim_start_matches('/')
        ))
    }
}

fn parse_genre_table(root: &Value) -> HashMap<String, String> {
    let mut table = HashMap::new();
    let Some(genres) = get_ci(root, "data").and_then(|d| get_ci(d, "genres")) else {
        return table;
    };
    let entries: Vec<(Option<String>, &Value)> = match genres {
        Value::Object(map) => map.iter().map(|(k, v)| (Some(k.clone()), v)).collect(),
        Value::Array(items) => items.iter().map(|v| (None, v)).collect(),
        _ => Vec::new(),
    };
    for (key, entry) in entries {
        let id = game_id(entry).or(key);
        if let (Some(id), Some(name)) = (id, first_string(entry, &["name"])) {
            table.insert(id, name);
        }
    }
    table
}

/// Object member lookup ignoring case and underscores (`game_title` == `GameTitle`).
fn get_ci<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let map = value.as_object()?;
    if let Some(v) = map.get(key) {
        return Some(v);
    }
    let wanted = fold_key(key);
    map.iter().find(|(k, _)| fold_key(k) == wanted).map(|(_, v)| v)
}

fn fold_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// First non-empty string (or number rendered as string) among `keys`.
fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match get_ci(value, key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn game_id(game: &Value) -> Option<String> {
    first_string(game, &["id"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;

    fn response(status: u16, body: Value) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn test_quota_payload_is_terminal() {
        let err = classify_catalog_response(&response(
            403,
            json!({"code": 403, "status": "Forbidden", "remaining_monthly_allowance": 0}),
        ))
        .unwrap_err();
        assert!(matches!(err, SourceFailure::QuotaExhausted(_)));
        assert!(err.is_terminal());
    }

    #[test]
    fn test_plain_401_is_auth() {
        let err = classify_catalog_response(&response(401, json!({"status": "Invalid key"})))
            .unwrap_err();
        assert!(matches!(err, SourceFailure::Auth(_)));
    }

    #[test]
    fn test_rejected_key_with_allowance_left_is_auth() {
        let err = classify_catalog_response(&response(
            401,
            json!({"code": 401, "status": "Invalid API key", "remaining_monthly_allowance": 2980}),
        ))
        .unwrap_err();
        assert!(matches!(err, SourceFailure::Auth(_)));

        let err = classify_catalog_response(&response(
            403,
            json!({"code": 403, "status": "Monthly allowance exceeded"}),
        ))
        .unwrap_err();
        assert!(matches!(err, SourceFailure::QuotaExhausted(_)));
    }

    #[test]
    fn test_payload_code_overrides_http_200() {
        let err = classify_catalog_response(&response(
            200,
            json!({"code": 403, "remaining_monthly_allowance": "0"}),
        ))
        .unwrap_err();
        assert!(matches!(err, SourceFailure::QuotaExhausted(_)));
        assert!(classify_catalog_response(&response(200, json!({"code": 200}))).is_ok());
    }

    #[test]
    fn test_case_insensitive_keys() {
        let game = json!({"GameTitle": "Halo 2", "ID": 42});
        assert_eq!(first_string(&game, &["game_title"]), Some("Halo 2".to_string()));
        assert_eq!(game_id(&game), Some("42".to_string()));
    }

    #[test]
    fn test_games_of_shapes() {
        assert_eq!(games_of(&json!({"data": {"games": []}})).unwrap().len(), 0);
        assert_eq!(
            games_of(&json!({"Data": {"Games": [{"id": 1}, {"id": 2}]}}))
                .unwrap()
                .len(),
            2
        );
        assert!(matches!(
            games_of(&json!({"error": "nope"})),
            Err(SourceFailure::Malformed(_))
        ));
    }

    #[test]
    fn test_front_boxart() {
        let root = json!({
            "include": {"boxart": {
                "base_url": {"original": "https://cdn.thegamesdb.net/images/original/"},
                "data": {"42": [
                    {"type": "boxart", "side": "back", "filename": "boxart/back/42-1.jpg"},
                    {"type": "boxart", "side": "front", "filename": "boxart/front/42-1.jpg"}
                ]}
            }}
        });
        assert_eq!(
            front_boxart(&root, "42").as_deref(),
            Some("https://cdn.thegamesdb.net/images/original/boxart/front/42-1.jpg")
        );
        assert_eq!(front_boxart(&root, "7"), None);
    }

    #[test]
    fn test_genre_table_shapes() {
        let keyed = parse_genre_table(&json!({"data": {"genres": {
            "1": {"id": 1, "name": "Action"},
            "8": {"id": 8, "name": "Shooter"}
        }}}));
        assert_eq!(keyed.get("8").map(String::as_str), Some("Shooter"));

        let listed = parse_genre_table(&json!({"data": {"genres": [{"id": 4, "name": "Racing"}]}}));
        assert_eq!(listed.get("4").map(String::as_str), Some("Racing"));
    }
}
