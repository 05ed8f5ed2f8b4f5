//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bytes::Bytes;
use core_library::MetadataField;
use core_metadata::platform::PlatformNamespace;
use core_metadata::sources::{PlatformTarget, SourceKind, VariantStyle};
use core_metadata::{Candidate, SourceAdapter, SourceFailure};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type Behavior = Box<dyn Fn(&str, usize) -> Result<Vec<Candidate>, SourceFailure> + Send + Sync>;

/// Scripted source. `behavior` receives the variant and the zero-based call
/// number and decides what `attempt` returns.
pub struct StubSource {
    id: &'static str,
    behavior: Behavior,
    threshold: Option<f64>,
    max_variants: usize,
    style: VariantStyle,
    fields: Option<Vec<MetadataField>>,
    detail: Option<String>,
    calls: AtomicUsize,
    completes: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl StubSource {
    pub fn new(
        id: &'static str,
        behavior: impl Fn(&str, usize) -> Result<Vec<Candidate>, SourceFailure> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            behavior: Box::new(behavior),
            threshold: Some(10.0),
            max_variants: 4,
            style: VariantStyle::Catalog,
            fields: None,
            detail: None,
            calls: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Answers every query with one exact-title candidate carrying `value`.
    pub fn answering(id: &'static str, value: &'static str) -> Self {
        Self::new(id, move |variant, _| Ok(vec![hit(id, variant, value)]))
    }

    pub fn failing(id: &'static str, failure: SourceFailure) -> Self {
        Self::new(id, move |_, _| Err(failure.clone()))
    }

    pub fn empty(id: &'static str) -> Self {
        Self::new(id, |_, _| Ok(Vec::new()))
    }

    pub fn with_threshold(mut self, threshold: Option<f64>) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_max_variants(mut self, max: usize) -> Self {
        self.max_variants = max;
        self
    }

    pub fn with_style(mut self, style: VariantStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_fields(mut self, fields: &[MetadataField]) -> Self {
        self.fields = Some(fields.to_vec());
        self
    }

    /// Value returned by `complete` for candidates without one.
    pub fn with_detail(mut self, value: &str) -> Self {
        self.detail = Some(value.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn completes(&self) -> usize {
        self.completes.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceAdapter for StubSource {
    fn id(&self) -> &str {
        self.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::StructuredCatalog
    }

    fn supports(&self, field: MetadataField) -> bool {
        self.fields.as_ref().map_or(true, |fields| fields.contains(&field))
    }

    fn variant_style(&self) -> VariantStyle {
        self.style
    }

    fn max_variants(&self) -> usize {
        self.max_variants
    }

    fn acceptance_threshold(&self) -> Option<f64> {
        self.threshold
    }

    fn platform_namespace(&self) -> Option<PlatformNamespace> {
        None
    }

    async fn attempt(
        &self,
        variant: &str,
        _platform: &PlatformTarget,
        _field: MetadataField,
    ) -> Result<Vec<Candidate>, SourceFailure> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(variant.to_string());
        (self.behavior)(variant, call)
    }

    async fn complete(
        &self,
        candidate: &Candidate,
        _field: MetadataField,
    ) -> Result<Option<String>, SourceFailure> {
        self.completes.fetch_add(1, Ordering::SeqCst);
        Ok(candidate.extracted_value.clone().or_else(|| self.detail.clone()))
    }
}

pub fn hit(source: &str, title: &str, value: &str) -> Candidate {
    Candidate::new(source, format!("{}-{}", source, title), title).with_value(value)
}

/// Canned HTTP responses keyed by URL fragment; anything else is a 404.
#[derive(Default)]
pub struct FixtureHttp {
    routes: Vec<(String, u16, Vec<(String, String)>, String)>,
    requests: Mutex<Vec<(HttpMethod, String)>>,
}

impl FixtureHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, fragment: &str, status: u16, body: &str) -> Self {
        self.routes
            .push((fragment.to_string(), status, Vec::new(), body.to_string()));
        self
    }

    pub fn route_with_headers(
        mut self,
        fragment: &str,
        status: u16,
        headers: &[(&str, &str)],
        body: &str,
    ) -> Self {
        let headers = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.routes
            .push((fragment.to_string(), status, headers, body.to_string()));
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, url)| url.clone())
            .collect()
    }

    pub fn count_matching(&self, fragment: &str) -> usize {
        self.requested().iter().filter(|u| u.contains(fragment)).count()
    }
}

#[async_trait]
impl HttpClient for FixtureHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((request.method, request.url.clone()));

        let route = self
            .routes
            .iter()
            .find(|(fragment, ..)| request.url.contains(fragment.as_str()));

        Ok(match route {
            Some((_, status, headers, body)) => HttpResponse {
                status: *status,
                headers: headers.iter().cloned().collect::<HashMap<_, _>>(),
                body: Bytes::from(body.clone()),
            },
            None => HttpResponse {
                status: 404,
                headers: HashMap::new(),
                body: Bytes::new(),
            },
        })
    }
}

pub fn json_response(status: u16, body: serde_json::Value) -> HttpResponse {
    HttpResponse {
        status,
        headers: HashMap::from([("Content-Type".to_string(), "application/json".to_string())]),
        body: Bytes::from(body.to_string()),
    }
}
