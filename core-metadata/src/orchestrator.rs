//! # Fallback Orchestrator
//!
//! Resolves one [`Query`] by walking the registered sources in priority order
//! and, within each source, a bounded list of title variants. The first
//! accepted candidate wins; nothing after it is called.
//!
//! ## Failure handling
//!
//! | Failure                 | Action                                          |
//! |-------------------------|-------------------------------------------------|
//! | `Auth`, `QuotaExhausted`| source unusable for the run, next source        |
//! | `RateLimited`           | strike and retry; unusable after N in a row     |
//! | `Transient`             | one retry, then next variant                    |
//! | `NoMatch`, `Malformed`  | next variant                                    |
//!
//! Source states live in the [`RunContext`] passed to every call, so a source
//! disabled on the first query of a batch stays disabled for the rest of it.
//! Request spacing and backoff are enforced by each adapter's transport.

use crate::context::RunContext;
use crate::normalizer::{normalize, scrape_variants, variants};
use crate::platform::{PlatformNamespace, PlatformResolver};
use crate::query::{Candidate, Query, ResolutionResult};
use crate::scorer::MatchScorer;
use crate::sources::{
    PlatformTarget, SourceAdapter, SourceFailure, SourceRegistry, VariantStyle,
};
use bridge_traits::http::HttpClient;
use core_library::MetadataField;
use core_runtime::config::ResolverConfig;
use core_runtime::events::{CoreEvent, EventBus, ResolutionEvent};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Consecutive 429s before a source is given up for the run.
pub const DEFAULT_RATE_LIMIT_STRIKES: u32 = 2;

/// Where the walk goes after one variant.
enum Step {
    Found(String),
    NextVariant,
    NextSource,
}

pub struct FallbackOrchestrator {
    registry: SourceRegistry,
    platforms: PlatformResolver,
    scorer: MatchScorer,
    event_bus: Option<EventBus>,
    rate_limit_strikes: u32,
}

impl FallbackOrchestrator {
    pub fn new(registry: SourceRegistry) -> Self {
        Self {
            registry,
            platforms: PlatformResolver::new(),
            scorer: MatchScorer::new(),
            event_bus: None,
            rate_limit_strikes: DEFAULT_RATE_LIMIT_STRIKES,
        }
    }

    /// Orchestrator over the default sources.
    pub fn from_config(http: Arc<dyn HttpClient>, config: &ResolverConfig) -> Self {
        Self::new(SourceRegistry::from_config(http, config))
            .with_rate_limit_strikes(config.rate_limit_strikes)
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_rate_limit_strikes(mut self, strikes: u32) -> Self {
        self.rate_limit_strikes = strikes.max(1);
        self
    }

    pub fn with_scorer(mut self, scorer: MatchScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_platforms(mut self, platforms: PlatformResolver) -> Self {
        self.platforms = platforms;
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Resolve one query. Never fails: exhaustion is `found: false`.
    #[instrument(
        skip(self, ctx),
        fields(title = %query.raw_title, platform = %query.platform_name, field = %query.desired_field)
    )]
    pub async fn resolve(&self, query: &Query, ctx: &RunContext) -> ResolutionResult {
        let canonical = normalize(&query.raw_title);
        if canonical.is_empty() {
            debug!("Title is empty after normalization");
            return ResolutionResult::not_found();
        }

        let field = query.desired_field;
        let catalog_variants = variants(&query.raw_title);
        let scrape_forms = scrape_variants(&query.raw_title);
        let mut attempts = 0u32;

        for source in self.registry.sources_for(field) {
            let source = source.as_ref();
            if !ctx.is_usable(source.id()) {
                debug!(source = source.id(), "Skipping unusable source");
                continue;
            }

            let target = self.platform_target(&query.platform_name, source.platform_namespace());
            let forms = match source.variant_style() {
                VariantStyle::Catalog => &catalog_variants,
                VariantStyle::Scrape => &scrape_forms,
            };

            for variant in forms.iter().take(source.max_variants()) {
                let step = self
                    .try_variant(source, variant, &target, &canonical, field, ctx, &mut attempts)
                    .await;
                match step {
                    Step::Found(value) => {
                        info!(source = source.id(), variant = %variant, "Resolved");
                        self.emit(ResolutionEvent::Resolved {
                            title: query.raw_title.clone(),
                            field: field.to_string(),
                            source: source.id().to_string(),
                            variant: variant.clone(),
                        });
                        return ResolutionResult::found(value, source.id(), variant.as_str());
                    }
                    Step::NextVariant => {}
                    Step::NextSource => break,
                }
            }
        }

        info!(attempts, "No source resolved the query");
        self.emit(ResolutionEvent::Exhausted {
            title: query.raw_title.clone(),
            field: field.to_string(),
            attempts,
        });
        ResolutionResult::not_found()
    }

    #[allow(clippy::too_many_arguments)]
    async fn try_variant(
        &self,
        source: &dyn SourceAdapter,
        variant: &str,
        target: &PlatformTarget,
        canonical: &str,
        field: MetadataField,
        ctx: &RunContext,
        attempts: &mut u32,
    ) -> Step {
        let candidates = match self
            .call(source, ctx, attempts, move || source.attempt(variant, target, field))
            .await
        {
            Ok(candidates) => candidates,
            Err(failure) => return self.on_failure(source, ctx, failure),
        };
        if candidates.is_empty() {
            return Step::NextVariant;
        }

        let Some(candidate) = self.choose(source, canonical, candidates) else {
            return Step::NextVariant;
        };
        if let Some(value) = candidate.extracted_value.clone() {
            return Step::Found(value);
        }

        let candidate = &candidate;
        match self
            .call(source, ctx, attempts, move || source.complete(candidate, field))
            .await
        {
            Ok(Some(value)) if !value.trim().is_empty() => Step::Found(value),
            Ok(_) => {
                debug!(source = source.id(), candidate = %candidate.display_title, "Selected candidate has no value");
                Step::NextVariant
            }
            Err(failure) => self.on_failure(source, ctx, failure),
        }
    }

    /// Pick the candidate to complete: the first one for unscored sources,
    /// otherwise the best one at or above the source's threshold.
    fn choose(
        &self,
        source: &dyn SourceAdapter,
        canonical: &str,
        candidates: Vec<Candidate>,
    ) -> Option<Candidate> {
        let Some(threshold) = source.acceptance_threshold() else {
            return candidates.into_iter().next();
        };

        let ranked = self.scorer.rank(canonical, candidates);
        let best = self.scorer.select_best(ranked, threshold);
        match &best {
            Some(best) => debug!(
                source = source.id(),
                candidate = %best.candidate.display_title,
                score = best.score,
                "Candidate accepted"
            ),
            None => debug!(source = source.id(), threshold, "No candidate above threshold"),
        }
        best.map(|scored| scored.candidate)
    }

    /// Run one source call, retrying a transient failure once and rate
    /// limits until the strike limit is reached.
    async fn call<T, F, Fut>(
        &self,
        source: &dyn SourceAdapter,
        ctx: &RunContext,
        attempts: &mut u32,
        mut op: F,
    ) -> Result<T, SourceFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceFailure>>,
    {
        let mut retried = false;
        loop {
            *attempts += 1;
            ctx.record_request(source.id());

            match op().await {
                Ok(value) => {
                    ctx.clear_strikes(source.id());
                    return Ok(value);
                }
                Err(SourceFailure::Transient(reason)) if !retried => {
                    debug!(source = source.id(), %reason, "Transient failure, retrying once");
                    retried = true;
                }
                Err(SourceFailure::RateLimited { retry_after }) => {
                    let strikes = ctx.record_rate_limit(source.id());
                    if strikes >= self.rate_limit_strikes {
                        return Err(SourceFailure::RateLimited { retry_after });
                    }
                    debug!(source = source.id(), strikes, ?retry_after, "Rate limited, retrying");
                }
                Err(failure) => {
                    if failure == SourceFailure::NoMatch {
                        ctx.clear_strikes(source.id());
                    }
                    return Err(failure);
                }
            }
        }
    }

    fn on_failure(&self, source: &dyn SourceAdapter, ctx: &RunContext, failure: SourceFailure) -> Step {
        match failure {
            SourceFailure::Auth(_) | SourceFailure::QuotaExhausted(_) => {
                self.disable(source, ctx, failure.to_string());
                Step::NextSource
            }
            SourceFailure::RateLimited { .. } => {
                let reason = format!("rate limited {} times in a row", ctx.strikes(source.id()));
                self.disable(source, ctx, reason);
                Step::NextSource
            }
            SourceFailure::Transient(reason) => {
                warn!(source = source.id(), %reason, "Transient failure persisted, next variant");
                Step::NextVariant
            }
            SourceFailure::Malformed(reason) => {
                warn!(source = source.id(), %reason, "Malformed response");
                Step::NextVariant
            }
            SourceFailure::NoMatch => Step::NextVariant,
        }
    }

    fn disable(&self, source: &dyn SourceAdapter, ctx: &RunContext, reason: String) {
        if ctx.mark_unusable(source.id(), reason.clone()) {
            warn!(source = source.id(), %reason, "Source disabled for this run");
            self.emit(ResolutionEvent::SourceDisabled {
                run_id: ctx.run_id().to_string(),
                source: source.id().to_string(),
                reason,
            });
        }
    }

    fn platform_target(
        &self,
        platform_name: &str,
        namespace: Option<PlatformNamespace>,
    ) -> PlatformTarget {
        PlatformTarget {
            canonical: self.platforms.canonical(platform_name),
            id: namespace.and_then(|ns| self.platforms.resolve(platform_name, ns)),
        }
    }

    fn emit(&self, event: ResolutionEvent) {
        if let Some(bus) = &self.event_bus {
            // No subscribers is fine.
            bus.emit(CoreEvent::Resolution(event)).ok();
        }
    }
}
