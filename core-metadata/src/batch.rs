//! # Batch Resolution
//!
//! Fills one metadata field for every collection record that lacks it.
//!
//! Records are resolved one at a time with a fixed pause between queries so
//! the external sites never see bursts. Only records still missing the field
//! are loaded, which makes an interrupted run safe to start again.
//!
//! ```ignore
//! use core_metadata::batch::{BatchConfig, BatchResolver};
//! use core_metadata::RunContext;
//!
//! let config = BatchConfig::new(MetadataField::CoverImage).with_limit(50);
//! let resolver = BatchResolver::new(config, orchestrator, repository)
//!     .with_event_bus(event_bus)
//!     .with_cancellation(token.clone());
//!
//! let progress = resolver.run(&RunContext::new()).await?;
//! println!("{} found, {} not found", progress.found, progress.not_found);
//! ```

use crate::applier::{RepositoryApplier, ResultApplier};
use crate::context::RunContext;
use crate::error::Result;
use crate::orchestrator::FallbackOrchestrator;
use crate::query::Query;
use core_library::{GameRecord, GameRepository, MetadataField};
use core_runtime::config::ResolverConfig;
use core_runtime::events::{BatchEvent, CoreEvent, EventBus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Field to fill
    pub field: MetadataField,

    /// Pause between two queries
    pub inter_query_delay: Duration,

    /// Maximum number of records to load; all when `None`
    pub limit: Option<u32>,

    /// Resolve without writing anything back
    pub dry_run: bool,
}

impl BatchConfig {
    pub fn new(field: MetadataField) -> Self {
        Self {
            field,
            inter_query_delay: Duration::from_millis(1500),
            limit: None,
            dry_run: false,
        }
    }

    /// Batch settings taking the inter-query delay from resolver configuration.
    pub fn from_resolver_config(field: MetadataField, config: &ResolverConfig) -> Self {
        Self::new(field).with_inter_query_delay(Duration::from_millis(config.inter_query_delay_ms))
    }

    pub fn with_inter_query_delay(mut self, delay: Duration) -> Self {
        self.inter_query_delay = delay;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

// =============================================================================
// Progress Tracking
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub total: usize,
    pub processed: usize,
    pub found: usize,
    pub not_found: usize,
    /// Records whose resolution or write-back failed
    pub failed: usize,
    /// Completion percentage (0-100)
    pub percent_complete: u8,
    /// Found values per source id
    pub sources: BTreeMap<String, usize>,
    /// Stopped before every record was processed
    pub cancelled: bool,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn update(&mut self) {
        self.percent_complete = if self.total > 0 {
            ((self.processed as f64 / self.total as f64) * 100.0).min(100.0) as u8
        } else {
            100
        };
    }
}

/// One record to resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub record_id: i64,
    pub title: String,
    pub platform: String,
}

impl BatchItem {
    pub fn new(record_id: i64, title: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            record_id,
            title: title.into(),
            platform: platform.into(),
        }
    }
}

impl From<GameRecord> for BatchItem {
    fn from(record: GameRecord) -> Self {
        Self::new(record.id, record.title, record.platform)
    }
}

// =============================================================================
// Batch Resolver
// =============================================================================

pub struct BatchResolver {
    config: BatchConfig,
    orchestrator: Arc<FallbackOrchestrator>,
    repository: Arc<dyn GameRepository>,
    applier: Arc<dyn ResultApplier>,
    event_bus: Option<EventBus>,
    cancel: Option<CancellationToken>,
}

impl BatchResolver {
    pub fn new(
        config: BatchConfig,
        orchestrator: Arc<FallbackOrchestrator>,
        repository: Arc<dyn GameRepository>,
    ) -> Self {
        let applier = Arc::new(RepositoryApplier::new(repository.clone()));
        Self {
            config,
            orchestrator,
            repository,
            applier,
            event_bus: None,
            cancel: None,
        }
    }

    pub fn with_applier(mut self, applier: Arc<dyn ResultApplier>) -> Self {
        self.applier = applier;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Stop between two queries once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Resolve every record missing the configured field.
    #[instrument(skip(self, ctx), fields(run_id = ctx.run_id(), field = %self.config.field))]
    pub async fn run(&self, ctx: &RunContext) -> Result<BatchProgress> {
        let records = self
            .repository
            .find_missing(self.config.field, self.config.limit)
            .await?;

        if records.is_empty() {
            info!("No records are missing the field");
        }

        let items = records.into_iter().map(BatchItem::from).collect();
        self.run_items(items, ctx).await
    }

    /// Resolve caller-supplied items.
    pub async fn run_items(&self, items: Vec<BatchItem>, ctx: &RunContext) -> Result<BatchProgress> {
        let started = Instant::now();
        let mut progress = BatchProgress::new(items.len());

        info!(total = items.len(), dry_run = self.config.dry_run, "Starting batch");
        self.emit(BatchEvent::Started {
            run_id: ctx.run_id().to_string(),
            field: self.config.field.to_string(),
            total: items.len() as u64,
        });

        for (index, item) in items.iter().enumerate() {
            if self.is_cancelled() || (index > 0 && !self.pause().await) {
                progress.cancelled = true;
                break;
            }

            match self.process(item, ctx).await {
                Ok(Some(source)) => {
                    progress.found += 1;
                    *progress.sources.entry(source).or_default() += 1;
                }
                Ok(None) => progress.not_found += 1,
                Err(e) => {
                    progress.failed += 1;
                    warn!(record_id = item.record_id, title = %item.title, error = %e, "Record failed");
                    self.emit(BatchEvent::RecordFailed {
                        run_id: ctx.run_id().to_string(),
                        record_id: item.record_id,
                        message: e.to_string(),
                    });
                }
            }

            progress.processed += 1;
            progress.update();
            info!(
                processed = progress.processed,
                total = progress.total,
                found = progress.found,
                not_found = progress.not_found,
                failed = progress.failed,
                "Batch progress"
            );
            self.emit(BatchEvent::Progress {
                run_id: ctx.run_id().to_string(),
                processed: progress.processed as u64,
                total: progress.total as u64,
                found: progress.found as u64,
                not_found: progress.not_found as u64,
                failed: progress.failed as u64,
                percent: progress.percent_complete,
            });
        }

        progress.update();
        for (source, reason) in ctx.disabled_sources() {
            info!(%source, %reason, "Source was disabled during the run");
        }

        if progress.cancelled {
            warn!(processed = progress.processed, "Batch cancelled");
            self.emit(BatchEvent::Cancelled {
                run_id: ctx.run_id().to_string(),
                processed: progress.processed as u64,
            });
        } else {
            info!(
                processed = progress.processed,
                found = progress.found,
                not_found = progress.not_found,
                failed = progress.failed,
                sources = ?progress.sources,
                "Batch completed"
            );
            self.emit(BatchEvent::Completed {
                run_id: ctx.run_id().to_string(),
                processed: progress.processed as u64,
                found: progress.found as u64,
                not_found: progress.not_found as u64,
                failed: progress.failed as u64,
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }

        Ok(progress)
    }

    /// Resolve and apply one item. Returns the answering source id.
    async fn process(&self, item: &BatchItem, ctx: &RunContext) -> Result<Option<String>> {
        let query = Query::new(item.title.clone(), item.platform.clone(), self.config.field);
        let result = self.orchestrator.resolve(&query, ctx).await;

        let (Some(value), Some(source)) = (result.value, result.source_id) else {
            debug!(record_id = item.record_id, "Not found");
            return Ok(None);
        };

        if self.config.dry_run {
            info!(record_id = item.record_id, %source, %value, "Dry run, not applied");
        } else {
            self.applier
                .apply(item.record_id, self.config.field, &value)
                .await?;
        }
        Ok(Some(source))
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|token| token.is_cancelled())
    }

    /// Wait the inter-query delay. `false` when cancelled meanwhile.
    async fn pause(&self) -> bool {
        let delay = self.config.inter_query_delay;
        match &self.cancel {
            Some(token) if !delay.is_zero() => {
                tokio::select! {
                    _ = token.cancelled() => false,
                    _ = sleep(delay) => true,
                }
            }
            Some(token) => !token.is_cancelled(),
            None => {
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                true
            }
        }
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Batch(event)).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent() {
        let mut progress = BatchProgress::new(3);
        progress.processed = 1;
        progress.update();
        assert_eq!(progress.percent_complete, 33);

        let mut empty = BatchProgress::new(0);
        empty.update();
        assert_eq!(empty.percent_complete, 100);
    }

    #[test]
    fn test_config_builder() {
        let config = BatchConfig::new(MetadataField::Genre)
            .with_limit(10)
            .with_dry_run(true)
            .with_inter_query_delay(Duration::ZERO);
        assert_eq!(config.limit, Some(10));
        assert!(config.dry_run);
        assert_eq!(config.inter_query_delay, Duration::ZERO);
    }

    #[test]
    fn test_config_from_resolver_config() {
        let resolver = ResolverConfig::builder()
            .inter_query_delay_ms(250)
            .build()
            .unwrap();
        let config = BatchConfig::from_resolver_config(MetadataField::Description, &resolver);
        assert_eq!(config.inter_query_delay, Duration::from_millis(250));
        assert_eq!(config.field, MetadataField::Description);
    }
}
