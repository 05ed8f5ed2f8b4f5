//! # Metadata Resolution Module
//!
//! Finds missing metadata for games in a collection (cover art, release
//! date, genre, description, critic rating, market price) by querying a
//! prioritized list of external sources.
//!
//! ## Overview
//!
//! - [`normalizer`] turns messy titles into a canonical form and ordered search variants
//! - [`platform`] maps free-text platform names to each source's identifiers
//! - [`scorer`] rates how well a candidate title matches the query
//! - [`sources`] holds the adapters for catalog APIs and scraped sites
//! - [`orchestrator`] walks sources and variants until a candidate is accepted
//! - [`applier`] and [`batch`] write results back to the collection
//! - [`lookup`] shapes a single answer for interactive callers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_metadata::{FallbackOrchestrator, Query, RunContext};
//! use core_library::MetadataField;
//!
//! let orchestrator = FallbackOrchestrator::from_config(http_client, &config);
//! let ctx = RunContext::new();
//!
//! let query = Query::new("007: Nightfire (USA)", "PS2", MetadataField::CoverImage);
//! let result = orchestrator.resolve(&query, &ctx).await;
//! if result.found {
//!     println!("{} from {:?}", result.value.unwrap(), result.source_id);
//! }
//! ```

pub mod applier;
pub mod batch;
pub mod context;
pub mod error;
pub mod lookup;
pub mod normalizer;
pub mod orchestrator;
pub mod platform;
pub mod query;
pub mod rate_limit;
pub mod scorer;
pub mod sources;

pub use applier::{RepositoryApplier, ResultApplier};
pub use batch::{BatchConfig, BatchItem, BatchProgress, BatchResolver};
pub use context::{RunContext, SourceState};
pub use error::{MetadataError, Result};
pub use lookup::{lookup, LookupResponse};
pub use orchestrator::FallbackOrchestrator;
pub use platform::{PlatformNamespace, PlatformResolver};
pub use query::{Candidate, Query, ResolutionResult, ScoredCandidate};
pub use scorer::MatchScorer;
pub use sources::{SourceAdapter, SourceFailure, SourceRegistry};
