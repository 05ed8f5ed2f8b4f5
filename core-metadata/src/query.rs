//! Query and result types shared by every stage of a resolution.

use core_library::{GameRecord, MetadataField};
use serde::{Deserialize, Serialize};

/// One lookup request: a title, the platform it belongs to and the field to fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub raw_title: String,
    /// Free-text platform name; empty when unknown
    pub platform_name: String,
    pub desired_field: MetadataField,
}

impl Query {
    pub fn new(
        raw_title: impl Into<String>,
        platform_name: impl Into<String>,
        desired_field: MetadataField,
    ) -> Self {
        Self {
            raw_title: raw_title.into(),
            platform_name: platform_name.into(),
            desired_field,
        }
    }

    /// Build the query for one collection record.
    pub fn for_record(record: &GameRecord, field: MetadataField) -> Self {
        Self::new(record.title.clone(), record.platform.clone(), field)
    }
}

/// A possible match returned by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub source_id: String,
    /// Source-specific identifier (catalog id or detail page URL)
    pub external_id: String,
    pub display_title: String,
    /// Present when the search step already carried the field value
    pub extracted_value: Option<String>,
}

impl Candidate {
    pub fn new(
        source_id: impl Into<String>,
        external_id: impl Into<String>,
        display_title: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            external_id: external_id.into(),
            display_title: display_title.into(),
            extracted_value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.extracted_value = Some(value.into());
        self
    }
}

/// A candidate together with its similarity score against the query title.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: f64,
}

/// Outcome of resolving one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub found: bool,
    pub value: Option<String>,
    pub source_id: Option<String>,
    pub variant_used: Option<String>,
}

impl ResolutionResult {
    pub fn found(
        value: impl Into<String>,
        source_id: impl Into<String>,
        variant_used: impl Into<String>,
    ) -> Self {
        Self {
            found: true,
            value: Some(value.into()),
            source_id: Some(source_id.into()),
            variant_used: Some(variant_used.into()),
        }
    }

    pub fn not_found() -> Self {
        Self::default()
    }
}
