//! Single-record lookup for interactive callers.

use crate::context::RunContext;
use crate::orchestrator::FallbackOrchestrator;
use crate::query::{Query, ResolutionResult};
use core_library::MetadataField;
use serde::{Deserialize, Serialize};

/// The JSON answer handed back to an interactive caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResponse {
    pub found: bool,
    pub value: Option<String>,
    pub source: Option<String>,
    /// Set when nothing was found
    pub message: Option<String>,
}

impl LookupResponse {
    pub fn from_result(result: &ResolutionResult, field: MetadataField) -> Self {
        if result.found {
            Self {
                found: true,
                value: result.value.clone(),
                source: result.source_id.clone(),
                message: None,
            }
        } else {
            Self {
                found: false,
                value: None,
                source: None,
                message: Some(not_found_message(field)),
            }
        }
    }
}

pub fn not_found_message(field: MetadataField) -> String {
    format!(
        "Could not find {} automatically, please enter it manually",
        field.label()
    )
}

/// Resolve one query in a fresh run and shape the answer for display.
pub async fn lookup(orchestrator: &FallbackOrchestrator, query: &Query) -> LookupResponse {
    let ctx = RunContext::new();
    let result = orchestrator.resolve(query, &ctx).await;
    LookupResponse::from_result(&result, query.desired_field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceRegistry;
    use serde_json::json;

    #[test]
    fn test_found_response_json() {
        let result = ResolutionResult::found("https://img.example/halo2.jpg", "thegamesdb", "Halo 2");
        let response = LookupResponse::from_result(&result, MetadataField::CoverImage);

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "found": true,
                "value": "https://img.example/halo2.jpg",
                "source": "thegamesdb",
                "message": null
            })
        );
    }

    #[test]
    fn test_not_found_message_names_field() {
        let response =
            LookupResponse::from_result(&ResolutionResult::not_found(), MetadataField::CriticRating);
        assert!(!response.found);
        assert_eq!(response.value, None);
        assert_eq!(
            response.message,
            Some(not_found_message(MetadataField::CriticRating))
        );
        assert!(response
            .message
            .unwrap()
            .starts_with(&format!("Could not find {}", MetadataField::CriticRating.label())));
    }

    #[tokio::test]
    async fn test_lookup_without_sources() {
        let orchestrator = FallbackOrchestrator::new(SourceRegistry::new());
        let query = Query::new("Ico", "PlayStation 2", MetadataField::Genre);
        let response = lookup(&orchestrator, &query).await;
        assert!(!response.found);
        assert!(response.message.is_some());
    }
}
