//! Writing resolved values back to the collection.

use crate::error::{MetadataError, Result};
use async_trait::async_trait;
use core_library::{FieldValue, GameRepository, MetadataField};
use std::sync::Arc;
use tracing::debug;

/// Persists a resolved value into the record it was resolved for.
#[async_trait]
pub trait ResultApplier: Send + Sync {
    async fn apply(&self, record_id: i64, field: MetadataField, value: &str) -> Result<()>;
}

/// Applies values through a [`GameRepository`], converting them to the
/// column's storage type first.
pub struct RepositoryApplier {
    repository: Arc<dyn GameRepository>,
}

impl RepositoryApplier {
    pub fn new(repository: Arc<dyn GameRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl ResultApplier for RepositoryApplier {
    async fn apply(&self, record_id: i64, field: MetadataField, value: &str) -> Result<()> {
        let typed = FieldValue::parse(field, value)
            .map_err(|message| MetadataError::Apply { record_id, message })?;

        self.repository.update_field(record_id, field, &typed).await?;
        debug!(record_id, field = %field, value = %typed, "Applied resolved value");
        Ok(())
    }
}
