use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::queries;
use crate::models::record::Record;

/// Persistence boundary for the reconciliation loop.
///
/// Both mutations are unconditional single-record writes keyed by id. Writing
/// to an id that no longer exists is not an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Up to `limit` eligible records, projected to id and uri. Empty when
    /// nothing is eligible.
    async fn fetch_eligible(&self, limit: usize) -> Result<Vec<Record>, StoreError>;

    /// Set the failure marker. Idempotent.
    async fn mark_failed(&self, id: Uuid) -> Result<(), StoreError>;

    /// Set the description and clear the status. Idempotent.
    async fn mark_succeeded(&self, id: Uuid, description: &str) -> Result<(), StoreError>;
}

/// `RecordStore` backed by the `records` table in PostgreSQL.
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn fetch_eligible(&self, limit: usize) -> Result<Vec<Record>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(queries::fetch_eligible(&self.pool, limit).await?)
    }

    async fn mark_failed(&self, id: Uuid) -> Result<(), StoreError> {
        let touched = queries::mark_failed(&self.pool, id).await?;
        if touched == 0 {
            tracing::debug!(record_id = %id, "Record vanished before failure marker was written");
        }
        Ok(())
    }

    async fn mark_succeeded(&self, id: Uuid, description: &str) -> Result<(), StoreError> {
        let touched = queries::mark_succeeded(&self.pool, id, description).await?;
        if touched == 0 {
            tracing::debug!(record_id = %id, "Record vanished before description was written");
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record store unavailable: {0}")]
    Database(#[from] sqlx::Error),
}
