use std::str::FromStr;

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::record::{Record, RecordStatus, StoredRecord};

/// Fetch up to `limit` records that have no description and are not marked failed.
///
/// No ORDER BY: records come back in whatever order the table yields them.
pub async fn fetch_eligible(pool: &PgPool, limit: i64) -> Result<Vec<Record>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, uri
        FROM records
        WHERE description IS NULL
          AND status IS DISTINCT FROM $1
        LIMIT $2
        "#,
    )
    .bind(RecordStatus::Failed.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok(Record {
                id: r.try_get("id")?,
                uri: r.try_get("uri")?,
            })
        })
        .collect()
}

/// Mark a record as permanently failed. Returns the number of rows touched.
pub async fn mark_failed(pool: &PgPool, record_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE records
        SET status = $1,
            updated_at = NOW()
        WHERE id = $2
        "#,
    )
    .bind(RecordStatus::Failed.to_string())
    .bind(record_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Store a generated description and clear any status marker.
pub async fn mark_succeeded(
    pool: &PgPool,
    record_id: Uuid,
    description: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE records
        SET description = $1,
            status = NULL,
            updated_at = NOW()
        WHERE id = $2
        "#,
    )
    .bind(description)
    .bind(record_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Get a record by ID
pub async fn get_record(
    pool: &PgPool,
    record_id: Uuid,
) -> Result<Option<StoredRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, uri, description, status, created_at, updated_at
        FROM records
        WHERE id = $1
        "#,
    )
    .bind(record_id)
    .fetch_optional(pool)
    .await?;

    Ok(match row {
        Some(r) => {
            let status_str: Option<String> = r.try_get("status")?;
            let status = status_str
                .as_deref()
                .map(RecordStatus::from_str)
                .transpose()
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

            Some(StoredRecord {
                id: r.try_get("id")?,
                uri: r.try_get("uri")?,
                description: r.try_get("description")?,
                status,
                created_at: r.try_get("created_at")?,
                updated_at: r.try_get("updated_at")?,
            })
        }
        None => None,
    })
}
