use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// Connect to the database holding the `records` table.
///
/// The loop issues one query or update at a time, so one connection does the
/// work and a second covers reconnects. A short acquire timeout turns an
/// unreachable database into a `StoreError` the loop can back off from.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(2)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(300))
        .connect(database_url)
        .await
}

/// Create or upgrade the `records` table from the embedded migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

/// Pool plus migrations: what the worker needs before its first query.
pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = init_pool(database_url).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

pub mod queries;
pub mod store;
