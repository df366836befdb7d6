//! Schema migrations, compiled into the binary from `migrations/sqlite/`.
//!
//! Files are applied in numeric order and recorded in `_sqlx_migrations`.
//! A shipped file is never edited; schema changes go in a new `NNN_*.sql`.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every migration the database has not seen yet.
pub async fn apply(pool: &SqlitePool) -> DbResult<()> {
    let before = pending(pool).await?;
    MIGRATOR.run(pool).await?;

    if before > 0 {
        info!(applied = before, "Schema migrated");
    }
    Ok(())
}

/// Number of embedded migrations not yet recorded as applied.
pub async fn pending(pool: &SqlitePool) -> DbResult<usize> {
    // The bookkeeping table does not exist before the first run.
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok(MIGRATOR.migrations.len().saturating_sub(applied as usize))
}
