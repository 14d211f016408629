//! Schema bootstrap for the experiment catalog.
//!
//! Creates the single `experiments` table and its indexes. Every statement
//! is `IF NOT EXISTS`, so running `cro init` repeatedly is safe.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // embedding: little-endian f32 BLOB, NULL until `cro embed pending` runs
    // search_text: keyword fields lower-cased in Rust, see sqlite_store
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS experiments (
            id TEXT PRIMARY KEY,
            experiment_id TEXT NOT NULL UNIQUE,
            test_name TEXT,
            hypothesis TEXT,
            lessons_learned TEXT,
            vertical TEXT,
            geo TEXT,
            brand TEXT,
            status TEXT,
            winning_var TEXT,
            primary_metric_name TEXT,
            date_launched TEXT,
            date_concluded TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            embedding BLOB,
            embedding_model TEXT,
            search_text TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    let has_search_text: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('experiments') WHERE name = 'search_text'",
    )
    .fetch_one(pool)
    .await?;
    if has_search_text == 0 {
        sqlx::query("ALTER TABLE experiments ADD COLUMN search_text TEXT NOT NULL DEFAULT ''")
            .execute(pool)
            .await?;
    }
    let reindexed = SqliteStore::new(pool.clone()).reindex_search_text().await?;
    if reindexed > 0 {
        tracing::info!(rows = reindexed, "rebuilt keyword search text");
    }

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_experiments_created_at ON experiments(created_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_experiments_vertical ON experiments(vertical)")
        .execute(pool)
        .await?;

    Ok(())
}
