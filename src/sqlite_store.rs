//! SQLite-backed implementation of the core store traits.
//!
//! One `experiments` table serves all three roles: keyword lookup with
//! `instr` substring matching over a case-folded `search_text` column,
//! vector lookup over stored
//! embedding BLOBs (cosine similarity computed in Rust), and bulk record
//! resolution. The catalog operations used by the CLI and HTTP API live
//! here too.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use cro_search_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use cro_search_core::store::{KeywordStore, RecordStore, VectorStore};
use cro_search_core::{ExperimentRecord, KeywordHit, VectorHit};

const COLUMNS: &str = "id, experiment_id, test_name, hypothesis, lessons_learned, vertical, geo, \
    brand, status, winning_var, primary_metric_name, date_launched, date_concluded, \
    created_at, updated_at";

/// SQLite holds at most 32766 bound parameters per statement.
const FETCH_BATCH: usize = 500;

/// Joins the keyword fields in `search_text` so a needle cannot match
/// across two fields.
const FIELD_SEPARATOR: &str = "\u{1f}";

/// The keyword fields, lower-cased in Rust. SQLite's `lower()` only folds
/// ASCII, so the folded copy is stored alongside the record.
fn search_text(record: &ExperimentRecord) -> String {
    record
        .keyword_fields()
        .iter()
        .flatten()
        .map(|field| field.to_lowercase())
        .collect::<Vec<_>>()
        .join(FIELD_SEPARATOR)
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a record, or update the one sharing its `experiment_id`.
    ///
    /// An update keeps the stored row id and `created_at`. The stored
    /// embedding is cleared when any searchable field changed, so the
    /// record shows up again in `cro embed pending`. `record.embedding` is
    /// not written; vectors go through [`set_embedding`](Self::set_embedding)
    /// so they always carry their model name. Returns the row id.
    pub async fn upsert_experiment(&self, record: &ExperimentRecord) -> Result<String> {
        let id: String = sqlx::query_scalar(
            r#"
            INSERT INTO experiments (id, experiment_id, test_name, hypothesis, lessons_learned,
                                     vertical, geo, brand, status, winning_var,
                                     primary_metric_name, date_launched, date_concluded,
                                     created_at, updated_at, search_text)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(experiment_id) DO UPDATE SET
                embedding = CASE
                    WHEN experiments.test_name IS excluded.test_name
                     AND experiments.hypothesis IS excluded.hypothesis
                     AND experiments.lessons_learned IS excluded.lessons_learned
                     AND experiments.vertical IS excluded.vertical
                     AND experiments.geo IS excluded.geo
                    THEN experiments.embedding ELSE NULL END,
                embedding_model = CASE
                    WHEN experiments.test_name IS excluded.test_name
                     AND experiments.hypothesis IS excluded.hypothesis
                     AND experiments.lessons_learned IS excluded.lessons_learned
                     AND experiments.vertical IS excluded.vertical
                     AND experiments.geo IS excluded.geo
                    THEN experiments.embedding_model ELSE NULL END,
                test_name = excluded.test_name,
                hypothesis = excluded.hypothesis,
                lessons_learned = excluded.lessons_learned,
                vertical = excluded.vertical,
                geo = excluded.geo,
                brand = excluded.brand,
                status = excluded.status,
                winning_var = excluded.winning_var,
                primary_metric_name = excluded.primary_metric_name,
                date_launched = excluded.date_launched,
                date_concluded = excluded.date_concluded,
                updated_at = excluded.updated_at,
                search_text = excluded.search_text
            RETURNING id
            "#,
        )
        .bind(&record.id)
        .bind(&record.experiment_id)
        .bind(&record.test_name)
        .bind(&record.hypothesis)
        .bind(&record.lessons_learned)
        .bind(&record.vertical)
        .bind(&record.geo)
        .bind(&record.brand)
        .bind(&record.status)
        .bind(&record.winning_var)
        .bind(&record.primary_metric_name)
        .bind(&record.date_launched)
        .bind(&record.date_concluded)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(search_text(record))
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to upsert experiment {}", record.experiment_id))?;

        Ok(id)
    }

    /// Recompute `search_text` for rows that have none, e.g. rows written
    /// before the column existed. Returns the number of rows updated.
    pub async fn reindex_search_text(&self) -> Result<usize> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM experiments WHERE search_text = ''"
        ))
        .fetch_all(&self.pool)
        .await?;

        for record in rows.iter().map(row_to_record) {
            sqlx::query("UPDATE experiments SET search_text = ? WHERE id = ?")
                .bind(search_text(&record))
                .bind(&record.id)
                .execute(&self.pool)
                .await?;
        }
        Ok(rows.len())
    }

    pub async fn get_experiment(&self, id: &str) -> Result<Option<ExperimentRecord>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM experiments WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_record))
    }

    /// Newest first, `created_at DESC, id ASC`.
    pub async fn list_experiments(&self, offset: i64, limit: i64) -> Result<Vec<ExperimentRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM experiments ORDER BY created_at DESC, id ASC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    pub async fn count_experiments(&self) -> Result<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM experiments")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    /// Records with no stored embedding, newest first.
    pub async fn pending_embeddings(&self, limit: Option<usize>) -> Result<Vec<ExperimentRecord>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM experiments WHERE embedding IS NULL \
             ORDER BY created_at DESC, id ASC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    pub async fn set_embedding(&self, id: &str, vector: &[f32], model: &str) -> Result<()> {
        sqlx::query("UPDATE experiments SET embedding = ?, embedding_model = ? WHERE id = ?")
            .bind(vec_to_blob(vector))
            .bind(model)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_record(row: &SqliteRow) -> ExperimentRecord {
    ExperimentRecord {
        id: row.get("id"),
        experiment_id: row.get("experiment_id"),
        test_name: row.get("test_name"),
        hypothesis: row.get("hypothesis"),
        lessons_learned: row.get("lessons_learned"),
        vertical: row.get("vertical"),
        geo: row.get("geo"),
        brand: row.get("brand"),
        status: row.get("status"),
        winning_var: row.get("winning_var"),
        primary_metric_name: row.get("primary_metric_name"),
        date_launched: row.get("date_launched"),
        date_concluded: row.get("date_concluded"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        embedding: None,
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn vector_search(
        &self,
        query_vec: &[f32],
        min_similarity: f64,
        limit: usize,
    ) -> Result<Vec<VectorHit>> {
        let rows = sqlx::query("SELECT id, embedding FROM experiments WHERE embedding IS NOT NULL")
            .fetch_all(&self.pool)
            .await
            .context("Failed to load experiment embeddings")?;

        let mut hits: Vec<VectorHit> = rows
            .iter()
            .filter_map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let similarity = cosine_similarity(query_vec, &blob_to_vec(&blob)) as f64;
                (similarity > min_similarity).then(|| VectorHit {
                    id: row.get("id"),
                    similarity,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(limit);

        Ok(hits)
    }
}

#[async_trait]
impl KeywordStore for SqliteStore {
    async fn keyword_search(&self, needle: &str, limit: usize) -> Result<Vec<KeywordHit>> {
        // the needle arrives trimmed and lower-cased
        let rows = sqlx::query(
            r#"
            SELECT id FROM experiments
            WHERE instr(search_text, ?) > 0
            ORDER BY created_at DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(needle)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Keyword query failed")?;

        Ok(rows
            .iter()
            .map(|row| KeywordHit { id: row.get("id") })
            .collect())
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<ExperimentRecord>> {
        let mut records = Vec::with_capacity(ids.len());
        for batch in ids.chunks(FETCH_BATCH) {
            let placeholders = vec!["?"; batch.len()].join(", ");
            let sql = format!("SELECT {COLUMNS} FROM experiments WHERE id IN ({placeholders})");
            let mut query = sqlx::query(&sql);
            for id in batch {
                query = query.bind(id);
            }
            let rows = query.fetch_all(&self.pool).await?;
            records.extend(rows.iter().map(row_to_record));
        }
        Ok(records)
    }
}
