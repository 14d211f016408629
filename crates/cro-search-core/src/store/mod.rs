//! Storage abstraction consumed by the retrieval pipeline.
//!
//! The search facade reads from three logical stores. They are separate
//! traits because deployments may back them differently (e.g. a vector
//! index next to a relational catalog), but a single type can implement
//! all three, as [`memory::InMemoryStore`] and the application's SQLite
//! store do.
//!
//! Implementations must be `Send + Sync` and are expected to serve each
//! call with a single logical read.
//!
//! | Trait | Method | Returns |
//! |-------|--------|---------|
//! | [`VectorStore`] | [`vector_search`](VectorStore::vector_search) | `(id, similarity)` pairs above a threshold |
//! | [`KeywordStore`] | [`keyword_search`](KeywordStore::keyword_search) | ids whose text fields contain the needle |
//! | [`RecordStore`] | [`fetch_by_ids`](RecordStore::fetch_by_ids) | full records, in any order |

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ExperimentRecord, KeywordHit, VectorHit};

/// Similarity lookup over stored experiment embeddings.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Return records whose stored vector has similarity strictly greater
    /// than `min_similarity` to `query_vec`, most similar first, at most
    /// `limit` of them. Records without a stored vector are skipped.
    async fn vector_search(
        &self,
        query_vec: &[f32],
        min_similarity: f64,
        limit: usize,
    ) -> Result<Vec<VectorHit>>;
}

/// Case-insensitive substring lookup over the experiment text fields.
#[async_trait]
pub trait KeywordStore: Send + Sync {
    /// `needle` is already trimmed and lower-cased. Results are ordered
    /// newest first (`created_at` desc, then `id` asc).
    async fn keyword_search(&self, needle: &str, limit: usize) -> Result<Vec<KeywordHit>>;
}

/// Bulk record lookup.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the records for `ids`. Unknown ids are omitted and the result
    /// order is unspecified.
    async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<ExperimentRecord>>;
}
