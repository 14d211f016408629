//! In-memory store implementation for tests and embedding-free setups.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Vector search is
//! brute-force cosine similarity over every stored vector.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{ExperimentRecord, KeywordHit, VectorHit};

use super::{KeywordStore, RecordStore, VectorStore};

/// In-memory experiment store.
pub struct InMemoryStore {
    records: RwLock<HashMap<String, ExperimentRecord>>,
    vector_index_offline: AtomicBool,
    keyword_index_offline: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            vector_index_offline: AtomicBool::new(false),
            keyword_index_offline: AtomicBool::new(false),
        }
    }

    /// Insert or replace a record by `id`.
    pub fn insert(&self, record: ExperimentRecord) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert(record.id.clone(), record);
    }

    /// Remove a record, returning it if present.
    pub fn remove(&self, id: &str) -> Option<ExperimentRecord> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.remove(id)
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every subsequent vector search fail, as if the index were gone.
    pub fn set_vector_index_offline(&self, offline: bool) {
        self.vector_index_offline.store(offline, Ordering::SeqCst);
    }

    /// Make every subsequent keyword search fail.
    pub fn set_keyword_index_offline(&self, offline: bool) {
        self.keyword_index_offline.store(offline, Ordering::SeqCst);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn vector_search(
        &self,
        query_vec: &[f32],
        min_similarity: f64,
        limit: usize,
    ) -> Result<Vec<VectorHit>> {
        if self.vector_index_offline.load(Ordering::SeqCst) {
            bail!("vector index is not available");
        }
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        let mut hits: Vec<VectorHit> = records
            .values()
            .filter_map(|r| {
                let stored = r.embedding.as_deref()?;
                let similarity = cosine_similarity(query_vec, stored) as f64;
                (similarity > min_similarity).then(|| VectorHit {
                    id: r.id.clone(),
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
impl KeywordStore for InMemoryStore {
    async fn keyword_search(&self, needle: &str, limit: usize) -> Result<Vec<KeywordHit>> {
        if self.keyword_index_offline.load(Ordering::SeqCst) {
            bail!("keyword index is not available");
        }
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        let mut matches: Vec<&ExperimentRecord> = records
            .values()
            .filter(|r| r.matches_keyword(needle))
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(matches
            .into_iter()
            .take(limit)
            .map(|r| KeywordHit { id: r.id.clone() })
            .collect())
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<ExperimentRecord>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
    }
}
