//! Vector retriever: query embedding → ranked `(id, similarity)` hits.
//!
//! Whatever the backing [`VectorStore`] returns, the output of [`search`]
//! holds these invariants:
//!
//! 1. every hit has `similarity > threshold_min`;
//! 2. no id appears twice (the highest similarity wins);
//! 3. ordered by similarity desc, then id asc;
//! 4. at most `limit` hits.

use std::collections::HashMap;

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::SearchError;
use crate::models::VectorHit;
use crate::store::VectorStore;

/// Run a similarity lookup for an already-embedded query.
pub async fn search(
    store: &dyn VectorStore,
    query_vec: &[f32],
    limit: usize,
    threshold_min: f64,
) -> Result<Vec<VectorHit>, SearchError> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let raw = store
        .vector_search(query_vec, threshold_min, limit)
        .await
        .map_err(SearchError::VectorStoreUnavailable)?;
    Ok(normalize_hits(raw, limit, threshold_min))
}

/// Embed `query` and run [`search`]. Embedding failures surface as
/// [`SearchError::EmbeddingUnavailable`].
pub async fn embed_and_search(
    provider: &dyn EmbeddingProvider,
    store: &dyn VectorStore,
    query: &str,
    limit: usize,
    threshold_min: f64,
) -> Result<Vec<VectorHit>, SearchError> {
    let query_vec = embed_query(provider, query)
        .await
        .map_err(SearchError::EmbeddingUnavailable)?;
    search(store, &query_vec, limit, threshold_min).await
}

fn normalize_hits(raw: Vec<VectorHit>, limit: usize, threshold_min: f64) -> Vec<VectorHit> {
    let mut best: HashMap<String, f64> = HashMap::with_capacity(raw.len());
    for hit in raw {
        if hit.similarity.is_nan() || hit.similarity <= threshold_min {
            continue;
        }
        best.entry(hit.id)
            .and_modify(|s| *s = s.max(hit.similarity))
            .or_insert(hit.similarity);
    }

    let mut hits: Vec<VectorHit> = best
        .into_iter()
        .map(|(id, similarity)| VectorHit { id, similarity })
        .collect();
    hits.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(limit);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    struct Canned(Vec<VectorHit>);

    #[async_trait]
    impl VectorStore for Canned {
        async fn vector_search(&self, _q: &[f32], _min: f64, _limit: usize) -> Result<Vec<VectorHit>> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    #[async_trait]
    impl VectorStore for Broken {
        async fn vector_search(&self, _q: &[f32], _min: f64, _limit: usize) -> Result<Vec<VectorHit>> {
            anyhow::bail!("relation \"experiments_embedding_idx\" does not exist")
        }
    }

    fn hit(id: &str, similarity: f64) -> VectorHit {
        VectorHit {
            id: id.to_string(),
            similarity,
        }
    }

    #[tokio::test]
    async fn ties_break_by_id_ascending() {
        let store = Canned(vec![hit("c", 0.8), hit("a", 0.8), hit("b", 0.9)]);
        let hits = search(&store, &[1.0], 10, 0.5).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn threshold_is_exclusive_and_nan_dropped() {
        let store = Canned(vec![hit("a", 0.5), hit("b", 0.51), hit("c", f64::NAN)]);
        let hits = search(&store, &[1.0], 10, 0.5).await.unwrap();
        assert_eq!(hits, vec![hit("b", 0.51)]);
    }

    #[tokio::test]
    async fn duplicates_keep_best_similarity_and_limit_applies() {
        let store = Canned(vec![hit("a", 0.6), hit("a", 0.95), hit("b", 0.7), hit("c", 0.8)]);
        let hits = search(&store, &[1.0], 2, 0.0).await.unwrap();
        assert_eq!(hits, vec![hit("a", 0.95), hit("c", 0.8)]);
    }

    #[tokio::test]
    async fn store_failure_is_vector_store_unavailable() {
        let err = search(&Broken, &[1.0], 5, 0.5).await.unwrap_err();
        assert!(matches!(err, SearchError::VectorStoreUnavailable(_)));
    }

    #[tokio::test]
    async fn zero_limit_skips_the_store() {
        assert!(search(&Broken, &[1.0], 0, 0.5).await.unwrap().is_empty());
    }
}
