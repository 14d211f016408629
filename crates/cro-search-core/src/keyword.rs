//! Keyword retriever: case-insensitive substring match over the
//! experiment text fields.
//!
//! Matches are unscored; the store's newest-first order is kept. A blank
//! query yields no hits and never reaches the store.

use std::collections::HashSet;

use crate::error::SearchError;
use crate::models::KeywordHit;
use crate::store::KeywordStore;

/// Trim and case-fold a query into the needle the store matches on.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

pub async fn search(
    store: &dyn KeywordStore,
    query_text: &str,
    limit: usize,
) -> Result<Vec<KeywordHit>, SearchError> {
    let needle = normalize_query(query_text);
    if needle.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let raw = store
        .keyword_search(&needle, limit)
        .await
        .map_err(SearchError::KeywordStoreUnavailable)?;

    let mut seen = HashSet::with_capacity(raw.len());
    let mut hits: Vec<KeywordHit> = raw.into_iter().filter(|h| seen.insert(h.id.clone())).collect();
    hits.truncate(limit);
    Ok(hits)
}
