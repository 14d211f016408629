//! Retrieval error taxonomy.
//!
//! Store and provider implementations return `anyhow::Result`; the
//! retrievers wrap those failures into [`SearchError`] so the facade can
//! decide which ones trigger a mode downgrade and which ones abort the
//! request.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    /// The embedding provider is misconfigured or the upstream call failed.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(#[source] anyhow::Error),

    /// The vector similarity lookup failed (e.g. missing index).
    #[error("vector store unavailable: {0}")]
    VectorStoreUnavailable(#[source] anyhow::Error),

    /// The keyword lookup failed.
    #[error("keyword store unavailable: {0}")]
    KeywordStoreUnavailable(#[source] anyhow::Error),

    /// Records could not be resolved at all.
    #[error("record store unavailable: {0}")]
    RecordStoreUnavailable(#[source] anyhow::Error),
}

impl SearchError {
    /// The downgrade reason this error produces when it is absorbed by a
    /// fallback, or `None` for errors that always propagate.
    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        match self {
            SearchError::EmbeddingUnavailable(_) => Some(FallbackReason::EmbeddingUnavailable),
            SearchError::VectorStoreUnavailable(_) => Some(FallbackReason::VectorStoreUnavailable),
            SearchError::KeywordStoreUnavailable(_) => {
                Some(FallbackReason::KeywordStoreUnavailable)
            }
            SearchError::RecordStoreUnavailable(_) => None,
        }
    }
}

/// Why a search ran in a narrower mode than requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    EmbeddingUnavailable,
    VectorStoreUnavailable,
    KeywordStoreUnavailable,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::EmbeddingUnavailable => "embedding_unavailable",
            FallbackReason::VectorStoreUnavailable => "vector_store_unavailable",
            FallbackReason::KeywordStoreUnavailable => "keyword_store_unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_path_errors_have_fallback_reasons() {
        let e = SearchError::EmbeddingUnavailable(anyhow::anyhow!("no key"));
        assert_eq!(e.fallback_reason(), Some(FallbackReason::EmbeddingUnavailable));

        let e = SearchError::VectorStoreUnavailable(anyhow::anyhow!("no index"));
        assert_eq!(e.fallback_reason(), Some(FallbackReason::VectorStoreUnavailable));
    }

    #[test]
    fn record_store_errors_never_fall_back() {
        let e = SearchError::RecordStoreUnavailable(anyhow::anyhow!("db gone"));
        assert_eq!(e.fallback_reason(), None);
    }

    #[test]
    fn display_includes_cause() {
        let e = SearchError::EmbeddingUnavailable(anyhow::anyhow!("OPENAI_API_KEY not set"));
        assert_eq!(e.to_string(), "embedding unavailable: OPENAI_API_KEY not set");
    }

    #[test]
    fn reason_serializes_snake_case() {
        let json = serde_json::to_string(&FallbackReason::VectorStoreUnavailable).unwrap();
        assert_eq!(json, "\"vector_store_unavailable\"");
    }
}
