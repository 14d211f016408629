//! Search facade: the single entry point for experiment search.
//!
//! [`SearchEngine`] owns injected handles to the embedding provider and the
//! three stores, and walks each request through the same lifecycle:
//!
//! ```text
//! Idle ──blank query──────────────────────────────────────────▶ Done([])
//!  │
//!  ▼ mode selected
//!  ├─ keyword ─▶ KeywordPath ─────────────────────────────────▶ resolve ─▶ Done
//!  ├─ vector  ─▶ VectorPath ──ok─────────────────────────────▶ resolve ─▶ Done
//!  │                └──embedding/vector error──▶ KeywordPath (downgraded)
//!  └─ hybrid  ─▶ BothPaths (concurrent, joined) ──▶ Fused ───▶ resolve ─▶ Done
//!                   └──vector path error──▶ keyword hits only (downgraded)
//! ```
//!
//! A downgrade is never silent: it is logged at `warn` and reported in
//! [`SearchOutcome::fallback`] alongside the mode that actually ran. Only a
//! keyword-store failure with no usable vector results, or a record-store
//! failure, is returned as an error.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::{FallbackReason, SearchError};
use crate::fusion::{self, FusionWeights};
use crate::keyword;
use crate::models::{ExperimentRecord, RetrievalMode};
use crate::store::{KeywordStore, RecordStore, VectorStore};
use crate::vector;

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    /// Result count used when the caller gives none, or an invalid one.
    pub default_limit: usize,
    /// Default weight of semantic similarity in hybrid fusion.
    pub vector_weight: f64,
    /// Relevance credited to a keyword match before weighting.
    pub keyword_bonus: f64,
    /// Hybrid mode fetches `limit × candidate_multiplier` candidates per path.
    pub candidate_multiplier: usize,
    /// Minimum similarity for pure vector mode.
    pub vector_threshold: f64,
    /// Minimum similarity for the vector half of hybrid mode.
    pub hybrid_threshold: f64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            default_limit: 20,
            vector_weight: 0.7,
            keyword_bonus: 0.8,
            candidate_multiplier: 2,
            vector_threshold: 0.7,
            hybrid_threshold: 0.5,
        }
    }
}

/// One search invocation.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    /// Values `<= 0` are replaced by [`SearchParams::default_limit`].
    pub limit: Option<i64>,
    pub mode: RetrievalMode,
    /// Overrides [`SearchParams::vector_weight`]; clamped to `[0, 1]`.
    pub vector_weight: Option<f64>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: RetrievalMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_vector_weight(mut self, weight: f64) -> Self {
        self.vector_weight = Some(weight);
        self
    }
}

/// The externally visible result of a search.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    /// Resolved records, best first.
    pub experiments: Vec<ExperimentRecord>,
    pub requested_mode: RetrievalMode,
    /// The mode that actually produced the results.
    #[serde(rename = "mode")]
    pub executed_mode: RetrievalMode,
    /// Set when the search ran in a narrower mode than requested.
    pub fallback: Option<FallbackReason>,
    /// Ids dropped because their record disappeared before resolution.
    pub unresolved: usize,
}

impl SearchOutcome {
    fn empty(mode: RetrievalMode) -> Self {
        Self {
            experiments: Vec::new(),
            requested_mode: mode,
            executed_mode: mode,
            fallback: None,
            unresolved: 0,
        }
    }
}

/// Ranked ids from the retrieval phase, before record resolution.
struct Ranked {
    ids: Vec<String>,
    executed: RetrievalMode,
    fallback: Option<FallbackReason>,
}

/// Hybrid keyword + vector search over the experiment catalog.
pub struct SearchEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: Arc<dyn VectorStore>,
    keywords: Arc<dyn KeywordStore>,
    records: Arc<dyn RecordStore>,
    params: SearchParams,
}

impl SearchEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStore>,
        keywords: Arc<dyn KeywordStore>,
        records: Arc<dyn RecordStore>,
        params: SearchParams,
    ) -> Self {
        Self {
            embedder,
            vectors,
            keywords,
            records,
            params,
        }
    }

    /// Build an engine whose three stores are the same backend.
    pub fn from_store<S>(embedder: Arc<dyn EmbeddingProvider>, store: Arc<S>, params: SearchParams) -> Self
    where
        S: VectorStore + KeywordStore + RecordStore + 'static,
    {
        Self::new(embedder, store.clone(), store.clone(), store, params)
    }

    /// Run a search. Retrieval-path failures downgrade the mode instead of
    /// failing; see the module docs for which errors propagate.
    pub async fn search(&self, req: &SearchRequest) -> Result<SearchOutcome, SearchError> {
        let query = req.query.trim();
        if query.is_empty() {
            debug!(mode = %req.mode, "blank query, skipping retrieval");
            return Ok(SearchOutcome::empty(req.mode));
        }

        let limit = self.effective_limit(req.limit);
        let ranked = match req.mode {
            RetrievalMode::Keyword => self.keyword_path(query, limit).await?,
            RetrievalMode::Vector => self.vector_path(query, limit).await?,
            RetrievalMode::Hybrid => {
                let weights = self.effective_weights(req.vector_weight);
                self.both_paths(query, limit, weights).await?
            }
        };

        let (experiments, unresolved) = self.resolve(&ranked.ids).await?;

        info!(
            requested_mode = %req.mode,
            executed_mode = %ranked.executed,
            fallback = ranked.fallback.map(|r| r.as_str()).unwrap_or("none"),
            results = experiments.len(),
            "search complete"
        );

        Ok(SearchOutcome {
            experiments,
            requested_mode: req.mode,
            executed_mode: ranked.executed,
            fallback: ranked.fallback,
            unresolved,
        })
    }

    async fn keyword_path(&self, query: &str, limit: usize) -> Result<Ranked, SearchError> {
        let hits = keyword::search(self.keywords.as_ref(), query, limit).await?;
        Ok(Ranked {
            ids: hits.into_iter().map(|h| h.id).collect(),
            executed: RetrievalMode::Keyword,
            fallback: None,
        })
    }

    async fn vector_path(&self, query: &str, limit: usize) -> Result<Ranked, SearchError> {
        let result = vector::embed_and_search(
            self.embedder.as_ref(),
            self.vectors.as_ref(),
            query,
            limit,
            self.params.vector_threshold,
        )
        .await;

        match result {
            Ok(hits) => Ok(Ranked {
                ids: hits.into_iter().map(|h| h.id).collect(),
                executed: RetrievalMode::Vector,
                fallback: None,
            }),
            Err(err) => {
                log_downgrade(RetrievalMode::Vector, RetrievalMode::Keyword, &err);
                let mut ranked = self.keyword_path(query, limit).await?;
                ranked.fallback = err.fallback_reason();
                Ok(ranked)
            }
        }
    }

    async fn both_paths(
        &self,
        query: &str,
        limit: usize,
        weights: FusionWeights,
    ) -> Result<Ranked, SearchError> {
        let candidates = limit.saturating_mul(self.params.candidate_multiplier.max(1));

        // Join barrier: neither branch cancels the other.
        let (vector_result, keyword_result) = tokio::join!(
            vector::embed_and_search(
                self.embedder.as_ref(),
                self.vectors.as_ref(),
                query,
                candidates,
                self.params.hybrid_threshold,
            ),
            keyword::search(self.keywords.as_ref(), query, candidates),
        );

        match (vector_result, keyword_result) {
            (Ok(vector_hits), Ok(keyword_hits)) => {
                let fused = fusion::fuse(&vector_hits, &keyword_hits, weights, limit);
                debug!(
                    vector_candidates = vector_hits.len(),
                    keyword_candidates = keyword_hits.len(),
                    fused = fused.len(),
                    vector_weight = weights.vector_weight,
                    "fused hybrid candidates"
                );
                Ok(Ranked {
                    ids: fused.into_iter().map(|s| s.id).collect(),
                    executed: RetrievalMode::Hybrid,
                    fallback: None,
                })
            }
            (Err(err), Ok(mut keyword_hits)) => {
                log_downgrade(RetrievalMode::Hybrid, RetrievalMode::Keyword, &err);
                keyword_hits.truncate(limit);
                Ok(Ranked {
                    ids: keyword_hits.into_iter().map(|h| h.id).collect(),
                    executed: RetrievalMode::Keyword,
                    fallback: err.fallback_reason(),
                })
            }
            (Ok(vector_hits), Err(err)) => {
                log_downgrade(RetrievalMode::Hybrid, RetrievalMode::Vector, &err);
                let fused = fusion::fuse(&vector_hits, &[], weights, limit);
                Ok(Ranked {
                    ids: fused.into_iter().map(|s| s.id).collect(),
                    executed: RetrievalMode::Vector,
                    fallback: err.fallback_reason(),
                })
            }
            (Err(vector_err), Err(keyword_err)) => {
                warn!(
                    vector_error = %vector_err,
                    keyword_error = %keyword_err,
                    "both retrieval paths failed"
                );
                Err(keyword_err)
            }
        }
    }

    /// Resolve ranked ids into records, keeping rank order and dropping ids
    /// whose record no longer exists.
    async fn resolve(&self, ids: &[String]) -> Result<(Vec<ExperimentRecord>, usize), SearchError> {
        if ids.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let fetched = self
            .records
            .fetch_by_ids(ids)
            .await
            .map_err(SearchError::RecordStoreUnavailable)?;

        let mut by_id: HashMap<String, ExperimentRecord> =
            fetched.into_iter().map(|r| (r.id.clone(), r)).collect();
        let ordered: Vec<ExperimentRecord> = ids.iter().filter_map(|id| by_id.remove(id)).collect();

        let unresolved = ids.len() - ordered.len();
        if unresolved > 0 {
            debug!(unresolved, "dropped ids that no longer resolve to a record");
        }
        Ok((ordered, unresolved))
    }

    fn effective_limit(&self, requested: Option<i64>) -> usize {
        match requested {
            Some(n) if n > 0 => usize::try_from(n).unwrap_or(self.params.default_limit),
            Some(n) => {
                debug!(requested = n, default = self.params.default_limit, "invalid limit, using default");
                self.params.default_limit
            }
            None => self.params.default_limit,
        }
    }

    fn effective_weights(&self, requested: Option<f64>) -> FusionWeights {
        let vector_weight = match requested {
            Some(w) if w.is_nan() => {
                debug!("vector weight is NaN, using default");
                self.params.vector_weight
            }
            Some(w) => w.clamp(0.0, 1.0),
            None => self.params.vector_weight,
        };
        FusionWeights {
            vector_weight,
            keyword_bonus: self.params.keyword_bonus,
        }
    }
}

fn log_downgrade(requested: RetrievalMode, executed: RetrievalMode, err: &SearchError) {
    warn!(
        requested_mode = %requested,
        executed_mode = %executed,
        reason = err.fallback_reason().map(|r| r.as_str()).unwrap_or("unknown"),
        error = %err,
        "search mode downgraded"
    );
}
