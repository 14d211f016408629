//! End-to-end behavior of the search facade against in-memory stores.
//!
//! Embeddings and vector hits are scripted so similarity values are exact.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use cro_search_core::embedding::EmbeddingProvider;
use cro_search_core::error::FallbackReason;
use cro_search_core::store::memory::InMemoryStore;
use cro_search_core::store::{KeywordStore, RecordStore, VectorStore};
use cro_search_core::{
    ExperimentRecord, KeywordHit, RetrievalMode, SearchEngine, SearchError, SearchParams,
    SearchRequest, VectorHit,
};

// ─── Test doubles ───────────────────────────────────────────────────

struct ScriptedEmbedder {
    fail: bool,
    calls: AtomicUsize,
}

impl ScriptedEmbedder {
    fn working() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedEmbedder {
    fn model_name(&self) -> &str {
        "scripted"
    }
    fn dims(&self) -> usize {
        2
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("OPENAI_API_KEY not set");
        }
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

/// Vector store returning a fixed ranked list, honoring the threshold.
struct CannedVectors {
    hits: Vec<(&'static str, f64)>,
    fail: bool,
    calls: AtomicUsize,
}

impl CannedVectors {
    fn new(hits: Vec<(&'static str, f64)>) -> Self {
        Self {
            hits,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn broken() -> Self {
        Self {
            hits: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VectorStore for CannedVectors {
    async fn vector_search(&self, _q: &[f32], min: f64, limit: usize) -> Result<Vec<VectorHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("vector index missing");
        }
        Ok(self
            .hits
            .iter()
            .filter(|(_, s)| *s > min)
            .take(limit)
            .map(|(id, s)| VectorHit {
                id: id.to_string(),
                similarity: *s,
            })
            .collect())
    }
}

/// Wraps a store and counts keyword and record calls.
struct Counting {
    inner: Arc<InMemoryStore>,
    keyword_calls: AtomicUsize,
    record_calls: AtomicUsize,
    records_offline: bool,
}

impl Counting {
    fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            keyword_calls: AtomicUsize::new(0),
            record_calls: AtomicUsize::new(0),
            records_offline: false,
        }
    }
}

#[async_trait]
impl KeywordStore for Counting {
    async fn keyword_search(&self, needle: &str, limit: usize) -> Result<Vec<KeywordHit>> {
        self.keyword_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.keyword_search(needle, limit).await
    }
}

#[async_trait]
impl RecordStore for Counting {
    async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<ExperimentRecord>> {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        if self.records_offline {
            anyhow::bail!("database is locked");
        }
        self.inner.fetch_by_ids(ids).await
    }
}

struct Fixture {
    store: Arc<InMemoryStore>,
    embedder: Arc<ScriptedEmbedder>,
    vectors: Arc<CannedVectors>,
    counting: Arc<Counting>,
    engine: SearchEngine,
}

fn fixture_with(
    store: Arc<InMemoryStore>,
    embedder: ScriptedEmbedder,
    vectors: CannedVectors,
    records_offline: bool,
) -> Fixture {
    let embedder = Arc::new(embedder);
    let vectors = Arc::new(vectors);
    let mut counting = Counting::new(store.clone());
    counting.records_offline = records_offline;
    let counting = Arc::new(counting);
    let engine = SearchEngine::new(
        embedder.clone(),
        vectors.clone(),
        counting.clone(),
        counting.clone(),
        SearchParams::default(),
    );
    Fixture {
        store,
        embedder,
        vectors,
        counting,
        engine,
    }
}

fn fixture(store: Arc<InMemoryStore>, vectors: CannedVectors) -> Fixture {
    fixture_with(store, ScriptedEmbedder::working(), vectors, false)
}

fn record(id: &str, test_name: &str, created_at: i64) -> ExperimentRecord {
    let mut r = ExperimentRecord::new(format!("EXP-{}", id.to_uppercase()));
    r.id = id.to_string();
    r.test_name = Some(test_name.to_string());
    r.created_at = created_at;
    r.updated_at = created_at;
    r
}

fn ids(records: &[ExperimentRecord]) -> Vec<&str> {
    records.iter().map(|r| r.id.as_str()).collect()
}

fn catalog() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store.insert(record("x", "Pricing page layout v2", 100));
    store.insert(record("y", "Pricing page layout mobile", 200));
    store.insert(record("z", "Pricing page hero copy", 300));
    store.insert(record("w", "Checkout flow", 400));
    store
}

// ─── Scenarios ──────────────────────────────────────────────────────

#[tokio::test]
async fn empty_query_runs_no_retrieval_in_any_mode() {
    let f = fixture(catalog(), CannedVectors::new(vec![("x", 0.9)]));

    for mode in [RetrievalMode::Keyword, RetrievalMode::Vector, RetrievalMode::Hybrid] {
        for query in ["", "   ", "\n\t"] {
            let outcome = f
                .engine
                .search(&SearchRequest::new(query).with_mode(mode))
                .await
                .unwrap();
            assert!(outcome.experiments.is_empty());
        }
    }

    assert_eq!(f.embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(f.vectors.calls.load(Ordering::SeqCst), 0);
    assert_eq!(f.counting.keyword_calls.load(Ordering::SeqCst), 0);
    assert_eq!(f.counting.record_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn keyword_mode_returns_matches_newest_first() {
    let store = Arc::new(InMemoryStore::new());
    store.insert(record("older", "Checkout Button color test", 1_700_000_000));
    store.insert(record("newer", "Bigger checkout button", 1_700_100_000));
    store.insert(record("other", "Pricing table", 1_700_200_000));
    let f = fixture(store, CannedVectors::new(vec![]));

    let outcome = f
        .engine
        .search(&SearchRequest::new("checkout button").with_mode(RetrievalMode::Keyword))
        .await
        .unwrap();

    assert_eq!(ids(&outcome.experiments), vec!["newer", "older"]);
    assert_eq!(outcome.executed_mode, RetrievalMode::Keyword);
    assert_eq!(f.embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(f.vectors.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn hybrid_boosts_records_found_by_both_paths() {
    let store = Arc::new(InMemoryStore::new());
    store.insert(record("x", "Pricing page layout", 100));
    store.insert(record("y", "pricing page layout (mobile)", 200));
    let f = fixture(store, CannedVectors::new(vec![("x", 0.9)]));

    let outcome = f
        .engine
        .search(&SearchRequest::new("pricing page layout").with_vector_weight(0.7))
        .await
        .unwrap();

    // x = 0.9·0.7 + 0.3·0.8 = 0.87, y = 0.3·0.8 = 0.24
    assert_eq!(ids(&outcome.experiments), vec!["x", "y"]);
    assert_eq!(outcome.executed_mode, RetrievalMode::Hybrid);
    assert_eq!(outcome.fallback, None);
}

#[tokio::test]
async fn embedding_failure_falls_back_to_keyword() {
    let store = Arc::new(InMemoryStore::new());
    store.insert(record("z", "Sticky add-to-cart", 100));
    let f = fixture_with(
        store,
        ScriptedEmbedder::failing(),
        CannedVectors::new(vec![("q", 0.99)]),
        false,
    );

    let outcome = f
        .engine
        .search(&SearchRequest::new("add-to-cart"))
        .await
        .unwrap();

    assert_eq!(ids(&outcome.experiments), vec!["z"]);
    assert_eq!(outcome.requested_mode, RetrievalMode::Hybrid);
    assert_eq!(outcome.executed_mode, RetrievalMode::Keyword);
    assert_eq!(outcome.fallback, Some(FallbackReason::EmbeddingUnavailable));
    assert_eq!(f.vectors.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn limit_one_keeps_only_the_top_fused_candidate() {
    let f = fixture(
        catalog(),
        CannedVectors::new(vec![("w", 0.95), ("z", 0.9), ("x", 0.85)]),
    );

    let outcome = f
        .engine
        .search(&SearchRequest::new("pricing page").with_limit(1))
        .await
        .unwrap();

    // Two candidates per path: vector {w, z}, keyword {z, y}.
    // z: 0.63 + 0.24, w: 0.665, y: 0.24.
    assert_eq!(ids(&outcome.experiments), vec!["z"]);
    assert_eq!(f.vectors.calls.load(Ordering::SeqCst), 1);
}

// ─── Properties ─────────────────────────────────────────────────────

#[tokio::test]
async fn vector_failure_matches_keyword_mode_exactly() {
    let store = catalog();
    let healthy = fixture(store.clone(), CannedVectors::new(vec![]));
    let broken = fixture(store, CannedVectors::broken());

    for limit in [1, 2, 3, 20] {
        let keyword = healthy
            .engine
            .search(
                &SearchRequest::new("pricing")
                    .with_mode(RetrievalMode::Keyword)
                    .with_limit(limit),
            )
            .await
            .unwrap();

        for mode in [RetrievalMode::Vector, RetrievalMode::Hybrid] {
            let degraded = broken
                .engine
                .search(&SearchRequest::new("pricing").with_mode(mode).with_limit(limit))
                .await
                .unwrap();
            assert_eq!(ids(&degraded.experiments), ids(&keyword.experiments));
            assert_eq!(degraded.executed_mode, RetrievalMode::Keyword);
            assert_eq!(degraded.fallback, Some(FallbackReason::VectorStoreUnavailable));
        }
    }
}

#[tokio::test]
async fn results_respect_limit_and_never_repeat() {
    let f = fixture(
        catalog(),
        CannedVectors::new(vec![("x", 0.99), ("w", 0.9), ("z", 0.8), ("y", 0.75)]),
    );

    for mode in [RetrievalMode::Keyword, RetrievalMode::Vector, RetrievalMode::Hybrid] {
        for limit in [1, 2, 3, 4, 10] {
            let outcome = f
                .engine
                .search(&SearchRequest::new("page").with_mode(mode).with_limit(limit))
                .await
                .unwrap();
            assert!(outcome.experiments.len() <= limit as usize);
            let mut seen = ids(&outcome.experiments);
            let total = seen.len();
            seen.sort();
            seen.dedup();
            assert_eq!(seen.len(), total, "duplicate ids in {mode} results");
        }
    }
}

#[tokio::test]
async fn repeated_hybrid_search_is_identical() {
    let f = fixture(
        catalog(),
        CannedVectors::new(vec![("w", 0.8), ("z", 0.8), ("x", 0.8)]),
    );
    let req = SearchRequest::new("pricing");

    let first = f.engine.search(&req).await.unwrap();
    for _ in 0..10 {
        let again = f.engine.search(&req).await.unwrap();
        assert_eq!(ids(&again.experiments), ids(&first.experiments));
    }
}

#[tokio::test]
async fn vector_mode_keeps_similarity_order_and_threshold() {
    let f = fixture(
        catalog(),
        CannedVectors::new(vec![("z", 0.92), ("w", 0.81), ("x", 0.7), ("y", 0.55)]),
    );

    let outcome = f
        .engine
        .search(&SearchRequest::new("anything").with_mode(RetrievalMode::Vector))
        .await
        .unwrap();

    // Pure vector mode requires similarity > 0.7.
    assert_eq!(ids(&outcome.experiments), vec!["z", "w"]);
    assert_eq!(outcome.executed_mode, RetrievalMode::Vector);
    assert_eq!(f.counting.keyword_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn hybrid_uses_wider_candidate_pool_and_lower_threshold() {
    let f = fixture(
        catalog(),
        CannedVectors::new(vec![("w", 0.6), ("y", 0.55)]),
    );

    let outcome = f
        .engine
        .search(&SearchRequest::new("no keyword match here"))
        .await
        .unwrap();

    assert_eq!(ids(&outcome.experiments), vec!["w", "y"]);
}

#[tokio::test]
async fn deleted_records_are_dropped_not_fatal() {
    let f = fixture(catalog(), CannedVectors::new(vec![("gone", 0.99), ("x", 0.9), ("y", 0.8)]));
    assert!(f.store.remove("y").is_some());

    let outcome = f
        .engine
        .search(&SearchRequest::new("anything").with_mode(RetrievalMode::Vector))
        .await
        .unwrap();

    assert_eq!(ids(&outcome.experiments), vec!["x"]);
    assert_eq!(outcome.unresolved, 2);
}

#[tokio::test]
async fn keyword_failure_in_hybrid_keeps_vector_results() {
    let store = catalog();
    store.set_keyword_index_offline(true);
    let f = fixture(store, CannedVectors::new(vec![("z", 0.9), ("x", 0.8)]));

    let outcome = f.engine.search(&SearchRequest::new("pricing")).await.unwrap();

    assert_eq!(ids(&outcome.experiments), vec!["z", "x"]);
    assert_eq!(outcome.executed_mode, RetrievalMode::Vector);
    assert_eq!(outcome.fallback, Some(FallbackReason::KeywordStoreUnavailable));
}

#[tokio::test]
async fn hybrid_runs_both_paths_even_when_one_fails() {
    let f = fixture(catalog(), CannedVectors::broken());

    f.engine.search(&SearchRequest::new("pricing")).await.unwrap();

    assert_eq!(f.vectors.calls.load(Ordering::SeqCst), 1);
    assert_eq!(f.counting.keyword_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn both_paths_failing_is_an_error() {
    let store = catalog();
    store.set_keyword_index_offline(true);
    let f = fixture(store, CannedVectors::broken());

    let err = f.engine.search(&SearchRequest::new("pricing")).await.unwrap_err();
    assert!(matches!(err, SearchError::KeywordStoreUnavailable(_)));
}

#[tokio::test]
async fn record_store_failure_propagates() {
    let f = fixture_with(
        catalog(),
        ScriptedEmbedder::working(),
        CannedVectors::new(vec![]),
        true,
    );

    let err = f
        .engine
        .search(&SearchRequest::new("pricing").with_mode(RetrievalMode::Keyword))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::RecordStoreUnavailable(_)));
}

#[tokio::test]
async fn non_positive_limit_uses_default() {
    let store = Arc::new(InMemoryStore::new());
    for i in 0..25 {
        store.insert(record(&format!("r{i:02}"), "Checkout test", i));
    }
    let f = fixture(store, CannedVectors::new(vec![]));

    for limit in [0, -1] {
        let outcome = f
            .engine
            .search(
                &SearchRequest::new("checkout")
                    .with_mode(RetrievalMode::Keyword)
                    .with_limit(limit),
            )
            .await
            .unwrap();
        assert_eq!(outcome.experiments.len(), 20);
        assert_eq!(outcome.experiments[0].id, "r24");
    }
}

#[tokio::test]
async fn in_memory_store_drives_real_cosine_search() {
    let store = Arc::new(InMemoryStore::new());
    let mut near = record("near", "Urgency banner", 10);
    near.embedding = Some(vec![0.95, 0.05]);
    let mut far = record("far", "Footer links", 20);
    far.embedding = Some(vec![0.0, 1.0]);
    store.insert(near);
    store.insert(far);

    let engine = SearchEngine::from_store(
        Arc::new(ScriptedEmbedder::working()),
        store,
        SearchParams::default(),
    );
    let outcome = engine
        .search(&SearchRequest::new("scarcity messaging").with_mode(RetrievalMode::Vector))
        .await
        .unwrap();

    assert_eq!(ids(&outcome.experiments), vec!["near"]);
}
