//! # CRO Search Core
//!
//! Runtime-agnostic retrieval logic for the experiment catalog: the data
//! model, the store and embedding traits the application plugs into, the
//! vector and keyword retrievers, weighted rank fusion, and the
//! [`search::SearchEngine`] facade that ties them together.
//!
//! This crate contains no sqlx, HTTP client, or server dependencies. The
//! application crate supplies SQLite and OpenAI-backed implementations of
//! the traits in [`store`] and [`embedding`]; tests use
//! [`store::memory::InMemoryStore`].

pub mod embedding;
pub mod error;
pub mod fusion;
pub mod keyword;
pub mod models;
pub mod search;
pub mod store;
pub mod vector;

pub use error::SearchError;
pub use models::{ExperimentRecord, KeywordHit, RetrievalMode, ScoredId, VectorHit};
pub use search::{SearchEngine, SearchOutcome, SearchParams, SearchRequest};
