//! Wires the core search engine to SQLite and the configured embedding
//! provider, and renders results for `cro search`.

use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;

use cro_search_core::{RetrievalMode, SearchEngine, SearchOutcome, SearchRequest};

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::sqlite_store::SqliteStore;

/// Build a [`SearchEngine`] over `pool` using the configured provider and
/// retrieval parameters.
pub fn build_engine(config: &Config, pool: SqlitePool) -> Result<SearchEngine> {
    let provider = embedding::create_provider(&config.embedding)?;
    let store = Arc::new(SqliteStore::new(pool));
    Ok(SearchEngine::from_store(
        provider,
        store,
        config.retrieval.to_params(),
    ))
}

/// CLI entry point for `cro search`.
pub async fn run_search(
    config: &Config,
    query: &str,
    mode: &str,
    limit: Option<i64>,
    vector_weight: Option<f64>,
    json: bool,
) -> Result<()> {
    let mode: RetrievalMode = mode.parse()?;

    let pool = db::connect(config).await?;
    let engine = build_engine(config, pool.clone())?;

    let mut request = SearchRequest::new(query).with_mode(mode);
    request.limit = limit;
    request.vector_weight = vector_weight;

    let outcome = engine.search(&request).await;
    pool.close().await;
    let outcome = outcome?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn print_outcome(outcome: &SearchOutcome) {
    if let Some(reason) = outcome.fallback {
        println!(
            "mode: {} (requested {}, {})",
            outcome.executed_mode,
            outcome.requested_mode,
            reason.as_str()
        );
    } else {
        println!("mode: {}", outcome.executed_mode);
    }
    println!();

    if outcome.experiments.is_empty() {
        println!("No results.");
        return;
    }

    for (i, exp) in outcome.experiments.iter().enumerate() {
        println!(
            "{}. {} / {}",
            i + 1,
            exp.experiment_id,
            exp.test_name.as_deref().unwrap_or("(untitled)")
        );
        let tags: Vec<&str> = [exp.vertical.as_deref(), exp.geo.as_deref(), exp.status.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if !tags.is_empty() {
            println!("    {}", tags.join(" · "));
        }
        if let Some(ref hypothesis) = exp.hypothesis {
            println!("    hypothesis: \"{}\"", hypothesis.replace('\n', " ").trim());
        }
        if let Some(ref winner) = exp.winning_var {
            println!("    winner: {}", winner);
        }
        println!("    id: {}", exp.id);
        println!();
    }
}
