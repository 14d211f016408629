use anyhow::{bail, Result};

use cro_search_core::embedding::EmbeddingProvider;

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::sqlite_store::SqliteStore;

/// Counters reported by [`embed_pending`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EmbedReport {
    pub pending: usize,
    pub embedded: usize,
    pub failed: usize,
}

/// Embed every record that has no stored vector, `batch_size` at a time.
///
/// A failed batch is logged and counted; the remaining batches still run.
pub async fn embed_pending(
    store: &SqliteStore,
    provider: &dyn EmbeddingProvider,
    batch_size: usize,
    limit: Option<usize>,
) -> Result<EmbedReport> {
    let pending = store.pending_embeddings(limit).await?;
    let mut report = EmbedReport {
        pending: pending.len(),
        ..EmbedReport::default()
    };

    for batch in pending.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|r| r.embedding_text()).collect();

        match provider.embed(&texts).await {
            Ok(vectors) if vectors.len() == batch.len() => {
                for (record, vec) in batch.iter().zip(vectors.iter()) {
                    store
                        .set_embedding(&record.id, vec, provider.model_name())
                        .await?;
                    report.embedded += 1;
                }
            }
            Ok(vectors) => {
                tracing::warn!(
                    expected = batch.len(),
                    received = vectors.len(),
                    "embedding batch returned wrong number of vectors"
                );
                report.failed += batch.len();
            }
            Err(e) => {
                tracing::warn!(error = %e, batch = batch.len(), "embedding batch failed");
                report.failed += batch.len();
            }
        }
    }

    Ok(report)
}

/// CLI entry point for `cro embed pending`.
pub async fn run_embed_pending(
    config: &Config,
    limit: Option<usize>,
    batch_size_override: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let batch_size = batch_size_override.unwrap_or(config.embedding.batch_size);

    if dry_run {
        let pending = store.pending_embeddings(limit).await;
        pool.close().await;
        println!("embed pending (dry-run)");
        println!("  experiments needing embeddings: {}", pending?.len());
        return Ok(());
    }

    let report = embed_pending(&store, provider.as_ref(), batch_size, limit).await;
    pool.close().await;
    let report = report?;

    println!("embed pending");
    if report.pending == 0 {
        println!("  all experiments up to date");
        return Ok(());
    }
    println!("  total pending: {}", report.pending);
    println!("  embedded: {}", report.embedded);
    println!("  failed: {}", report.failed);
    Ok(())
}
