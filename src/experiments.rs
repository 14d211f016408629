//! Catalog browsing: paginated listing, lookup by id, and loading records
//! from a JSON file.
//!
//! Used by the `cro list`, `cro get`, and `cro add` commands and by the
//! `/api/experiments` routes.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use cro_search_core::ExperimentRecord;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

pub const DEFAULT_PAGE_SIZE: i64 = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExperimentPage {
    pub experiments: Vec<ExperimentRecord>,
    pub pagination: Pagination,
}

/// One page of the catalog, newest first. `page < 1` is treated as 1 and
/// `limit < 1` as [`DEFAULT_PAGE_SIZE`].
pub async fn list_page(store: &SqliteStore, page: i64, limit: i64) -> Result<ExperimentPage> {
    let page = page.max(1);
    let limit = if limit < 1 { DEFAULT_PAGE_SIZE } else { limit };

    let offset = (page - 1).saturating_mul(limit);
    let experiments = store.list_experiments(offset, limit).await?;
    let total = store.count_experiments().await?;

    Ok(ExperimentPage {
        experiments,
        pagination: Pagination {
            page,
            limit,
            total,
            total_pages: total / limit + i64::from(total % limit != 0),
        },
    })
}

pub async fn get_by_id(store: &SqliteStore, id: &str) -> Result<ExperimentRecord> {
    match store.get_experiment(id).await? {
        Some(record) => Ok(record),
        None => bail!("experiment not found: {}", id),
    }
}

/// A record as written by hand or exported from another tool. Only
/// `experimentId` is required.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentInput {
    pub experiment_id: String,
    pub test_name: Option<String>,
    pub hypothesis: Option<String>,
    pub lessons_learned: Option<String>,
    pub vertical: Option<String>,
    pub geo: Option<String>,
    pub brand: Option<String>,
    pub status: Option<String>,
    pub winning_var: Option<String>,
    pub primary_metric_name: Option<String>,
    pub date_launched: Option<String>,
    pub date_concluded: Option<String>,
}

impl ExperimentInput {
    pub fn into_record(self) -> ExperimentRecord {
        let mut record = ExperimentRecord::new(self.experiment_id.trim());
        record.test_name = self.test_name;
        record.hypothesis = self.hypothesis;
        record.lessons_learned = self.lessons_learned;
        record.vertical = self.vertical;
        record.geo = self.geo;
        record.brand = self.brand;
        record.status = self.status;
        record.winning_var = self.winning_var;
        record.primary_metric_name = self.primary_metric_name;
        record.date_launched = self.date_launched;
        record.date_concluded = self.date_concluded;
        record
    }
}

/// Upsert every record in a JSON array file. Returns the number written.
pub async fn load_file(store: &SqliteStore, path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let inputs: Vec<ExperimentInput> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {} as a JSON array of experiments", path.display()))?;

    let mut written = 0;
    for input in inputs {
        if input.experiment_id.trim().is_empty() {
            bail!("experimentId must not be empty (record #{})", written + 1);
        }
        store.upsert_experiment(&input.into_record()).await?;
        written += 1;
    }
    Ok(written)
}

// ============ CLI entry points ============

pub async fn run_list(config: &Config, page: i64, limit: i64) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let result = list_page(&store, page, limit).await;
    pool.close().await;
    let page = result?;

    if page.experiments.is_empty() {
        println!("No experiments.");
        return Ok(());
    }

    for exp in &page.experiments {
        println!(
            "{:<12} {:<40} {}",
            exp.experiment_id,
            exp.test_name.as_deref().unwrap_or("(untitled)"),
            exp.id
        );
    }
    println!();
    println!(
        "page {}/{} ({} total)",
        page.pagination.page, page.pagination.total_pages, page.pagination.total
    );
    Ok(())
}

pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let result = get_by_id(&store, id).await;
    pool.close().await;
    let exp = result?;

    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());

    println!("--- Experiment ---");
    println!("id:              {}", exp.id);
    println!("experiment_id:   {}", exp.experiment_id);
    println!("test_name:       {}", field(&exp.test_name));
    println!("vertical:        {}", field(&exp.vertical));
    println!("geo:             {}", field(&exp.geo));
    println!("brand:           {}", field(&exp.brand));
    println!("status:          {}", field(&exp.status));
    println!("primary_metric:  {}", field(&exp.primary_metric_name));
    println!("winning_var:     {}", field(&exp.winning_var));
    println!("launched:        {}", field(&exp.date_launched));
    println!("concluded:       {}", field(&exp.date_concluded));
    println!();
    println!("--- Hypothesis ---");
    println!("{}", field(&exp.hypothesis));
    println!();
    println!("--- Lessons Learned ---");
    println!("{}", field(&exp.lessons_learned));
    Ok(())
}

pub async fn run_add(config: &Config, path: &Path) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let result = load_file(&store, path).await;
    pool.close().await;
    let written = result?;

    println!("add");
    println!("  experiments written: {}", written);
    Ok(())
}
