//! Configuration parsing and validation.
//!
//! The catalog is configured with a single TOML file (default
//! `./config/cro.toml`). Every section except `[db]` may be omitted.
//!
//! ```toml
//! [db]
//! path = "./data/cro.sqlite"
//!
//! [retrieval]
//! default_limit = 20
//! vector_weight = 0.7
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [server]
//! bind = "127.0.0.1:7340"
//! ```
//!
//! The OpenAI key is read from `OPENAI_API_KEY` at call time, never from
//! this file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use cro_search_core::SearchParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f64,
    #[serde(default = "default_keyword_bonus")]
    pub keyword_bonus: f64,
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
    #[serde(default = "default_vector_threshold")]
    pub vector_threshold: f64,
    #[serde(default = "default_hybrid_threshold")]
    pub hybrid_threshold: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            vector_weight: default_vector_weight(),
            keyword_bonus: default_keyword_bonus(),
            candidate_multiplier: default_candidate_multiplier(),
            vector_threshold: default_vector_threshold(),
            hybrid_threshold: default_hybrid_threshold(),
        }
    }
}

impl RetrievalConfig {
    pub fn to_params(&self) -> SearchParams {
        SearchParams {
            default_limit: self.default_limit,
            vector_weight: self.vector_weight,
            keyword_bonus: self.keyword_bonus,
            candidate_multiplier: self.candidate_multiplier,
            vector_threshold: self.vector_threshold,
            hybrid_threshold: self.hybrid_threshold,
        }
    }
}

fn default_limit() -> usize {
    20
}
fn default_vector_weight() -> f64 {
    0.7
}
fn default_keyword_bonus() -> f64 {
    0.8
}
fn default_candidate_multiplier() -> usize {
    2
}
fn default_vector_threshold() -> f64 {
    0.7
}
fn default_hybrid_threshold() -> f64 {
    0.5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dims: default_dims(),
            url: default_url(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a config from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    let r = &config.retrieval;
    if r.default_limit < 1 {
        bail!("retrieval.default_limit must be >= 1");
    }
    if r.candidate_multiplier < 1 {
        bail!("retrieval.candidate_multiplier must be >= 1");
    }
    for (name, value) in [
        ("vector_weight", r.vector_weight),
        ("vector_threshold", r.vector_threshold),
        ("hybrid_threshold", r.hybrid_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            bail!("retrieval.{} must be in [0.0, 1.0]", name);
        }
    }
    if r.keyword_bonus.is_nan() || r.keyword_bonus < 0.0 {
        bail!("retrieval.keyword_bonus must be >= 0.0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims == 0 {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.trim().is_empty() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_takes_defaults() {
        let cfg = parse_config("[db]\npath = \"./data/cro.sqlite\"\n").unwrap();
        assert_eq!(cfg.retrieval.default_limit, 20);
        assert_eq!(cfg.retrieval.to_params(), SearchParams::default());
        assert_eq!(cfg.embedding.provider, "disabled");
        assert_eq!(cfg.embedding.model, "text-embedding-3-small");
        assert_eq!(cfg.server.bind, "127.0.0.1:7340");
    }

    #[test]
    fn retrieval_overrides_flow_into_params() {
        let cfg = parse_config(
            r#"
            [db]
            path = "x.sqlite"

            [retrieval]
            default_limit = 5
            vector_weight = 0.4
            hybrid_threshold = 0.3
            "#,
        )
        .unwrap();
        let params = cfg.retrieval.to_params();
        assert_eq!(params.default_limit, 5);
        assert_eq!(params.vector_weight, 0.4);
        assert_eq!(params.hybrid_threshold, 0.3);
        assert_eq!(params.keyword_bonus, 0.8);
    }

    #[test]
    fn rejects_out_of_range_weight() {
        let err = parse_config("[db]\npath = \"x\"\n[retrieval]\nvector_weight = 1.5\n")
            .unwrap_err()
            .to_string();
        assert!(err.contains("vector_weight"));
    }

    #[test]
    fn rejects_zero_limit() {
        assert!(parse_config("[db]\npath = \"x\"\n[retrieval]\ndefault_limit = 0\n").is_err());
    }

    #[test]
    fn rejects_unknown_provider() {
        let err = parse_config("[db]\npath = \"x\"\n[embedding]\nprovider = \"ollama\"\n")
            .unwrap_err()
            .to_string();
        assert!(err.contains("Unknown embedding provider"));
    }

    #[test]
    fn example_config_is_valid() {
        let cfg = parse_config(include_str!("../config/cro.example.toml")).unwrap();
        assert_eq!(cfg.retrieval.to_params(), SearchParams::default());
        assert!(!cfg.embedding.is_enabled());
    }

    #[test]
    fn missing_db_section_is_an_error() {
        assert!(parse_config("[server]\nbind = \"0.0.0.0:1\"\n").is_err());
    }
}
