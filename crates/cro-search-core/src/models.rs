//! Core data models shared by the retrieval pipeline.
//!
//! [`ExperimentRecord`] is owned by the persistence layer; the search code
//! only reads it. The hit types carry one retrieval path's output each, so
//! fusion never has to guess which path a candidate came from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A recorded CRO experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentRecord {
    /// Stable record identifier (UUID).
    pub id: String,
    /// Human-assigned experiment key, unique across the catalog.
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
    /// `YYYY-MM-DD`.
    pub date_launched: Option<String>,
    /// `YYYY-MM-DD`.
    pub date_concluded: Option<String>,
    /// Unix seconds.
    pub created_at: i64,
    /// Unix seconds.
    pub updated_at: i64,
    /// Stored embedding of [`embedding_text`](Self::embedding_text), if any.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl ExperimentRecord {
    /// Create a record with a fresh UUID and the current timestamp.
    pub fn new(experiment_id: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            experiment_id: experiment_id.into(),
            test_name: None,
            hypothesis: None,
            lessons_learned: None,
            vertical: None,
            geo: None,
            brand: None,
            status: None,
            winning_var: None,
            primary_metric_name: None,
            date_launched: None,
            date_concluded: None,
            created_at: now,
            updated_at: now,
            embedding: None,
        }
    }

    /// The fields keyword search matches against, in a fixed order:
    /// test name, experiment id, hypothesis, lessons learned, vertical, geo.
    pub fn keyword_fields(&self) -> [Option<&str>; 6] {
        [
            self.test_name.as_deref(),
            Some(self.experiment_id.as_str()),
            self.hypothesis.as_deref(),
            self.lessons_learned.as_deref(),
            self.vertical.as_deref(),
            self.geo.as_deref(),
        ]
    }

    /// True if `needle` (already trimmed and lower-cased) is a substring of
    /// any keyword field, compared case-insensitively.
    pub fn matches_keyword(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return false;
        }
        self.keyword_fields()
            .iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(needle))
    }

    /// Text fed to the embedding provider for this record.
    pub fn embedding_text(&self) -> String {
        self.keyword_fields()
            .iter()
            .flatten()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Which retrieval paths a search runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    Keyword,
    Vector,
    #[default]
    Hybrid,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Keyword => "keyword",
            RetrievalMode::Vector => "vector",
            RetrievalMode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(RetrievalMode::Keyword),
            "vector" => Ok(RetrievalMode::Vector),
            "hybrid" => Ok(RetrievalMode::Hybrid),
            other => anyhow::bail!(
                "Unknown search mode: {}. Use keyword, vector, or hybrid.",
                other
            ),
        }
    }
}

/// One vector retrieval result.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub id: String,
    /// `1 - cosine distance`, higher is closer.
    pub similarity: f64,
}

/// One keyword retrieval result. Keyword matches are binary, so there is
/// no score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordHit {
    pub id: String,
}

/// A fused candidate with its accumulated relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredId {
    pub id: String,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ExperimentRecord {
        let mut r = ExperimentRecord::new("EXP-101");
        r.test_name = Some("Checkout Button Color".to_string());
        r.hypothesis = Some("  A green CTA lifts conversions ".to_string());
        r.geo = Some("DE".to_string());
        r
    }

    #[test]
    fn new_assigns_unique_ids() {
        let a = ExperimentRecord::new("A");
        let b = ExperimentRecord::new("A");
        assert_ne!(a.id, b.id);
        assert_eq!(a.created_at, a.updated_at);
    }

    #[test]
    fn matches_keyword_is_case_insensitive() {
        let r = record();
        assert!(r.matches_keyword("checkout button"));
        assert!(r.matches_keyword("exp-101"));
        assert!(r.matches_keyword("de"));
        assert!(!r.matches_keyword("pricing"));
    }

    #[test]
    fn matches_keyword_rejects_empty_needle() {
        assert!(!record().matches_keyword(""));
    }

    #[test]
    fn brand_is_not_a_keyword_field() {
        let mut r = record();
        r.brand = Some("Acme".to_string());
        assert!(!r.matches_keyword("acme"));
    }

    #[test]
    fn embedding_text_skips_missing_fields() {
        let r = record();
        assert_eq!(
            r.embedding_text(),
            "Checkout Button Color\nEXP-101\nA green CTA lifts conversions\nDE"
        );
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("HYBRID".parse::<RetrievalMode>().unwrap(), RetrievalMode::Hybrid);
        assert_eq!(" vector ".parse::<RetrievalMode>().unwrap(), RetrievalMode::Vector);
        assert!("semantic".parse::<RetrievalMode>().is_err());
        assert_eq!(RetrievalMode::default(), RetrievalMode::Hybrid);
    }

    #[test]
    fn record_serializes_camel_case_without_embedding() {
        let mut r = record();
        r.embedding = Some(vec![0.1, 0.2]);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["experimentId"], "EXP-101");
        assert_eq!(json["testName"], "Checkout Button Color");
        assert!(json.get("embedding").is_none());
    }
}
