//! Weighted-union rank fusion of vector and keyword hits.
//!
//! # Scoring
//!
//! With `w = vector_weight` and `b = keyword_bonus`:
//!
//! - a vector hit contributes `similarity × w`;
//! - a keyword hit contributes `(1 − w) × b`, **added** to any vector score
//!   the same id already has.
//!
//! Records found by both paths therefore outrank records found by one.
//! Scores accumulate in a single slot per id, so the output never repeats
//! an id. Ordering is score desc; equal scores keep first-seen order
//! (vector hits first, then keyword hits), so repeated calls with the same
//! inputs give the same list.

use std::collections::HashMap;

use crate::models::{KeywordHit, ScoredId, VectorHit};

/// Relative trust in each retrieval path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    /// Weight of semantic similarity, in `[0, 1]`. Keyword weight is `1 − vector_weight`.
    pub vector_weight: f64,
    /// Fixed relevance credited to a keyword match before weighting.
    pub keyword_bonus: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            vector_weight: 0.7,
            keyword_bonus: 0.8,
        }
    }
}

impl FusionWeights {
    /// Score credited to one keyword match.
    pub fn keyword_contribution(&self) -> f64 {
        (1.0 - self.vector_weight) * self.keyword_bonus
    }
}

/// Merge both hit lists into at most `limit` scored ids, best first.
pub fn fuse(
    vector_hits: &[VectorHit],
    keyword_hits: &[KeywordHit],
    weights: FusionWeights,
    limit: usize,
) -> Vec<ScoredId> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut scored: Vec<ScoredId> = Vec::with_capacity(vector_hits.len() + keyword_hits.len());

    for hit in vector_hits {
        credit(&mut slots, &mut scored, &hit.id, hit.similarity * weights.vector_weight);
    }
    let bonus = weights.keyword_contribution();
    for hit in keyword_hits {
        credit(&mut slots, &mut scored, &hit.id, bonus);
    }

    // Stable sort: ties keep insertion order.
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(limit);
    scored
}

fn credit<'a>(
    slots: &mut HashMap<&'a str, usize>,
    scored: &mut Vec<ScoredId>,
    id: &'a str,
    amount: f64,
) {
    match slots.get(id) {
        Some(&slot) => scored[slot].score += amount,
        None => {
            slots.insert(id, scored.len());
            scored.push(ScoredId {
                id: id.to_string(),
                score: amount,
            });
        }
    }
}
