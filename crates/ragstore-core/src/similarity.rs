//! Scoring primitives: cosine similarity, token overlap, and the blend of the two.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Error, Result};

/// `dot(a, b) / (|a| * |b|)`, or `0.0` when either side has zero magnitude.
///
/// Accumulates in `f64`. Vectors of different length are scored over their
/// common prefix; callers enforce equal dimensions before getting here.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "cosine over vectors of different dimension");
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let sim = dot / (norm_a.sqrt() * norm_b.sqrt());
    if sim.is_finite() { sim as f32 } else { 0.0 }
}

pub fn token_set<I, S>(tokens: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    tokens.into_iter().map(Into::into).collect()
}

/// Fraction of the query's unique tokens that also appear in the document.
pub fn keyword_overlap(query: &HashSet<String>, document: &HashSet<String>) -> f32 {
    if query.is_empty() {
        return 0.0;
    }
    let shared = query.iter().filter(|t| document.contains(*t)).count();
    shared as f32 / query.len() as f32
}

/// Weights for the BLEND composite `(we * e + wk * k) / (we + wk)`.
///
/// The default is equal weighting, i.e. `(e + k) / 2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendWeights {
    pub embedding: f32,
    pub keyword: f32,
}

impl BlendWeights {
    pub const fn equal() -> Self {
        Self { embedding: 0.5, keyword: 0.5 }
    }

    /// Embedding-emphasised variant, `0.7e + 0.3k`.
    pub const fn emphasis() -> Self {
        Self { embedding: 0.7, keyword: 0.3 }
    }

    pub fn new(embedding: f32, keyword: f32) -> Result<Self> {
        let weights = Self { embedding, keyword };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<()> {
        let finite = self.embedding.is_finite() && self.keyword.is_finite();
        if !finite || self.embedding < 0.0 || self.keyword < 0.0 || self.embedding + self.keyword <= 0.0 {
            return Err(Error::Configuration(format!(
                "blend weights must be non-negative with a positive sum, got embedding={} keyword={}",
                self.embedding, self.keyword
            )));
        }
        Ok(())
    }

    pub fn combine(&self, embedding_score: f32, keyword_score: f32) -> f32 {
        let total = self.embedding + self.keyword;
        (self.embedding * embedding_score + self.keyword * keyword_score) / total
    }
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self::equal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_self_is_one() {
        let v = [0.3f32, -1.2, 4.0, 0.0, 2.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_with_zero_vector_is_zero() {
        let v = [1.0f32, 2.0, 3.0];
        let zero = [0.0f32; 3];
        assert_eq!(cosine_similarity(&v, &zero), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn cosine_of_opposites_is_minus_one() {
        let a = [1.0f32, 0.0];
        let b = [-2.0f32, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn overlap_counts_unique_query_tokens() {
        let q = token_set(["外滩", "开放", "时间"]);
        let d = token_set(["外滩", "是", "开放", "开放"]);
        assert!((keyword_overlap(&q, &d) - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(keyword_overlap(&HashSet::new(), &d), 0.0);
    }

    #[test]
    fn blend_defaults_to_mean() {
        let w = BlendWeights::default();
        assert!((w.combine(0.8, 0.4) - 0.6).abs() < 1e-6);
        let e = BlendWeights::emphasis();
        assert!((e.combine(1.0, 0.0) - 0.7).abs() < 1e-6);
    }

    #[test]
    fn blend_rejects_degenerate_weights() {
        assert!(BlendWeights::new(0.0, 0.0).is_err());
        assert!(BlendWeights::new(-1.0, 2.0).is_err());
        assert!(BlendWeights::new(2.0, 1.0).is_ok());
    }
}
