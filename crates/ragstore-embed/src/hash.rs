use anyhow::{ensure, Result};
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use ragstore_core::traits::Embedder;

/// Deterministic feature-hashing embedder for tests and offline development.
///
/// Features are lower-cased whitespace words plus character bigrams, so texts
/// without spaces (Chinese, Japanese) still land near texts sharing phrases.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
    id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Result<Self> {
        ensure!(dim > 0, "hash embedder dimension must be positive");
        Ok(Self { dim, id: format!("hash-{dim}") })
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let lowered = text.to_lowercase();
        for (i, word) in lowered.split_whitespace().enumerate() {
            self.add_feature(&mut v, ("w", word), i);
        }
        let chars: Vec<char> = lowered.chars().filter(|c| !c.is_whitespace()).collect();
        for (i, pair) in chars.windows(2).enumerate() {
            self.add_feature(&mut v, ("b", pair), i);
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }

    fn add_feature(&self, v: &mut [f32], feature: impl Hash, i: usize) {
        let mut hasher = XxHash64::with_seed(0);
        feature.hash(&mut hasher);
        let h = hasher.finish();
        let idx = (h as usize) % self.dim;
        let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
        v[idx] += val + (i as f32 % 3.0) * 0.01;
    }
}

impl Embedder for HashEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
}
