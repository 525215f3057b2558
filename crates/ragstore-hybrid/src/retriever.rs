//! Retrieval Core: scores every candidate of the requested knowledge bases in
//! one of three modes, then filters by threshold, ranks and truncates.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use ragstore_core::error::{Error, Result};
use ragstore_core::similarity::{cosine_similarity, keyword_overlap, token_set, BlendWeights};
use ragstore_core::store::DocumentStore;
use ragstore_core::traits::{Embedder, Tokenizer};
use ragstore_core::types::{Meta, PassageRecord, SearchHit, SearchMode};

pub const DEFAULT_TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub knowledge_ids: Vec<String>,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Inclusive lower bound on the composite score; the mode default when absent.
    #[serde(default)]
    pub similarity: Option<f32>,
    #[serde(default)]
    pub mode: SearchMode,
    /// Only passages whose `meta` holds every one of these key/value pairs are scored.
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta_filter: Meta,
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, knowledge_ids: Vec<String>) -> Self {
        Self {
            query: query.into(),
            knowledge_ids,
            top_n: DEFAULT_TOP_N,
            similarity: None,
            mode: SearchMode::default(),
            meta_filter: Meta::new(),
        }
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_similarity(mut self, similarity: f32) -> Self {
        self.similarity = Some(similarity);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.meta_filter.insert(key.into(), value.into());
        self
    }

    /// Restricts the search to passages tagged with `meta.category`.
    pub fn with_category(self, category: impl Into<String>) -> Self {
        self.with_meta("category", category.into())
    }

    pub fn matches_meta(&self, record: &PassageRecord) -> bool {
        self.meta_filter.iter().all(|(key, value)| record.passage.meta.get(key) == Some(value))
    }

    pub fn threshold(&self) -> f32 {
        self.similarity.unwrap_or_else(|| self.mode.default_threshold())
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(Error::validation("top_n", "must be at least 1"));
        }
        if let Some(similarity) = self.similarity {
            if !similarity.is_finite() || !(0.0..=1.0).contains(&similarity) {
                return Err(Error::validation("similarity", format!("must be within [0, 1], got {similarity}")));
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct Retriever {
    tokenizer: Arc<dyn Tokenizer>,
    weights: BlendWeights,
}

impl Retriever {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, weights: BlendWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { tokenizer, weights })
    }

    pub fn weights(&self) -> BlendWeights {
        self.weights
    }

    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }

    /// Runs `request` against `store`.
    ///
    /// An empty knowledge-base list returns nothing without touching the store
    /// or the provider. EMBEDDING and BLEND fail with `InvalidMode` when
    /// `embedder` is `None`; there is no fallback at this level.
    pub fn search(
        &self,
        store: &DocumentStore,
        embedder: Option<&dyn Embedder>,
        request: &SearchRequest,
    ) -> Result<Vec<SearchHit>> {
        request.validate()?;
        if request.knowledge_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mode = request.mode;
        let embedder = match (mode.requires_embedder(), embedder) {
            (true, None) => return Err(Error::InvalidMode(mode)),
            (true, Some(embedder)) => Some(embedder),
            (false, _) => None,
        };

        let query_vector = match embedder {
            Some(embedder) => {
                let vector = embedder.embed_one(&request.query).map_err(Error::from_provider)?;
                if let Some(expected) = store.dimension() {
                    if expected != vector.len() {
                        return Err(Error::DimensionMismatch { expected, actual: vector.len() });
                    }
                }
                Some(vector)
            }
            None => None,
        };
        let query_tokens = match mode {
            SearchMode::Keywords | SearchMode::Blend => token_set(self.tokenizer.tokenize(&request.query)),
            SearchMode::Embedding => Default::default(),
        };

        let threshold = request.threshold();
        let candidates = store.search_candidates(&request.knowledge_ids)?;
        let candidate_count = candidates.len();
        let mut hits = Vec::new();
        for record in candidates.iter().filter(|r| request.matches_meta(r)) {
            let embedding_score = match (&query_vector, &record.embedding) {
                (Some(q), Some(d)) => {
                    if q.len() != d.len() {
                        return Err(Error::DimensionMismatch { expected: d.len(), actual: q.len() });
                    }
                    Some(cosine_similarity(q, d))
                }
                _ => None,
            };
            let hit = match mode {
                SearchMode::Embedding => {
                    // Passages stored without a vector cannot be ranked by embedding.
                    let Some(e) = embedding_score else { continue };
                    SearchHit::from_passage(&record.passage, e)
                }
                SearchMode::Keywords => {
                    let k = keyword_overlap(&query_tokens, &token_set(self.tokenizer.tokenize(&record.passage.text)));
                    SearchHit::from_passage(&record.passage, k)
                }
                SearchMode::Blend => {
                    let e = embedding_score.unwrap_or(0.0);
                    let k = keyword_overlap(&query_tokens, &token_set(self.tokenizer.tokenize(&record.passage.text)));
                    let mut hit = SearchHit::from_passage(&record.passage, self.weights.combine(e, k));
                    hit.embedding_score = Some(e);
                    hit.keyword_score = Some(k);
                    hit
                }
            };
            if hit.similarity >= threshold {
                hits.push(hit);
            }
        }

        // Stable: equal scores keep candidate order.
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(request.top_n);
        debug!(%mode, candidates = candidate_count, returned = hits.len(), threshold, "search finished");
        Ok(hits)
    }
}
