//! Retrieval Client: one API over any configured store, with keyword-only
//! degradation when no embedding provider is available.

use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

use ragstore_core::config::Settings;
use ragstore_core::error::Result;
use ragstore_core::store::DocumentStore;
use ragstore_core::traits::Embedder;
use ragstore_core::types::{DeleteScope, PassageInput, PassageRecord, SearchHit, SearchMode, StoreStats};
use ragstore_embed::get_default_embedder;
use ragstore_text::TextTokenizer;

use crate::backend::open_store;
use crate::retriever::{Retriever, SearchRequest};

pub struct RetrievalClient {
    store: DocumentStore,
    embedder: Option<Arc<dyn Embedder>>,
    retriever: Retriever,
    default_mode: SearchMode,
    default_top_n: usize,
    default_similarity: Option<f32>,
}

impl RetrievalClient {
    pub fn new(store: DocumentStore, embedder: Option<Arc<dyn Embedder>>, retriever: Retriever) -> Self {
        Self {
            store,
            embedder,
            retriever,
            default_mode: SearchMode::Blend,
            default_top_n: crate::retriever::DEFAULT_TOP_N,
            default_similarity: None,
        }
    }

    /// Store, provider, tokenizer and search defaults from configuration.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let store = open_store(&settings.store).context("opening document store")?;
        let embedder = get_default_embedder(&settings.embedding).context("building embedding provider")?;
        let tokenizer = TextTokenizer::from_settings(&settings.tokenizer).context("building tokenizer")?;
        let retriever = Retriever::new(Arc::new(tokenizer), settings.search.blend)?;
        let mut client = Self::new(store, embedder, retriever);
        client.default_mode = settings.search.mode;
        client.default_top_n = settings.search.top_n;
        client.default_similarity = settings.search.similarity;
        info!(
            backend = client.store.backend_name(),
            embeddings = client.has_embedder(),
            mode = %client.default_mode,
            "retrieval client ready"
        );
        Ok(client)
    }

    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// A request carrying the configured mode, `top_n` and threshold.
    pub fn request(&self, query: impl Into<String>, knowledge_ids: Vec<String>) -> SearchRequest {
        let mut request = SearchRequest::new(query, knowledge_ids).with_mode(self.default_mode).with_top_n(self.default_top_n);
        request.similarity = self.default_similarity;
        request
    }

    pub fn add_document(&mut self, input: PassageInput) -> Result<()> {
        let passage = input.into_passage("")?;
        self.store.save(passage, self.embedder.as_deref())
    }

    /// Validates every input before anything is embedded or written.
    pub fn add_documents(&mut self, inputs: Vec<PassageInput>) -> Result<usize> {
        let passages = inputs
            .into_iter()
            .enumerate()
            .map(|(i, input)| input.into_passage(&format!("documents[{i}].")))
            .collect::<Result<Vec<_>>>()?;
        let count = passages.len();
        self.store.batch_save(passages, self.embedder.as_deref())?;
        Ok(count)
    }

    /// Mode the client will actually run for `requested`.
    pub fn effective_mode(&self, requested: SearchMode) -> SearchMode {
        if requested.requires_embedder() && self.embedder.is_none() {
            SearchMode::Keywords
        } else {
            requested
        }
    }

    pub fn search(&self, mut request: SearchRequest) -> Result<Vec<SearchHit>> {
        let effective = self.effective_mode(request.mode);
        if effective != request.mode {
            warn!(
                requested = %request.mode,
                effective = %effective,
                "no embedding provider configured; degrading to keyword search"
            );
            request.mode = effective;
        }
        self.retriever.search(&self.store, self.embedder.as_deref(), &request)
    }

    pub fn get(&self, paragraph_id: &str) -> Result<Option<PassageRecord>> {
        self.store.get(paragraph_id)
    }

    pub fn set_active(&mut self, paragraph_id: &str, active: bool) -> Result<bool> {
        self.store.set_active(paragraph_id, active)
    }

    pub fn delete_by_knowledge_id(&mut self, knowledge_id: &str) -> Result<usize> {
        self.store.delete_by_knowledge_id(knowledge_id)
    }

    pub fn delete_by_document_id(&mut self, document_id: &str) -> Result<usize> {
        self.store.delete_by_document_id(document_id)
    }

    pub fn delete_by_paragraph_id(&mut self, paragraph_id: &str) -> Result<usize> {
        self.store.delete_by_paragraph_id(paragraph_id)
    }

    pub fn delete(&mut self, scope: DeleteScope) -> Result<usize> {
        self.store.delete(scope)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.store.stats()
    }
}
