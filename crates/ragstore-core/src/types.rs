//! Domain types shared by the store backends and the retrieval core.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub type ParagraphId = String;
pub type Meta = serde_json::Map<String, serde_json::Value>;

pub const DEFAULT_SOURCE_TYPE: &str = "1";

/// The atomic indexed unit.
///
/// - `paragraph_id`: primary key within a store
/// - `knowledge_id`: the knowledge base the passage is searched under
/// - `document_id`: the source document the passage was cut from
/// - `source_id`/`source_type`: free-form provenance tags
/// - `is_active`: inactive passages stay stored but never match a search
/// - `meta`: opaque auxiliary attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub paragraph_id: ParagraphId,
    pub text: String,
    pub knowledge_id: String,
    pub document_id: String,
    pub source_id: String,
    pub source_type: String,
    pub is_active: bool,
    #[serde(default)]
    pub meta: Meta,
}

impl Passage {
    pub fn new(
        paragraph_id: impl Into<String>,
        text: impl Into<String>,
        knowledge_id: impl Into<String>,
        document_id: impl Into<String>,
    ) -> Self {
        let paragraph_id = paragraph_id.into();
        Self {
            source_id: paragraph_id.clone(),
            paragraph_id,
            text: text.into(),
            knowledge_id: knowledge_id.into(),
            document_id: document_id.into(),
            source_type: DEFAULT_SOURCE_TYPE.to_string(),
            is_active: true,
            meta: Meta::new(),
        }
    }

    pub fn with_source(mut self, source_id: impl Into<String>, source_type: impl Into<String>) -> Self {
        self.source_id = source_id.into();
        self.source_type = source_type.into();
        self
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    /// Checks the fields every write requires. `field_prefix` is prepended to the
    /// reported field name (e.g. `documents[3].`).
    pub fn validate(&self, field_prefix: &str) -> Result<()> {
        let required = [
            ("paragraph_id", &self.paragraph_id),
            ("text", &self.text),
            ("knowledge_id", &self.knowledge_id),
            ("document_id", &self.document_id),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Validation {
                    field: format!("{field_prefix}{name}"),
                    reason: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Loosely-typed add request as it arrives from JSON/JSONL input.
///
/// Every field is optional so that a missing one can be reported by name
/// instead of failing deserialization as a whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassageInput {
    pub text: Option<String>,
    pub knowledge_id: Option<String>,
    pub document_id: Option<String>,
    pub paragraph_id: Option<String>,
    pub source_id: Option<String>,
    pub source_type: Option<String>,
    pub is_active: Option<bool>,
    pub meta: Option<Meta>,
}

impl PassageInput {
    pub fn into_passage(self, field_prefix: &str) -> Result<Passage> {
        let missing = |field: &str| Error::Validation {
            field: format!("{field_prefix}{field}"),
            reason: "is required".to_string(),
        };
        let text = self.text.ok_or_else(|| missing("text"))?;
        let knowledge_id = self.knowledge_id.ok_or_else(|| missing("knowledge_id"))?;
        let document_id = self.document_id.ok_or_else(|| missing("document_id"))?;
        let paragraph_id = self.paragraph_id.ok_or_else(|| missing("paragraph_id"))?;

        let mut passage = Passage::new(paragraph_id, text, knowledge_id, document_id);
        if let Some(source_id) = self.source_id {
            passage.source_id = source_id;
        }
        if let Some(source_type) = self.source_type {
            passage.source_type = source_type;
        }
        if let Some(is_active) = self.is_active {
            passage.is_active = is_active;
        }
        if let Some(meta) = self.meta {
            passage.meta = meta;
        }
        passage.validate(field_prefix)?;
        Ok(passage)
    }
}

impl From<Passage> for PassageInput {
    fn from(passage: Passage) -> Self {
        Self {
            text: Some(passage.text),
            knowledge_id: Some(passage.knowledge_id),
            document_id: Some(passage.document_id),
            paragraph_id: Some(passage.paragraph_id),
            source_id: Some(passage.source_id),
            source_type: Some(passage.source_type),
            is_active: Some(passage.is_active),
            meta: Some(passage.meta),
        }
    }
}

/// A passage together with its embedding, as held by a store backend.
#[derive(Debug, Clone, PartialEq)]
pub struct PassageRecord {
    pub passage: Passage,
    pub embedding: Option<Vec<f32>>,
}

impl PassageRecord {
    pub fn new(passage: Passage, embedding: Option<Vec<f32>>) -> Self {
        Self { passage, embedding }
    }

    pub fn paragraph_id(&self) -> &str {
        &self.passage.paragraph_id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Embedding,
    Keywords,
    #[default]
    Blend,
}

impl SearchMode {
    pub fn requires_embedder(self) -> bool {
        !matches!(self, SearchMode::Keywords)
    }

    /// Threshold applied when the caller does not give one.
    pub fn default_threshold(self) -> f32 {
        match self {
            SearchMode::Embedding => 0.7,
            SearchMode::Keywords | SearchMode::Blend => 0.6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Embedding => "embedding",
            SearchMode::Keywords => "keywords",
            SearchMode::Blend => "blend",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embedding" | "vector" => Ok(SearchMode::Embedding),
            "keywords" | "keyword" => Ok(SearchMode::Keywords),
            "blend" | "hybrid" => Ok(SearchMode::Blend),
            other => Err(Error::Validation {
                field: "search_mode".to_string(),
                reason: format!("unknown mode '{other}'"),
            }),
        }
    }
}

/// One ranked result. `similarity` and `comprehensive_score` always carry the
/// composite score used for filtering and ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub paragraph_id: ParagraphId,
    pub similarity: f32,
    pub comprehensive_score: f32,
    pub knowledge_id: String,
    pub document_id: String,
    pub source_id: String,
    pub source_type: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_score: Option<f32>,
}

impl SearchHit {
    pub fn from_passage(passage: &Passage, score: f32) -> Self {
        Self {
            paragraph_id: passage.paragraph_id.clone(),
            similarity: score,
            comprehensive_score: score,
            knowledge_id: passage.knowledge_id.clone(),
            document_id: passage.document_id.clone(),
            source_id: passage.source_id.clone(),
            source_type: passage.source_type.clone(),
            text: passage.text.clone(),
            embedding_score: None,
            keyword_score: None,
        }
    }
}

/// Which passages a cascading delete removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteScope {
    Knowledge(String),
    Document(String),
    Paragraph(String),
}

impl DeleteScope {
    pub fn matches(&self, passage: &Passage) -> bool {
        match self {
            DeleteScope::Knowledge(id) => passage.knowledge_id == *id,
            DeleteScope::Document(id) => passage.document_id == *id,
            DeleteScope::Paragraph(id) => passage.paragraph_id == *id,
        }
    }
}

impl fmt::Display for DeleteScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteScope::Knowledge(id) => write!(f, "knowledge_id={id}"),
            DeleteScope::Document(id) => write!(f, "document_id={id}"),
            DeleteScope::Paragraph(id) => write!(f, "paragraph_id={id}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub backend: String,
    pub passages: usize,
    pub active: usize,
    pub embedded: usize,
    pub knowledge_bases: usize,
    pub documents: usize,
    pub dimension: Option<usize>,
}

impl StoreStats {
    /// Tallies counts over a full record listing.
    pub fn from_records<'a>(backend: &str, dimension: Option<usize>, records: impl IntoIterator<Item = &'a PassageRecord>) -> Self {
        let mut knowledge = std::collections::HashSet::new();
        let mut documents = std::collections::HashSet::new();
        let mut stats = StoreStats { backend: backend.to_string(), dimension, ..Default::default() };
        for record in records {
            stats.passages += 1;
            if record.passage.is_active {
                stats.active += 1;
            }
            if record.embedding.is_some() {
                stats.embedded += 1;
            }
            knowledge.insert(record.passage.knowledge_id.as_str());
            documents.insert(record.passage.document_id.as_str());
        }
        stats.knowledge_bases = knowledge.len();
        stats.documents = documents.len();
        stats
    }
}
