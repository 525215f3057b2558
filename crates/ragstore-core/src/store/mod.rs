//! Document Store: one write/read/delete contract over pluggable backends.
//!
//! Backends only persist [`PassageRecord`]s. Embedding the text, enforcing the
//! store-wide vector dimension and refusing vector-less writes where a backend
//! needs vectors all happen here, once, for every backend.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::traits::Embedder;
use crate::types::{DeleteScope, Passage, PassageRecord, StoreStats};

pub mod file;
pub mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// Storage capability a backend provides to the [`DocumentStore`].
///
/// Implementations keep passages keyed by `paragraph_id` and report candidates
/// in a stable order (insertion order of the `paragraph_id` slot).
pub trait StoreBackend: Send + Sync {
    /// Short backend label for logs and stats.
    fn name(&self) -> &'static str;

    /// Whether every record must carry an embedding.
    fn requires_embeddings(&self) -> bool;

    /// Vector length established by the first stored embedding.
    fn dimension(&self) -> Option<usize>;

    /// Creates or overwrites the slot of each record's `paragraph_id`.
    fn upsert(&mut self, records: Vec<PassageRecord>) -> Result<()>;

    /// Active records whose `knowledge_id` is in `knowledge_ids`.
    fn candidates(&self, knowledge_ids: &[String]) -> Result<Vec<PassageRecord>>;

    fn get(&self, paragraph_id: &str) -> Result<Option<PassageRecord>>;

    /// Flips `is_active`; returns `false` when no such passage exists.
    fn set_active(&mut self, paragraph_id: &str, active: bool) -> Result<bool>;

    /// Removes every matching record and its embedding; returns how many.
    fn delete(&mut self, scope: &DeleteScope) -> Result<usize>;

    fn stats(&self) -> Result<StoreStats>;
}

/// Checks `vectors` against the store dimension (or, when none is established
/// yet, against the first vector) and returns the dimension they share.
pub fn check_dimensions<'a>(
    established: Option<usize>,
    vectors: impl IntoIterator<Item = &'a [f32]>,
) -> Result<Option<usize>> {
    let mut expected = established;
    for vector in vectors {
        match expected {
            Some(dim) if dim != vector.len() => {
                return Err(Error::DimensionMismatch { expected: dim, actual: vector.len() });
            }
            Some(_) => {}
            None if vector.is_empty() => {
                return Err(Error::Provider("embedding provider returned an empty vector".to_string()));
            }
            None => expected = Some(vector.len()),
        }
    }
    Ok(expected)
}

pub struct DocumentStore {
    backend: Box<dyn StoreBackend>,
}

impl DocumentStore {
    pub fn new(backend: Box<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend::new()))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn requires_embeddings(&self) -> bool {
        self.backend.requires_embeddings()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.backend.dimension()
    }

    /// Embeds `passage.text` with `embedder` (when given) and writes the record,
    /// replacing any passage stored under the same `paragraph_id`.
    pub fn save(&mut self, passage: Passage, embedder: Option<&dyn Embedder>) -> Result<()> {
        passage.validate("")?;
        let embedding = match embedder {
            Some(embedder) => {
                let vector = embedder.embed_one(&passage.text).map_err(Error::from_provider)?;
                check_dimensions(self.backend.dimension(), [vector.as_slice()])?;
                Some(vector)
            }
            None => {
                self.ensure_vectorless_allowed()?;
                None
            }
        };
        debug!(paragraph_id = %passage.paragraph_id, backend = self.backend.name(), "saving passage");
        self.backend.upsert(vec![PassageRecord::new(passage, embedding)])
    }

    /// Embeds all texts in one provider call and writes every record.
    ///
    /// A provider failure aborts before anything is written. Empty input is a no-op.
    pub fn batch_save(&mut self, passages: Vec<Passage>, embedder: Option<&dyn Embedder>) -> Result<()> {
        if passages.is_empty() {
            return Ok(());
        }
        for (i, passage) in passages.iter().enumerate() {
            passage.validate(&format!("documents[{i}]."))?;
        }
        let records = match embedder {
            Some(embedder) => {
                let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
                let vectors = embedder.embed_many(&texts).map_err(Error::from_provider)?;
                if vectors.len() != passages.len() {
                    return Err(Error::Provider(format!(
                        "{} returned {} vectors for {} texts",
                        embedder.embedder_id(),
                        vectors.len(),
                        passages.len()
                    )));
                }
                check_dimensions(self.backend.dimension(), vectors.iter().map(Vec::as_slice))?;
                passages
                    .into_iter()
                    .zip(vectors)
                    .map(|(passage, vector)| PassageRecord::new(passage, Some(vector)))
                    .collect::<Vec<_>>()
            }
            None => {
                self.ensure_vectorless_allowed()?;
                passages.into_iter().map(|p| PassageRecord::new(p, None)).collect()
            }
        };
        info!(count = records.len(), backend = self.backend.name(), "batch saving passages");
        self.backend.upsert(records)
    }

    /// Active passages of the given knowledge bases, in stable candidate order.
    pub fn search_candidates(&self, knowledge_ids: &[String]) -> Result<Vec<PassageRecord>> {
        if knowledge_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.backend.candidates(knowledge_ids)
    }

    pub fn get(&self, paragraph_id: &str) -> Result<Option<PassageRecord>> {
        self.backend.get(paragraph_id)
    }

    pub fn set_active(&mut self, paragraph_id: &str, active: bool) -> Result<bool> {
        self.backend.set_active(paragraph_id, active)
    }

    pub fn delete_by_knowledge_id(&mut self, knowledge_id: &str) -> Result<usize> {
        self.delete(DeleteScope::Knowledge(knowledge_id.to_string()))
    }

    pub fn delete_by_document_id(&mut self, document_id: &str) -> Result<usize> {
        self.delete(DeleteScope::Document(document_id.to_string()))
    }

    pub fn delete_by_paragraph_id(&mut self, paragraph_id: &str) -> Result<usize> {
        self.delete(DeleteScope::Paragraph(paragraph_id.to_string()))
    }

    pub fn delete(&mut self, scope: DeleteScope) -> Result<usize> {
        let removed = self.backend.delete(&scope)?;
        debug!(%scope, removed, "deleted passages");
        Ok(removed)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.backend.stats()
    }

    fn ensure_vectorless_allowed(&self) -> Result<()> {
        if self.backend.requires_embeddings() {
            return Err(Error::Configuration(format!(
                "the {} store needs an embedding for every passage but no embedding provider was given",
                self.backend.name()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_vector_establishes_dimension() {
        let a = vec![1.0f32, 2.0, 3.0];
        let b = vec![0.0f32, 1.0, 0.0];
        let dim = check_dimensions(None, [a.as_slice(), b.as_slice()]).ok().flatten();
        assert_eq!(dim, Some(3));
    }

    #[test]
    fn mixed_dimensions_are_fatal() {
        let a = vec![1.0f32, 2.0, 3.0];
        let b = vec![1.0f32, 2.0];
        let err = check_dimensions(None, [a.as_slice(), b.as_slice()]);
        assert!(matches!(err, Err(Error::DimensionMismatch { expected: 3, actual: 2 })));
        let err = check_dimensions(Some(4), [a.as_slice()]);
        assert!(matches!(err, Err(Error::DimensionMismatch { expected: 4, actual: 3 })));
    }
}
