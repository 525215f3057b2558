use indexmap::IndexMap;

use crate::error::Result;
use crate::store::StoreBackend;
use crate::types::{DeleteScope, PassageRecord, StoreStats};

/// Process-local backend. Accepts passages without embeddings, so a store built
/// on it serves keyword search with no provider configured at all.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: IndexMap<String, PassageRecord>,
    dimension: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl StoreBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn requires_embeddings(&self) -> bool {
        false
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn upsert(&mut self, records: Vec<PassageRecord>) -> Result<()> {
        for record in records {
            if self.dimension.is_none() {
                self.dimension = record.embedding.as_ref().map(Vec::len);
            }
            // IndexMap::insert keeps the original slot position on overwrite.
            self.records.insert(record.passage.paragraph_id.clone(), record);
        }
        Ok(())
    }

    fn candidates(&self, knowledge_ids: &[String]) -> Result<Vec<PassageRecord>> {
        Ok(self
            .records
            .values()
            .filter(|r| r.passage.is_active && knowledge_ids.contains(&r.passage.knowledge_id))
            .cloned()
            .collect())
    }

    fn get(&self, paragraph_id: &str) -> Result<Option<PassageRecord>> {
        Ok(self.records.get(paragraph_id).cloned())
    }

    fn set_active(&mut self, paragraph_id: &str, active: bool) -> Result<bool> {
        Ok(match self.records.get_mut(paragraph_id) {
            Some(record) => {
                record.passage.is_active = active;
                true
            }
            None => false,
        })
    }

    fn delete(&mut self, scope: &DeleteScope) -> Result<usize> {
        let before = self.records.len();
        self.records.retain(|_, r| !scope.matches(&r.passage));
        Ok(before - self.records.len())
    }

    fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats::from_records(self.name(), self.dimension, self.records.values()))
    }
}
