//! File-backed store: two artifacts under one directory.
//!
//! - `vectors.bin`: bincode-encoded `paragraph_id -> vector`
//! - `metadata.json`: pretty JSON `paragraph_id -> passage`, in insertion order
//!
//! Both are loaded together at open and rewritten after every mutation through
//! a temp file + rename. The two renames are not atomic as a pair, so open
//! reconciles them: metadata without a vector stays (keyword-searchable),
//! vectors without metadata are dropped.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::store::{check_dimensions, StoreBackend};
use crate::types::{DeleteScope, Passage, PassageRecord, StoreStats};

pub const VECTORS_FILE: &str = "vectors.bin";
pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    vectors: HashMap<String, Vec<f32>>,
    metadata: IndexMap<String, Passage>,
    dimension: Option<usize>,
}

/// What reconciliation found when the two artifacts disagreed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub missing_vectors: Vec<String>,
    pub orphan_vectors: Vec<String>,
}

impl LoadReport {
    pub fn is_consistent(&self) -> bool {
        self.missing_vectors.is_empty() && self.orphan_vectors.is_empty()
    }
}

impl FileBackend {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_report(root).map(|(backend, _)| backend)
    }

    pub fn open_with_report(root: impl AsRef<Path>) -> Result<(Self, LoadReport)> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .map_err(|e| Error::StoreIo(format!("cannot create store dir {}: {e}", root.display())))?;

        let vectors_path = root.join(VECTORS_FILE);
        let mut vectors: HashMap<String, Vec<f32>> = if vectors_path.exists() {
            let reader = BufReader::new(File::open(&vectors_path)?);
            bincode::deserialize_from(reader)
                .map_err(|e| Error::StoreIo(format!("cannot decode {}: {e}", vectors_path.display())))?
        } else {
            HashMap::new()
        };

        let metadata_path = root.join(METADATA_FILE);
        let metadata: IndexMap<String, Passage> = if metadata_path.exists() {
            let reader = BufReader::new(File::open(&metadata_path)?);
            serde_json::from_reader(reader)
                .map_err(|e| Error::StoreIo(format!("cannot parse {}: {e}", metadata_path.display())))?
        } else {
            IndexMap::new()
        };

        let mut report = LoadReport::default();
        for id in metadata.keys() {
            if !vectors.contains_key(id) {
                warn!(paragraph_id = %id, "metadata entry has no stored vector; keeping it for keyword search");
                report.missing_vectors.push(id.clone());
            }
        }
        vectors.retain(|id, _| {
            let known = metadata.contains_key(id);
            if !known {
                warn!(paragraph_id = %id, "dropping vector with no metadata entry");
                report.orphan_vectors.push(id.clone());
            }
            known
        });

        // Iterate in metadata order so a mismatch names a deterministic pair.
        let dimension = check_dimensions(None, metadata.keys().filter_map(|id| vectors.get(id)).map(Vec::as_slice))?;

        info!(
            root = %root.display(),
            passages = metadata.len(),
            vectors = vectors.len(),
            consistent = report.is_consistent(),
            "loaded file store"
        );
        Ok((Self { root, vectors, metadata, dimension }, report))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn persist(&self) -> Result<()> {
        write_atomic(&self.root.join(VECTORS_FILE), |w| {
            bincode::serialize_into(w, &self.vectors).map_err(|e| Error::StoreIo(format!("cannot encode vectors: {e}")))
        })?;
        write_atomic(&self.root.join(METADATA_FILE), |w| {
            serde_json::to_writer_pretty(w, &self.metadata)
                .map_err(|e| Error::StoreIo(format!("cannot encode metadata: {e}")))
        })
    }

    /// Runs `op`, then persists if it reports a change. A failed persist puts
    /// the in-memory maps back the way they were and re-raises.
    fn mutate<T>(&mut self, op: impl FnOnce(&mut Self) -> (T, bool)) -> Result<T> {
        let snapshot = (self.vectors.clone(), self.metadata.clone(), self.dimension);
        let (out, changed) = op(self);
        if !changed {
            return Ok(out);
        }
        if let Err(err) = self.persist() {
            error!(root = %self.root.display(), error = %err, "persisting file store failed; reverting in-memory state");
            (self.vectors, self.metadata, self.dimension) = snapshot;
            return Err(err);
        }
        Ok(out)
    }

    fn record(&self, passage: &Passage) -> PassageRecord {
        PassageRecord::new(passage.clone(), self.vectors.get(&passage.paragraph_id).cloned())
    }
}

fn write_atomic(path: &Path, write: impl FnOnce(&mut dyn Write) -> Result<()>) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| Error::StoreIo(format!("cannot replace {}: {}", path.display(), e.error)))?;
    Ok(())
}

impl StoreBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn requires_embeddings(&self) -> bool {
        true
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn upsert(&mut self, records: Vec<PassageRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.mutate(|store| {
            for PassageRecord { passage, embedding } in records {
                let id = passage.paragraph_id.clone();
                match embedding {
                    Some(vector) => {
                        if store.dimension.is_none() {
                            store.dimension = Some(vector.len());
                        }
                        store.vectors.insert(id.clone(), vector);
                    }
                    None => {
                        store.vectors.remove(&id);
                    }
                }
                store.metadata.insert(id, passage);
            }
            ((), true)
        })
    }

    fn candidates(&self, knowledge_ids: &[String]) -> Result<Vec<PassageRecord>> {
        Ok(self
            .metadata
            .values()
            .filter(|p| p.is_active && knowledge_ids.contains(&p.knowledge_id))
            .map(|p| self.record(p))
            .collect())
    }

    fn get(&self, paragraph_id: &str) -> Result<Option<PassageRecord>> {
        Ok(self.metadata.get(paragraph_id).map(|p| self.record(p)))
    }

    fn set_active(&mut self, paragraph_id: &str, active: bool) -> Result<bool> {
        let paragraph_id = paragraph_id.to_string();
        self.mutate(move |store| match store.metadata.get_mut(&paragraph_id) {
            Some(passage) if passage.is_active == active => (true, false),
            Some(passage) => {
                passage.is_active = active;
                (true, true)
            }
            None => (false, false),
        })
    }

    fn delete(&mut self, scope: &DeleteScope) -> Result<usize> {
        self.mutate(|store| {
            let doomed: Vec<String> = store
                .metadata
                .values()
                .filter(|p| scope.matches(p))
                .map(|p| p.paragraph_id.clone())
                .collect();
            for id in &doomed {
                store.metadata.shift_remove(id);
                store.vectors.remove(id);
            }
            (doomed.len(), !doomed.is_empty())
        })
    }

    fn stats(&self) -> Result<StoreStats> {
        let records: Vec<PassageRecord> = self.metadata.values().map(|p| self.record(p)).collect();
        Ok(StoreStats::from_records(self.name(), self.dimension, &records))
    }
}
