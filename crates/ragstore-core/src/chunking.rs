//! Turning raw text into passages: a paragraph-aware character window splitter
//! and a directory loader over `.txt` files.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{Meta, Passage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Window size in characters.
    pub max_chars: usize,
    /// Characters shared by consecutive windows of one long paragraph.
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_chars: 500, overlap_chars: 50 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_chars == 0 || self.overlap_chars >= self.max_chars {
            return Err(Error::Configuration(format!(
                "chunk overlap ({}) must be smaller than a positive chunk size ({})",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PassageSplitter {
    config: ChunkingConfig,
}

impl PassageSplitter {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Splits on blank lines; paragraphs longer than the window are cut into
    /// overlapping windows. Blank paragraphs are skipped.
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        for paragraph in text.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }
            if paragraph.chars().count() <= self.config.max_chars {
                chunks.push(paragraph.to_string());
            } else {
                chunks.extend(self.windows(paragraph));
            }
        }
        chunks
    }

    fn windows(&self, paragraph: &str) -> Vec<String> {
        let chars: Vec<char> = paragraph.chars().collect();
        let step = self.config.max_chars - self.config.overlap_chars;
        let mut windows = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + self.config.max_chars).min(chars.len());
            let window: String = chars[start..end].iter().collect();
            let window = window.trim();
            if !window.is_empty() {
                windows.push(window.to_string());
            }
            if end >= chars.len() {
                break;
            }
            start += step;
        }
        windows
    }

    /// Chunks one document into passages `<document_id>:<n>`.
    pub fn passages(&self, text: &str, knowledge_id: &str, document_id: &str, meta: &Meta) -> Vec<Passage> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(n, chunk)| {
                Passage::new(format!("{document_id}:{n}"), chunk, knowledge_id, document_id).with_meta(meta.clone())
            })
            .collect()
    }
}

/// Walks a directory and turns every `.txt` file into passages of one knowledge base.
pub struct DirectoryLoader {
    splitter: PassageSplitter,
    limit: Option<usize>,
}

impl DirectoryLoader {
    pub fn new(splitter: PassageSplitter) -> Self {
        Self { splitter, limit: None }
    }

    /// Only the first `limit` files (in path order) are read.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn load(&self, data_dir: &Path, knowledge_id: &str) -> Result<Vec<Passage>> {
        let mut files = list_txt_files(data_dir);
        if let Some(limit) = self.limit {
            files.truncate(limit);
        }
        let mut passages = Vec::new();
        for (i, path) in files.iter().enumerate() {
            debug!(file = %path.display(), n = i + 1, of = files.len(), "chunking file");
            let content = read_file_content(path)?;
            let document_id = doc_id(path)?;
            let mut meta = Meta::new();
            meta.insert("category".to_string(), Value::String(category(path, data_dir)));
            meta.insert("source_path".to_string(), Value::String(path.to_string_lossy().to_string()));
            passages.extend(self.splitter.passages(&content, knowledge_id, &document_id, &meta));
        }
        info!(dir = %data_dir.display(), files = files.len(), passages = passages.len(), "loaded directory");
        Ok(passages)
    }
}

fn read_file_content(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(path)?).to_string()),
    }
}

fn doc_id(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .ok_or_else(|| Error::validation("document_id", format!("cannot derive from {}", path.display())))
}

fn category(path: &Path, data_dir: &Path) -> String {
    let relative = path.strip_prefix(data_dir).unwrap_or(path);
    match relative.parent().and_then(Path::to_str) {
        Some(parent) if !parent.is_empty() => parent.replace('\\', "/"),
        _ => "misc".to_string(),
    }
}

fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("txt"))
        .collect();
    txt_files.sort();
    txt_files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_paragraphs_stay_whole() {
        let splitter = PassageSplitter::default();
        let chunks = splitter.split("first paragraph\n\n\n\nsecond one\n");
        assert_eq!(chunks, vec!["first paragraph", "second one"]);
    }

    #[test]
    fn long_paragraph_windows_overlap() {
        let splitter = PassageSplitter::new(ChunkingConfig { max_chars: 4, overlap_chars: 1 }).unwrap();
        let chunks = splitter.split("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn windows_count_characters_not_bytes() {
        let splitter = PassageSplitter::new(ChunkingConfig { max_chars: 3, overlap_chars: 0 }).unwrap();
        assert_eq!(splitter.split("外滩开放时间"), vec!["外滩开", "放时间"]);
    }

    #[test]
    fn overlap_must_be_smaller_than_window() {
        assert!(PassageSplitter::new(ChunkingConfig { max_chars: 10, overlap_chars: 10 }).is_err());
        assert!(PassageSplitter::new(ChunkingConfig { max_chars: 0, overlap_chars: 0 }).is_err());
    }
}
