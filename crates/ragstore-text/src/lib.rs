//! ragstore-text
//!
//! Word segmentation for keyword scoring. [`TextTokenizer`] implements the core
//! `Tokenizer` trait on top of a tantivy analysis pipeline, so the same
//! analyzer can also be registered on a tantivy index.

pub mod analyzer;
pub mod segmenter;
pub mod vocabulary;

pub use analyzer::{default_stop_words, TextTokenizer, ANALYZER_NAME};
pub use segmenter::CjkSegmenter;
pub use vocabulary::Vocabulary;
