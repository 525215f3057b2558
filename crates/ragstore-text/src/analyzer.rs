use anyhow::Result;
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, StopWordFilter, TextAnalyzer, TokenStream};
use tantivy::Index;
use tracing::debug;

use ragstore_core::config::{expand_path, TokenizerSettings};
use ragstore_core::traits::Tokenizer;

use crate::segmenter::CjkSegmenter;
use crate::vocabulary::Vocabulary;

/// Name under which [`TextTokenizer::register`] installs the analyzer on an index.
pub const ANALYZER_NAME: &str = "ragstore_cjk";

pub const DEFAULT_MAX_TOKEN_CHARS: usize = 40;

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it", "its", "of", "on",
    "that", "the", "to", "was", "will", "with", "or", "but", "not", "this", "these", "they", "them", "their", "there",
    "then", "than", "so", "if", "when", "where", "why", "how", "what", "which", "who", "whom", "whose", "can", "could",
    "should", "would", "may", "might", "must", "shall", "do", "does", "did", "have", "had", "having",
];

const CHINESE_STOP_WORDS: &[&str] = &[
    "的", "了", "是", "在", "和", "与", "及", "或", "也", "都", "就", "而", "着", "吗", "呢", "吧", "啊", "这", "那",
];

pub fn default_stop_words() -> Vec<String> {
    ENGLISH_STOP_WORDS.iter().chain(CHINESE_STOP_WORDS).map(|s| s.to_string()).collect()
}

/// Segmenter + lower-casing + stop words + long-token removal, usable both as
/// the keyword tokenizer of the retrieval core and as a tantivy field analyzer.
///
/// Han text is only cut into words the vocabulary knows. With an empty
/// vocabulary every character is its own token, which makes overlap scores on
/// Chinese queries run noticeably higher than word-level ones ("外滩开放时间"
/// against "外滩是著名景点，24小时开放" is 5/6 per character, 2/3 per word).
/// The workspace `config.toml` points `tokenizer.vocabulary_file` at
/// `crates/ragstore-text/data/vocabulary.txt` so the default thresholds see
/// word-level scores.
#[derive(Clone)]
pub struct TextTokenizer {
    analyzer: TextAnalyzer,
}

impl TextTokenizer {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self::with_options(vocabulary, default_stop_words(), DEFAULT_MAX_TOKEN_CHARS)
    }

    pub fn with_options(vocabulary: Vocabulary, stop_words: Vec<String>, max_token_chars: usize) -> Self {
        let analyzer = TextAnalyzer::builder(CjkSegmenter::new(vocabulary))
            .filter(LowerCaser)
            .filter(StopWordFilter::remove(stop_words))
            // The filter counts UTF-8 bytes; four per char bounds any script.
            .filter(RemoveLongFilter::limit(max_token_chars.saturating_mul(4).max(1)))
            .build();
        Self { analyzer }
    }

    /// Vocabulary is read once here; later edits to the file are not picked up.
    pub fn from_settings(settings: &TokenizerSettings) -> Result<Self> {
        let mut vocabulary = match &settings.vocabulary_file {
            Some(path) => Vocabulary::from_file(&expand_path(path))?,
            None => Vocabulary::default(),
        };
        vocabulary.extend(settings.vocabulary.iter().cloned());
        debug!(words = vocabulary.len(), "tokenizer vocabulary loaded");
        let stop_words = settings.stop_words.clone().unwrap_or_else(default_stop_words);
        Ok(Self::with_options(vocabulary, stop_words, settings.max_token_chars))
    }

    pub fn analyzer(&self) -> TextAnalyzer {
        self.analyzer.clone()
    }

    pub fn register(&self, index: &Index) {
        index.tokenizers().register(ANALYZER_NAME, self.analyzer());
    }
}

impl Default for TextTokenizer {
    fn default() -> Self {
        Self::new(Vocabulary::default())
    }
}

impl Tokenizer for TextTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut analyzer = self.analyzer.clone();
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while stream.advance() {
            tokens.push(stream.token().text.clone());
        }
        tokens
    }
}
