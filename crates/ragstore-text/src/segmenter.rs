//! CJK-aware word segmentation as a tantivy tokenizer.
//!
//! Han and kana runs are cut by forward maximum matching against a
//! [`Vocabulary`], falling back to single characters. Other alphanumeric runs
//! (Latin words, digits, Hangul) become one token each. Whitespace and
//! punctuation separate tokens and are never emitted.

use std::sync::Arc;
use tantivy::tokenizer::{Token, TokenStream, Tokenizer};

use crate::vocabulary::Vocabulary;

pub fn is_cjk(c: char) -> bool {
    matches!(
        c as u32,
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF | 0x20000..=0x2A6DF | 0x3040..=0x30FF
    )
}

#[derive(Clone, Default)]
pub struct CjkSegmenter {
    vocabulary: Arc<Vocabulary>,
    token: Token,
}

impl CjkSegmenter {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self { vocabulary: Arc::new(vocabulary), token: Token::default() }
    }

    /// Byte spans of the tokens of `text`, in order.
    pub fn spans(&self, text: &str) -> Vec<(usize, usize)> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut spans = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i].1;
            if is_cjk(c) {
                let run_end = (i..chars.len()).find(|&j| !is_cjk(chars[j].1)).unwrap_or(chars.len());
                while i < run_end {
                    let len = self.longest_match(text, &chars, i, run_end);
                    spans.push((chars[i].0, byte_end(text, &chars, i + len)));
                    i += len;
                }
            } else if c.is_alphanumeric() {
                let run_end = (i..chars.len())
                    .find(|&j| is_cjk(chars[j].1) || !chars[j].1.is_alphanumeric())
                    .unwrap_or(chars.len());
                spans.push((chars[i].0, byte_end(text, &chars, run_end)));
                i = run_end;
            } else {
                i += 1;
            }
        }
        spans
    }

    fn longest_match(&self, text: &str, chars: &[(usize, char)], start: usize, run_end: usize) -> usize {
        let max = self.vocabulary.longest().min(run_end - start);
        for len in (2..=max).rev() {
            let word = &text[chars[start].0..byte_end(text, chars, start + len)];
            if self.vocabulary.contains(word) {
                return len;
            }
        }
        1
    }
}

fn byte_end(text: &str, chars: &[(usize, char)], i: usize) -> usize {
    chars.get(i).map_or(text.len(), |&(offset, _)| offset)
}

pub struct SegmentStream<'a> {
    text: &'a str,
    spans: std::vec::IntoIter<(usize, usize)>,
    token: &'a mut Token,
}

impl Tokenizer for CjkSegmenter {
    type TokenStream<'a> = SegmentStream<'a>;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> SegmentStream<'a> {
        let spans = self.spans(text);
        self.token = Token::default();
        SegmentStream { text, spans: spans.into_iter(), token: &mut self.token }
    }
}

impl TokenStream for SegmentStream<'_> {
    fn advance(&mut self) -> bool {
        let Some((from, to)) = self.spans.next() else {
            return false;
        };
        self.token.position = self.token.position.wrapping_add(1);
        self.token.offset_from = from;
        self.token.offset_to = to;
        self.token.text.clear();
        self.token.text.push_str(&self.text[from..to]);
        true
    }

    fn token(&self) -> &Token {
        self.token
    }

    fn token_mut(&mut self) -> &mut Token {
        self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(segmenter: &CjkSegmenter, text: &str) -> Vec<String> {
        segmenter.spans(text).into_iter().map(|(a, b)| text[a..b].to_string()).collect()
    }

    #[test]
    fn han_without_vocabulary_splits_per_character() {
        let s = CjkSegmenter::default();
        assert_eq!(words(&s, "外滩开放"), vec!["外", "滩", "开", "放"]);
    }

    #[test]
    fn vocabulary_words_stay_whole() {
        let s = CjkSegmenter::new(Vocabulary::new(["外滩", "开放时间", "开放"]));
        assert_eq!(words(&s, "外滩开放时间"), vec!["外滩", "开放时间"]);
        assert_eq!(words(&s, "外滩开放"), vec!["外滩", "开放"]);
    }

    #[test]
    fn mixed_scripts_and_punctuation() {
        let s = CjkSegmenter::default();
        assert_eq!(words(&s, "景点，24小时 open-air!"), vec!["景", "点", "24", "小", "时", "open", "air"]);
    }

    #[test]
    fn stream_positions_and_offsets() {
        let mut s = CjkSegmenter::default();
        let mut stream = s.token_stream("ab 外");
        assert!(stream.advance());
        assert_eq!((stream.token().position, stream.token().offset_from, stream.token().offset_to), (0, 0, 2));
        assert!(stream.advance());
        assert_eq!(stream.token().text, "外");
        assert_eq!((stream.token().position, stream.token().offset_from, stream.token().offset_to), (1, 3, 6));
        assert!(!stream.advance());
    }
}
