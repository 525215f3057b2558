use ragstore_core::types::SearchHit;

pub const DEFAULT_MAX_PASSAGE_CHARS: usize = 300;
pub const NO_RESULTS: &str = "No relevant passages found.";

/// Renders hits as numbered plain-text blocks for a prompt. Passages longer
/// than `max_chars` characters are cut and marked with `...`.
pub fn format_context(hits: &[SearchHit], max_chars: usize) -> String {
    if hits.is_empty() {
        return NO_RESULTS.to_string();
    }
    let mut parts = Vec::with_capacity(hits.len());
    for (i, hit) in hits.iter().enumerate() {
        let mut content: String = hit.text.chars().take(max_chars).collect();
        if hit.text.chars().count() > max_chars {
            content.push_str("...");
        }
        parts.push(format!(
            "[{}] {} / {}\n{content}\nscore: {:.2}\n",
            i + 1,
            hit.document_id,
            hit.paragraph_id,
            hit.similarity
        ));
    }
    parts.join("\n")
}
