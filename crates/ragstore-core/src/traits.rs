/// Turns text into fixed-length vectors.
///
/// `embed_many` must return exactly one vector per input, in input order.
/// Implementations never promise a particular dimension; the store learns it
/// from the first vector it receives.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model, used in logs.
    fn embedder_id(&self) -> &str;

    fn embed_many(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_many(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("{} returned no vector for a single input", self.embedder_id()))
    }
}

/// Word-level segmentation. Output order follows the text; duplicates are kept.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
}
