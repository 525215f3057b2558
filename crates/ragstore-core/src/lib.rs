pub mod chunking;
pub mod config;
pub mod error;
pub mod similarity;
pub mod store;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use similarity::{cosine_similarity, keyword_overlap, token_set, BlendWeights};
pub use store::{DocumentStore, FileBackend, MemoryBackend, StoreBackend};
pub use traits::{Embedder, Tokenizer};
pub use types::{DeleteScope, Meta, Passage, PassageInput, PassageRecord, SearchHit, SearchMode, StoreStats};
