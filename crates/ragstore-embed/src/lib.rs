//! Embedding providers: a deterministic hashing embedder, a local
//! XLM-RoBERTa encoder on candle, and a timeout wrapper around either.

pub mod device;
pub mod factory;
pub mod hash;
pub mod model;
pub mod pool;
pub mod timeout;
pub mod tokenize;

pub use factory::{build_embedder, get_default_embedder, use_fake_embeddings};
pub use hash::HashEmbedder;
pub use model::CandleEmbedder;
pub use pool::masked_mean_l2;
pub use timeout::TimeoutEmbedder;
