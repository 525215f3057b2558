//! ragstore-hybrid
//!
//! Hybrid retrieval over a Document Store: embedding, keyword and blended
//! ranking ([`Retriever`]) behind a client facade ([`RetrievalClient`]) that
//! wires store, provider and tokenizer from configuration.

pub mod backend;
pub mod client;
pub mod context;
pub mod retriever;

pub use backend::open_store;
pub use client::RetrievalClient;
pub use context::format_context;
pub use retriever::{Retriever, SearchRequest};
