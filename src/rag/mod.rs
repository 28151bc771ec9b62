//! Retrieval-augmented generation support: similarity retrieval and context formatting.

mod retriever;

pub use retriever::{format_chunks_as_context, RetrieveOptions, Retriever};
