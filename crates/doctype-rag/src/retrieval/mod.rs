//! Retrieval: similarity search over embedded chunks

pub mod index;

pub use index::{cosine_similarity, FlatIndex, SearchResult};
