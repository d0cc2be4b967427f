//! biofuse-index — pluggable vector index over merged fusion artifacts.
//! - Embedder trait (fastembed implementation behind a feature)
//! - Word-window chunking
//! - Local on-disk cosine index: build / load / query
//! - VectorBackend trait consumed by the pipeline's indexing trigger

pub mod backend;
pub mod chunk;
pub mod embedder;
pub mod local;

pub use backend::{resolve_backend, VectorBackend};
pub use embedder::Embedder;
pub use local::LocalIndex;
