//! Embedding provider trait and vector helpers.
//!
//! The fusion pipeline treats embedding as a black-box capability: anything
//! that maps a batch of texts to fixed-dimension float vectors can back the
//! index. The shipped implementation uses fastembed, gated behind the
//! `fastembed-backend` feature so the core builds without ONNX runtime
//! downloads.

use async_trait::async_trait;

use biofuse_common::Result;

/// Batch text-to-vector capability.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embedding dimensionality.
    fn dims(&self) -> usize;

    /// Embed a batch of texts. Returns one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Encode a float vector as little-endian f32 bytes.
pub fn vec_to_bytes(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes back into a float vector.
pub fn bytes_to_vec(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity in [-1, 1]; 0.0 for empty or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

#[cfg(feature = "fastembed-backend")]
pub use fastembed_impl::FastEmbedder;

#[cfg(feature = "fastembed-backend")]
mod fastembed_impl {
    use super::*;
    use biofuse_common::BiofuseError;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::Mutex;

    /// fastembed-backed embedder (all-MiniLM-L6-v2, 384 dims).
    pub struct FastEmbedder {
        model: Mutex<TextEmbedding>,
        dims: usize,
    }

    impl FastEmbedder {
        pub fn new() -> Result<Self> {
            let model = TextEmbedding::try_new(
                InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false),
            )
            .map_err(|e| BiofuseError::Index(format!("fastembed init: {e}")))?;
            Ok(Self { model: Mutex::new(model), dims: 384 })
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedder {
        fn dims(&self) -> usize {
            self.dims
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let docs: Vec<String> = texts.to_vec();
            let mut model = self
                .model
                .lock()
                .map_err(|_| BiofuseError::Index("embedder lock poisoned".to_string()))?;
            model
                .embed(docs, None)
                .map_err(|e| BiofuseError::Index(format!("fastembed embed: {e}")))
        }
    }
}
