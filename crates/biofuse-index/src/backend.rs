//! Backend seam between the fusion pipeline and the index machinery.
//!
//! The pipeline only ever sees `VectorBackend`; which implementation sits
//! behind it is decided once, at startup, from the `--backend` selector.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use biofuse_common::{BiofuseError, Result};

use crate::embedder::Embedder;
use crate::local::LocalIndex;

#[async_trait]
pub trait VectorBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Ingest a merged NDJSON artifact into the backing index.
    async fn build_index(&self, input: &Path) -> Result<()>;
}

/// Embeds chunks in-process and persists the index to a local directory.
pub struct LocalBackend {
    index_dir: PathBuf,
    embedder: Arc<dyn Embedder>,
}

impl LocalBackend {
    pub fn new(index_dir: PathBuf, embedder: Arc<dyn Embedder>) -> Self {
        Self { index_dir, embedder }
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }
}

#[async_trait]
impl VectorBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn build_index(&self, input: &Path) -> Result<()> {
        let index = LocalIndex::build(input, self.embedder.as_ref(), &self.index_dir).await?;
        info!(
            backend = self.name(),
            dir = %self.index_dir.display(),
            chunks = index.len(),
            "Index build complete"
        );
        Ok(())
    }
}

/// Resolve a backend selector to a concrete implementation.
///
/// Only `local` is wired up; remote vector stores are rejected here rather
/// than failing half-way through a run.
pub fn resolve_backend(name: &str, index_dir: &Path) -> Result<Arc<dyn VectorBackend>> {
    match name {
        "local" => {
            let embedder = default_embedder()?;
            Ok(Arc::new(LocalBackend::new(index_dir.to_path_buf(), embedder)))
        }
        "pinecone" | "weaviate" => Err(BiofuseError::Config(format!(
            "vector backend '{name}' is not supported in this build"
        ))),
        other => Err(BiofuseError::Config(format!("unknown vector backend '{other}'"))),
    }
}

#[cfg(feature = "fastembed-backend")]
fn default_embedder() -> Result<Arc<dyn Embedder>> {
    Ok(Arc::new(crate::embedder::FastEmbedder::new()?))
}

#[cfg(not(feature = "fastembed-backend"))]
fn default_embedder() -> Result<Arc<dyn Embedder>> {
    Err(BiofuseError::Config(
        "local backend requires the fastembed-backend feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_rejects_remote_backends() {
        let dir = std::env::temp_dir();
        for name in ["pinecone", "weaviate"] {
            let err = resolve_backend(name, &dir).err().unwrap();
            assert!(matches!(err, BiofuseError::Config(_)));
        }
    }

    #[test]
    fn test_resolve_rejects_unknown_backend() {
        let err = resolve_backend("faiss-cloud", &std::env::temp_dir()).err().unwrap();
        assert!(err.to_string().contains("unknown vector backend"));
    }
}
