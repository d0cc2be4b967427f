//! Local on-disk vector index.
//!
//! Build: read a merged NDJSON artifact, chunk each record's serialized
//! text, embed all chunks, persist texts + embeddings + per-chunk metadata.
//! Query: embed the question and rank stored chunks by cosine similarity.
//!
//! Layout inside the index directory:
//!   texts.json      — Vec<String>, chunk texts
//!   embeddings.bin  — u32 LE dims header, then dims × n f32 LE values
//!   metadata.json   — Vec<Value>, one object per chunk (source tag etc.)

use serde_json::Value;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{info, instrument};

use biofuse_common::record::read_ndjson;
use biofuse_common::{BiofuseError, Result};

use crate::chunk::{chunk_text, ChunkerConfig};
use crate::embedder::{bytes_to_vec, cosine_similarity, vec_to_bytes, Embedder};

const TEXTS_FILE: &str = "texts.json";
const EMBEDDINGS_FILE: &str = "embeddings.bin";
const METADATA_FILE: &str = "metadata.json";

/// One query hit: chunk text, cosine score, chunk metadata.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub text: String,
    pub score: f32,
    pub metadata: Value,
}

pub struct LocalIndex {
    texts: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    metadata: Vec<Value>,
    dims: usize,
}

impl LocalIndex {
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Build an index from a merged NDJSON artifact and persist it to `dir`.
    #[instrument(skip(embedder), fields(input = %input.display()))]
    pub async fn build(input: &Path, embedder: &dyn Embedder, dir: &Path) -> Result<Self> {
        let records = read_ndjson(input)?;

        let config = ChunkerConfig::default();
        let mut texts = Vec::new();
        let mut metadata = Vec::new();
        for record in &records {
            let meta = serde_json::json!({ "source": record.source().unwrap_or("unknown") });
            let combined = record.to_line()?;
            for chunk in chunk_text(&combined, &config) {
                texts.push(chunk);
                metadata.push(meta.clone());
            }
        }

        info!(records = records.len(), chunks = texts.len(), "Embedding index chunks");
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.embed(&texts).await?
        };

        let index = Self { texts, embeddings, metadata, dims: embedder.dims() };
        index.save(dir)?;
        Ok(index)
    }

    fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        let texts_json = serde_json::to_string(&self.texts)?;
        std::fs::write(dir.join(TEXTS_FILE), texts_json)?;

        let meta_json = serde_json::to_string(&self.metadata)?;
        std::fs::write(dir.join(METADATA_FILE), meta_json)?;

        let mut file = std::fs::File::create(dir.join(EMBEDDINGS_FILE))?;
        file.write_all(&(self.dims as u32).to_le_bytes())?;
        for vector in &self.embeddings {
            file.write_all(&vec_to_bytes(vector))?;
        }
        file.flush()?;

        info!(dir = %dir.display(), chunks = self.texts.len(), "Index saved");
        Ok(())
    }

    /// Load a previously built index from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let texts: Vec<String> =
            serde_json::from_str(&std::fs::read_to_string(dir.join(TEXTS_FILE))?)?;
        let metadata: Vec<Value> =
            serde_json::from_str(&std::fs::read_to_string(dir.join(METADATA_FILE))?)?;

        let mut file = std::fs::File::open(dir.join(EMBEDDINGS_FILE))?;
        let mut header = [0u8; 4];
        file.read_exact(&mut header)?;
        let dims = u32::from_le_bytes(header) as usize;
        if dims == 0 {
            return Err(BiofuseError::Index("embeddings file has zero dims".to_string()));
        }

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let flat = bytes_to_vec(&bytes);
        if flat.len() != texts.len() * dims {
            return Err(BiofuseError::Index(format!(
                "embeddings size mismatch: {} values for {} texts × {} dims",
                flat.len(),
                texts.len(),
                dims
            )));
        }
        let embeddings: Vec<Vec<f32>> = flat.chunks(dims).map(|c| c.to_vec()).collect();

        Ok(Self { texts, embeddings, metadata, dims })
    }

    /// Rank stored chunks against a question, best first.
    pub async fn query(
        &self,
        embedder: &dyn Embedder,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let query_vecs = embedder.embed(&[question.to_string()]).await?;
        let query_vec = query_vecs
            .first()
            .ok_or_else(|| BiofuseError::Index("embedder returned no vector".to_string()))?;

        let mut hits: Vec<SearchHit> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, emb)| SearchHit {
                text: self.texts[i].clone(),
                score: cosine_similarity(query_vec, emb),
                metadata: self.metadata[i].clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Deterministic toy embedder: counts a few marker words.
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn dims(&self) -> usize {
            3
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let lower = t.to_lowercase();
                    vec![
                        lower.matches("variant").count() as f32,
                        lower.matches("trial").count() as f32,
                        lower.matches("indicator").count() as f32,
                    ]
                })
                .collect())
        }
    }

    fn write_artifact(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("fusion_medical.jsonl");
        std::fs::write(
            &path,
            concat!(
                "{\"source\":\"clinvar\",\"text\":\"pathogenic variant in BRCA1\"}\n",
                "{\"source\":\"clinicaltrials\",\"text\":\"phase 2 trial of olaparib\"}\n",
            ),
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn test_build_load_query_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = write_artifact(dir.path());
        let index_dir = dir.path().join("index");

        let built = LocalIndex::build(&artifact, &KeywordEmbedder, &index_dir).await.unwrap();
        assert_eq!(built.len(), 2);

        let loaded = LocalIndex::load(&index_dir).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.dims(), 3);

        let hits = loaded.query(&KeywordEmbedder, "variant significance", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].text.contains("variant"));
        assert_eq!(hits[0].metadata["source"], "clinvar");
    }

    #[tokio::test]
    async fn test_query_orders_by_score_desc() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = write_artifact(dir.path());
        let index_dir = dir.path().join("index");

        let index = LocalIndex::build(&artifact, &KeywordEmbedder, &index_dir).await.unwrap();
        let hits = index.query(&KeywordEmbedder, "clinical trial", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
        assert!(hits[0].text.contains("trial"));
    }

    #[tokio::test]
    async fn test_build_empty_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("empty.jsonl");
        std::fs::write(&artifact, "").unwrap();
        let index_dir = dir.path().join("index");

        let index = LocalIndex::build(&artifact, &KeywordEmbedder, &index_dir).await.unwrap();
        assert!(index.is_empty());
        let hits = index.query(&KeywordEmbedder, "anything", 3).await.unwrap();
        assert!(hits.is_empty());
    }
}
