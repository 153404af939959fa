use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};

use crate::config::EmbeddingsConfig;
use crate::error::{Result, VigilError};

/// Seam for embedding generation so the indexing path can run against a
/// stub in tests. `embed_passages` is resilient: a failed batch degrades
/// to per-item embedding with one retry each, and items that still fail
/// come back as `None`. Callers decide what a missing embedding means;
/// the page pipeline treats any `None` as a failed page.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_passages(&self, texts: Vec<String>) -> Result<Vec<Option<Vec<f32>>>>;

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>>;

    fn dimensions(&self) -> usize;
}

pub struct EmbeddingProvider {
    model: Arc<Mutex<TextEmbedding>>,
    batch_size: usize,
    dimensions: usize,
}

impl EmbeddingProvider {
    pub fn new(config: &EmbeddingsConfig) -> Result<Self> {
        let embedding_model = resolve_embedding_model(&config.model);
        let model = TextEmbedding::try_new(
            InitOptions::new(embedding_model).with_show_download_progress(true),
        )
        .map_err(|e| VigilError::Embedding(e.to_string()))?;

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            batch_size: config.batch_size.clamp(1, 64),
            dimensions: config.dimensions,
        })
    }

    async fn embed_raw(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.model);
        let batch_size = self.batch_size;
        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|e| VigilError::Embedding(format!("embedding model lock poisoned: {e}")))?;
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| VigilError::Embedding(e.to_string()))
        })
        .await
        .map_err(|e| VigilError::Embedding(format!("embedding worker failed: {e}")))?
    }
}

impl Clone for EmbeddingProvider {
    fn clone(&self) -> Self {
        Self {
            model: Arc::clone(&self.model),
            batch_size: self.batch_size,
            dimensions: self.dimensions,
        }
    }
}

#[async_trait]
impl Embedder for EmbeddingProvider {
    async fn embed_passages(&self, texts: Vec<String>) -> Result<Vec<Option<Vec<f32>>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prefixed: Vec<String> = texts.iter().map(|t| format!("passage: {t}")).collect();

        match self.embed_raw(prefixed.clone()).await {
            Ok(embeddings) => Ok(embeddings.into_iter().map(Some).collect()),
            Err(batch_err) => {
                tracing::warn!(
                    error = %batch_err,
                    count = prefixed.len(),
                    "Batch embedding failed, retrying per item"
                );
                let mut results = Vec::with_capacity(prefixed.len());
                for text in prefixed {
                    let mut attempt = self.embed_raw(vec![text.clone()]).await;
                    if attempt.is_err() {
                        attempt = self.embed_raw(vec![text]).await;
                    }
                    match attempt {
                        Ok(mut single) => results.push(single.pop()),
                        Err(err) => {
                            tracing::warn!(error = %err, "Per-item embedding failed after retry");
                            results.push(None);
                        }
                    }
                }
                Ok(results)
            }
        }
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_raw(vec![format!("query: {query}")]).await?;
        embeddings
            .pop()
            .ok_or_else(|| VigilError::Embedding("no embedding generated".to_string()))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn resolve_embedding_model(model_name: &str) -> EmbeddingModel {
    match model_name {
        "BAAI/bge-small-en-v1.5" | "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
        "BAAI/bge-base-en-v1.5" | "bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
        "BAAI/bge-large-en-v1.5" | "bge-large-en-v1.5" => EmbeddingModel::BGELargeENV15,
        "all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
            EmbeddingModel::AllMiniLML6V2
        }
        "all-MiniLM-L12-v2" | "sentence-transformers/all-MiniLM-L12-v2" => {
            EmbeddingModel::AllMiniLML12V2
        }
        _ => EmbeddingModel::BGESmallENV15,
    }
}

/// Cosine similarity over raw vectors. Returns 0.0 for mismatched or
/// zero-magnitude inputs instead of NaN.
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

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.5, -0.2, 0.8];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_of_opposite_vectors_is_negative_one() {
        let sim = cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_inputs_yield_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn model_names_resolve_with_fallback() {
        assert!(matches!(
            resolve_embedding_model("bge-small-en-v1.5"),
            EmbeddingModel::BGESmallENV15
        ));
        assert!(matches!(
            resolve_embedding_model("something-unknown"),
            EmbeddingModel::BGESmallENV15
        ));
    }
}
