/*!
 * Embedding-based similarity.
 *
 * Texts are embedded with an `Embedder` and compared by cosine similarity.
 * When no embedding service is configured the local `HashingEmbedder` is
 * used: feature-hashed words and character trigrams, L2-normalised.
 */

use async_trait::async_trait;
use log::{debug, warn};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{Config, TranslationProvider};
use crate::errors::{EvaluationError, ProviderError};
use crate::providers::{ollama::Ollama, openai::OpenAI, Embedder, RetryPolicy};

/// Default vector size of the hashing embedder
pub const DEFAULT_DIMENSIONS: usize = 512;

/// Cosine similarity of two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, EvaluationError> {
    if a.len() != b.len() {
        return Err(EvaluationError::Degenerate("embedding dimensions differ"));
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(EvaluationError::Degenerate("zero-length embedding"));
    }

    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

/// Embed both texts and compare them
pub async fn semantic_similarity(embedder: &dyn Embedder, a: &str, b: &str) -> Result<f32, EvaluationError> {
    if a.trim().is_empty() || b.trim().is_empty() {
        return Err(EvaluationError::Degenerate("empty text"));
    }
    let left = embedder.embed(a).await?;
    let right = embedder.embed(b).await?;
    cosine_similarity(&left, &right)
}

/// Local embedder needing no service
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed synchronously
    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
        {
            self.add_feature(&mut vector, &format!("w:{}", word), 1.0);

            let padded: Vec<char> = format!("<{}>", word).chars().collect();
            for trigram in padded.windows(3) {
                let trigram: String = trigram.iter().collect();
                self.add_feature(&mut vector, &format!("t:{}", trigram), 0.5);
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket = [0u8; 8];
        bucket.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(bucket) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign * weight;
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        Ok(self.vectorize(text))
    }
}

/// Embedder for the configured provider and embedding model
///
/// Falls back to the hashing embedder when no embedding model is set or the
/// provider has no embedding endpoint.
pub fn create_embedder(config: &Config) -> anyhow::Result<Arc<dyn Embedder>> {
    let Some(model) = config.evaluation.embedding_model.clone().filter(|m| !m.is_empty()) else {
        debug!("No embedding model configured, using the local hashing embedder");
        return Ok(Arc::new(HashingEmbedder::default()));
    };

    let translation = &config.translation;
    let policy = RetryPolicy::from_config(translation);
    let timeout = Duration::from_secs(translation.get_timeout_secs());

    let embedder: Arc<dyn Embedder> = match translation.provider {
        TranslationProvider::OpenAI | TranslationProvider::LMStudio => Arc::new(
            OpenAI::new_with_config(
                translation.get_api_key(),
                translation.get_endpoint(),
                translation.get_model(),
                policy,
                timeout,
            )
            .with_embedding_model(model),
        ),
        TranslationProvider::Ollama => Arc::new(Ollama::new_with_config(
            &translation.get_endpoint(),
            model,
            policy,
            timeout,
        )?),
        TranslationProvider::Anthropic => {
            warn!("Anthropic has no embedding endpoint, using the local hashing embedder");
            Arc::new(HashingEmbedder::default())
        }
    };

    Ok(embedder)
}
