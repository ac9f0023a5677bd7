//! AI provider contract (spec §6): the single seam through which this crate
//! consumes a chat-completion + embedding backend. Concrete providers are
//! external collaborators; this crate ships a [`MockAiProvider`] for tests
//! and an optional [`openai::OpenAiProvider`] behind the `openai-provider` feature.

#[cfg(feature = "openai-provider")]
pub mod openai;

use crate::error::{AiProviderError, Result};
use async_trait::async_trait;

/// Chat-completion + embedding backend used by the intent analyzer, SQL
/// generator, and answer synthesizer.
///
/// Implementations must be `Send + Sync`: the router calls them
/// concurrently across intent analysis and document search (spec §4.8).
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Generates a single text completion for `prompt`.
    ///
    /// # Errors
    ///
    /// Returns [`AiProviderError::Transient`] for retryable failures
    /// (timeout, rate limit) or [`AiProviderError::Permanent`] otherwise.
    async fn generate_response(&self, system_prompt: &str, prompt: &str) -> Result<String>;

    /// Generates an embedding vector for a single text.
    ///
    /// # Errors
    ///
    /// See [`Self::generate_response`].
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>>;

    /// Generates embedding vectors for a batch of texts.
    ///
    /// The default implementation calls [`Self::generate_embedding`] for
    /// each text sequentially. Providers with a native batch endpoint
    /// should override this.
    ///
    /// # Errors
    ///
    /// See [`Self::generate_response`].
    async fn generate_embeddings_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.generate_embedding(text).await?);
        }
        Ok(out)
    }
}

/// A deterministic, in-process [`AiProvider`] used in tests and the
/// development harness when no external provider is configured.
///
/// Responses are looked up from a fixed table of `(needle, response)`
/// pairs matched by substring against the prompt; the first match wins.
/// If nothing matches, a canned fallback response is returned rather than
/// an error, so callers exercising the happy path never need network access.
#[derive(Debug, Clone, Default)]
pub struct MockAiProvider {
    responses: Vec<(String, String)>,
    embedding_dim: usize,
}

impl MockAiProvider {
    /// Creates a mock provider with the given embedding dimension and no canned responses.
    #[must_use]
    pub fn new(embedding_dim: usize) -> Self {
        Self {
            responses: Vec::new(),
            embedding_dim,
        }
    }

    /// Registers a canned response returned when `needle` appears in the prompt.
    #[must_use]
    pub fn with_response(mut self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.responses.push((needle.into(), response.into()));
        self
    }

    /// Produces a small deterministic pseudo-embedding from a text's byte sum,
    /// so semantically-similar mock inputs in tests can be made to differ predictably.
    fn hash_embedding(&self, text: &str) -> Vec<f32> {
        let seed: u32 = text.bytes().fold(0u32, |acc, b| acc.wrapping_add(u32::from(b)));
        (0..self.embedding_dim)
            .map(|i| {
                let v = (seed.wrapping_add(i as u32) % 997) as f32 / 997.0;
                v * 2.0 - 1.0
            })
            .collect()
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn generate_response(&self, _system_prompt: &str, prompt: &str) -> Result<String> {
        for (needle, response) in &self.responses {
            if prompt.contains(needle.as_str()) {
                return Ok(response.clone());
            }
        }
        Err(AiProviderError::Permanent(format!(
            "MockAiProvider has no canned response matching prompt: {prompt}"
        ))
        .into())
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.hash_embedding(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_returns_registered_response() {
        let provider = MockAiProvider::new(8).with_response("capital of France", "Paris");
        let response = provider
            .generate_response("system", "What is the capital of France?")
            .await
            .unwrap();
        assert_eq!(response, "Paris");
    }

    #[tokio::test]
    async fn mock_provider_errors_on_unmatched_prompt() {
        let provider = MockAiProvider::new(8);
        let result = provider.generate_response("system", "anything").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn mock_provider_embedding_has_configured_dimension() {
        let provider = MockAiProvider::new(16);
        let embedding = provider.generate_embedding("hello").await.unwrap();
        assert_eq!(embedding.len(), 16);
    }

    #[tokio::test]
    async fn mock_provider_embedding_is_deterministic() {
        let provider = MockAiProvider::new(16);
        let a = provider.generate_embedding("hello").await.unwrap();
        let b = provider.generate_embedding("hello").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn batch_default_impl_calls_single_for_each_text() {
        let provider = MockAiProvider::new(8);
        let texts = vec!["a".to_string(), "b".to_string()];
        let embeddings = provider.generate_embeddings_batch(&texts).await.unwrap();
        assert_eq!(embeddings.len(), 2);
    }
}
