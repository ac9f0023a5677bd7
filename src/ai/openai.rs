//! `async-openai`-backed [`AiProvider`] (feature `openai-provider`).

use super::AiProvider;
use crate::error::{AiProviderError, Result};
use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, CreateEmbeddingRequestArgs,
};
use async_trait::async_trait;

/// An [`AiProvider`] backed by the OpenAI chat completion and embedding APIs.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    chat_model: String,
    embedding_model: String,
}

impl OpenAiProvider {
    /// Creates a provider using the default client configuration (reads
    /// `OPENAI_API_KEY` from the environment).
    #[must_use]
    pub fn new(chat_model: impl Into<String>, embedding_model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            chat_model: chat_model.into(),
            embedding_model: embedding_model.into(),
        }
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    async fn generate_response(&self, system_prompt: &str, prompt: &str) -> Result<String> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()
            .map_err(|e| AiProviderError::MalformedResponse(e.to_string()))?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| AiProviderError::MalformedResponse(e.to_string()))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.chat_model)
            .messages(vec![system.into(), user.into()])
            .build()
            .map_err(|e| AiProviderError::MalformedResponse(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| AiProviderError::Transient(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AiProviderError::MalformedResponse("empty choices list".to_string()).into())
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.embedding_model)
            .input(text)
            .build()
            .map_err(|e| AiProviderError::MalformedResponse(e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| AiProviderError::Transient(e.to_string()))?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| AiProviderError::MalformedResponse("empty embedding data".to_string()).into())
    }
}
