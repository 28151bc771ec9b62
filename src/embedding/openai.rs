//! OpenAI embeddings implementation.

use super::Embedder;
use crate::config::EmbeddingSettings;
use crate::error::{AcervoError, Result};
use crate::openai::{api_key_from_env, create_client, require_api_key};
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Maximum inputs per provider call.
pub const EMBEDDING_BATCH_SIZE: usize = 100;

/// OpenAI-based embedder.
pub struct OpenAIEmbedder {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    /// Create an embedder. Fails when no API key is given.
    pub fn new(api_key: Option<String>, model: &str, dimensions: usize) -> Result<Self> {
        Self::build(api_key, None, model, dimensions)
    }

    /// Create an embedder from settings and `OPENAI_API_KEY`.
    pub fn from_env(settings: &EmbeddingSettings) -> Result<Self> {
        Self::new(api_key_from_env(), &settings.model, settings.dimensions as usize)
    }

    /// Create an embedder against a custom API base URL.
    pub fn with_api_base(api_key: Option<String>, api_base: &str, model: &str, dimensions: usize) -> Result<Self> {
        Self::build(api_key, Some(api_base), model, dimensions)
    }

    fn build(api_key: Option<String>, api_base: Option<&str>, model: &str, dimensions: usize) -> Result<Self> {
        let api_key = require_api_key(api_key)?;
        Ok(Self {
            client: create_client(&api_key, api_base)?,
            model: model.to_string(),
            dimensions,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| AcervoError::Embedding("Empty embedding response".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(EMBEDDING_BATCH_SIZE) {
            let request = CreateEmbeddingRequestArgs::default()
                .model(&self.model)
                .input(EmbeddingInput::StringArray(chunk.to_vec()))
                .dimensions(self.dimensions as u32)
                .build()
                .map_err(|e| AcervoError::Embedding(format!("Failed to build request: {}", e)))?;

            let response = self.client.embeddings().create(request).await.map_err(|e| {
                AcervoError::ProviderUnavailable(format!("Embedding API error: {}", e))
            })?;

            if response.data.len() != chunk.len() {
                return Err(AcervoError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    chunk.len(),
                    response.data.len()
                )));
            }

            // Provider order is not guaranteed; index is.
            let mut embeddings = response.data;
            embeddings.sort_by_key(|e| e.index);
            all_embeddings.extend(embeddings.into_iter().map(|e| e.embedding));
        }

        debug!("Generated {} embeddings", all_embeddings.len());
        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    /// Echoes one embedding per input, in reverse index order. Each vector
    /// encodes the input's length so order can be checked.
    struct EchoEmbeddings;

    impl Respond for EchoEmbeddings {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let body: Value = serde_json::from_slice(&request.body).unwrap();
            let inputs = body["input"].as_array().cloned().unwrap_or_default();
            let data: Vec<Value> = inputs
                .iter()
                .enumerate()
                .rev()
                .map(|(index, input)| {
                    let len = input.as_str().unwrap_or_default().len() as f32;
                    json!({"object": "embedding", "index": index, "embedding": [len, 0.5]})
                })
                .collect();

            ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": data,
                "model": "text-embedding-3-small",
                "usage": {"prompt_tokens": 1, "total_tokens": 1}
            }))
        }
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let result = OpenAIEmbedder::new(None, "text-embedding-3-small", 1536);
        assert!(matches!(result, Err(AcervoError::Config(_))));
    }

    #[test]
    fn test_embedder_creation() {
        let embedder = OpenAIEmbedder::new(Some("sk-test".to_string()), "text-embedding-3-large", 3072).unwrap();
        assert_eq!(embedder.dimensions(), 3072);
        assert_eq!(embedder.model(), "text-embedding-3-large");
    }

    #[tokio::test]
    async fn test_embed_batch_splits_and_preserves_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(EchoEmbeddings)
            .expect(2)
            .mount(&server)
            .await;

        let embedder = OpenAIEmbedder::with_api_base(
            Some("sk-test".to_string()),
            &server.uri(),
            "text-embedding-3-small",
            2,
        )
        .unwrap();

        let texts: Vec<String> = (1..=150).map(|n| "x".repeat(n)).collect();
        let embeddings = embedder.embed_batch(&texts).await.unwrap();

        assert_eq!(embeddings.len(), 150);
        for (i, embedding) in embeddings.iter().enumerate() {
            assert_eq!(embedding[0], (i + 1) as f32);
        }
    }

    #[tokio::test]
    async fn test_embed_empty_batch_makes_no_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(EchoEmbeddings)
            .expect(0)
            .mount(&server)
            .await;

        let embedder =
            OpenAIEmbedder::with_api_base(Some("sk-test".to_string()), &server.uri(), "m", 2).unwrap();
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
    }
}
