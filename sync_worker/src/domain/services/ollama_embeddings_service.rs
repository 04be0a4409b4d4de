use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use common::domain::entities::record_point::Embeddings;
use common::ports::{EmbeddingsService, EmbeddingsServiceError};

/// Client to an Ollama-compatible embedding inference server
pub struct OllamaEmbeddingsService {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Embeddings>,
}

impl OllamaEmbeddingsService {
    pub fn try_new(
        base_url: &str,
        model: String,
        timeout: Duration,
    ) -> Result<Self, EmbeddingsServiceError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

#[async_trait]
impl EmbeddingsService for OllamaEmbeddingsService {
    #[tracing::instrument(name = "Embedding text", skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Embeddings, EmbeddingsServiceError> {
        let response = self
            .http_client
            .post(format!("{}/api/embed", self.base_url))
            .json(&EmbedRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await?
            .error_for_status()?
            .json::<EmbedResponse>()
            .await?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| {
                EmbeddingsServiceError::UnexpectedResponse(
                    "the response contained no embedding".to_string(),
                )
            })
    }
}
