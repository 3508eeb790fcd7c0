//! Embeddings via an OpenAI-compatible `/v1/embeddings` endpoint.

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

use prism_common::{Error, Result};

use crate::embeddings::EmbeddingProvider;

pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dims: usize,
}

impl HttpEmbeddingProvider {
    /// Build a provider from the environment. `None` when no key is set,
    /// which disables the semantic path cleanly.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok()?;
        Some(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: "https://api.openai.com".into(),
            model: "text-embedding-3-small".into(),
            dims: 1536,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>, dims: usize) -> Self {
        self.model = model.into();
        self.dims = dims;
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: vec![text],
            })
            .send()
            .await
            .map_err(|e| Error::ExternalUnavailable(format!("embeddings: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::ExternalUnavailable(format!(
                "embeddings endpoint returned {}",
                resp.status()
            )));
        }

        let body: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| Error::ExternalUnavailable(format!("embeddings: {e}")))?;
        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::ExternalUnavailable("embeddings: empty response".into()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}
