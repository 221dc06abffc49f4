//! Embedding service client for generating passage vectors.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::EmbeddingError;
use crate::models::EmbeddingConfig;
use crate::utils::retry::{RetryConfig, with_retry};

/// Turns an ordered batch of texts into vectors in the same order.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Fixed dimensionality of returned vectors.
    fn dimension(&self) -> usize;
}

/// Request body for the OpenAI-compatible `/embeddings` endpoint.
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Client for an OpenAI-compatible embedding server.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
    retry: RetryConfig,
}

impl EmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            dimension: config.dimension as usize,
            retry: RetryConfig::new(config.max_retries),
        })
    }

    /// List the models served by the endpoint.
    pub async fn health_check(&self) -> Result<Vec<String>, EmbeddingError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EmbeddingError::ServerError(format!(
                "health check failed with status: {}",
                response.status()
            )));
        }

        // Some servers answer with an empty body.
        let text = response.text().await.unwrap_or_default();
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let models: ModelList = serde_json::from_str(&text)
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn embed_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .authorized(self.client.post(&url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout
                } else if e.is_connect() {
                    EmbeddingError::ConnectionError(e.to_string())
                } else {
                    EmbeddingError::RequestError(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ServerError(format!(
                "status {}: {}",
                status, body
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        order_vectors(body.data, texts.len(), self.dimension)
    }
}

/// Put vectors back in request order and check their shape.
fn order_vectors(
    mut data: Vec<EmbeddingData>,
    expected: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if data.len() != expected {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }

    data.sort_unstable_by_key(|d| d.index);
    let mut vectors = Vec::with_capacity(expected);
    for (position, item) in data.into_iter().enumerate() {
        if item.index != position {
            return Err(EmbeddingError::InvalidResponse(format!(
                "missing embedding for input {}",
                position
            )));
        }
        if item.embedding.len() != dimension {
            return Err(EmbeddingError::InvalidResponse(format!(
                "embedding {} has dimension {}, expected {}",
                position,
                item.embedding.len(),
                dimension
            )));
        }
        vectors.push(item.embedding);
    }
    Ok(vectors)
}

#[async_trait]
impl EmbeddingService for EmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = texts.len(), "requesting embeddings");
        with_retry(&self.retry, || self.embed_once(texts))
            .await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(index: usize, embedding: Vec<f32>) -> EmbeddingData {
        EmbeddingData { index, embedding }
    }

    #[test]
    fn test_client_creation() {
        let client = EmbeddingClient::new(&EmbeddingConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_base_url_trimming() {
        let config = EmbeddingConfig {
            url: "http://localhost:8000/v1/".to_string(),
            ..Default::default()
        };
        let client = EmbeddingClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000/v1");
        assert_eq!(client.dimension(), 1024);
    }

    #[test]
    fn test_vectors_reordered_by_index() {
        let data = vec![item(1, vec![1.0, 1.0]), item(0, vec![0.0, 0.0])];
        let vectors = order_vectors(data, 2, 2).unwrap();
        assert_eq!(vectors, vec![vec![0.0, 0.0], vec![1.0, 1.0]]);
    }

    #[test]
    fn test_response_shape_is_validated() {
        assert!(matches!(
            order_vectors(vec![item(0, vec![0.0])], 2, 1),
            Err(EmbeddingError::InvalidResponse(_))
        ));
        assert!(matches!(
            order_vectors(vec![item(0, vec![0.0]), item(0, vec![0.0])], 2, 1),
            Err(EmbeddingError::InvalidResponse(_))
        ));
        assert!(matches!(
            order_vectors(vec![item(0, vec![0.0, 1.0, 2.0])], 1, 2),
            Err(EmbeddingError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.5,0.25]}],"model":"m"}"#;
        let body: EmbedResponse = serde_json::from_str(json).unwrap();
        assert_eq!(order_vectors(body.data, 1, 2).unwrap(), vec![vec![0.5, 0.25]]);
    }
}
