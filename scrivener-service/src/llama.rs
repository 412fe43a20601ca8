//! llama-server API client.
//!
//! Two capabilities are used by the service: synchronous prompt completion
//! (`/completion`) and text embedding (`/embedding`). The embedding side
//! tolerates the several response shapes llama-server emits (single vector,
//! per-token matrix, list-wrapped) and mean-pools everything down to one
//! vector of the configured hidden size.

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::LlamaConfig;
use crate::error::{InferenceError, ServiceError, ServiceResult};
use crate::service::InferenceApi;

/// Sampling seed pinned for reproducible answers across identical uploads.
const COMPLETION_SEED: u64 = 12345;

pub struct LlamaClient {
    client: Client,
    config: LlamaConfig,
}

impl LlamaClient {
    pub fn new(config: LlamaConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                ServiceError::Inference(InferenceError::Connection {
                    url: config.base_url(),
                    source: e,
                })
            })?;

        Ok(Self { client, config })
    }

    /// Check if llama-server is reachable
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.config.base_url());
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!(error = %e, "llama-server health check failed");
                false
            }
        }
    }

    /// Submit a prompt and wait for the full generated answer
    pub async fn completion(&self, prompt: &str, temperature: f32) -> ServiceResult<String> {
        let url = format!("{}/completion", self.config.base_url());

        let request = CompletionRequest {
            prompt,
            n_predict: self.config.n_predict,
            temperature,
            seed: COMPLETION_SEED,
            top_k: 40,
            top_p: 0.9,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| InferenceError::Connection {
                url: url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ServiceError::Inference(InferenceError::Generation {
                status,
                message,
            }));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse {
                message: e.to_string(),
            })?;

        // llama-server builds differ on the field name
        let generated = body
            .get("completion")
            .or_else(|| body.get("content"))
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        generated.ok_or_else(|| {
            ServiceError::Inference(InferenceError::InvalidResponse {
                message: "response missing generated text".to_string(),
            })
        })
    }

    /// Request an embedding vector for the given text.
    ///
    /// Over-long inputs are split into character chunks which are embedded
    /// separately and aggregated by elementwise mean.
    pub async fn embedding(&self, text: &str) -> ServiceResult<Vec<f32>> {
        let max_chunk = self.config.max_embedding_input_chars;

        if text.chars().count() <= max_chunk {
            return self.embed_chunk(text).await;
        }

        let chunks = split_chunks(text, max_chunk);
        debug!(
            chunks = chunks.len(),
            "Input exceeds embedding limit; splitting into chunks"
        );

        let mut vectors = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            vectors.push(self.embed_chunk(chunk).await?);
        }

        mean_of_vectors(&vectors).map_err(ServiceError::from)
    }

    async fn embed_chunk(&self, chunk: &str) -> ServiceResult<Vec<f32>> {
        let url = format!("{}/embedding", self.config.base_url());

        let request = EmbeddingRequest {
            input: chunk,
            pooling: "mean",
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| InferenceError::Connection {
                url: url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ServiceError::Inference(InferenceError::Generation {
                status,
                message,
            }));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse {
                message: e.to_string(),
            })?;

        let matrix = extract_embedding_values(&body).ok_or_else(|| {
            ServiceError::Inference(InferenceError::InvalidResponse {
                message: "no embedding found in response".to_string(),
            })
        })?;

        pool_to_hidden_size(matrix, self.config.embedding_hidden_size).map_err(ServiceError::from)
    }
}

impl InferenceApi for LlamaClient {
    async fn complete(&self, prompt: &str, temperature: f32) -> ServiceResult<String> {
        self.completion(prompt, temperature).await
    }

    async fn embed(&self, text: &str) -> ServiceResult<Vec<f32>> {
        self.embedding(text).await
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    n_predict: u32,
    temperature: f32,
    seed: u64,
    top_k: u32,
    top_p: f64,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    pooling: &'a str,
}

/// Pull the flat list of floats out of an embedding response.
///
/// Accepts `{"embedding": [...]}`, `{"vector": [...]}`, the same wrapped in
/// a single-element list, and nested per-token matrices (flattened).
fn extract_embedding_values(body: &Value) -> Option<Vec<f32>> {
    let container = match body {
        Value::Array(items) => items.first()?,
        other => other,
    };

    let matrix = container
        .get("embedding")
        .or_else(|| container.get("vector"))?;

    let rows = matrix.as_array()?;
    if rows.is_empty() {
        return None;
    }

    let mut values = Vec::new();
    if rows[0].is_array() {
        for row in rows {
            for v in row.as_array()? {
                values.push(v.as_f64()? as f32);
            }
        }
    } else {
        for v in rows {
            values.push(v.as_f64()? as f32);
        }
    }

    (!values.is_empty()).then_some(values)
}

/// Reduce a flat embedding matrix to one vector of `hidden_size` floats.
///
/// A trailing partial row is truncated with a warning; multiple rows are
/// mean-pooled elementwise; fewer values than one row is an error.
fn pool_to_hidden_size(mut values: Vec<f32>, hidden_size: usize) -> Result<Vec<f32>, InferenceError> {
    if hidden_size == 0 {
        return Err(InferenceError::DimensionMismatch {
            got: values.len(),
            expected: 0,
        });
    }

    let remainder = values.len() % hidden_size;
    if remainder != 0 && values.len() > hidden_size {
        warn!(
            len = values.len(),
            hidden_size, "Embedding length is not a multiple of hidden size; truncating remainder"
        );
        values.truncate(values.len() - remainder);
    }

    if values.len() == hidden_size {
        return Ok(values);
    }

    if values.len() < hidden_size {
        return Err(InferenceError::DimensionMismatch {
            got: values.len(),
            expected: hidden_size,
        });
    }

    let num_rows = values.len() / hidden_size;
    let mut pooled = vec![0.0f32; hidden_size];
    for row in values.chunks_exact(hidden_size) {
        for (acc, v) in pooled.iter_mut().zip(row) {
            *acc += v;
        }
    }
    for acc in &mut pooled {
        *acc /= num_rows as f32;
    }
    Ok(pooled)
}

/// Split text into chunks of at most `max_chars` characters, on character
/// boundaries.
fn split_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;

    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == max_chars {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Elementwise mean of equal-length vectors.
fn mean_of_vectors(vectors: &[Vec<f32>]) -> Result<Vec<f32>, InferenceError> {
    let Some(first) = vectors.first() else {
        return Err(InferenceError::InvalidResponse {
            message: "no embedding chunks produced".to_string(),
        });
    };

    let len = first.len();
    if let Some(odd) = vectors.iter().find(|v| v.len() != len) {
        return Err(InferenceError::DimensionMismatch {
            got: odd.len(),
            expected: len,
        });
    }

    let mut mean = vec![0.0f32; len];
    for vector in vectors {
        for (acc, v) in mean.iter_mut().zip(vector) {
            *acc += v;
        }
    }
    for acc in &mut mean {
        *acc /= vectors.len() as f32;
    }
    Ok(mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_flat_embedding() {
        let body = json!({"embedding": [1.0, 2.0, 3.0]});
        assert_eq!(extract_embedding_values(&body), Some(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn extract_vector_field_and_list_wrapper() {
        let body = json!([{"vector": [0.5, 0.25]}]);
        assert_eq!(extract_embedding_values(&body), Some(vec![0.5, 0.25]));
    }

    #[test]
    fn extract_flattens_per_token_matrix() {
        let body = json!({"embedding": [[1.0, 2.0], [3.0, 4.0]]});
        assert_eq!(
            extract_embedding_values(&body),
            Some(vec![1.0, 2.0, 3.0, 4.0])
        );
    }

    #[test]
    fn extract_rejects_missing_or_empty() {
        assert_eq!(extract_embedding_values(&json!({"other": 1})), None);
        assert_eq!(extract_embedding_values(&json!({"embedding": []})), None);
        assert_eq!(extract_embedding_values(&json!([])), None);
    }

    #[test]
    fn pool_passes_through_exact_vector() {
        let pooled = pool_to_hidden_size(vec![1.0, 2.0, 3.0], 3).unwrap();
        assert_eq!(pooled, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn pool_means_per_token_rows() {
        let pooled = pool_to_hidden_size(vec![1.0, 2.0, 3.0, 4.0], 2).unwrap();
        assert_eq!(pooled, vec![2.0, 3.0]);
    }

    #[test]
    fn pool_truncates_partial_trailing_row() {
        // Two full rows of 2 plus one stray value
        let pooled = pool_to_hidden_size(vec![1.0, 2.0, 3.0, 4.0, 9.0], 2).unwrap();
        assert_eq!(pooled, vec![2.0, 3.0]);
    }

    #[test]
    fn pool_rejects_short_vector() {
        let result = pool_to_hidden_size(vec![1.0, 2.0], 4);
        assert!(matches!(
            result,
            Err(InferenceError::DimensionMismatch {
                got: 2,
                expected: 4
            })
        ));
    }

    #[test]
    fn pool_rejects_zero_hidden_size() {
        let result = pool_to_hidden_size(vec![1.0, 2.0], 0);
        assert!(matches!(
            result,
            Err(InferenceError::DimensionMismatch {
                got: 2,
                expected: 0
            })
        ));
    }

    #[test]
    fn chunk_splitting_respects_char_boundaries() {
        let chunks = split_chunks("héllo wörld", 4);
        assert_eq!(chunks, vec!["héll", "o wö", "rld"]);
        assert_eq!(chunks.concat(), "héllo wörld");
    }

    #[test]
    fn chunk_splitting_short_input_is_single_chunk() {
        assert_eq!(split_chunks("abc", 10), vec!["abc"]);
    }

    #[test]
    fn mean_of_chunk_embeddings() {
        let mean = mean_of_vectors(&[vec![1.0, 3.0], vec![3.0, 5.0]]).unwrap();
        assert_eq!(mean, vec![2.0, 4.0]);
    }

    #[test]
    fn mean_rejects_mismatched_lengths() {
        let result = mean_of_vectors(&[vec![1.0, 2.0], vec![1.0]]);
        assert!(matches!(
            result,
            Err(InferenceError::DimensionMismatch { .. })
        ));
    }
}
