//! Qdrant vector store client over its REST API.
//!
//! Covers the handful of operations the service needs: collection
//! management, point upsert, exact-match payload lookup by document
//! fingerprint, and nearest-neighbor search for knowledge-base queries.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::QdrantConfig;
use crate::error::{ServiceError, ServiceResult, VectorStoreError};
use crate::service::VectorIndex;

/// Payload stored alongside each document vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentPayload {
    pub fingerprint: String,
    pub extracted_text: String,
    pub filename: String,
}

/// One point as sent to the upsert endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: DocumentPayload,
}

/// One search hit: the stored payload plus its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub score: f32,
    pub payload: DocumentPayload,
}

/// Qdrant wraps every response body in `{"result": ..., "status": ..}`.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct ScrollResult {
    points: Vec<ScrollPoint>,
}

#[derive(Debug, Deserialize)]
struct ScrollPoint {
    payload: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    score: f32,
    payload: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ExistsResult {
    exists: bool,
}

pub struct QdrantStore {
    client: Client,
    config: QdrantConfig,
}

impl QdrantStore {
    pub fn new(config: QdrantConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                ServiceError::VectorStore(VectorStoreError::Connection {
                    url: config.url.clone(),
                    source: e,
                })
            })?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.url.trim_end_matches('/'))
    }

    fn connection_error(&self, url: &str, source: reqwest::Error) -> ServiceError {
        ServiceError::VectorStore(VectorStoreError::Connection {
            url: url.to_string(),
            source,
        })
    }

    async fn check_response(response: reqwest::Response) -> ServiceResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(ServiceError::VectorStore(VectorStoreError::Api {
            status,
            message,
        }))
    }

    /// List all collection names. Also serves as a connectivity probe at
    /// startup.
    pub async fn list_collections(&self) -> ServiceResult<Vec<String>> {
        let url = self.endpoint("/collections");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.connection_error(&url, e))?;
        let response = Self::check_response(response).await?;

        let body: ApiResponse<Value> =
            response
                .json()
                .await
                .map_err(|e| VectorStoreError::InvalidResponse {
                    message: e.to_string(),
                })?;

        let names = body
            .result
            .get("collections")
            .and_then(Value::as_array)
            .map(|collections| {
                collections
                    .iter()
                    .filter_map(|c| c.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(names)
    }

    pub async fn collection_exists(&self, name: &str) -> ServiceResult<bool> {
        let url = self.endpoint(&format!("/collections/{name}/exists"));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.connection_error(&url, e))?;
        let response = Self::check_response(response).await?;

        let body: ApiResponse<ExistsResult> =
            response
                .json()
                .await
                .map_err(|e| VectorStoreError::InvalidResponse {
                    message: e.to_string(),
                })?;

        Ok(body.result.exists)
    }

    pub async fn create_collection(
        &self,
        name: &str,
        vector_size: usize,
        distance: &str,
    ) -> ServiceResult<()> {
        let url = self.endpoint(&format!("/collections/{name}"));
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": normalize_distance(distance),
            }
        });

        let response = self
            .client
            .put(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.connection_error(&url, e))?;
        Self::check_response(response).await?;

        info!(collection = name, vector_size, "Created vector collection");
        Ok(())
    }

    /// Create the collection if it does not already exist.
    pub async fn ensure_collection(&self, name: &str, vector_size: usize) -> ServiceResult<()> {
        if self.collection_exists(name).await? {
            debug!(collection = name, "Collection already exists");
            return Ok(());
        }
        self.create_collection(name, vector_size, &self.config.distance_metric)
            .await
    }

    /// Upsert points, waiting for the write to be applied.
    pub async fn upsert_points(
        &self,
        collection: &str,
        points: &[EmbeddingPoint],
    ) -> ServiceResult<()> {
        let url = self.endpoint(&format!("/collections/{collection}/points?wait=true"));
        let body = json!({ "points": points });

        let response = self
            .client
            .put(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.connection_error(&url, e))?;
        Self::check_response(response).await?;

        debug!(collection, count = points.len(), "Upserted points");
        Ok(())
    }

    /// Nearest-neighbor search over stored documents.
    ///
    /// Hits without a decodable payload are skipped rather than failing the
    /// whole search.
    pub async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> ServiceResult<Vec<ScoredDocument>> {
        let url = self.endpoint(&format!("/collections/{collection}/points/search"));
        let body = search_request(vector, limit);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.connection_error(&url, e))?;
        let response = Self::check_response(response).await?;

        let body: ApiResponse<Vec<SearchHit>> =
            response
                .json()
                .await
                .map_err(|e| VectorStoreError::InvalidResponse {
                    message: e.to_string(),
                })?;

        Ok(hits_to_documents(body.result))
    }

    /// Look up a stored document by content fingerprint.
    ///
    /// Uses the scroll endpoint with an exact-match payload filter, which
    /// needs no query vector. Returns the first matching payload, or `None`
    /// when no point carries the fingerprint.
    pub async fn find_by_fingerprint(
        &self,
        collection: &str,
        fingerprint: &str,
    ) -> ServiceResult<Option<DocumentPayload>> {
        let url = self.endpoint(&format!("/collections/{collection}/points/scroll"));
        let body = scroll_request(fingerprint);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.connection_error(&url, e))?;
        let response = Self::check_response(response).await?;

        let body: ApiResponse<ScrollResult> =
            response
                .json()
                .await
                .map_err(|e| VectorStoreError::InvalidResponse {
                    message: e.to_string(),
                })?;

        let Some(point) = body.result.points.into_iter().next() else {
            return Ok(None);
        };

        let payload = point
            .payload
            .ok_or_else(|| VectorStoreError::InvalidResponse {
                message: "matched point has no payload".to_string(),
            })?;

        let payload: DocumentPayload =
            serde_json::from_value(payload).map_err(|e| VectorStoreError::InvalidResponse {
                message: format!("malformed document payload: {e}"),
            })?;

        Ok(Some(payload))
    }
}

impl VectorIndex for QdrantStore {
    async fn find_by_fingerprint(
        &self,
        collection: &str,
        fingerprint: &str,
    ) -> ServiceResult<Option<DocumentPayload>> {
        QdrantStore::find_by_fingerprint(self, collection, fingerprint).await
    }

    async fn ensure_collection(&self, collection: &str, vector_size: usize) -> ServiceResult<()> {
        QdrantStore::ensure_collection(self, collection, vector_size).await
    }

    async fn upsert_points(
        &self,
        collection: &str,
        points: &[EmbeddingPoint],
    ) -> ServiceResult<()> {
        QdrantStore::upsert_points(self, collection, points).await
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> ServiceResult<Vec<ScoredDocument>> {
        QdrantStore::search(self, collection, vector, limit).await
    }
}

fn hits_to_documents(hits: Vec<SearchHit>) -> Vec<ScoredDocument> {
    hits.into_iter()
        .filter_map(|hit| {
            let payload: DocumentPayload = serde_json::from_value(hit.payload?).ok()?;
            Some(ScoredDocument {
                score: hit.score,
                payload,
            })
        })
        .collect()
}

fn search_request(vector: &[f32], limit: usize) -> Value {
    json!({
        "vector": vector,
        "limit": limit,
        "with_payload": true,
    })
}

fn scroll_request(fingerprint: &str) -> Value {
    json!({
        "filter": {
            "must": [
                { "key": "fingerprint", "match": { "value": fingerprint } }
            ]
        },
        "limit": 1,
        "with_payload": true,
    })
}

/// Map a configured distance name onto Qdrant's canonical spelling.
fn normalize_distance(distance: &str) -> &'static str {
    match distance.to_lowercase().as_str() {
        "cosine" => "Cosine",
        "euclid" | "euclidean" => "Euclid",
        "dot" => "Dot",
        other => {
            tracing::warn!(distance = other, "Unknown distance metric; defaulting to Cosine");
            "Cosine"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_serializes_to_qdrant_shape() {
        let point = EmbeddingPoint {
            id: "2c94e2a3-94e5-4a35-b3c9-1a9a1e3f7c21".to_string(),
            vector: vec![0.1, 0.2],
            payload: DocumentPayload {
                fingerprint: "abc123".to_string(),
                extracted_text: "hello".to_string(),
                filename: "contract.pdf".to_string(),
            },
        };

        let value = serde_json::to_value(&point).unwrap();
        assert_eq!(value["id"], "2c94e2a3-94e5-4a35-b3c9-1a9a1e3f7c21");
        assert_eq!(value["vector"].as_array().unwrap().len(), 2);
        assert_eq!(value["payload"]["fingerprint"], "abc123");
        assert_eq!(value["payload"]["extracted_text"], "hello");
        assert_eq!(value["payload"]["filename"], "contract.pdf");
    }

    #[test]
    fn scroll_request_filters_on_fingerprint() {
        let body = scroll_request("deadbeef");
        assert_eq!(body["limit"], 1);
        assert_eq!(body["with_payload"], true);
        assert_eq!(
            body["filter"]["must"][0]["match"]["value"],
            "deadbeef"
        );
        assert_eq!(body["filter"]["must"][0]["key"], "fingerprint");
    }

    #[test]
    fn scroll_response_parses_payload() {
        let raw = r#"{
            "result": {
                "points": [
                    {
                        "id": "0f0f",
                        "payload": {
                            "fingerprint": "abc",
                            "extracted_text": "",
                            "filename": "scan.tiff"
                        }
                    }
                ],
                "next_page_offset": null
            },
            "status": "ok",
            "time": 0.001
        }"#;

        let parsed: ApiResponse<ScrollResult> = serde_json::from_str(raw).unwrap();
        let payload: DocumentPayload =
            serde_json::from_value(parsed.result.points[0].payload.clone().unwrap()).unwrap();
        // An empty extracted_text is a valid cached value, not a miss.
        assert_eq!(payload.extracted_text, "");
        assert_eq!(payload.filename, "scan.tiff");
    }

    #[test]
    fn search_request_carries_vector_and_limit() {
        let body = search_request(&[0.1, 0.2, 0.3], 3);
        assert_eq!(body["vector"].as_array().unwrap().len(), 3);
        assert_eq!(body["limit"], 3);
        assert_eq!(body["with_payload"], true);
    }

    #[test]
    fn search_response_skips_payloadless_hits() {
        let raw = r#"{
            "result": [
                {
                    "id": "aa",
                    "score": 0.91,
                    "payload": {
                        "fingerprint": "abc",
                        "extracted_text": "lease terms",
                        "filename": "lease.pdf"
                    }
                },
                { "id": "bb", "score": 0.4, "payload": null }
            ],
            "status": "ok",
            "time": 0.002
        }"#;

        let parsed: ApiResponse<Vec<SearchHit>> = serde_json::from_str(raw).unwrap();
        let documents = hits_to_documents(parsed.result);

        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].payload.extracted_text, "lease terms");
        assert!((documents[0].score - 0.91).abs() < f32::EPSILON);
    }

    #[test]
    fn distance_names_normalize() {
        assert_eq!(normalize_distance("cosine"), "Cosine");
        assert_eq!(normalize_distance("COSINE"), "Cosine");
        assert_eq!(normalize_distance("euclidean"), "Euclid");
        assert_eq!(normalize_distance("dot"), "Dot");
        assert_eq!(normalize_distance("manhattan"), "Cosine");
    }
}
