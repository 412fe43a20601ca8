//! Background persistence of newly extracted documents.
//!
//! A single worker drains a bounded queue, embedding each document and
//! upserting it into the vector store. Failures are logged and dropped:
//! the upload that produced the request has already been answered, and a
//! document that fails to persist is simply re-extracted on its next
//! upload.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::config::StaticConfig;
use crate::error::ServiceResult;
use crate::vector_store::{DocumentPayload, EmbeddingPoint};

use super::{InferenceApi, VectorIndex};

/// One document to embed and store.
#[derive(Debug, Clone)]
pub struct PersistRequest {
    pub point_id: String,
    pub fingerprint: String,
    pub extracted_text: String,
    pub filename: String,
}

/// Spawn the persistence worker and return its submission handle.
pub fn start_worker<I, V>(
    inference: Arc<I>,
    index: Arc<V>,
    config: Arc<StaticConfig>,
) -> mpsc::Sender<PersistRequest>
where
    I: InferenceApi,
    V: VectorIndex,
{
    let (tx, mut rx) = mpsc::channel::<PersistRequest>(config.persistence.queue_capacity);

    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let fingerprint = request.fingerprint.clone();
            let filename = request.filename.clone();
            if let Err(e) = persist_one(&*inference, &*index, &config, request).await {
                error!(
                    error = %e,
                    fingerprint,
                    filename,
                    "Failed to persist document to vector store"
                );
            }
        }
    });

    tx
}

async fn persist_one<I, V>(
    inference: &I,
    index: &V,
    config: &StaticConfig,
    request: PersistRequest,
) -> ServiceResult<()>
where
    I: InferenceApi,
    V: VectorIndex,
{
    let embedding = inference.embed(&request.extracted_text).await?;

    let collection = &config.qdrant.collection_name;
    index.ensure_collection(collection, embedding.len()).await?;

    let point = EmbeddingPoint {
        id: request.point_id.clone(),
        vector: embedding,
        payload: DocumentPayload {
            fingerprint: request.fingerprint,
            extracted_text: request.extracted_text,
            filename: request.filename.clone(),
        },
    };

    index.upsert_points(collection, &[point]).await?;

    info!(
        point_id = request.point_id,
        filename = request.filename,
        "Persisted document embedding"
    );
    Ok(())
}
