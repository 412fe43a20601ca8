//! Document analysis service.
//!
//! The service is generic over its three external seams (inference, vector
//! index, text extraction) so the pipeline can be exercised end to end in
//! tests without a llama-server, a Qdrant instance, or PDFium on the box.
//! Production wires the concrete clients through [`ScrivenerService`].

pub mod analysis;
pub mod persistence;

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::{ExtractionConfig, StaticConfig};
use crate::db::Database;
use crate::error::{ProcessingError, ServiceResult};
use crate::ingestion::{self, OcrEngine};
use crate::llama::LlamaClient;
use crate::vector_store::{DocumentPayload, EmbeddingPoint, QdrantStore, ScoredDocument};

use persistence::PersistRequest;

/// Prompt completion and text embedding.
pub trait InferenceApi: Send + Sync + 'static {
    fn complete(
        &self,
        prompt: &str,
        temperature: f32,
    ) -> impl Future<Output = ServiceResult<String>> + Send;

    fn embed(&self, text: &str) -> impl Future<Output = ServiceResult<Vec<f32>>> + Send;
}

/// Vector store operations the pipeline depends on.
pub trait VectorIndex: Send + Sync + 'static {
    fn find_by_fingerprint(
        &self,
        collection: &str,
        fingerprint: &str,
    ) -> impl Future<Output = ServiceResult<Option<DocumentPayload>>> + Send;

    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: usize,
    ) -> impl Future<Output = ServiceResult<()>> + Send;

    fn upsert_points(
        &self,
        collection: &str,
        points: &[EmbeddingPoint],
    ) -> impl Future<Output = ServiceResult<()>> + Send;

    fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> impl Future<Output = ServiceResult<Vec<ScoredDocument>>> + Send;
}

/// Text extraction from a saved upload.
pub trait Extractor: Send + Sync + 'static {
    fn extract(
        &self,
        path: &Path,
        ocr_enabled: bool,
    ) -> impl Future<Output = Result<String, ProcessingError>> + Send;
}

/// Production extractor backed by the ingestion module.
///
/// Extraction is CPU- and subprocess-bound, so it runs on the blocking
/// thread pool.
pub struct FileExtractor {
    ocr: OcrEngine,
}

impl FileExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            ocr: OcrEngine::new(config),
        }
    }
}

impl Extractor for FileExtractor {
    async fn extract(&self, path: &Path, ocr_enabled: bool) -> Result<String, ProcessingError> {
        let path = path.to_path_buf();
        let ocr = self.ocr.clone();
        tokio::task::spawn_blocking(move || ingestion::extract_text(&path, ocr_enabled, &ocr))
            .await
            .map_err(|e| ProcessingError::Io(std::io::Error::other(e)))?
    }
}

pub struct AnalysisService<I, V, E> {
    config: Arc<StaticConfig>,
    db: Arc<Database>,
    inference: Arc<I>,
    index: Arc<V>,
    extractor: Arc<E>,
    persist_tx: mpsc::Sender<PersistRequest>,
}

impl<I, V, E> AnalysisService<I, V, E>
where
    I: InferenceApi,
    V: VectorIndex,
    E: Extractor,
{
    /// Assemble the service and start its persistence worker.
    pub fn new(
        config: Arc<StaticConfig>,
        db: Arc<Database>,
        inference: Arc<I>,
        index: Arc<V>,
        extractor: Arc<E>,
    ) -> Arc<Self> {
        let persist_tx =
            persistence::start_worker(Arc::clone(&inference), Arc::clone(&index), Arc::clone(&config));

        Arc::new(Self {
            config,
            db,
            inference,
            index,
            extractor,
            persist_tx,
        })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &StaticConfig {
        &self.config
    }
}

/// The service as deployed: llama-server inference, Qdrant index, filesystem
/// extraction.
pub type ScrivenerService = AnalysisService<LlamaClient, QdrantStore, FileExtractor>;

impl ScrivenerService {
    /// Build the production service, probing both backends.
    ///
    /// An unreachable llama-server is tolerated at startup (requests will
    /// fail until it comes up); an unreachable vector store is not, since
    /// the cache lookup is on every request path.
    pub async fn initialize(
        config: Arc<StaticConfig>,
        db: Arc<Database>,
    ) -> ServiceResult<Arc<Self>> {
        let inference = Arc::new(LlamaClient::new(config.llama.clone())?);
        if inference.health_check().await {
            info!(url = config.llama.base_url(), "llama-server is reachable");
        } else {
            warn!(
                url = config.llama.base_url(),
                "llama-server is not responding; analysis requests will fail until it is up"
            );
        }

        let index = Arc::new(QdrantStore::new(config.qdrant.clone())?);
        let collections = index.list_collections().await?;
        info!(
            url = config.qdrant.url,
            collections = collections.len(),
            "Connected to vector store"
        );
        index
            .ensure_collection(&config.qdrant.collection_name, config.qdrant.vector_size)
            .await?;

        let extractor = Arc::new(FileExtractor::new(&config.extraction));

        Ok(Self::new(config, db, inference, index, extractor))
    }

    /// Whether llama-server currently answers its health endpoint.
    pub async fn llama_healthy(&self) -> bool {
        self.inference.health_check().await
    }

    /// Whether the vector store currently answers API requests.
    pub async fn vector_store_healthy(&self) -> bool {
        self.index.list_collections().await.is_ok()
    }
}
