//! Service configuration.
//!
//! All settings are loaded once at startup into a [`StaticConfig`] that is
//! passed by `Arc` into the service and its collaborators. Nothing reads
//! ambient process state after startup.

use serde::Deserialize;
use std::path::PathBuf;

/// Full service configuration, loaded from `config.{toml,yaml,json}` with
/// `SCRIVENER__`-prefixed environment overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_storage")]
    pub storage: StorageConfig,

    #[serde(default = "default_upload")]
    pub upload: UploadConfig,

    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default = "default_llama")]
    pub llama: LlamaConfig,

    #[serde(default = "default_qdrant")]
    pub qdrant: QdrantConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl StaticConfig {
    pub fn load() -> Result<Self, ::config::ConfigError> {
        ::config::Config::builder()
            .add_source(::config::File::with_name("config").required(false))
            .add_source(
                ::config::Environment::with_prefix("SCRIVENER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            storage: default_storage(),
            upload: default_upload(),
            extraction: ExtractionConfig::default(),
            llama: default_llama(),
            qdrant: default_qdrant(),
            persistence: PersistenceConfig::default(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Uploaded files are persisted here under `{uuid}_{filename}` before
    /// extraction. Concurrent requests never collide on a path.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Location of the job-tracking database.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Upload validation limits
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    #[serde(default = "default_max_file_size_bytes")]
    pub max_file_size_bytes: u64,
}

impl UploadConfig {
    /// Check a lowercase dotted extension (".pdf") against the allow-list.
    pub fn is_allowed(&self, extension: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }
}

/// Text extraction configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    /// When true, PDF pages without embedded text are rasterized and OCRed.
    /// Raster image uploads are always OCRed regardless of this flag.
    #[serde(default = "default_true")]
    pub ocr_enabled: bool,

    /// Tesseract language code.
    #[serde(default = "default_ocr_language")]
    pub ocr_language: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr_enabled: true,
            ocr_language: default_ocr_language(),
        }
    }
}

/// llama-server connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LlamaConfig {
    #[serde(default = "default_llama_host")]
    pub host: String,

    #[serde(default = "default_llama_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_n_predict")]
    pub n_predict: u32,

    /// Embedding dimensionality expected from the model. Per-token embedding
    /// matrices are mean-pooled down to a single vector of this size.
    #[serde(default = "default_embedding_hidden_size")]
    pub embedding_hidden_size: usize,

    /// Inputs longer than this are split into chunks whose embeddings are
    /// mean-pooled elementwise.
    #[serde(default = "default_max_embedding_input_chars")]
    pub max_embedding_input_chars: usize,
}

impl LlamaConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Qdrant connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QdrantConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Used when ensuring the collection exists at startup, before any
    /// embedding has been observed.
    #[serde(default = "default_vector_size")]
    pub vector_size: usize,

    #[serde(default = "default_distance_metric")]
    pub distance_metric: String,

    #[serde(default = "default_qdrant_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Background persistence worker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Capacity of the persistence queue. When full, new embedding writes
    /// are dropped with a warning rather than blocking the response path.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

// ==================== Default Value Functions ====================

pub(crate) fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

pub(crate) fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub(crate) fn default_port() -> u16 {
    8000
}

pub(crate) fn default_storage() -> StorageConfig {
    StorageConfig {
        scratch_dir: default_scratch_dir(),
        data_dir: default_data_dir(),
    }
}

pub(crate) fn default_scratch_dir() -> PathBuf {
    PathBuf::from("./processed")
}

pub(crate) fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

pub(crate) fn default_upload() -> UploadConfig {
    UploadConfig {
        allowed_extensions: default_allowed_extensions(),
        max_file_size_bytes: default_max_file_size_bytes(),
    }
}

pub(crate) fn default_allowed_extensions() -> Vec<String> {
    [".pdf", ".doc", ".docx", ".jpg", ".jpeg", ".tiff", ".png"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub(crate) fn default_max_file_size_bytes() -> u64 {
    10 * 1024 * 1024
}

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn default_ocr_language() -> String {
    "eng".to_string()
}

pub(crate) fn default_llama() -> LlamaConfig {
    LlamaConfig {
        host: default_llama_host(),
        port: default_llama_port(),
        request_timeout_secs: default_request_timeout_secs(),
        n_predict: default_n_predict(),
        embedding_hidden_size: default_embedding_hidden_size(),
        max_embedding_input_chars: default_max_embedding_input_chars(),
    }
}

pub(crate) fn default_llama_host() -> String {
    "127.0.0.1".to_string()
}

pub(crate) fn default_llama_port() -> u16 {
    8080
}

pub(crate) fn default_request_timeout_secs() -> u64 {
    120
}

pub(crate) fn default_n_predict() -> u32 {
    512
}

pub(crate) fn default_embedding_hidden_size() -> usize {
    4096
}

pub(crate) fn default_max_embedding_input_chars() -> usize {
    1024
}

pub(crate) fn default_qdrant() -> QdrantConfig {
    QdrantConfig {
        url: default_qdrant_url(),
        collection_name: default_collection_name(),
        vector_size: default_vector_size(),
        distance_metric: default_distance_metric(),
        request_timeout_secs: default_qdrant_timeout_secs(),
    }
}

pub(crate) fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}

pub(crate) fn default_collection_name() -> String {
    "documents".to_string()
}

pub(crate) fn default_vector_size() -> usize {
    4096
}

pub(crate) fn default_distance_metric() -> String {
    "Cosine".to_string()
}

pub(crate) fn default_qdrant_timeout_secs() -> u64 {
    30
}

pub(crate) fn default_queue_capacity() -> usize {
    32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_all_sections() {
        let config = StaticConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.llama.port, 8080);
        assert_eq!(config.upload.max_file_size_bytes, 10 * 1024 * 1024);
        assert!(config.extraction.ocr_enabled);
        assert_eq!(config.qdrant.collection_name, "documents");
        assert_eq!(config.persistence.queue_capacity, 32);
    }

    #[test]
    fn extension_allow_list_is_case_insensitive() {
        let upload = default_upload();
        assert!(upload.is_allowed(".pdf"));
        assert!(upload.is_allowed(".PDF"));
        assert!(upload.is_allowed(".docx"));
        assert!(!upload.is_allowed(".xyz"));
        assert!(!upload.is_allowed(""));
    }
}
