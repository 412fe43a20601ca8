use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Job not found: {job_id}")]
    JobNotFound { job_id: i64 },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Document processing failed")]
    Processing(#[from] ProcessingError),

    #[error("{0}")]
    Inference(#[from] InferenceError),

    #[error("Vector store error")]
    VectorStore(#[from] VectorStoreError),

    #[error("Database error")]
    Database(#[from] DatabaseError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Text extraction errors
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Unsupported extension: {extension}")]
    UnsupportedExtension { extension: String },

    #[error("Legacy .doc format is not supported; convert to .docx")]
    LegacyFormat,

    #[error("File too large: {size} bytes (max {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Failed to extract text from {format} content")]
    Extraction {
        format: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("OCR failed: {message}")]
    Ocr { message: String },

    #[error("IO error")]
    Io(#[from] std::io::Error),
}

/// llama-server client errors
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Connection failed to llama-server at {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Generation failed (status {status}): {message}")]
    Generation { status: u16, message: String },

    #[error("Invalid response from llama-server: {message}")]
    InvalidResponse { message: String },

    #[error("Embedding dimension mismatch: got {got}, expected {expected}")]
    DimensionMismatch { got: usize, expected: usize },
}

/// Qdrant client errors
#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Connection failed to Qdrant at {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Qdrant request failed (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response from Qdrant: {message}")]
    InvalidResponse { message: String },
}

/// Job database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed")]
    Connection(#[source] rusqlite::Error),

    #[error("Query failed")]
    Query(#[source] rusqlite::Error),
}

/// API error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::JobNotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ServiceError::Processing(ProcessingError::UnsupportedExtension { .. })
            | ServiceError::Processing(ProcessingError::LegacyFormat) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ServiceError::Processing(ProcessingError::FileTooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ServiceError::Processing(ProcessingError::Extraction { .. })
            | ServiceError::Processing(ProcessingError::Ocr { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServiceError::Inference(InferenceError::Connection { .. }) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServiceError::JobNotFound { .. } => "job_not_found",
            ServiceError::InvalidRequest { .. } => "invalid_request",
            ServiceError::Processing(ProcessingError::UnsupportedExtension { .. }) => {
                "unsupported_extension"
            }
            ServiceError::Processing(ProcessingError::LegacyFormat) => "legacy_format",
            ServiceError::Processing(ProcessingError::FileTooLarge { .. }) => "file_too_large",
            ServiceError::Processing(ProcessingError::Extraction { .. }) => "extraction_error",
            ServiceError::Processing(ProcessingError::Ocr { .. }) => "ocr_error",
            ServiceError::Processing(ProcessingError::Io(_)) => "io_error",
            ServiceError::Inference(InferenceError::Connection { .. }) => "inference_connection",
            ServiceError::Inference(InferenceError::Generation { .. }) => "inference_generation",
            ServiceError::Inference(InferenceError::InvalidResponse { .. }) => {
                "inference_invalid_response"
            }
            ServiceError::Inference(InferenceError::DimensionMismatch { .. }) => {
                "embedding_dimension_mismatch"
            }
            ServiceError::VectorStore(_) => "vector_store_error",
            ServiceError::Database(_) => "database_error",
            ServiceError::Internal { .. } => "internal_error",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code().to_string();

        // The Display impls carry no internal detail beyond the typed context,
        // so they are safe to hand to clients as-is.
        let response = ErrorResponse {
            message: self.to_string(),
            code: Some(code),
        };

        (status, Json(response)).into_response()
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
