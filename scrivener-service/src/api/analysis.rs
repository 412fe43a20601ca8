//! Document analysis endpoints.
//!
//! Each handler accepts a multipart upload, runs the corresponding analysis
//! task, and returns the job id alongside the raw model answer.

use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ServiceError, ServiceResult};
use crate::tasks::{AnalysisTask, QuestionItem};

use super::AppState;

#[derive(Serialize)]
pub struct SummaryResponse {
    pub job_id: i64,
    pub summary: String,
}

#[derive(Serialize)]
pub struct ObligationsResponse {
    pub job_id: i64,
    pub obligations: String,
}

#[derive(Serialize)]
pub struct RisksResponse {
    pub job_id: i64,
    pub risks: String,
}

#[derive(Serialize)]
pub struct QnaResponse {
    pub job_id: i64,
    pub results: Vec<crate::service::analysis::QuestionAnswer>,
}

#[derive(Deserialize)]
pub struct KnowledgeBaseRequest {
    pub user_query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    3
}

#[derive(Serialize)]
pub struct KnowledgeBaseResponse {
    pub job_id: i64,
    pub answer: String,
}

/// An uploaded file plus any accompanying form fields.
struct UploadForm {
    filename: String,
    bytes: Vec<u8>,
    fields: std::collections::HashMap<String, String>,
}

/// Drain a multipart body into the file part and its text fields.
///
/// Stream errors (truncated or malformed bodies) are reported as such
/// rather than falling through to a missing-file rejection.
async fn read_upload(mut multipart: Multipart) -> ServiceResult<UploadForm> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut fields = std::collections::HashMap::new();

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| ServiceError::InvalidRequest {
                message: format!("Malformed multipart body: {e}"),
            })?;
        let Some(field) = field else {
            break;
        };
        let name = field.name().unwrap_or("").to_string();

        if name == "file" {
            let filename = field.file_name().unwrap_or("document").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ServiceError::InvalidRequest {
                    message: format!("Malformed multipart body: {e}"),
                })?;
            file = Some((filename, data.to_vec()));
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ServiceError::InvalidRequest {
                    message: format!("Malformed multipart body: {e}"),
                })?;
            fields.insert(name, value);
        }
    }

    let (filename, bytes) = file.ok_or_else(|| ServiceError::InvalidRequest {
        message: "No file provided".to_string(),
    })?;

    Ok(UploadForm {
        filename,
        bytes,
        fields,
    })
}

/// Parse an optional numeric form field, falling back to a default.
fn parse_field(form: &UploadForm, name: &str, default: u32) -> ServiceResult<u32> {
    match form.fields.get(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ServiceError::InvalidRequest {
            message: format!("Invalid value for {name}: {raw}"),
        }),
    }
}

/// Generate a summary of the uploaded document
pub async fn generate_summary_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<SummaryResponse>, ServiceError> {
    let form = read_upload(multipart).await?;
    let min_words = parse_field(&form, "min_words", 50)?;
    let max_words = parse_field(&form, "max_words", 150)?;

    let outcome = state
        .service
        .analyze(
            AnalysisTask::Summary {
                min_words,
                max_words,
            },
            &form.filename,
            &form.bytes,
        )
        .await?;

    Ok(Json(SummaryResponse {
        job_id: outcome.job_id,
        summary: outcome.answer,
    }))
}

/// Extract obligations from the uploaded document
pub async fn find_obligations_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ObligationsResponse>, ServiceError> {
    let form = read_upload(multipart).await?;

    let outcome = state
        .service
        .analyze(AnalysisTask::Obligations, &form.filename, &form.bytes)
        .await?;

    Ok(Json(ObligationsResponse {
        job_id: outcome.job_id,
        obligations: outcome.answer,
    }))
}

/// Identify risks in the uploaded document
pub async fn find_risks_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<RisksResponse>, ServiceError> {
    let form = read_upload(multipart).await?;

    let outcome = state
        .service
        .analyze(AnalysisTask::Risks, &form.filename, &form.bytes)
        .await?;

    Ok(Json(RisksResponse {
        job_id: outcome.job_id,
        risks: outcome.answer,
    }))
}

/// Answer a batch of questions against the uploaded document.
///
/// Questions arrive as a `qna_items` form field holding a JSON array of
/// `{"question": ..., "response_type": "specific" | "elaborate"}` objects.
pub async fn qna_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<QnaResponse>, ServiceError> {
    let form = read_upload(multipart).await?;

    let raw_items = form
        .fields
        .get("qna_items")
        .ok_or_else(|| ServiceError::InvalidRequest {
            message: "No qna_items provided".to_string(),
        })?;

    let items: Vec<QuestionItem> =
        serde_json::from_str(raw_items).map_err(|e| ServiceError::InvalidRequest {
            message: format!("Invalid qna_items: {e}"),
        })?;

    let outcome = state
        .service
        .answer_questions(&form.filename, &form.bytes, items)
        .await?;

    Ok(Json(QnaResponse {
        job_id: outcome.job_id,
        results: outcome.results,
    }))
}

/// Answer a query against the knowledge base of previously analyzed
/// documents
pub async fn chat_with_kb_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<KnowledgeBaseRequest>,
) -> Result<Json<KnowledgeBaseResponse>, ServiceError> {
    let outcome = state
        .service
        .query_knowledge_base(&request.user_query, request.top_k)
        .await?;

    Ok(Json(KnowledgeBaseResponse {
        job_id: outcome.job_id,
        answer: outcome.answer,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::Request;

    async fn multipart_from(body: String) -> Multipart {
        let request = Request::builder()
            .header(
                "content-type",
                "multipart/form-data; boundary=UPLOAD_BOUNDARY",
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    #[tokio::test]
    async fn upload_form_collects_file_and_fields() {
        let body = concat!(
            "--UPLOAD_BOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"file\"; filename=\"doc.pdf\"\r\n",
            "\r\n",
            "%PDF-1.4 payload\r\n",
            "--UPLOAD_BOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"min_words\"\r\n",
            "\r\n",
            "40\r\n",
            "--UPLOAD_BOUNDARY--\r\n",
        );

        let form = read_upload(multipart_from(body.to_string()).await)
            .await
            .unwrap();
        assert_eq!(form.filename, "doc.pdf");
        assert_eq!(form.bytes, b"%PDF-1.4 payload");
        assert_eq!(parse_field(&form, "min_words", 50).unwrap(), 40);
        assert_eq!(parse_field(&form, "max_words", 150).unwrap(), 150);
    }

    #[tokio::test]
    async fn truncated_body_reports_malformed_multipart() {
        // Body cut off mid-part: the stream errors and the failure must
        // name the body, not claim the file was missing.
        let body = concat!(
            "--UPLOAD_BOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"file\"; filename=\"doc.pdf\"",
        );

        let error = read_upload(multipart_from(body.to_string()).await)
            .await
            .err()
            .expect("truncated body must be rejected");
        match error {
            ServiceError::InvalidRequest { message } => {
                assert!(message.contains("Malformed multipart body"), "{message}");
            }
            other => panic!("expected InvalidRequest, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_file_part_is_rejected() {
        let body = concat!(
            "--UPLOAD_BOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"min_words\"\r\n",
            "\r\n",
            "40\r\n",
            "--UPLOAD_BOUNDARY--\r\n",
        );

        let error = read_upload(multipart_from(body.to_string()).await)
            .await
            .err()
            .expect("file-less body must be rejected");
        match error {
            ServiceError::InvalidRequest { message } => {
                assert_eq!(message, "No file provided");
            }
            other => panic!("expected InvalidRequest, got {other:?}"),
        }
    }

    #[test]
    fn invalid_numeric_field_is_rejected() {
        let form = UploadForm {
            filename: "doc.pdf".to_string(),
            bytes: Vec::new(),
            fields: [("min_words".to_string(), "lots".to_string())]
                .into_iter()
                .collect(),
        };

        assert!(parse_field(&form, "min_words", 50).is_err());
    }
}
