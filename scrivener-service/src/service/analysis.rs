//! The analysis pipeline: validate, dedup, extract, prompt, persist.

use std::path::Path;

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::JobStatus;
use crate::error::{ProcessingError, ServiceError, ServiceResult};
use crate::ingestion::fingerprint;
use crate::tasks::{self, AnalysisTask, QuestionItem, QuestionMode};

use crate::vector_store::ScoredDocument;

use super::persistence::PersistRequest;
use super::{AnalysisService, Extractor, InferenceApi, VectorIndex};

/// Result of a single-answer analysis request.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub job_id: i64,
    pub answer: String,
}

/// Result of a Q&A request.
#[derive(Debug, Clone, Serialize)]
pub struct QnaOutcome {
    pub job_id: i64,
    pub results: Vec<QuestionAnswer>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionAnswer {
    pub question: String,
    pub answer: String,
    pub response_type: QuestionMode,
}

/// A document that has passed validation and has text available, either
/// from the cache or from a fresh extraction.
struct PreparedDocument {
    text: String,
    fingerprint: String,
    filename: String,
    /// Point id for the pending embedding; `None` on a cache hit, which
    /// must never write to the store.
    unique_id: Option<String>,
}

impl<I, V, E> AnalysisService<I, V, E>
where
    I: InferenceApi,
    V: VectorIndex,
    E: Extractor,
{
    /// Run a single-answer analysis task over an uploaded document.
    ///
    /// A job row tracks the request; any failure marks it aborted with the
    /// error message before the error propagates to the caller.
    pub async fn analyze(
        &self,
        task: AnalysisTask,
        filename: &str,
        bytes: &[u8],
    ) -> ServiceResult<AnalysisOutcome> {
        let job_id = self
            .db
            .create_job(task.job_name(), Some(&format!("File: {filename}")))?;

        match self.run_analysis(job_id, task, filename, bytes).await {
            Ok(answer) => Ok(AnalysisOutcome { job_id, answer }),
            Err(e) => {
                error!(job_id, filename, error = %e, "Analysis failed");
                self.abort_job(job_id, &e);
                Err(e)
            }
        }
    }

    async fn run_analysis(
        &self,
        job_id: i64,
        task: AnalysisTask,
        filename: &str,
        bytes: &[u8],
    ) -> ServiceResult<String> {
        let document = self.prepare_document(filename, bytes).await?;

        let prompt = task.build_prompt(&document.text);
        self.db.update_job(job_id, JobStatus::Specific, None)?;

        let answer = self.inference.complete(&prompt, task.temperature()).await?;
        self.db.update_job(job_id, JobStatus::Completed, None)?;
        info!(
            job_id,
            task = task.job_name(),
            filename,
            "Analysis completed"
        );

        self.schedule_persistence(&document);
        Ok(answer)
    }

    /// Answer a batch of questions against one uploaded document.
    ///
    /// Per-question inference failures are reported inline in the answer
    /// text so one bad question does not void the rest of the batch.
    pub async fn answer_questions(
        &self,
        filename: &str,
        bytes: &[u8],
        items: Vec<QuestionItem>,
    ) -> ServiceResult<QnaOutcome> {
        let job_id = self
            .db
            .create_job("Q&A on Documents", Some(&format!("File: {filename}")))?;

        match self.run_qna(job_id, filename, bytes, items).await {
            Ok(results) => Ok(QnaOutcome { job_id, results }),
            Err(e) => {
                error!(job_id, filename, error = %e, "Q&A failed");
                self.abort_job(job_id, &e);
                Err(e)
            }
        }
    }

    async fn run_qna(
        &self,
        job_id: i64,
        filename: &str,
        bytes: &[u8],
        items: Vec<QuestionItem>,
    ) -> ServiceResult<Vec<QuestionAnswer>> {
        let document = self.prepare_document(filename, bytes).await?;
        self.db.update_job(job_id, JobStatus::Specific, None)?;

        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let prompt = tasks::question_prompt(&document.text, &item.question, item.response_type);
            let answer = match self
                .inference
                .complete(&prompt, tasks::QUESTION_TEMPERATURE)
                .await
            {
                Ok(answer) => answer,
                Err(e) => {
                    error!(job_id, question = item.question, error = %e, "Question failed");
                    format!("Error generating answer: {e}")
                }
            };
            results.push(QuestionAnswer {
                question: item.question,
                answer,
                response_type: item.response_type,
            });
        }

        self.db.update_job(job_id, JobStatus::Completed, None)?;
        info!(job_id, filename, answers = results.len(), "Q&A completed");

        self.schedule_persistence(&document);
        Ok(results)
    }

    /// Answer a free-standing query against previously persisted documents.
    ///
    /// Retrieval-augmented: the query is embedded, the nearest stored
    /// documents are fetched, and their text becomes the only context the
    /// model may use. No retrieved context short-circuits to a canned
    /// fallback without calling inference.
    pub async fn query_knowledge_base(
        &self,
        query: &str,
        top_k: usize,
    ) -> ServiceResult<AnalysisOutcome> {
        let job_id = self.db.create_job("Chat with Knowledge Base", None)?;

        match self.run_knowledge_base_query(job_id, query, top_k).await {
            Ok(answer) => Ok(AnalysisOutcome { job_id, answer }),
            Err(e) => {
                error!(job_id, error = %e, "Knowledge-base query failed");
                self.abort_job(job_id, &e);
                Err(e)
            }
        }
    }

    async fn run_knowledge_base_query(
        &self,
        job_id: i64,
        query: &str,
        top_k: usize,
    ) -> ServiceResult<String> {
        let query: String = query.split_whitespace().collect::<Vec<_>>().join(" ");
        if query.is_empty() {
            return Err(ServiceError::InvalidRequest {
                message: "Empty query".to_string(),
            });
        }

        let embedding = self.inference.embed(&query).await?;
        let collection = &self.config.qdrant.collection_name;
        let hits = self.index.search(collection, &embedding, top_k).await?;

        // The model context is bounded relative to the embedding input limit
        let max_context_chars = self.config.llama.max_embedding_input_chars * 4;
        let context = combined_context(&hits, max_context_chars);
        if context.is_empty() {
            info!(job_id, "No relevant documents; returning fallback answer");
            self.db.update_job(job_id, JobStatus::Completed, None)?;
            return Ok(tasks::KNOWLEDGE_BASE_FALLBACK.to_string());
        }

        let prompt = tasks::knowledge_base_prompt(&context, &query);
        self.db.update_job(job_id, JobStatus::Specific, None)?;

        let answer = self
            .inference
            .complete(&prompt, tasks::KNOWLEDGE_BASE_TEMPERATURE)
            .await?;
        self.db.update_job(job_id, JobStatus::Completed, None)?;
        info!(job_id, documents = hits.len(), "Knowledge-base query completed");

        Ok(answer)
    }

    /// Validate the upload, then resolve its text via the fingerprint cache
    /// or a fresh extraction.
    ///
    /// On a cache hit the stored text is reused as-is, even when it is
    /// empty, and nothing touches the scratch directory or the store. On a
    /// miss the file is saved as `{uuid}_{filename}` and extracted.
    async fn prepare_document(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> ServiceResult<PreparedDocument> {
        self.validate_upload(filename, bytes.len())?;

        let fingerprint = fingerprint::fingerprint_bytes(bytes);
        let collection = &self.config.qdrant.collection_name;

        if let Some(cached) = self
            .index
            .find_by_fingerprint(collection, &fingerprint)
            .await?
        {
            info!(filename, fingerprint, "Cache hit; reusing extracted text");
            return Ok(PreparedDocument {
                text: cached.extracted_text,
                fingerprint,
                filename: filename.to_string(),
                unique_id: None,
            });
        }

        let unique_id = Uuid::new_v4().to_string();
        let scratch_dir = &self.config.storage.scratch_dir;
        tokio::fs::create_dir_all(scratch_dir)
            .await
            .map_err(ProcessingError::Io)?;

        let path = scratch_dir.join(format!("{unique_id}_{filename}"));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(ProcessingError::Io)?;
        info!(filename, fingerprint, path = %path.display(), "Saved new upload");

        let text = self
            .extractor
            .extract(&path, self.config.extraction.ocr_enabled)
            .await?;

        Ok(PreparedDocument {
            text,
            fingerprint,
            filename: filename.to_string(),
            unique_id: Some(unique_id),
        })
    }

    fn validate_upload(&self, filename: &str, size: usize) -> ServiceResult<()> {
        let extension = Path::new(filename)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        if !self.config.upload.is_allowed(&extension) {
            return Err(ServiceError::InvalidRequest {
                message: format!("Unsupported file type: {extension}"),
            });
        }

        let max = self.config.upload.max_file_size_bytes;
        if size as u64 > max {
            return Err(ProcessingError::FileTooLarge {
                size: size as u64,
                max,
            }
            .into());
        }

        Ok(())
    }

    /// Hand a freshly extracted document to the persistence worker.
    ///
    /// Cache hits carry no `unique_id` and are skipped. A full or closed
    /// queue drops the request with a warning; the response has already
    /// been served and the document will be re-extracted next time.
    fn schedule_persistence(&self, document: &PreparedDocument) {
        let Some(point_id) = &document.unique_id else {
            return;
        };

        let request = PersistRequest {
            point_id: point_id.clone(),
            fingerprint: document.fingerprint.clone(),
            extracted_text: document.text.clone(),
            filename: document.filename.clone(),
        };

        if let Err(e) = self.persist_tx.try_send(request) {
            warn!(
                filename = document.filename,
                error = %e,
                "Persistence queue unavailable; document will not be cached"
            );
        }
    }

    fn abort_job(&self, job_id: i64, error: &ServiceError) {
        if let Err(db_err) = self
            .db
            .update_job(job_id, JobStatus::Aborted, Some(&error.to_string()))
        {
            error!(job_id, error = %db_err, "Failed to mark job aborted");
        }
    }
}

/// Join retrieved document texts with blank lines, capped at `max_chars`
/// characters.
fn combined_context(hits: &[ScoredDocument], max_chars: usize) -> String {
    let context = hits
        .iter()
        .map(|hit| hit.payload.extracted_text.as_str())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    if context.chars().count() > max_chars {
        warn!(max_chars, "Retrieved context truncated to fit the model window");
        return context.chars().take(max_chars).collect();
    }
    context
}
