//! Job tracking endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::{Job, JobStatus};
use crate::error::ServiceError;

use super::AppState;

#[derive(Deserialize)]
pub struct ListJobsParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreateJobRequest {
    pub job_name: String,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateJobStatusRequest {
    pub status: JobStatus,
    pub description: Option<String>,
}

/// List jobs, newest first
pub async fn list_jobs_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<Vec<Job>>, ServiceError> {
    let limit = params.limit.unwrap_or(100);
    let offset = params.offset.unwrap_or(0);
    let jobs = state.service.db().list_jobs(limit, offset)?;
    Ok(Json(jobs))
}

/// Get a single job by id
pub async fn get_job_handler(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<i64>,
) -> Result<Json<Job>, ServiceError> {
    let job = state
        .service
        .db()
        .get_job(job_id)?
        .ok_or(ServiceError::JobNotFound { job_id })?;
    Ok(Json(job))
}

/// Create a job record directly, outside the analysis pipeline
pub async fn create_job_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateJobRequest>,
) -> Result<Json<Job>, ServiceError> {
    let job_id = state
        .service
        .db()
        .create_job(&request.job_name, request.description.as_deref())?;
    let job = state
        .service
        .db()
        .get_job(job_id)?
        .ok_or(ServiceError::JobNotFound { job_id })?;
    Ok(Json(job))
}

/// Update a job's status
pub async fn update_job_status_handler(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<i64>,
    Json(request): Json<UpdateJobStatusRequest>,
) -> Result<Json<Job>, ServiceError> {
    let updated = state.service.db().update_job(
        job_id,
        request.status,
        request.description.as_deref(),
    )?;
    if !updated {
        return Err(ServiceError::JobNotFound { job_id });
    }

    let job = state
        .service
        .db()
        .get_job(job_id)?
        .ok_or(ServiceError::JobNotFound { job_id })?;
    Ok(Json(job))
}
