//! Job status and session listing endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::processing::{JobStats, JobStatus};
use crate::retrieval::DEFAULT_SESSION;
use crate::server::state::AppState;

/// Response for job listing
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobStatus>,
    pub stats: JobStats,
}

/// Response for session listing
#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<String>,
    pub default_available: bool,
}

/// GET /status/:id - Progress of one ingestion job
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobStatus>> {
    state
        .jobs()
        .get(&id)
        .map(Json)
        .ok_or(Error::JobNotFound(id))
}

/// GET /jobs - All jobs with aggregate counts
pub async fn list_jobs(State(state): State<AppState>) -> Json<JobListResponse> {
    Json(JobListResponse {
        jobs: state.jobs().list(),
        stats: state.jobs().stats(),
    })
}

/// GET /sessions - Ids with a ready index
pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionListResponse> {
    Json(SessionListResponse {
        sessions: state.sessions().ids(),
        default_available: state.sessions().contains(DEFAULT_SESSION),
    })
}
