//! HTTP routes for the tutoring server

pub mod chat;
pub mod jobs;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build the upload, status and chat routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(upload::upload_document).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/status/:id", get(jobs::get_job_status))
        .route("/jobs", get(jobs::list_jobs))
        .route("/sessions", get(jobs::list_sessions))
        .route("/chat", post(chat::chat))
}
