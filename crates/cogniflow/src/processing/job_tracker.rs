//! Per-upload job state machine
//!
//! `started → loading → chunking → vectorizing → completed | error`.
//! Once a job is `completed` or `error` every mutator is a no-op, so late
//! progress callbacks cannot rewrite a finished record.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Lower bound of the vectorizing progress range
pub const VECTORIZING_START: u8 = 30;
/// Upper bound of the vectorizing progress range
pub const VECTORIZING_END: u8 = 95;

/// Job status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Started,
    Loading,
    Chunking,
    Vectorizing,
    Completed,
    Error,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Progress record for one ingestion job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobStatus {
    pub id: String,
    pub status: JobState,
    /// Percent complete (0-100)
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks_done: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks_total: Option<usize>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobStatus {
    fn new(id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            status: JobState::Started,
            progress: 0,
            message: "Upload received".to_string(),
            chunks_done: None,
            chunks_total: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Counts of tracked jobs per outcome
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobStats {
    pub total_jobs: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Concurrent registry of job statuses
#[derive(Default)]
pub struct JobTracker {
    jobs: DashMap<String, JobStatus>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job in `started`, replacing any earlier record with the same id
    pub fn start(&self, id: &str) -> JobStatus {
        let status = JobStatus::new(id);
        self.jobs.insert(id.to_string(), status.clone());
        status
    }

    /// Move a running job to `state`
    ///
    /// Returns `false` for unknown or finished jobs. Progress never goes backwards.
    pub fn set_stage(&self, id: &str, state: JobState, progress: u8, message: impl Into<String>) -> bool {
        match state {
            JobState::Completed => return self.complete(id, message),
            JobState::Error => return self.fail(id, message),
            _ => {}
        }

        self.update(id, |job| {
            job.status = state;
            job.progress = job.progress.max(progress.min(100));
            job.message = message.into();
        })
    }

    /// Record `done` of `total` chunks vectorized, mapped into 30-95%
    pub fn record_vectorizing(&self, id: &str, done: usize, total: usize) -> bool {
        let progress = vectorizing_progress(done, total);
        self.update(id, |job| {
            job.status = JobState::Vectorizing;
            job.progress = job.progress.max(progress);
            job.message = format!("Vectorizing {}/{} chunks", done, total);
            job.chunks_done = Some(done);
            job.chunks_total = Some(total);
        })
    }

    /// Finish the job successfully
    pub fn complete(&self, id: &str, message: impl Into<String>) -> bool {
        self.update(id, |job| {
            job.status = JobState::Completed;
            job.progress = 100;
            job.message = message.into();
        })
    }

    /// Finish the job with an error
    pub fn fail(&self, id: &str, message: impl Into<String>) -> bool {
        self.update(id, |job| {
            job.status = JobState::Error;
            job.message = message.into();
        })
    }

    /// `None` means the job was never started
    pub fn get(&self, id: &str) -> Option<JobStatus> {
        self.jobs.get(id).map(|job| job.clone())
    }

    /// All jobs, newest first
    pub fn list(&self) -> Vec<JobStatus> {
        let mut jobs: Vec<JobStatus> = self.jobs.iter().map(|job| job.clone()).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    pub fn stats(&self) -> JobStats {
        let mut stats = JobStats {
            total_jobs: self.jobs.len(),
            ..Default::default()
        };
        for job in self.jobs.iter() {
            match job.status {
                JobState::Completed => stats.completed += 1,
                JobState::Error => stats.failed += 1,
                _ => stats.active += 1,
            }
        }
        stats
    }

    fn update(&self, id: &str, apply: impl FnOnce(&mut JobStatus)) -> bool {
        let Some(mut job) = self.jobs.get_mut(id) else {
            return false;
        };
        if job.status.is_terminal() {
            tracing::debug!("Ignoring update for finished job {}", id);
            return false;
        }
        apply(job.value_mut());
        job.updated_at = Utc::now();
        true
    }
}

fn vectorizing_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return VECTORIZING_END;
    }
    let span = (VECTORIZING_END - VECTORIZING_START) as usize;
    let offset = done.min(total) * span / total;
    VECTORIZING_START + offset as u8
}
