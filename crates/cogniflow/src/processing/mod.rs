//! Background ingestion jobs with progress tracking

mod job_tracker;
mod pipeline;

pub use job_tracker::{JobState, JobStats, JobStatus, JobTracker, VECTORIZING_END, VECTORIZING_START};
pub use pipeline::IngestionPipeline;
