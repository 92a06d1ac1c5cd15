use thiserror::Error;

/// Why a job produced no result.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job failed: {0}")]
    Failed(#[source] anyhow::Error),

    #[error("Job panicked: {0}")]
    Panicked(String),

    /// The job was discarded before it ran, e.g. at shutdown.
    #[error("Job was cancelled before it ran")]
    Cancelled,

    #[error("Task queue is full")]
    QueueFull,

    #[error("Task queue is shutting down")]
    ShuttingDown,
}
