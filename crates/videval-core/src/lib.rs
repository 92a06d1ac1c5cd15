//! Videval Core Library
//!
//! Domain models, error types and configuration shared by every Videval crate.

pub mod config;
pub mod content_type;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::Config;
pub use content_type::content_type_for;
pub use error::{AppError, AppResult};
pub use models::{
    Assignment, CutInterval, Dataset, DatasetVideo, HitSettings, Project, RemoteCredentials,
    RemoteLocation, Segment, Severity, StatusMessage, StoredFile, SubmissionTask, WorkerIdentity,
};
