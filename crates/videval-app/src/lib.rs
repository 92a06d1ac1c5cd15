//! Videval application layer
//!
//! Wires configuration, storage, database and processing into an [`AppState`],
//! and dispatches background work through an explicitly owned task queue.

pub mod ingest;
pub mod jobs;
pub mod state;

pub use ingest::{ingest_video, IngestRequest, AUDIO_SUBDIRECTORY};
pub use jobs::Dispatcher;
pub use state::AppState;
