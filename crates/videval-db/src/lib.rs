//! Videval database layer
//!
//! SQLite persistence for stored files, datasets, segments and submission
//! bookkeeping. Every repository is a cheap clone around the shared pool.

pub mod db;

pub use db::pool::{connect, migrate};
pub use db::transaction::WriteTransaction;
pub use db::{
    DatasetRepository, DatasetVideoRepository, NewDatasetVideo, NewSegment, ProjectRepository,
    SegmentRepository, StoredFileRepository,
};
