//! Domain models
//!
//! Plain data types shared between the repositories, the processing services and
//! the binary. Persistence row types live in `videval-db`.

pub mod cut;
pub mod dataset;
pub mod message;
pub mod project;
pub mod remote;
pub mod segment;
pub mod stored_file;

pub use cut::CutInterval;
pub use dataset::{Dataset, DatasetVideo};
pub use message::{Severity, StatusMessage};
pub use project::{
    ActionsGuarded, Assignment, Comparator, HitSettings, LocaleValue, Project,
    QualificationRequirement, SubmissionTask, WorkerIdentity,
};
pub use remote::{RemoteCredentials, RemoteLocation};
pub use segment::Segment;
pub use stored_file::StoredFile;
