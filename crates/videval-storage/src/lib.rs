//! Videval Storage Library
//!
//! Local content-addressed file tree plus the remote object tier.
//!
//! # Layout
//!
//! Files live under the media root at `{subdirectory}/{h0}/{h1}/{hash}{.ext}`, where
//! `h0`/`h1` are the first two hex digits of the MD5 content hash. Uploads are staged
//! in `tmp/`; files pending deletion are parked in `trash/` until the owning
//! transaction commits. Remote keys reuse the same relative path under an optional
//! prefix, so a file keeps one canonical path for its whole lifetime.

pub mod content;
pub(crate) mod keys;
pub mod object;
pub mod remote;
pub mod traits;

// Re-export commonly used types
pub use content::{ContentStore, StagedRemoval, StoredContent};
pub use object::ObjectStoreRemote;
pub use remote::{RemoteTier, StagedObjectRemoval};
pub use traits::{RemoteStore, StorageError, StorageResult};
