//! Videval worker
//!
//! A fixed pool of worker loops draining one bounded FIFO of background jobs,
//! supervised so a worker that panics is replaced.

pub mod error;
pub mod queue;

pub use error::JobError;
pub use queue::{JobHandle, TaskQueue, TaskQueueConfig};
