//! Videval infrastructure library
//!
//! Process-wide concerns shared by the binary and the test suites:
//! - Telemetry initialization

pub mod telemetry;

pub use telemetry::{init_telemetry, shutdown_telemetry};
