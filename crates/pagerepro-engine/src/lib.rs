//! Orchestration for the Cassandra paging-defect reproduction.
//!
//! [`ReproductionDriver`] owns the run: it provisions the container, waits for
//! the database, bootstraps the schema, seeds rows, runs the scan sequence
//! that provokes the defect, and always tears everything down.

#![warn(clippy::pedantic)]

pub mod ack;
pub mod config;
pub mod errors;
pub mod orchestrator;
pub mod port;
pub mod report;
pub mod seed;

pub use ack::{DefectAcknowledger, DefectNotice, NoPause};
pub use config::EnvironmentConfig;
pub use errors::{ConfigError, RunError, RunFailure};
pub use orchestrator::{teardown_by_name, ReproductionDriver};
pub use report::{Outcome, RunReport, TeardownStatus};
