//! Run-level error model.

use pagerepro_container::ProvisionError;
use pagerepro_cql::{ConnectionError, DriverError, ScanError, SchemaError, TimeoutError};

use crate::report::RunReport;

/// Invalid `CASSANDRA_13592_*` environment value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: String,
        value: String,
        reason: String,
    },
}

/// Which step of the scan sequence failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStep {
    FullScan,
    SingleRow,
    RepeatFullScan,
    Resume,
}

impl std::fmt::Display for ScanStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::FullScan => "full scan",
            Self::SingleRow => "single-row scan",
            Self::RepeatFullScan => "repeated full scan",
            Self::Resume => "resumed 5-row scan",
        })
    }
}

/// A failure that ends the run early. Teardown still runs.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("failed to allocate a host port: {0}")]
    PortAllocation(#[source] std::io::Error),

    #[error("error starting container: {0}")]
    Provision(#[from] ProvisionError),

    #[error("error waiting for connection: {0}")]
    Readiness(#[from] TimeoutError),

    #[error("error setting up the DB: {0}")]
    Connection(#[from] ConnectionError),

    #[error("error setting up the DB: {0}")]
    Schema(#[from] SchemaError),

    #[error("error seeding rows: {0}")]
    Seed(#[source] DriverError),

    #[error("error performing recreation ({step}): {source}")]
    Scan {
        step: ScanStep,
        #[source]
        source: ScanError,
    },
}

/// A failed run together with everything it recorded before failing.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct RunFailure {
    #[source]
    pub error: RunError,
    pub report: Box<RunReport>,
}
