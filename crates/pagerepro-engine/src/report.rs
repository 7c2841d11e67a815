//! What a reproduction run observed.

use pagerepro_types::UserRecord;
use serde::Serialize;

use crate::ack::DefectNotice;
use crate::config::EnvironmentConfig;

/// How a run that reached the end of the scan sequence finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The resumed scan returned rows; the defect did not fire.
    Completed,
    /// The resumed scan failed with the server `NullPointerException`.
    DefectReproduced,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Completed => "completed",
            Self::DefectReproduced => "defect reproduced",
        })
    }
}

/// Result of the final cleanup step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TeardownStatus {
    NotRun,
    /// No container was provisioned or none was found by name.
    NothingToRemove,
    Removed { id: String },
    Failed { message: String },
}

impl TeardownStatus {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Everything a run recorded, filled in step by step.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub container_name: String,
    pub keyspace: String,
    pub host_port: Option<u16>,
    /// `None` when the run failed before the scan sequence finished.
    pub outcome: Option<Outcome>,
    pub seeded: Vec<UserRecord>,
    pub full_scan: Vec<UserRecord>,
    pub single_row: Vec<UserRecord>,
    /// Byte length of the continuation captured after the single-row scan.
    pub continuation_len: usize,
    pub repeat_scan_count: Option<usize>,
    pub resumed: Vec<UserRecord>,
    pub defect: Option<DefectNotice>,
    pub teardown: TeardownStatus,
}

impl RunReport {
    #[must_use]
    pub fn new(config: &EnvironmentConfig) -> Self {
        Self {
            container_name: config.name.clone(),
            keyspace: config.keyspace.clone(),
            host_port: config.port,
            outcome: None,
            seeded: Vec::new(),
            full_scan: Vec::new(),
            single_row: Vec::new(),
            continuation_len: 0,
            repeat_scan_count: None,
            resumed: Vec::new(),
            defect: None,
            teardown: TeardownStatus::NotRun,
        }
    }
}
