//! Reproduction driver: provisions, connects, bootstraps, seeds, scans, and
//! always tears down.

use std::time::Duration;

use pagerepro_container::{
    ContainerLifecycleManager, ContainerRuntime, LocateError, CASSANDRA_IMAGE,
};
use pagerepro_cql::supervisor::SYSTEM_KEYSPACE;
use pagerepro_cql::{
    ConnectionError, ConnectionHandle, ConnectionSupervisor, PagedScanner, ProbePolicy, ScanError,
    SchemaBootstrapper, SessionConnector,
};
use pagerepro_types::{ContainerDescriptor, ContainerState, PageState, UserRecord};

use crate::ack::{DefectAcknowledger, DefectNotice};
use crate::config::EnvironmentConfig;
use crate::errors::{ConfigError, RunError, RunFailure, ScanStep};
use crate::port::allocate_port;
use crate::report::{Outcome, RunReport, TeardownStatus};
use crate::seed::{age_rng, fixture_records, seed_records, USERS_TABLE};

/// Driver page size for the bounded scans of the reproduction sequence. The
/// single-row scan's continuation then points past a full page of ten rows,
/// which is the paging state the server mishandles.
pub const SCAN_FETCH_SIZE: i32 = 10;

/// Resources acquired so far, released by teardown.
struct Acquired<S> {
    provision_attempted: bool,
    container: Option<ContainerDescriptor>,
    session: Option<ConnectionHandle<S>>,
}

impl<S> Acquired<S> {
    fn new() -> Self {
        Self {
            provision_attempted: false,
            container: None,
            session: None,
        }
    }
}

/// Runs one reproduction end to end.
///
/// Generic over the session connector, the container runtime, and what
/// happens when the defect fires, so every step can run against in-memory
/// doubles.
pub struct ReproductionDriver<C, R, A> {
    config: EnvironmentConfig,
    connector: C,
    containers: ContainerLifecycleManager<R>,
    acknowledger: A,
    probe: ProbePolicy,
}

impl<C, R, A> ReproductionDriver<C, R, A>
where
    C: SessionConnector + Clone,
    R: ContainerRuntime,
    A: DefectAcknowledger,
{
    pub fn new(config: EnvironmentConfig, connector: C, runtime: R, acknowledger: A) -> Self {
        Self {
            config,
            connector,
            containers: ContainerLifecycleManager::new(runtime),
            acknowledger,
            probe: ProbePolicy::default(),
        }
    }

    /// Build a driver from the `CASSANDRA_13592_*` environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable holds an invalid value.
    pub fn from_env(connector: C, runtime: R, acknowledger: A) -> Result<Self, ConfigError> {
        Ok(Self::new(
            EnvironmentConfig::from_env()?,
            connector,
            runtime,
            acknowledger,
        ))
    }

    #[must_use]
    pub fn with_probe_policy(mut self, probe: ProbePolicy) -> Self {
        self.probe = probe;
        self
    }

    #[must_use]
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.containers = self.containers.with_stop_grace(grace);
        self
    }

    /// Execute the run. Teardown happens before this returns, whatever the
    /// outcome.
    ///
    /// # Errors
    ///
    /// Returns [`RunFailure`] carrying the first fatal error and the partial
    /// report. Teardown problems are recorded in the report, never returned.
    pub async fn run(self) -> Result<RunReport, RunFailure> {
        let mut report = RunReport::new(&self.config);
        let mut acquired = Acquired::new();
        let records = fixture_records(&mut age_rng(self.config.seed));

        let result = self.execute(records, &mut acquired, &mut report).await;
        report.teardown = self.teardown(&mut acquired).await;

        match result {
            Ok(outcome) => {
                tracing::info!(%outcome, container = %self.config.name, "Reproduction finished");
                report.outcome = Some(outcome);
                Ok(report)
            }
            Err(error) => {
                tracing::error!(error = %error, container = %self.config.name, "Reproduction failed");
                Err(RunFailure {
                    error,
                    report: Box::new(report),
                })
            }
        }
    }

    async fn execute(
        &self,
        records: Vec<UserRecord>,
        acquired: &mut Acquired<C::Session>,
        report: &mut RunReport,
    ) -> Result<Outcome, RunError> {
        let cfg = &self.config;

        let port = match cfg.port {
            Some(port) => port,
            None => allocate_port().map_err(RunError::PortAllocation)?,
        };
        report.host_port = Some(port);
        tracing::info!(container = %cfg.name, host_port = port, "Starting Cassandra");

        acquired.provision_attempted = true;
        match self.containers.provision(&cfg.name, port).await {
            Ok(desc) => acquired.container = Some(desc),
            Err(e) => {
                if let Some(id) = &e.container_id {
                    acquired.container = Some(partial_descriptor(&cfg.name, id));
                }
                return Err(e.into());
            }
        }

        let supervisor =
            ConnectionSupervisor::new(self.connector.clone(), cfg.connection_config(port))
                .with_probe_policy(self.probe);
        supervisor
            .wait_until_ready(&cfg.host, port, cfg.timeout_attempts)
            .await?;

        let bootstrapper = SchemaBootstrapper::new();
        let mut admin = supervisor
            .open_session(supervisor.build_topology(Some(SYSTEM_KEYSPACE)))
            .await?;
        bootstrapper
            .ensure_keyspace(live(&admin)?, &cfg.keyspace)
            .await?;
        admin.close();

        let handle = acquired.session.insert(
            supervisor
                .open_session(supervisor.build_topology(Some(&cfg.keyspace)))
                .await?,
        );
        let session = live(handle)?;
        bootstrapper
            .ensure_table(session, USERS_TABLE, &cfg.keyspace)
            .await?;

        seed_records(session, USERS_TABLE, &records)
            .await
            .map_err(RunError::Seed)?;
        report.seeded = records;

        self.scan_sequence(session, report).await
    }

    /// Full scan, single-row scan, full scan again, then five rows resumed
    /// from the single-row continuation. The last step is where the server
    /// defect fires.
    async fn scan_sequence(
        &self,
        session: &C::Session,
        report: &mut RunReport,
    ) -> Result<Outcome, RunError> {
        let scanner = PagedScanner::new(session).with_fetch_size(SCAN_FETCH_SIZE);
        let start = PageState::start();

        tracing::info!("Query all");
        let all = scanner
            .scan(USERS_TABLE, 0, &start)
            .await
            .map_err(scan_failed(ScanStep::FullScan))?;
        log_records(&all.records);
        report.full_scan = all.records;

        tracing::info!("Query 1");
        let first = scanner
            .scan(USERS_TABLE, 1, &start)
            .await
            .map_err(scan_failed(ScanStep::SingleRow))?;
        log_records(&first.records);
        report.single_row = first.records;
        report.continuation_len = first.next.len();
        let continuation = first.next;

        tracing::info!("Query all again");
        let again = scanner
            .scan(USERS_TABLE, 0, &start)
            .await
            .map_err(scan_failed(ScanStep::RepeatFullScan))?;
        report.repeat_scan_count = Some(again.records.len());

        tracing::info!(continuation_len = continuation.len(), "Query next 5");
        match scanner.scan(USERS_TABLE, 5, &continuation).await {
            Ok(page) => {
                log_records(&page.records);
                report.resumed = page.records;
                Ok(Outcome::Completed)
            }
            Err(e) if e.is_known_defect() => {
                let notice = DefectNotice::new(&self.config.name, e.to_string());
                tracing::warn!(
                    error = %e,
                    hint = %notice.logs_hint,
                    "Server failed the resumed scan with the paging defect"
                );
                self.acknowledger.acknowledge(&notice).await;
                report.defect = Some(notice);
                Ok(Outcome::DefectReproduced)
            }
            Err(source) => Err(RunError::Scan {
                step: ScanStep::Resume,
                source,
            }),
        }
    }

    async fn teardown(&self, acquired: &mut Acquired<C::Session>) -> TeardownStatus {
        if let Some(mut handle) = acquired.session.take() {
            if handle.close() {
                tracing::info!(endpoint = %handle.topology().endpoint(), "Closed session");
            }
        }

        if !acquired.provision_attempted {
            return TeardownStatus::NothingToRemove;
        }

        let status = match acquired.container.as_mut() {
            Some(desc) if !desc.id.is_empty() => {
                match self.containers.destroy_descriptor(desc).await {
                    Ok(()) => TeardownStatus::Removed {
                        id: desc.id.clone(),
                    },
                    Err(e) => TeardownStatus::Failed {
                        message: e.to_string(),
                    },
                }
            }
            _ => remove_named(&self.containers, &self.config.name).await,
        };

        if let TeardownStatus::Failed { message } = &status {
            tracing::warn!(container = %self.config.name, error = %message, "Unable to remove container");
        }
        status
    }
}

/// Find container `name` and remove it. Cleans up after a run that died
/// before its own teardown.
pub async fn teardown_by_name<R: ContainerRuntime>(runtime: R, name: &str) -> TeardownStatus {
    let containers = ContainerLifecycleManager::new(runtime);
    remove_named(&containers, name).await
}

async fn remove_named<R: ContainerRuntime>(
    containers: &ContainerLifecycleManager<R>,
    name: &str,
) -> TeardownStatus {
    let mut desc = match containers.locate(name).await {
        Ok(desc) => desc,
        Err(LocateError::NotFound { .. }) => {
            tracing::info!(container = name, "No container to remove");
            return TeardownStatus::NothingToRemove;
        }
        Err(e) => {
            return TeardownStatus::Failed {
                message: e.to_string(),
            };
        }
    };
    match containers.destroy_descriptor(&mut desc).await {
        Ok(()) => TeardownStatus::Removed { id: desc.id },
        Err(e) => TeardownStatus::Failed {
            message: e.to_string(),
        },
    }
}

/// Descriptor for a container that was created but never reached `running`.
fn partial_descriptor(name: &str, id: &str) -> ContainerDescriptor {
    let mut desc = ContainerDescriptor::absent(name, CASSANDRA_IMAGE.reference());
    desc.id = id.to_string();
    desc.state = ContainerState::Created;
    desc
}

fn live<S>(handle: &ConnectionHandle<S>) -> Result<&S, RunError> {
    handle.session().map_err(|cause| {
        RunError::Connection(ConnectionError {
            endpoint: handle.topology().endpoint(),
            cause,
        })
    })
}

fn scan_failed(step: ScanStep) -> impl FnOnce(ScanError) -> RunError {
    move |source| RunError::Scan { step, source }
}

fn log_records(records: &[UserRecord]) {
    for record in records {
        tracing::info!(%record, "Row");
    }
}
