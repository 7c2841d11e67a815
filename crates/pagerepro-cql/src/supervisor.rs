//! Session ownership and the readiness gate.

use std::time::Duration;

use crate::config::ConnectionConfig;
use crate::error::{ConnectionError, DriverError, TimeoutError};
use crate::session::SessionConnector;
use crate::topology::{build_topology, Topology};

/// Keyspace every Cassandra node has; used for admin and probe sessions.
pub const SYSTEM_KEYSPACE: &str = "system";

/// Pacing for [`ConnectionSupervisor::wait_until_ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbePolicy {
    /// Sleep between failed attempts.
    pub interval: Duration,
    /// Connect and request timeout of each throwaway session.
    pub attempt_timeout: Duration,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(6),
        }
    }
}

/// An open session plus the topology it was created from.
///
/// [`close`](Self::close) is idempotent; dropping the handle also releases
/// the session.
pub struct ConnectionHandle<S> {
    session: Option<S>,
    topology: Topology,
}

impl<S> ConnectionHandle<S> {
    /// Borrow the live session.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Closed`] after [`close`](Self::close).
    pub fn session(&self) -> Result<&S, DriverError> {
        self.session.as_ref().ok_or(DriverError::Closed)
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Release the session. Returns `true` if this call closed it.
    pub fn close(&mut self) -> bool {
        let closed = self.session.take().is_some();
        if closed {
            tracing::debug!(endpoint = %self.topology.endpoint(), "CQL session closed");
        }
        closed
    }
}

impl<S> std::fmt::Debug for ConnectionHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("open", &self.is_open())
            .field("topology", &self.topology)
            .finish()
    }
}

/// Builds topologies and opens sessions for one [`ConnectionConfig`].
pub struct ConnectionSupervisor<C> {
    connector: C,
    config: ConnectionConfig,
    probe: ProbePolicy,
}

impl<C: SessionConnector> ConnectionSupervisor<C> {
    pub fn new(connector: C, config: ConnectionConfig) -> Self {
        Self {
            connector,
            config,
            probe: ProbePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_probe_policy(mut self, probe: ProbePolicy) -> Self {
        self.probe = probe;
        self
    }

    /// Topology for a session bound to `keyspace` (or unbound for `None`).
    pub fn build_topology(&self, keyspace: Option<&str>) -> Topology {
        build_topology(&self.config, keyspace)
    }

    /// Open a session.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] when the service is unreachable,
    /// authentication fails, or TLS setup/negotiation fails.
    pub async fn open_session(
        &self,
        topology: Topology,
    ) -> Result<ConnectionHandle<C::Session>, ConnectionError> {
        match self.connector.connect(&topology).await {
            Ok(session) => Ok(ConnectionHandle {
                session: Some(session),
                topology,
            }),
            Err(cause) => Err(ConnectionError {
                endpoint: topology.endpoint(),
                cause,
            }),
        }
    }

    /// Poll `host:port` until a throwaway `system` session succeeds.
    ///
    /// Makes at most `timeout_seconds` attempts, sleeping the probe interval
    /// after each failure. A successful probe session is closed immediately.
    ///
    /// # Errors
    ///
    /// Returns [`TimeoutError`] once every attempt has failed.
    pub async fn wait_until_ready(
        &self,
        host: &str,
        port: u16,
        timeout_seconds: u32,
    ) -> Result<(), TimeoutError> {
        let mut topology = build_topology(&self.config, Some(SYSTEM_KEYSPACE));
        topology.hosts = vec![host.to_string()];
        topology.port = port;
        topology.connect_timeout = self.probe.attempt_timeout;
        topology.request_timeout = self.probe.attempt_timeout;

        let endpoint = topology.endpoint();
        tracing::info!(%endpoint, max_attempts = timeout_seconds, "Waiting for database");

        let mut last_cause = None;
        let mut attempts = 0;
        while attempts < timeout_seconds {
            attempts += 1;
            match self.connector.connect(&topology).await {
                Ok(session) => {
                    drop(session);
                    tracing::info!(%endpoint, attempts, "Database is accepting connections");
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!(%endpoint, attempt = attempts, error = %e, "Database not ready");
                    last_cause = Some(e);
                    if attempts < timeout_seconds {
                        tokio::time::sleep(self.probe.interval).await;
                    }
                }
            }
        }

        Err(TimeoutError {
            endpoint,
            attempts,
            last_cause,
        })
    }
}
