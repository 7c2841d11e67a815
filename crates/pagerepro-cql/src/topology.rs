//! Pure construction of cluster connection parameters.

use std::path::PathBuf;
use std::time::Duration;

use scylla::statement::Consistency;

use crate::config::{ConnectionConfig, Credentials};

/// Connect timeout used for regular (non-probe) sessions.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// TLS options attached to a topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsOptions {
    pub ca_path: PathBuf,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    /// Always `false` here. Test-environment trust model: the peer
    /// certificate and host name are not checked. Do not reuse this outside
    /// a disposable local cluster.
    pub verify_peer: bool,
}

/// Everything a [`SessionConnector`](crate::SessionConnector) needs to open a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub hosts: Vec<String>,
    pub port: u16,
    /// Keyspace to bind the session to, if any.
    pub keyspace: Option<String>,
    pub consistency: Consistency,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub credentials: Option<Credentials>,
    pub tls: Option<TlsOptions>,
}

impl Topology {
    /// `host:port` pairs for every known node.
    #[must_use]
    pub fn known_nodes(&self) -> Vec<String> {
        self.hosts
            .iter()
            .map(|host| format!("{host}:{}", self.port))
            .collect()
    }

    /// `host:port` of the first node, for log and error context.
    #[must_use]
    pub fn endpoint(&self) -> String {
        self.known_nodes()
            .into_iter()
            .next()
            .unwrap_or_else(|| format!("<none>:{}", self.port))
    }
}

/// Assemble connection parameters for `keyspace` from `config`.
///
/// Consistency is always quorum. TLS is attached only when the CA,
/// certificate, and key paths are all present.
#[must_use]
pub fn build_topology(config: &ConnectionConfig, keyspace: Option<&str>) -> Topology {
    let tls = config.tls.complete().map(|(ca, cert, key)| TlsOptions {
        ca_path: ca.clone(),
        cert_path: cert.clone(),
        key_path: key.clone(),
        verify_peer: false,
    });

    Topology {
        hosts: config.hosts.clone(),
        port: config.port,
        keyspace: keyspace.map(str::to_string),
        consistency: Consistency::Quorum,
        request_timeout: config.request_timeout,
        connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        credentials: config.credentials.clone(),
        tls,
    }
}
