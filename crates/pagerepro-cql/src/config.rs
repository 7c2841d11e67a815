//! Connection settings for the column-store session.

use std::path::PathBuf;
use std::time::Duration;

/// Default request timeout applied to every statement.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Username/password authenticator settings.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Paths to PEM files for mutual TLS. TLS is enabled only when all three are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsMaterial {
    pub ca: Option<PathBuf>,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
}

impl TlsMaterial {
    /// `(ca, cert, key)` when every path is present.
    #[must_use]
    pub fn complete(&self) -> Option<(&PathBuf, &PathBuf, &PathBuf)> {
        match (&self.ca, &self.cert, &self.key) {
            (Some(ca), Some(cert), Some(key)) => Some((ca, cert, key)),
            _ => None,
        }
    }
}

/// Immutable connection settings owned by the
/// [`ConnectionSupervisor`](crate::ConnectionSupervisor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub hosts: Vec<String>,
    pub port: u16,
    pub credentials: Option<Credentials>,
    pub tls: TlsMaterial,
    /// Keyspace the working session is bound to.
    pub keyspace: String,
    pub request_timeout: Duration,
}

impl ConnectionConfig {
    /// Single-host config with no auth, no TLS, and the default timeout.
    pub fn new(host: impl Into<String>, port: u16, keyspace: impl Into<String>) -> Self {
        Self {
            hosts: vec![host.into()],
            port,
            credentials: None,
            tls: TlsMaterial::default(),
            keyspace: keyspace.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    #[must_use]
    pub fn with_tls(mut self, tls: TlsMaterial) -> Self {
        self.tls = tls;
        self
    }

    /// `host:port` of the first host, for log and error context.
    #[must_use]
    pub fn endpoint(&self) -> String {
        let host = self.hosts.first().map_or("<none>", String::as_str);
        format!("{host}:{}", self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_tls_material_is_incomplete() {
        let tls = TlsMaterial {
            ca: Some("ca.pem".into()),
            cert: Some("cert.pem".into()),
            key: None,
        };
        assert!(tls.complete().is_none());
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials {
            username: "cassandra".into(),
            password: "hunter2".into(),
        };
        let dbg = format!("{creds:?}");
        assert!(dbg.contains("cassandra"));
        assert!(!dbg.contains("hunter2"));
    }

    #[test]
    fn endpoint_uses_first_host() {
        let mut cfg = ConnectionConfig::new("10.0.0.1", 9142, "recreation");
        cfg.hosts.push("10.0.0.2".into());
        assert_eq!(cfg.endpoint(), "10.0.0.1:9142");
    }
}
