//! Run configuration from `CASSANDRA_13592_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use pagerepro_cql::{ConnectionConfig, Credentials, TlsMaterial};

use crate::errors::ConfigError;

/// Prefix shared by every variable the harness reads.
pub const ENV_PREFIX: &str = "CASSANDRA_13592_";

pub const DEFAULT_KEYSPACE: &str = "recreation";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_CONTAINER_NAME: &str = "recreation";
/// Readiness probe attempts, roughly one per second.
pub const DEFAULT_TIMEOUT_ATTEMPTS: u32 = 30;

const MAX_KEYSPACE_LEN: usize = 48;

/// Validated settings for one reproduction run.
#[derive(Clone, PartialEq, Eq)]
pub struct EnvironmentConfig {
    pub keyspace: String,
    pub host: String,
    /// `None` means allocate an ephemeral host port.
    pub port: Option<u16>,
    pub name: String,
    pub timeout_attempts: u32,
    pub user: Option<String>,
    pub password: String,
    pub ca: Option<PathBuf>,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            keyspace: DEFAULT_KEYSPACE.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: None,
            name: DEFAULT_CONTAINER_NAME.to_string(),
            timeout_attempts: DEFAULT_TIMEOUT_ATTEMPTS,
            user: None,
            password: String::new(),
            ca: None,
            cert: None,
            key: None,
            seed: None,
        }
    }
}

impl std::fmt::Debug for EnvironmentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentConfig")
            .field("keyspace", &self.keyspace)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("timeout_attempts", &self.timeout_attempts)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("ca", &self.ca)
            .field("cert", &self.cert)
            .field("key", &self.key)
            .field("seed", &self.seed)
            .finish()
    }
}

impl EnvironmentConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load using `lookup` to resolve fully prefixed variable names.
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any variable is set to an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };
        let defaults = Self::default();

        let keyspace = vars.string("KEYSPACE").unwrap_or(defaults.keyspace);
        if !is_keyspace_name(&keyspace) {
            return Err(invalid(
                "KEYSPACE",
                &keyspace,
                "expected a CQL identifier ([A-Za-z][A-Za-z0-9_]*, at most 48 chars)",
            ));
        }

        let name = vars.string("NAME").unwrap_or(defaults.name);
        if !is_container_name(&name) {
            return Err(invalid(
                "NAME",
                &name,
                "expected a container name ([A-Za-z0-9][A-Za-z0-9_.-]*)",
            ));
        }

        let port = vars
            .parsed::<u16>("PORT", "expected a port number")?
            .filter(|p| *p != 0);

        Ok(Self {
            keyspace,
            host: vars.string("HOST").unwrap_or(defaults.host),
            port,
            name,
            timeout_attempts: vars
                .parsed("TIMEOUT", "expected a whole number of seconds")?
                .unwrap_or(defaults.timeout_attempts),
            user: vars.string("USER"),
            password: vars.string("PASSWORD").unwrap_or_default(),
            ca: vars.string("CA").map(PathBuf::from),
            cert: vars.string("CERT").map(PathBuf::from),
            key: vars.string("KEY").map(PathBuf::from),
            seed: vars.parsed("SEED", "expected an unsigned 64-bit integer")?,
        })
    }

    /// Credentials when a user is configured.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        self.user.as_ref().map(|username| Credentials {
            username: username.clone(),
            password: self.password.clone(),
        })
    }

    #[must_use]
    pub fn tls_material(&self) -> TlsMaterial {
        TlsMaterial {
            ca: self.ca.clone(),
            cert: self.cert.clone(),
            key: self.key.clone(),
        }
    }

    /// Session settings for a database reachable on `port`.
    #[must_use]
    pub fn connection_config(&self, port: u16) -> ConnectionConfig {
        ConnectionConfig::new(self.host.clone(), port, self.keyspace.clone())
            .with_credentials(self.credentials())
            .with_tls(self.tls_material())
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn string(&self, suffix: &str) -> Option<String> {
        (self.lookup)(&format!("{ENV_PREFIX}{suffix}")).filter(|v| !v.is_empty())
    }

    fn parsed<T: FromStr>(&self, suffix: &str, reason: &str) -> Result<Option<T>, ConfigError> {
        match self.string(suffix) {
            None => Ok(None),
            Some(raw) => match raw.trim().parse() {
                Ok(v) => Ok(Some(v)),
                Err(_) => Err(invalid(suffix, &raw, reason)),
            },
        }
    }
}

fn invalid(suffix: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var: format!("{ENV_PREFIX}{suffix}"),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn is_keyspace_name(name: &str) -> bool {
    let mut chars = name.chars();
    name.len() <= MAX_KEYSPACE_LEN
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_container_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}
