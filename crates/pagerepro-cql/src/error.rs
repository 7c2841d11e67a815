//! Error types for session, schema, and scan operations.

/// Message the server attaches when the paging defect fires.
pub const NULL_POINTER_SIGNATURE: &str = "java.lang.NullPointerException";

/// Failure reported by a [`CqlSession`](crate::CqlSession) implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    /// The server executed the request and returned an error.
    #[error("server error: {message}")]
    Server { message: String },

    /// The request never got a server answer (refused, reset, timed out).
    #[error("transport error: {message}")]
    Transport { message: String },

    /// TLS material could not be loaded or the TLS context could not be built.
    #[error("tls setup failed: {message}")]
    Tls { message: String },

    /// A returned row did not match `(text, text, int)`.
    #[error("row decode failed: {message}")]
    Decode { message: String },

    /// The session was already released.
    #[error("session is closed")]
    Closed,
}

impl DriverError {
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Server-side `NullPointerException`, the signature of the paging defect.
    #[must_use]
    pub fn is_null_pointer(&self) -> bool {
        matches!(self, Self::Server { message } if message.contains(NULL_POINTER_SIGNATURE))
    }
}

/// Opening a session failed.
#[derive(Debug, thiserror::Error)]
#[error("failed to open session to {endpoint}: {cause}")]
pub struct ConnectionError {
    pub endpoint: String,
    #[source]
    pub cause: DriverError,
}

/// The readiness probe ran out of attempts.
#[derive(Debug, thiserror::Error)]
#[error("database at {endpoint} not ready after {attempts} attempt(s)")]
pub struct TimeoutError {
    pub endpoint: String,
    pub attempts: u32,
    #[source]
    pub last_cause: Option<DriverError>,
}

/// Keyspace or table bootstrap failed.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Name is not a plain CQL identifier; nothing was sent to the server.
    #[error("invalid {kind} name '{name}'")]
    InvalidIdentifier { kind: &'static str, name: String },

    #[error("schema statement failed ({statement}): {cause}")]
    Statement {
        statement: String,
        #[source]
        cause: DriverError,
    },
}

/// A paged scan failed.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("invalid table name '{name}'")]
    InvalidIdentifier { name: String },

    #[error("scan failed: {0}")]
    Driver(#[from] DriverError),
}

impl ScanError {
    /// Whether this is the server `NullPointerException` the harness exists
    /// to reproduce, as opposed to an unrelated failure.
    #[must_use]
    pub fn is_known_defect(&self) -> bool {
        match self {
            Self::Driver(e) => e.is_null_pointer(),
            Self::InvalidIdentifier { .. } => false,
        }
    }
}
