//! Idempotent keyspace and table bootstrap.

use crate::error::SchemaError;
use crate::session::CqlSession;

const MAX_IDENTIFIER_LEN: usize = 48;

/// Whether `name` is a plain unquoted CQL identifier.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && name.len() <= MAX_IDENTIFIER_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_identifier(kind: &'static str, name: &str) -> Result<(), SchemaError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier {
            kind,
            name: name.to_string(),
        })
    }
}

/// A schema statement that is safe to retry: running it again after it has
/// already succeeded changes nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdempotentStatement {
    /// `SimpleStrategy` keyspace with the given replication factor.
    CreateKeyspace { name: String, replication_factor: u8 },
    /// The fixed `users` schema keyed by `(first_name, last_name)`.
    CreateUsersTable { keyspace: String, table: String },
}

impl IdempotentStatement {
    /// CQL text. Always carries `IF NOT EXISTS`.
    #[must_use]
    pub fn to_cql(&self) -> String {
        match self {
            Self::CreateKeyspace {
                name,
                replication_factor,
            } => format!(
                "CREATE KEYSPACE IF NOT EXISTS {name} WITH replication = \
                 {{ 'class' : 'SimpleStrategy', 'replication_factor' : {replication_factor} }}"
            ),
            Self::CreateUsersTable { keyspace, table } => format!(
                "CREATE TABLE IF NOT EXISTS {keyspace}.{table} (\
                 first_name text, last_name text, age int, \
                 PRIMARY KEY (first_name, last_name))"
            ),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::CreateKeyspace { name, .. } => format!("create keyspace {name}"),
            Self::CreateUsersTable { keyspace, table } => format!("create table {keyspace}.{table}"),
        }
    }

    /// Run against `session`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Statement`] when the driver rejects it.
    pub async fn apply<S: CqlSession>(&self, session: &S) -> Result<(), SchemaError> {
        session
            .execute(&self.to_cql())
            .await
            .map_err(|cause| SchemaError::Statement {
                statement: self.describe(),
                cause,
            })
    }
}

/// Ensures the target keyspace and table exist.
#[derive(Debug, Clone, Copy)]
pub struct SchemaBootstrapper {
    replication_factor: u8,
}

impl Default for SchemaBootstrapper {
    fn default() -> Self {
        Self {
            replication_factor: 1,
        }
    }
}

impl SchemaBootstrapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create keyspace `name` if missing. `admin` should be bound to the
    /// `system` keyspace.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] for a malformed name (before anything is sent)
    /// or a driver failure.
    pub async fn ensure_keyspace<S: CqlSession>(
        &self,
        admin: &S,
        name: &str,
    ) -> Result<(), SchemaError> {
        check_identifier("keyspace", name)?;
        IdempotentStatement::CreateKeyspace {
            name: name.to_string(),
            replication_factor: self.replication_factor,
        }
        .apply(admin)
        .await?;
        tracing::info!(keyspace = name, "Keyspace ready");
        Ok(())
    }

    /// Create `keyspace.name` with the `users` schema if missing.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] for a malformed name (before anything is sent)
    /// or a driver failure.
    pub async fn ensure_table<S: CqlSession>(
        &self,
        session: &S,
        name: &str,
        keyspace: &str,
    ) -> Result<(), SchemaError> {
        check_identifier("keyspace", keyspace)?;
        check_identifier("table", name)?;
        IdempotentStatement::CreateUsersTable {
            keyspace: keyspace.to_string(),
            table: name.to_string(),
        }
        .apply(session)
        .await?;
        tracing::info!(keyspace, table = name, "Table ready");
        Ok(())
    }
}
