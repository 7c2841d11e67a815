//! `scylla`-backed [`SessionConnector`] for live Cassandra clusters.

use std::collections::VecDeque;
use std::sync::Arc;

use openssl::ssl::{SslContext, SslContextBuilder, SslFiletype, SslMethod, SslVerifyMode};
use scylla::query::Query;
use scylla::statement::{PagingState, PagingStateResponse};
use scylla::transport::errors::{NewSessionError, QueryError};
use scylla::{ExecutionProfile, QueryResult, Session, SessionBuilder};

use pagerepro_types::{PageState, UserRecord};

use crate::error::DriverError;
use crate::session::{CqlSession, RowCursor, SessionConnector};
use crate::topology::{TlsOptions, Topology};

const USER_COLUMNS: &str = "first_name, last_name, age";

/// Opens [`ScyllaSession`]s over the CQL native protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScyllaConnector;

impl SessionConnector for ScyllaConnector {
    type Session = ScyllaSession;

    async fn connect(&self, topology: &Topology) -> Result<ScyllaSession, DriverError> {
        let profile = ExecutionProfile::builder()
            .consistency(topology.consistency)
            .request_timeout(Some(topology.request_timeout))
            .build();

        let mut builder = SessionBuilder::new()
            .known_nodes(topology.known_nodes())
            .connection_timeout(topology.connect_timeout)
            .default_execution_profile_handle(profile.into_handle());

        if let Some(keyspace) = &topology.keyspace {
            builder = builder.use_keyspace(keyspace, false);
        }
        if let Some(creds) = &topology.credentials {
            builder = builder.user(&creds.username, &creds.password);
        }
        if let Some(tls) = &topology.tls {
            builder = builder.ssl_context(Some(ssl_context(tls)?));
        }

        let session = builder.build().await.map_err(map_session_error)?;
        tracing::debug!(endpoint = %topology.endpoint(), keyspace = ?topology.keyspace, "CQL session established");
        Ok(ScyllaSession {
            inner: Arc::new(session),
        })
    }
}

fn ssl_context(tls: &TlsOptions) -> Result<SslContext, DriverError> {
    let tls_err = |what: &str, e: openssl::error::ErrorStack| DriverError::Tls {
        message: format!("{what}: {e}"),
    };

    let mut ctx = SslContextBuilder::new(SslMethod::tls()).map_err(|e| tls_err("context", e))?;
    ctx.set_ca_file(&tls.ca_path)
        .map_err(|e| tls_err(&format!("ca file {}", tls.ca_path.display()), e))?;
    ctx.set_certificate_file(&tls.cert_path, SslFiletype::PEM)
        .map_err(|e| tls_err(&format!("cert file {}", tls.cert_path.display()), e))?;
    ctx.set_private_key_file(&tls.key_path, SslFiletype::PEM)
        .map_err(|e| tls_err(&format!("key file {}", tls.key_path.display()), e))?;
    // Local test clusters use self-signed certs without matching host names.
    ctx.set_verify(if tls.verify_peer {
        SslVerifyMode::PEER
    } else {
        SslVerifyMode::NONE
    });
    Ok(ctx.build())
}

fn map_session_error(err: NewSessionError) -> DriverError {
    DriverError::transport(err.to_string())
}

fn map_query_error(err: QueryError) -> DriverError {
    match err {
        QueryError::DbError(_, message) => DriverError::Server { message },
        other => DriverError::transport(other.to_string()),
    }
}

fn decode_err(err: impl std::fmt::Display) -> DriverError {
    DriverError::Decode {
        message: err.to_string(),
    }
}

fn decode_users(result: QueryResult) -> Result<VecDeque<UserRecord>, DriverError> {
    let rows = result.into_rows_result().map_err(decode_err)?;
    let typed = rows.rows::<(String, String, i32)>().map_err(decode_err)?;
    typed
        .map(|row| {
            row.map(|(first_name, last_name, age)| UserRecord {
                first_name,
                last_name,
                age,
            })
            .map_err(decode_err)
        })
        .collect()
}

/// Live session. Cheap to clone; the pool closes when the last clone drops.
#[derive(Clone)]
pub struct ScyllaSession {
    inner: Arc<Session>,
}

impl CqlSession for ScyllaSession {
    type Cursor = ScyllaCursor;

    async fn execute(&self, cql: &str) -> Result<(), DriverError> {
        tracing::debug!(cql, "executing statement");
        self.inner
            .query_unpaged(cql, ())
            .await
            .map(|_| ())
            .map_err(map_query_error)
    }

    async fn insert_user(&self, table: &str, record: &UserRecord) -> Result<(), DriverError> {
        let cql = format!("INSERT INTO {table} ({USER_COLUMNS}) VALUES (?, ?, ?)");
        self.inner
            .query_unpaged(
                cql,
                (
                    record.first_name.as_str(),
                    record.last_name.as_str(),
                    record.age,
                ),
            )
            .await
            .map(|_| ())
            .map_err(map_query_error)
    }

    async fn open_user_scan(
        &self,
        table: &str,
        fetch_size: Option<i32>,
        state: &PageState,
    ) -> Result<ScyllaCursor, DriverError> {
        let mut query = Query::new(format!("SELECT {USER_COLUMNS} FROM {table}"));
        if let Some(size) = fetch_size {
            query.set_page_size(size);
        }
        let paging = if state.is_empty() {
            PagingState::start()
        } else {
            PagingState::new_from_raw_bytes(state.as_driver_bytes().to_vec())
        };

        let mut cursor = ScyllaCursor {
            session: Arc::clone(&self.inner),
            query,
            buffered: VecDeque::new(),
            next_page: None,
        };
        cursor.fetch(paging).await?;
        Ok(cursor)
    }
}

/// Page-at-a-time cursor. Each fetch is a single request/response, so no
/// server-side stream stays open between calls.
pub struct ScyllaCursor {
    session: Arc<Session>,
    query: Query,
    buffered: VecDeque<UserRecord>,
    /// Paging state of the page after the last fetched one, if any.
    next_page: Option<PagingState>,
}

impl ScyllaCursor {
    async fn fetch(&mut self, paging: PagingState) -> Result<(), DriverError> {
        let (result, response) = self
            .session
            .query_single_page(self.query.clone(), (), paging)
            .await
            .map_err(map_query_error)?;
        self.buffered = decode_users(result)?;
        self.next_page = match response {
            PagingStateResponse::HasMorePages { state } => Some(state),
            PagingStateResponse::NoMorePages => None,
        };
        Ok(())
    }
}

impl RowCursor for ScyllaCursor {
    async fn next_row(&mut self) -> Result<Option<UserRecord>, DriverError> {
        loop {
            if let Some(row) = self.buffered.pop_front() {
                return Ok(Some(row));
            }
            // Servers may return empty pages that still carry more-pages state.
            let Some(paging) = self.next_page.take() else {
                return Ok(None);
            };
            self.fetch(paging).await?;
        }
    }

    fn page_state(&self) -> PageState {
        self.next_page
            .as_ref()
            .and_then(PagingState::as_bytes_slice)
            .map(|bytes| PageState::from_driver_bytes(bytes.to_vec()))
            .unwrap_or_default()
    }

    async fn close(self) -> Result<(), DriverError> {
        drop(self);
        Ok(())
    }
}
