//! Seams between the harness components and a concrete CQL driver.
//!
//! The supervisor, bootstrapper, and scanner only talk to these traits, so
//! the same logic runs against a live cluster ([`ScyllaConnector`]) and the
//! in-memory doubles in `testing`.
//!
//! [`ScyllaConnector`]: crate::ScyllaConnector

use std::future::Future;

use pagerepro_types::{PageState, UserRecord};

use crate::error::DriverError;
use crate::topology::Topology;

/// Opens sessions from a [`Topology`].
pub trait SessionConnector: Send + Sync {
    type Session: CqlSession;

    /// Perform the network handshake.
    fn connect(
        &self,
        topology: &Topology,
    ) -> impl Future<Output = Result<Self::Session, DriverError>> + Send;
}

/// An established session. Dropping it releases the connection pool.
pub trait CqlSession: Send + Sync {
    type Cursor: RowCursor;

    /// Run a statement that returns no rows (DDL).
    fn execute(&self, cql: &str) -> impl Future<Output = Result<(), DriverError>> + Send;

    /// Insert one row into `table` of the bound keyspace.
    fn insert_user(
        &self,
        table: &str,
        record: &UserRecord,
    ) -> impl Future<Output = Result<(), DriverError>> + Send;

    /// Start `SELECT first_name, last_name, age FROM table`.
    ///
    /// `fetch_size` is the driver page size (`None` for the driver default).
    /// A non-empty `state` resumes a previous scan of the same query.
    fn open_user_scan(
        &self,
        table: &str,
        fetch_size: Option<i32>,
        state: &PageState,
    ) -> impl Future<Output = Result<Self::Cursor, DriverError>> + Send;
}

/// Row iterator over one scan. Fetches further pages on demand.
///
/// Callers must [`close`](RowCursor::close) it on every path.
pub trait RowCursor: Send {
    /// Next row, fetching the next driver page when the buffer is drained.
    fn next_row(&mut self) -> impl Future<Output = Result<Option<UserRecord>, DriverError>> + Send;

    /// Paging state after the most recently fetched page. Empty once the
    /// result set is exhausted.
    fn page_state(&self) -> PageState;

    /// Release driver-side resources, surfacing any deferred error.
    fn close(self) -> impl Future<Output = Result<(), DriverError>> + Send;
}
