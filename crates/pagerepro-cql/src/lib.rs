//! CQL session plumbing for the pagerepro harness.
//!
//! [`ConnectionSupervisor`] opens sessions and gates on server readiness,
//! [`SchemaBootstrapper`] creates the keyspace and table idempotently, and
//! [`PagedScanner`] runs capped, resumable scans. All three are generic over
//! the [`SessionConnector`] / [`CqlSession`] traits; [`ScyllaConnector`] is the
//! production implementation.

#![warn(clippy::pedantic)]

pub mod config;
pub mod driver;
pub mod error;
pub mod scanner;
pub mod schema;
pub mod session;
pub mod supervisor;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod topology;

pub use config::{ConnectionConfig, Credentials, TlsMaterial};
pub use driver::{ScyllaConnector, ScyllaSession};
pub use error::{ConnectionError, DriverError, ScanError, SchemaError, TimeoutError};
pub use scanner::{PagedScanner, ScanPage};
pub use schema::{IdempotentStatement, SchemaBootstrapper};
pub use session::{CqlSession, RowCursor, SessionConnector};
pub use supervisor::{ConnectionHandle, ConnectionSupervisor, ProbePolicy};
pub use topology::{build_topology, TlsOptions, Topology};
