//! In-memory CQL doubles for tests.
//!
//! [`MemoryCluster`] keeps keyspaces, tables, and rows in a shared map and
//! hands out [`MemoryConnector`]s and [`MemorySession`]s that implement the
//! session traits. Paging tokens are opaque offsets tied to the table they
//! came from. Faults can be injected per operation, and counters expose open
//! sessions and cursor hygiene for assertions.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pagerepro_types::{PageState, UserRecord};

use crate::error::{DriverError, NULL_POINTER_SIGNATURE};
use crate::session::{CqlSession, RowCursor, SessionConnector};
use crate::supervisor::SYSTEM_KEYSPACE;
use crate::topology::Topology;

const DEFAULT_FETCH_SIZE: usize = 5000;
const TOKEN_PREFIX: &str = "memq:";

type TableKey = (String, String);
type RowKey = (String, String);

#[derive(Default)]
struct ClusterState {
    keyspaces: BTreeSet<String>,
    tables: BTreeMap<TableKey, BTreeMap<RowKey, i32>>,
    statements: Vec<String>,

    connect_attempts: usize,
    refuse_connections: usize,
    connections_allowed: Option<usize>,
    last_topology: Option<Topology>,
    open_sessions: usize,

    default_fetch_size: Option<usize>,
    last_fetch_size: Option<i32>,
    cursors_opened: usize,
    cursors_closed: usize,

    failing_statements: Vec<String>,
    scan_failure: Option<DriverError>,
    close_failure: Option<DriverError>,
    null_pointer_on_resume: bool,
}

/// Shared in-memory cluster state.
#[derive(Clone, Default)]
pub struct MemoryCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl MemoryCluster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            cluster: self.clone(),
        }
    }

    /// A session bound to `keyspace`, bypassing connect checks.
    #[must_use]
    pub fn session(&self, keyspace: &str) -> MemorySession {
        self.state().open_sessions += 1;
        MemorySession {
            cluster: self.clone(),
            keyspace: keyspace.to_string(),
        }
    }

    /// Refuse every connection attempt from now on.
    pub fn refuse_all_connections(&self) {
        self.state().refuse_connections = usize::MAX;
    }

    /// Refuse the next `n` connection attempts.
    pub fn refuse_next_connections(&self, n: usize) {
        self.state().refuse_connections = n;
    }

    /// Accept `n` more connections, then refuse every later attempt.
    pub fn refuse_connections_after(&self, n: usize) {
        self.state().connections_allowed = Some(n);
    }

    /// Fail any statement (DDL or insert) whose CQL contains `pattern`.
    pub fn fail_statements_containing(&self, pattern: &str) {
        self.state().failing_statements.push(pattern.to_string());
    }

    /// Fail the first row read of every scan with `error`.
    pub fn fail_scans_with(&self, error: DriverError) {
        self.state().scan_failure = Some(error);
    }

    /// Fail every cursor close with `error`. The cursor still counts as closed.
    pub fn fail_cursor_close_with(&self, error: DriverError) {
        self.state().close_failure = Some(error);
    }

    /// Make every resumed scan fail with the server `NullPointerException`.
    pub fn null_pointer_on_resume(&self, enabled: bool) {
        self.state().null_pointer_on_resume = enabled;
    }

    /// Driver page size used when a scan does not ask for one.
    pub fn set_default_fetch_size(&self, size: usize) {
        self.state().default_fetch_size = Some(size.max(1));
    }

    /// Create keyspace and table directly, without recording a statement.
    pub fn create_users_table(&self, keyspace: &str, table: &str) {
        let mut state = self.state();
        state.keyspaces.insert(keyspace.to_string());
        state
            .tables
            .entry((keyspace.to_string(), table.to_string()))
            .or_default();
    }

    /// Upsert a row directly. Creates the table if needed.
    pub fn insert(&self, keyspace: &str, table: &str, record: UserRecord) {
        self.create_users_table(keyspace, table);
        let mut state = self.state();
        if let Some(rows) = state.tables.get_mut(&(keyspace.to_string(), table.to_string())) {
            rows.insert((record.first_name, record.last_name), record.age);
        }
    }

    /// Rows of `keyspace.table` in key order.
    #[must_use]
    pub fn rows(&self, keyspace: &str, table: &str) -> Vec<UserRecord> {
        self.state()
            .tables
            .get(&(keyspace.to_string(), table.to_string()))
            .map(to_records)
            .unwrap_or_default()
    }

    /// User keyspaces (excluding `system`).
    #[must_use]
    pub fn keyspaces(&self) -> Vec<String> {
        self.state().keyspaces.iter().cloned().collect()
    }

    #[must_use]
    pub fn tables(&self) -> Vec<(String, String)> {
        self.state().tables.keys().cloned().collect()
    }

    /// Every statement passed to `execute`, in order.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.state().statements.clone()
    }

    #[must_use]
    pub fn connect_attempts(&self) -> usize {
        self.state().connect_attempts
    }

    #[must_use]
    pub fn last_topology(&self) -> Option<Topology> {
        self.state().last_topology.clone()
    }

    /// Sessions created and not yet dropped.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.state().open_sessions
    }

    /// Fetch size requested by the most recent scan (`None` when unbounded).
    #[must_use]
    pub fn last_fetch_size(&self) -> Option<i32> {
        self.state().last_fetch_size
    }

    #[must_use]
    pub fn cursors_opened(&self) -> usize {
        self.state().cursors_opened
    }

    /// Cursors explicitly closed through [`RowCursor::close`].
    #[must_use]
    pub fn cursors_closed(&self) -> usize {
        self.state().cursors_closed
    }
}

fn to_records(rows: &BTreeMap<RowKey, i32>) -> Vec<UserRecord> {
    rows.iter()
        .map(|((first, last), age)| UserRecord::new(first.clone(), last.clone(), *age))
        .collect()
}

fn encode_token(table: &str, offset: usize) -> PageState {
    PageState::from_driver_bytes(format!("{TOKEN_PREFIX}{table}:{offset}").into_bytes())
}

fn decode_token(table: &str, state: &PageState) -> Result<usize, DriverError> {
    let invalid = || DriverError::server("Invalid value for the paging state");
    let text = std::str::from_utf8(state.as_driver_bytes()).map_err(|_| invalid())?;
    let (token_table, offset) = text
        .strip_prefix(TOKEN_PREFIX)
        .and_then(|rest| rest.rsplit_once(':'))
        .ok_or_else(invalid)?;
    if token_table != table {
        return Err(invalid());
    }
    offset.parse().map_err(|_| invalid())
}

/// Connector over a [`MemoryCluster`].
#[derive(Clone)]
pub struct MemoryConnector {
    cluster: MemoryCluster,
}

impl SessionConnector for MemoryConnector {
    type Session = MemorySession;

    async fn connect(&self, topology: &Topology) -> Result<MemorySession, DriverError> {
        let keyspace = {
            let mut state = self.cluster.state();
            state.connect_attempts += 1;
            state.last_topology = Some(topology.clone());
            let exhausted = state.connections_allowed == Some(0);
            if state.refuse_connections > 0 || exhausted {
                if state.refuse_connections != usize::MAX && !exhausted {
                    state.refuse_connections -= 1;
                }
                return Err(DriverError::transport(format!(
                    "connection refused: {}",
                    topology.endpoint()
                )));
            }
            if let Some(allowed) = state.connections_allowed.as_mut() {
                *allowed -= 1;
            }
            let keyspace = topology
                .keyspace
                .clone()
                .unwrap_or_else(|| SYSTEM_KEYSPACE.to_string());
            if keyspace != SYSTEM_KEYSPACE && !state.keyspaces.contains(&keyspace) {
                return Err(DriverError::server(format!(
                    "Keyspace '{keyspace}' does not exist"
                )));
            }
            keyspace
        };
        Ok(self.cluster.session(&keyspace))
    }
}

/// Session bound to one keyspace of a [`MemoryCluster`].
pub struct MemorySession {
    cluster: MemoryCluster,
    keyspace: String,
}

impl MemorySession {
    fn check_injected(state: &ClusterState, cql: &str) -> Result<(), DriverError> {
        match state.failing_statements.iter().find(|p| cql.contains(p.as_str())) {
            Some(pattern) => Err(DriverError::server(format!(
                "injected failure for statement matching '{pattern}'"
            ))),
            None => Ok(()),
        }
    }

    fn qualify(&self, name: &str) -> TableKey {
        match name.split_once('.') {
            Some((ks, table)) => (ks.to_string(), table.to_string()),
            None => (self.keyspace.clone(), name.to_string()),
        }
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        let mut state = self.cluster.state();
        state.open_sessions = state.open_sessions.saturating_sub(1);
    }
}

impl CqlSession for MemorySession {
    type Cursor = MemoryCursor;

    async fn execute(&self, cql: &str) -> Result<(), DriverError> {
        let mut state = self.cluster.state();
        state.statements.push(cql.to_string());
        Self::check_injected(&state, cql)?;

        let tokens: Vec<&str> = cql.split_whitespace().collect();
        let upper: Vec<String> = tokens.iter().map(|t| t.to_ascii_uppercase()).collect();
        let if_not_exists = upper.get(2..5).is_some_and(|w| w == ["IF", "NOT", "EXISTS"]);
        let name_at = if if_not_exists { 5 } else { 2 };
        let Some(name) = tokens.get(name_at).map(|n| n.trim_end_matches('(')) else {
            return Ok(());
        };

        match upper.get(..2) {
            Some([create, kind]) if create == "CREATE" && kind == "KEYSPACE" => {
                let fresh = state.keyspaces.insert(name.to_string());
                if !fresh && !if_not_exists {
                    return Err(DriverError::server(format!(
                        "Keyspace {name} already exists"
                    )));
                }
            }
            Some([create, kind]) if create == "CREATE" && kind == "TABLE" => {
                let key = self.qualify(name);
                if key.0 != SYSTEM_KEYSPACE && !state.keyspaces.contains(&key.0) {
                    return Err(DriverError::server(format!(
                        "Keyspace {} doesn't exist",
                        key.0
                    )));
                }
                if state.tables.contains_key(&key) {
                    if !if_not_exists {
                        return Err(DriverError::server(format!(
                            "Table {}.{} already exists",
                            key.0, key.1
                        )));
                    }
                } else {
                    state.tables.insert(key, BTreeMap::new());
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn insert_user(&self, table: &str, record: &UserRecord) -> Result<(), DriverError> {
        let mut state = self.cluster.state();
        Self::check_injected(
            &state,
            &format!("INSERT INTO {table} (first_name, last_name, age) VALUES (?, ?, ?)"),
        )?;
        let key = self.qualify(table);
        let rows = state
            .tables
            .get_mut(&key)
            .ok_or_else(|| DriverError::server(format!("unconfigured table {}", key.1)))?;
        rows.insert(
            (record.first_name.clone(), record.last_name.clone()),
            record.age,
        );
        Ok(())
    }

    async fn open_user_scan(
        &self,
        table: &str,
        fetch_size: Option<i32>,
        state: &PageState,
    ) -> Result<MemoryCursor, DriverError> {
        let key = self.qualify(table);
        let mut cluster = self.cluster.state();
        cluster.last_fetch_size = fetch_size;

        let rows = cluster
            .tables
            .get(&key)
            .map(to_records)
            .ok_or_else(|| DriverError::server(format!("unconfigured table {}", key.1)))?;
        let offset = if state.is_empty() {
            0
        } else {
            decode_token(&key.1, state)?
        };

        let pending_error = if !state.is_empty() && cluster.null_pointer_on_resume {
            Some(DriverError::server(NULL_POINTER_SIGNATURE))
        } else {
            cluster.scan_failure.clone()
        };
        let fetch = fetch_size
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n > 0)
            .or(cluster.default_fetch_size)
            .unwrap_or(DEFAULT_FETCH_SIZE);
        cluster.cursors_opened += 1;
        drop(cluster);

        let mut cursor = MemoryCursor {
            cluster: self.cluster.clone(),
            table: key.1,
            rows,
            fetch,
            page: VecDeque::new(),
            next_offset: None,
            pending_error,
        };
        cursor.fetch_from(offset);
        Ok(cursor)
    }
}

/// Cursor over a snapshot of a [`MemoryCluster`] table.
pub struct MemoryCursor {
    cluster: MemoryCluster,
    table: String,
    rows: Vec<UserRecord>,
    fetch: usize,
    page: VecDeque<UserRecord>,
    next_offset: Option<usize>,
    pending_error: Option<DriverError>,
}

impl MemoryCursor {
    fn fetch_from(&mut self, offset: usize) {
        let start = offset.min(self.rows.len());
        let end = start.saturating_add(self.fetch).min(self.rows.len());
        self.page = self.rows[start..end].iter().cloned().collect();
        self.next_offset = (end < self.rows.len()).then_some(end);
    }
}

impl RowCursor for MemoryCursor {
    async fn next_row(&mut self) -> Result<Option<UserRecord>, DriverError> {
        if let Some(err) = self.pending_error.take() {
            return Err(err);
        }
        loop {
            if let Some(row) = self.page.pop_front() {
                return Ok(Some(row));
            }
            let Some(offset) = self.next_offset.take() else {
                return Ok(None);
            };
            self.fetch_from(offset);
        }
    }

    fn page_state(&self) -> PageState {
        self.next_offset
            .map(|offset| encode_token(&self.table, offset))
            .unwrap_or_default()
    }

    async fn close(self) -> Result<(), DriverError> {
        let mut state = self.cluster.state();
        state.cursors_closed += 1;
        match state.close_failure.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
