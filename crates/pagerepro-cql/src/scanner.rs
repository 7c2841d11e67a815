//! Capped, resumable scans of the `users` table.

use pagerepro_types::{PageState, UserRecord};

use crate::error::ScanError;
use crate::schema::is_identifier;
use crate::session::{CqlSession, RowCursor};

/// Rows returned by one [`PagedScanner::scan`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    pub records: Vec<UserRecord>,
    /// Continuation for the next call; empty when the table is exhausted.
    pub next: PageState,
}

/// Runs paginated scans over a session.
///
/// A bounded scan fetches driver pages of `fetch_size` rows, which defaults
/// to the cap itself.
pub struct PagedScanner<'s, S> {
    session: &'s S,
    fetch_size: Option<i32>,
}

impl<'s, S: CqlSession> PagedScanner<'s, S> {
    pub fn new(session: &'s S) -> Self {
        Self {
            session,
            fetch_size: None,
        }
    }

    /// Fixed driver page size for bounded scans instead of the cap.
    #[must_use]
    pub fn with_fetch_size(mut self, fetch_size: i32) -> Self {
        self.fetch_size = Some(fetch_size).filter(|n| *n > 0);
        self
    }

    /// Scan `table`, returning at most `page_size_cap` rows (`0` = all rows).
    ///
    /// A non-empty `continuation` resumes where the call that produced it
    /// stopped. The cursor is closed on every return path.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] for an invalid table name or whatever the driver
    /// raises, including a stale or foreign continuation.
    pub async fn scan(
        &self,
        table: &str,
        page_size_cap: usize,
        continuation: &PageState,
    ) -> Result<ScanPage, ScanError> {
        if !is_identifier(table) {
            return Err(ScanError::InvalidIdentifier {
                name: table.to_string(),
            });
        }

        let fetch_size = if page_size_cap == 0 {
            None
        } else {
            Some(
                self.fetch_size
                    .unwrap_or_else(|| i32::try_from(page_size_cap).unwrap_or(i32::MAX)),
            )
        };

        let mut cursor = self
            .session
            .open_user_scan(table, fetch_size, continuation)
            .await?;

        let mut records = Vec::new();
        let drained = loop {
            if page_size_cap > 0 && records.len() >= page_size_cap {
                break Ok(());
            }
            match cursor.next_row().await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        let next = cursor.page_state();
        let closed = cursor.close().await;
        drained?;
        closed?;

        tracing::debug!(
            table,
            cap = page_size_cap,
            resumed = !continuation.is_empty(),
            returned = records.len(),
            more = !next.is_empty(),
            "scan finished"
        );
        Ok(ScanPage { records, next })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::error::DriverError;
    use crate::testing::MemoryCluster;

    fn seeded(count: usize) -> MemoryCluster {
        let cluster = MemoryCluster::new();
        cluster.create_users_table("recreation", "users");
        for i in 0..count {
            cluster.insert("recreation", "users", UserRecord::new(format!("user{i:02}"), "smith", 20));
        }
        cluster
    }

    fn keys(records: &[UserRecord]) -> HashSet<(String, String)> {
        records
            .iter()
            .map(|r| (r.first_name.clone(), r.last_name.clone()))
            .collect()
    }

    #[tokio::test]
    async fn cap_is_a_hard_ceiling() {
        let cluster = seeded(12);
        let session = cluster.session("recreation");
        let page = PagedScanner::new(&session)
            .scan("users", 5, &PageState::start())
            .await
            .unwrap();
        assert_eq!(page.records.len(), 5);
        assert!(!page.next.is_empty());
    }

    #[tokio::test]
    async fn cap_holds_even_when_driver_page_is_larger() {
        let cluster = seeded(12);
        let session = cluster.session("recreation");
        let page = PagedScanner::new(&session)
            .with_fetch_size(10)
            .scan("users", 3, &PageState::start())
            .await
            .unwrap();
        assert_eq!(page.records.len(), 3);
        assert!(!page.next.is_empty());
        assert_eq!(cluster.last_fetch_size(), Some(10));
    }

    #[tokio::test]
    async fn unbounded_scan_returns_everything_and_empty_token() {
        let cluster = seeded(12);
        let session = cluster.session("recreation");
        let page = PagedScanner::new(&session)
            .scan("users", 0, &PageState::start())
            .await
            .unwrap();
        assert_eq!(page.records.len(), 12);
        assert!(page.next.is_empty());
        assert_eq!(cluster.last_fetch_size(), None);
    }

    #[tokio::test]
    async fn unbounded_scan_spans_multiple_driver_pages() {
        let cluster = seeded(12);
        cluster.set_default_fetch_size(5);
        let session = cluster.session("recreation");
        let page = PagedScanner::new(&session)
            .scan("users", 0, &PageState::start())
            .await
            .unwrap();
        assert_eq!(page.records.len(), 12);
        assert!(page.next.is_empty());
    }

    #[tokio::test]
    async fn resume_after_single_row_returns_next_five() {
        let cluster = seeded(12);
        let session = cluster.session("recreation");
        let scanner = PagedScanner::new(&session);

        let first = scanner.scan("users", 1, &PageState::start()).await.unwrap();
        assert_eq!(first.records.len(), 1);
        assert!(!first.next.is_empty());

        let next = scanner.scan("users", 5, &first.next).await.unwrap();
        assert_eq!(next.records.len(), 5);
        assert!(keys(&first.records).is_disjoint(&keys(&next.records)));
    }

    #[tokio::test]
    async fn paging_to_the_end_visits_every_row_once() {
        let cluster = seeded(12);
        let session = cluster.session("recreation");
        let scanner = PagedScanner::new(&session);

        let mut seen = Vec::new();
        let mut token = PageState::start();
        loop {
            let page = scanner.scan("users", 5, &token).await.unwrap();
            seen.extend(page.records);
            if page.next.is_empty() {
                break;
            }
            token = page.next;
        }
        assert_eq!(seen.len(), 12);
        assert_eq!(keys(&seen).len(), 12);
    }

    #[tokio::test]
    async fn defect_signature_surfaces_and_cursor_is_closed() {
        let cluster = seeded(12);
        cluster.null_pointer_on_resume(true);
        let session = cluster.session("recreation");
        let scanner = PagedScanner::new(&session);

        let first = scanner.scan("users", 1, &PageState::start()).await.unwrap();
        let err = scanner.scan("users", 5, &first.next).await.unwrap_err();
        assert!(err.is_known_defect(), "unexpected error: {err}");
        assert_eq!(cluster.cursors_opened(), 2);
        assert_eq!(cluster.cursors_closed(), 2);
    }

    #[tokio::test]
    async fn unrelated_failure_is_not_the_defect() {
        let cluster = seeded(3);
        cluster.fail_scans_with(DriverError::transport("connection reset"));
        let session = cluster.session("recreation");
        let err = PagedScanner::new(&session)
            .scan("users", 0, &PageState::start())
            .await
            .unwrap_err();
        assert!(!err.is_known_defect());
        assert_eq!(cluster.cursors_opened(), cluster.cursors_closed());
    }

    #[tokio::test]
    async fn close_failure_fails_an_otherwise_clean_scan() {
        let cluster = seeded(12);
        cluster.fail_cursor_close_with(DriverError::transport("stream reset on close"));
        let session = cluster.session("recreation");
        let err = PagedScanner::new(&session)
            .scan("users", 5, &PageState::start())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScanError::Driver(DriverError::Transport { ref message }) if message == "stream reset on close"
        ));
        assert_eq!(cluster.cursors_closed(), 1);
    }

    #[tokio::test]
    async fn read_failure_wins_over_close_failure() {
        let cluster = seeded(12);
        cluster.fail_scans_with(DriverError::server("read timeout"));
        cluster.fail_cursor_close_with(DriverError::transport("stream reset on close"));
        let session = cluster.session("recreation");
        let err = PagedScanner::new(&session)
            .scan("users", 0, &PageState::start())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScanError::Driver(DriverError::Server { ref message }) if message == "read timeout"
        ));
        assert_eq!(cluster.cursors_opened(), cluster.cursors_closed());
    }

    #[tokio::test]
    async fn foreign_token_propagates_driver_error() {
        let cluster = seeded(3);
        let session = cluster.session("recreation");
        let bogus = PageState::from_driver_bytes(vec![0xde, 0xad]);
        let err = PagedScanner::new(&session)
            .scan("users", 1, &bogus)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Driver(DriverError::Server { .. })));
    }

    #[tokio::test]
    async fn every_path_closes_its_cursor() {
        let cluster = seeded(12);
        let session = cluster.session("recreation");
        let scanner = PagedScanner::new(&session);
        scanner.scan("users", 0, &PageState::start()).await.unwrap();
        scanner.scan("users", 4, &PageState::start()).await.unwrap();
        scanner.scan("users", 100, &PageState::start()).await.unwrap();
        assert_eq!(cluster.cursors_opened(), 3);
        assert_eq!(cluster.cursors_closed(), 3);
    }

    #[tokio::test]
    async fn invalid_table_name_rejected() {
        let cluster = seeded(1);
        let session = cluster.session("recreation");
        let err = PagedScanner::new(&session)
            .scan("users where 1=1", 0, &PageState::start())
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidIdentifier { .. }));
        assert_eq!(cluster.cursors_opened(), 0);
    }
}
