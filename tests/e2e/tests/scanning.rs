use std::collections::HashSet;

use anyhow::{ensure, Result};
use pagerepro_cql::supervisor::SYSTEM_KEYSPACE;
use pagerepro_cql::{PagedScanner, SchemaBootstrapper};
use pagerepro_e2e::harness::LiveCassandra;
use pagerepro_engine::seed::{age_rng, fixture_records, seed_records, USERS_TABLE};
use pagerepro_types::PageState;

#[tokio::test]
#[ignore = "requires Docker and pulls cassandra:3.11.1"]
async fn bootstrap_is_idempotent_and_paging_honours_cap() {
    let context = pagerepro_e2e::harness::bootstrap().await.unwrap();
    let live = context.start_cassandra("scanning").await.unwrap();

    let outcome = exercise(&live).await;
    live.stop(&context).await.unwrap();
    outcome.unwrap();
}

async fn exercise(live: &LiveCassandra) -> Result<()> {
    let keyspace = live.config.keyspace.as_str();
    let bootstrapper = SchemaBootstrapper::new();

    let mut admin = live
        .supervisor
        .open_session(live.supervisor.build_topology(Some(SYSTEM_KEYSPACE)))
        .await?;
    bootstrapper.ensure_keyspace(admin.session()?, keyspace).await?;
    bootstrapper.ensure_keyspace(admin.session()?, keyspace).await?;
    admin.close();

    let handle = live
        .supervisor
        .open_session(live.supervisor.build_topology(Some(keyspace)))
        .await?;
    let session = handle.session()?;
    bootstrapper.ensure_table(session, USERS_TABLE, keyspace).await?;
    bootstrapper.ensure_table(session, USERS_TABLE, keyspace).await?;

    let records = fixture_records(&mut age_rng(Some(1)));
    seed_records(session, USERS_TABLE, &records).await?;

    let scanner = PagedScanner::new(session);
    let start = PageState::start();

    let all = scanner.scan(USERS_TABLE, 0, &start).await?;
    ensure!(all.records.len() == 12, "expected 12 rows, got {}", all.records.len());
    ensure!(all.next.is_empty(), "unbounded scan left a continuation");
    ensure!(all.records.iter().all(|r| r.last_name == "smith"));

    let capped = scanner.scan(USERS_TABLE, 5, &start).await?;
    ensure!(capped.records.len() == 5, "cap of 5 returned {}", capped.records.len());
    ensure!(!capped.next.is_empty(), "capped scan returned no continuation");

    let first = scanner.scan(USERS_TABLE, 1, &start).await?;
    ensure!(first.records.len() == 1);
    match scanner.scan(USERS_TABLE, 5, &first.next).await {
        Ok(next) => {
            ensure!(next.records.len() == 5, "resume returned {}", next.records.len());
            let seen: HashSet<_> = first.records.iter().map(|r| r.key()).collect();
            ensure!(
                next.records.iter().all(|r| !seen.contains(&r.key())),
                "resumed page repeated the first row"
            );
        }
        Err(e) => ensure!(e.is_known_defect(), "unexpected resume failure: {e}"),
    }
    Ok(())
}
