use pagerepro_container::LocateError;
use pagerepro_engine::{NoPause, Outcome, TeardownStatus};

#[tokio::test]
#[ignore = "requires Docker and pulls cassandra:3.11.1"]
async fn live_run_reproduces_defect_and_cleans_up() {
    let context = pagerepro_e2e::harness::bootstrap().await.unwrap();
    let config = context.config("live_run");
    let name = config.name.clone();

    let report = context.driver(config, NoPause).run().await.unwrap();

    assert_eq!(report.full_scan.len(), 12);
    assert!(report.full_scan.iter().all(|r| r.last_name == "smith"));
    assert_eq!(report.single_row.len(), 1);
    assert!(report.continuation_len > 0);
    assert_eq!(report.repeat_scan_count, Some(12));
    match report.outcome {
        Some(Outcome::DefectReproduced) => {
            let defect = report.defect.as_ref().unwrap();
            assert!(defect.message.contains("java.lang.NullPointerException"));
        }
        Some(Outcome::Completed) => assert!(!report.resumed.contains(&report.single_row[0])),
        None => panic!("successful run must carry an outcome"),
    }
    assert!(matches!(report.teardown, TeardownStatus::Removed { .. }));

    let gone = context.containers().locate(&name).await;
    assert!(matches!(gone, Err(LocateError::NotFound { .. })));
}

#[tokio::test]
#[ignore = "requires Docker and pulls cassandra:3.11.1"]
async fn readiness_timeout_still_removes_container() {
    let context = pagerepro_e2e::harness::bootstrap().await.unwrap();
    let mut config = context.config("readiness_timeout");
    config.timeout_attempts = 1;
    let name = config.name.clone();

    let failure = context.driver(config, NoPause).run().await.unwrap_err();

    assert!(matches!(
        failure.error,
        pagerepro_engine::RunError::Readiness(_)
    ));
    let gone = context.containers().locate(&name).await;
    assert!(matches!(gone, Err(LocateError::NotFound { .. })));
}
