#[tokio::test]
#[ignore = "requires a local Docker Engine"]
async fn harness_bootstrap_reaches_docker() {
    let context = pagerepro_e2e::harness::bootstrap()
        .await
        .expect("bootstrap must reach the Docker Engine");

    let config = context.config("smoke");
    assert!(config.name.starts_with("pagerepro-e2e-smoke-"));
}
