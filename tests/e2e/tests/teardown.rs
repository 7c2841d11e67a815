use pagerepro_engine::{teardown_by_name, TeardownStatus};
use pagerepro_types::ContainerState;

#[tokio::test]
#[ignore = "requires Docker and pulls cassandra:3.11.1"]
async fn leftover_container_is_found_and_removed() {
    let context = pagerepro_e2e::harness::bootstrap().await.unwrap();
    let config = context.config("leftover");
    let containers = context.containers();

    let port = pagerepro_engine::port::allocate_port().unwrap();
    let desc = containers.provision(&config.name, port).await.unwrap();
    assert_eq!(desc.state, ContainerState::Running);
    assert_eq!(desc.host_port_for(9042), Some(port));

    let located = containers.locate(&config.name).await.unwrap();
    assert_eq!(located.id, desc.id);

    let status = teardown_by_name(context.runtime.clone(), &config.name).await;
    assert_eq!(status, TeardownStatus::Removed { id: desc.id.clone() });

    let status = teardown_by_name(context.runtime.clone(), &config.name).await;
    assert_eq!(status, TeardownStatus::NothingToRemove);

    containers.destroy(&desc.id).await.unwrap();
}
