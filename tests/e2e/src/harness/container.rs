use anyhow::{Context, Result};
use pagerepro_container::{ContainerRuntime, DockerRuntime};

/// Connect to the local engine and make one cheap call so tests fail fast
/// with a clear message when Docker is missing.
pub async fn docker() -> Result<DockerRuntime> {
    let runtime = DockerRuntime::connect_local().context("failed to reach the Docker socket")?;
    runtime
        .list_containers()
        .await
        .context("Docker socket reachable but the engine did not answer")?;
    Ok(runtime)
}
