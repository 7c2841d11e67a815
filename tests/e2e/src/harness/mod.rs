mod container;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use pagerepro_container::{ContainerLifecycleManager, DockerRuntime};
use pagerepro_cql::{ConnectionSupervisor, ProbePolicy, ScyllaConnector};
use pagerepro_engine::port::allocate_port;
use pagerepro_engine::{
    teardown_by_name, DefectAcknowledger, EnvironmentConfig, ReproductionDriver,
};
use pagerepro_types::ContainerDescriptor;
use tracing_subscriber::EnvFilter;

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

/// Cassandra 3.11 takes a while to accept CQL on a cold start.
pub const LIVE_TIMEOUT_ATTEMPTS: u32 = 120;

#[derive(Clone)]
pub struct HarnessContext {
    pub runtime: DockerRuntime,
}

pub async fn bootstrap() -> Result<HarnessContext> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .try_init();
    Ok(HarnessContext {
        runtime: container::docker().await?,
    })
}

impl HarnessContext {
    /// Config with a container name no other test in this process uses.
    pub fn config(&self, test_name: &str) -> EnvironmentConfig {
        let id = NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed);
        EnvironmentConfig {
            name: format!(
                "pagerepro-e2e-{}-{}-{id}",
                sanitize_name(test_name),
                std::process::id()
            ),
            timeout_attempts: LIVE_TIMEOUT_ATTEMPTS,
            seed: Some(13_592),
            ..EnvironmentConfig::default()
        }
    }

    pub fn driver<A: DefectAcknowledger>(
        &self,
        config: EnvironmentConfig,
        acknowledger: A,
    ) -> ReproductionDriver<ScyllaConnector, DockerRuntime, A> {
        ReproductionDriver::new(config, ScyllaConnector, self.runtime.clone(), acknowledger)
            .with_probe_policy(ProbePolicy::default())
            .with_stop_grace(Duration::from_secs(5))
    }

    pub fn containers(&self) -> ContainerLifecycleManager<DockerRuntime> {
        ContainerLifecycleManager::new(self.runtime.clone()).with_stop_grace(Duration::from_secs(5))
    }

    /// Provision a container and wait until it accepts CQL. The container is
    /// removed again if either step fails.
    pub async fn start_cassandra(&self, test_name: &str) -> Result<LiveCassandra> {
        let config = self.config(test_name);
        let port = allocate_port().context("failed to allocate host port")?;
        let containers = self.containers();

        let container = match containers.provision(&config.name, port).await {
            Ok(desc) => desc,
            Err(e) => {
                teardown_by_name(self.runtime.clone(), &config.name).await;
                return Err(e).context("failed to provision Cassandra");
            }
        };

        let supervisor = ConnectionSupervisor::new(ScyllaConnector, config.connection_config(port));
        if let Err(e) = supervisor
            .wait_until_ready(&config.host, port, config.timeout_attempts)
            .await
        {
            let _ = containers.destroy(&container.id).await;
            return Err(e).context("Cassandra never became ready");
        }

        Ok(LiveCassandra {
            config,
            container,
            supervisor,
        })
    }
}

/// A running, reachable Cassandra container owned by one test.
pub struct LiveCassandra {
    pub config: EnvironmentConfig,
    pub container: ContainerDescriptor,
    pub supervisor: ConnectionSupervisor<ScyllaConnector>,
}

impl LiveCassandra {
    pub async fn stop(mut self, context: &HarnessContext) -> Result<()> {
        context
            .containers()
            .destroy_descriptor(&mut self.container)
            .await
            .context("failed to remove Cassandra container")
    }
}

fn sanitize_name(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::sanitize_name;

    #[test]
    fn sanitize_replaces_non_alphanumerics() {
        assert_eq!(sanitize_name("Defect Repro::live"), "defect-repro--live");
    }
}
