//! Provision, locate, and destroy the backing Cassandra container.

use std::time::Duration;

use pagerepro_types::{ContainerDescriptor, ContainerState, PortMapping};

use crate::error::{DestroyError, LocateError, ProvisionError, ProvisionStage, RuntimeError};
use crate::runtime::{ContainerRuntime, ContainerSpec, RuntimeContainer};

/// Image repository and tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRef {
    pub repository: &'static str,
    pub tag: &'static str,
}

impl ImageRef {
    #[must_use]
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

/// The Cassandra release the harness reproduces against.
pub const CASSANDRA_IMAGE: ImageRef = ImageRef {
    repository: "cassandra",
    tag: "3.11.1",
};

/// CQL native-protocol port inside the container.
pub const CQL_PORT: u16 = 9042;

/// Grace period before the engine kills a stopping container.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(30);

const CONTAINER_ENV: &[&str] = &["CASSANDRA_BROADCAST_ADDRESS=127.0.0.1"];

/// Map an engine state string onto the lifecycle. A container that exists
/// but is not running (created, exited, dead) counts as `Created`.
fn lifecycle_state(engine_state: &str) -> ContainerState {
    match engine_state {
        "running" | "restarting" | "paused" => ContainerState::Running,
        "removing" => ContainerState::Stopping,
        _ => ContainerState::Created,
    }
}

fn to_descriptor(container: RuntimeContainer, name: &str) -> ContainerDescriptor {
    ContainerDescriptor {
        name: name.to_string(),
        id: container.id,
        image: container.image,
        ports: container.ports,
        state: lifecycle_state(&container.state),
    }
}

/// Drives one container through `absent -> pulling -> created -> running ->
/// stopping -> removed`.
pub struct ContainerLifecycleManager<R> {
    runtime: R,
    image: ImageRef,
    stop_grace: Duration,
}

impl<R: ContainerRuntime> ContainerLifecycleManager<R> {
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            image: CASSANDRA_IMAGE,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }

    #[must_use]
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Pull the image, create container `name` with `9042/tcp` bound to
    /// `host_port`, and start it.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] naming the failed stage. A container may
    /// already exist when the start stage fails, so callers must still run
    /// teardown.
    pub async fn provision(
        &self,
        name: &str,
        host_port: u16,
    ) -> Result<ContainerDescriptor, ProvisionError> {
        let mut desc = ContainerDescriptor::absent(name, self.image.reference());
        desc.ports.push(PortMapping {
            host_port,
            container_port: CQL_PORT,
        });

        step(&mut desc, ContainerState::Pulling, ProvisionStage::Pull)?;
        tracing::info!(image = %desc.image, "Pulling Cassandra image");
        self.runtime
            .pull_image(self.image.repository, self.image.tag)
            .await
            .map_err(|cause| ProvisionError {
                stage: ProvisionStage::Pull,
                container_id: None,
                cause,
            })?;

        tracing::info!(container = name, host_port, "Creating Cassandra container");
        let spec = ContainerSpec {
            name: name.to_string(),
            image: desc.image.clone(),
            ports: desc.ports.clone(),
            env: CONTAINER_ENV.iter().map(|s| (*s).to_string()).collect(),
        };
        desc.id = self
            .runtime
            .create_container(&spec)
            .await
            .map_err(|cause| ProvisionError {
                stage: ProvisionStage::Create,
                container_id: None,
                cause,
            })?;
        step(&mut desc, ContainerState::Created, ProvisionStage::Create)?;

        tracing::info!(container = name, id = %desc.id, "Starting Cassandra container");
        self.runtime
            .start_container(&desc.id)
            .await
            .map_err(|cause| ProvisionError {
                stage: ProvisionStage::Start,
                container_id: Some(desc.id.clone()),
                cause,
            })?;
        step(&mut desc, ContainerState::Running, ProvisionStage::Start)?;

        Ok(desc)
    }

    /// Find container `name` among all containers, running or not.
    ///
    /// # Errors
    ///
    /// Returns [`LocateError::NotFound`] when no container has that name.
    pub async fn locate(&self, name: &str) -> Result<ContainerDescriptor, LocateError> {
        let containers = self.runtime.list_containers().await?;
        containers
            .into_iter()
            .find(|c| c.has_name(name))
            .map(|c| to_descriptor(c, name))
            .ok_or_else(|| LocateError::NotFound {
                name: name.to_string(),
            })
    }

    /// Stop (bounded grace period) and force-remove container `id` with its
    /// volumes. Removing a container that is already gone succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`DestroyError`] if the engine refuses the removal.
    pub async fn destroy(&self, id: &str) -> Result<(), DestroyError> {
        tracing::info!(id, "Destroying Cassandra container");
        match self.runtime.stop_container(id, self.stop_grace).await {
            Ok(()) => {}
            Err(RuntimeError::NotModified { .. }) => {
                tracing::debug!(id, "container already stopped");
            }
            Err(RuntimeError::NotFound { .. }) => {
                tracing::debug!(id, "container already removed");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(id, error = %e, "stop failed, forcing removal");
            }
        }

        match self.runtime.remove_container(id).await {
            Ok(()) | Err(RuntimeError::NotFound { .. }) => Ok(()),
            Err(cause) => Err(DestroyError {
                id: id.to_string(),
                cause,
            }),
        }
    }

    /// [`destroy`](Self::destroy) a tracked descriptor, recording the
    /// `stopping -> removed` transitions on it.
    ///
    /// # Errors
    ///
    /// Returns [`DestroyError`] if the engine refuses the removal; the
    /// descriptor is left in `Stopping`.
    pub async fn destroy_descriptor(
        &self,
        desc: &mut ContainerDescriptor,
    ) -> Result<(), DestroyError> {
        if desc.state == ContainerState::Removed {
            return Ok(());
        }
        if desc.id.is_empty() {
            desc.state = ContainerState::Removed;
            return Ok(());
        }
        if desc.state.can_transition_to(ContainerState::Stopping) {
            desc.state = ContainerState::Stopping;
        }
        self.destroy(&desc.id).await?;
        desc.state = ContainerState::Removed;
        Ok(())
    }
}

fn step(
    desc: &mut ContainerDescriptor,
    next: ContainerState,
    stage: ProvisionStage,
) -> Result<(), ProvisionError> {
    desc.transition(next).map_err(|e| ProvisionError {
        stage,
        container_id: Some(desc.id.clone()).filter(|id| !id.is_empty()),
        cause: RuntimeError::api(e.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryRuntime;

    fn manager(rt: &MemoryRuntime) -> ContainerLifecycleManager<MemoryRuntime> {
        ContainerLifecycleManager::new(rt.clone())
    }

    #[tokio::test]
    async fn provision_runs_container_with_port_binding() {
        let rt = MemoryRuntime::new();
        let desc = manager(&rt).provision("recreation", 40123).await.unwrap();

        assert_eq!(desc.state, ContainerState::Running);
        assert_eq!(desc.image, "cassandra:3.11.1");
        assert_eq!(desc.host_port_for(CQL_PORT), Some(40123));
        let live = rt.container_named("recreation").unwrap();
        assert_eq!(live.state, "running");
        assert_eq!(live.id, desc.id);
        assert_eq!(rt.pulled_images(), vec!["cassandra:3.11.1".to_string()]);
        assert!(rt
            .env_of("recreation")
            .contains(&"CASSANDRA_BROADCAST_ADDRESS=127.0.0.1".to_string()));
    }

    #[tokio::test]
    async fn pull_failure_reports_stage_and_creates_nothing() {
        let rt = MemoryRuntime::new();
        rt.fail_pull_with(RuntimeError::api("manifest unknown"));
        let err = manager(&rt).provision("recreation", 40123).await.unwrap_err();
        assert_eq!(err.stage, ProvisionStage::Pull);
        assert!(err.container_id.is_none());
        assert!(rt.container_named("recreation").is_none());
    }

    #[tokio::test]
    async fn start_failure_leaves_created_container_for_teardown() {
        let rt = MemoryRuntime::new();
        rt.fail_start_with(RuntimeError::api("port is already allocated"));
        let mgr = manager(&rt);
        let err = mgr.provision("recreation", 40123).await.unwrap_err();
        assert_eq!(err.stage, ProvisionStage::Start);
        let id = err.container_id.clone().unwrap();

        let found = mgr.locate("recreation").await.unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.state, ContainerState::Created);

        mgr.destroy(&id).await.unwrap();
        assert!(rt.container_named("recreation").is_none());
    }

    #[tokio::test]
    async fn create_conflict_reports_create_stage() {
        let rt = MemoryRuntime::new();
        let mgr = manager(&rt);
        mgr.provision("recreation", 40123).await.unwrap();
        let err = mgr.provision("recreation", 40124).await.unwrap_err();
        assert_eq!(err.stage, ProvisionStage::Create);
    }

    #[tokio::test]
    async fn locate_missing_container() {
        let rt = MemoryRuntime::new();
        let err = manager(&rt).locate("recreation").await.unwrap_err();
        assert!(matches!(err, LocateError::NotFound { .. }));
    }

    #[tokio::test]
    async fn destroy_is_idempotent() {
        let rt = MemoryRuntime::new();
        let mgr = manager(&rt);
        let desc = mgr.provision("recreation", 40123).await.unwrap();

        mgr.destroy(&desc.id).await.unwrap();
        mgr.destroy(&desc.id).await.unwrap();
        assert!(rt.container_named("recreation").is_none());
    }

    #[tokio::test]
    async fn destroy_stopped_container() {
        let rt = MemoryRuntime::new();
        let id = rt.insert_stopped("recreation");
        manager(&rt).destroy(&id).await.unwrap();
        assert!(rt.container_named("recreation").is_none());
    }

    #[tokio::test]
    async fn destroy_reports_remove_failure() {
        let rt = MemoryRuntime::new();
        let mgr = manager(&rt);
        let desc = mgr.provision("recreation", 40123).await.unwrap();
        rt.fail_remove_with(RuntimeError::api("device or resource busy"));

        let err = mgr.destroy(&desc.id).await.unwrap_err();
        assert_eq!(err.id, desc.id);
    }

    #[tokio::test]
    async fn destroy_descriptor_walks_lifecycle() {
        let rt = MemoryRuntime::new();
        let mgr = manager(&rt);
        let mut desc = mgr.provision("recreation", 40123).await.unwrap();

        mgr.destroy_descriptor(&mut desc).await.unwrap();
        assert_eq!(desc.state, ContainerState::Removed);
        mgr.destroy_descriptor(&mut desc).await.unwrap();
        assert_eq!(rt.remove_calls(), 1);
    }

    #[tokio::test]
    async fn destroy_uses_default_stop_grace() {
        let rt = MemoryRuntime::new();
        let mgr = manager(&rt);
        let desc = mgr.provision("recreation", 40123).await.unwrap();

        mgr.destroy(&desc.id).await.unwrap();
        assert_eq!(rt.last_stop_grace(), Some(DEFAULT_STOP_GRACE));
        assert_eq!(DEFAULT_STOP_GRACE, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn destroy_honours_configured_stop_grace() {
        let rt = MemoryRuntime::new();
        let mgr = manager(&rt).with_stop_grace(Duration::from_secs(2));
        let desc = mgr.provision("recreation", 40123).await.unwrap();

        mgr.destroy(&desc.id).await.unwrap();
        assert_eq!(rt.last_stop_grace(), Some(Duration::from_secs(2)));
    }

    #[tokio::test]
    async fn create_failure_leaves_no_container_id() {
        let rt = MemoryRuntime::new();
        rt.fail_create_with(RuntimeError::api("no space left on device"));
        let err = manager(&rt).provision("recreation", 40123).await.unwrap_err();
        assert_eq!(err.stage, ProvisionStage::Create);
        assert!(err.container_id.is_none());
        assert!(rt.containers().is_empty());
    }

    #[tokio::test]
    async fn locate_surfaces_list_failure() {
        let rt = MemoryRuntime::new();
        rt.fail_list_with(RuntimeError::Unavailable {
            message: "socket closed".into(),
        });
        let err = manager(&rt).locate("recreation").await.unwrap_err();
        assert!(matches!(err, LocateError::Runtime(_)));
    }

    #[test]
    fn engine_states_map_onto_lifecycle() {
        assert_eq!(lifecycle_state("running"), ContainerState::Running);
        assert_eq!(lifecycle_state("exited"), ContainerState::Created);
        assert_eq!(lifecycle_state("created"), ContainerState::Created);
        assert_eq!(lifecycle_state("removing"), ContainerState::Stopping);
    }
}
