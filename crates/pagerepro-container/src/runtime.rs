//! Container runtime seam.

use std::future::Future;
use std::time::Duration;

use pagerepro_types::PortMapping;

use crate::error::RuntimeError;

/// What to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    /// `repository:tag`.
    pub image: String,
    pub ports: Vec<PortMapping>,
    /// `KEY=value` entries.
    pub env: Vec<String>,
}

/// A container as reported by the runtime's list call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeContainer {
    pub id: String,
    /// Names as the engine reports them, with a leading `/`.
    pub names: Vec<String>,
    pub image: String,
    /// Engine state string: `created`, `running`, `exited`, ...
    pub state: String,
    pub ports: Vec<PortMapping>,
}

impl RuntimeContainer {
    /// Whether this container is called `name`.
    #[must_use]
    pub fn has_name(&self, name: &str) -> bool {
        self.names
            .iter()
            .any(|n| n.strip_prefix('/').unwrap_or(n) == name)
    }
}

/// Operations the lifecycle manager needs from a container engine.
pub trait ContainerRuntime: Send + Sync {
    fn pull_image(
        &self,
        repository: &str,
        tag: &str,
    ) -> impl Future<Output = Result<(), RuntimeError>> + Send;

    /// Create (but do not start) a container. Returns its id.
    fn create_container(
        &self,
        spec: &ContainerSpec,
    ) -> impl Future<Output = Result<String, RuntimeError>> + Send;

    fn start_container(&self, id: &str) -> impl Future<Output = Result<(), RuntimeError>> + Send;

    /// Every container, running or not.
    fn list_containers(
        &self,
    ) -> impl Future<Output = Result<Vec<RuntimeContainer>, RuntimeError>> + Send;

    /// Stop, killing after `grace`.
    fn stop_container(
        &self,
        id: &str,
        grace: Duration,
    ) -> impl Future<Output = Result<(), RuntimeError>> + Send;

    /// Force-remove the container and its anonymous volumes.
    fn remove_container(&self, id: &str) -> impl Future<Output = Result<(), RuntimeError>> + Send;
}
