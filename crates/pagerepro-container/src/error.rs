//! Container runtime and lifecycle error types.

/// Failure reported by a [`ContainerRuntime`](crate::ContainerRuntime).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// No such container (HTTP 404 from the engine).
    #[error("no such container: {id}")]
    NotFound { id: String },

    /// Nothing to do, e.g. stopping a stopped container (HTTP 304).
    #[error("container {id} already in requested state")]
    NotModified { id: String },

    /// The runtime socket could not be reached.
    #[error("container runtime unavailable: {message}")]
    Unavailable { message: String },

    #[error("container runtime error: {message}")]
    Api { message: String },
}

impl RuntimeError {
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }
}

/// Step of [`provision`](crate::ContainerLifecycleManager::provision) that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStage {
    Pull,
    Create,
    Start,
}

impl std::fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pull => "pull",
            Self::Create => "create",
            Self::Start => "start",
        })
    }
}

/// Provisioning aborted. A container may exist if `stage` is `Start`.
#[derive(Debug, thiserror::Error)]
#[error("container provisioning failed at {stage}: {cause}")]
pub struct ProvisionError {
    pub stage: ProvisionStage,
    /// Id of the container if it was created before the failure.
    pub container_id: Option<String>,
    #[source]
    pub cause: RuntimeError,
}

/// Looking a container up by name failed.
#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    #[error("no container named '{name}'")]
    NotFound { name: String },

    #[error("failed to list containers: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Removing a container failed.
#[derive(Debug, thiserror::Error)]
#[error("failed to remove container {id}: {cause}")]
pub struct DestroyError {
    pub id: String,
    #[source]
    pub cause: RuntimeError,
}
