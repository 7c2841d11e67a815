//! Container identity and lifecycle state.

use serde::{Deserialize, Serialize};

/// Lifecycle of the harness-provisioned container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    Absent,
    Pulling,
    Created,
    Running,
    Stopping,
    Removed,
}

impl ContainerState {
    /// Whether `self -> next` is a legal lifecycle step.
    ///
    /// Forced removal is legal from every state except `Removed` itself.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use ContainerState::{Absent, Created, Pulling, Removed, Running, Stopping};
        match (self, next) {
            (Absent, Pulling)
            | (Pulling, Created)
            | (Created, Running)
            | (Created | Running, Stopping)
            | (Stopping, Removed) => true,
            (Removed, _) => false,
            (_, Removed) => true,
            _ => false,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Pulling => "pulling",
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Removed => "removed",
        }
    }
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected lifecycle step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: ContainerState,
    pub to: ContainerState,
}

impl std::fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "illegal container transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// Host port bound to a container-internal TCP port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortMapping {
    pub host_port: u16,
    pub container_port: u16,
}

/// Identity, port mapping, and lifecycle state of one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDescriptor {
    pub name: String,
    /// Runtime-assigned id. Empty until the container has been created.
    pub id: String,
    pub image: String,
    pub ports: Vec<PortMapping>,
    pub state: ContainerState,
}

impl ContainerDescriptor {
    /// A descriptor for a container that does not exist yet.
    #[must_use]
    pub fn absent(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: String::new(),
            image: image.into(),
            ports: Vec::new(),
            state: ContainerState::Absent,
        }
    }

    /// Move to `next`, rejecting steps the lifecycle does not allow.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] when `state -> next` is not a legal step.
    pub fn transition(&mut self, next: ContainerState) -> Result<(), IllegalTransition> {
        if !self.state.can_transition_to(next) {
            return Err(IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Host port mapped to `container_port`, if any.
    #[must_use]
    pub fn host_port_for(&self, container_port: u16) -> Option<u16> {
        self.ports
            .iter()
            .find(|p| p.container_port == container_port)
            .map(|p| p.host_port)
    }
}
