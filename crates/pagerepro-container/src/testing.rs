//! In-memory [`ContainerRuntime`] for tests.
//!
//! Mirrors the engine behaviours teardown depends on: name conflicts on
//! create, 304 when stopping a stopped container, 404 for unknown ids.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::RuntimeError;
use crate::runtime::{ContainerRuntime, ContainerSpec, RuntimeContainer};

struct MemoryContainer {
    name: String,
    spec: ContainerSpec,
    running: bool,
}

#[derive(Default)]
struct RuntimeState {
    pulled: Vec<String>,
    containers: BTreeMap<String, MemoryContainer>,
    next_id: u64,
    remove_calls: usize,
    last_stop_grace: Option<Duration>,
    fail_pull: Option<RuntimeError>,
    fail_create: Option<RuntimeError>,
    fail_start: Option<RuntimeError>,
    fail_remove: Option<RuntimeError>,
    fail_list: Option<RuntimeError>,
}

impl RuntimeState {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("{:064x}", self.next_id)
    }
}

/// Shared in-memory container engine.
#[derive(Clone, Default)]
pub struct MemoryRuntime {
    state: Arc<Mutex<RuntimeState>>,
}

impl MemoryRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RuntimeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail_pull_with(&self, err: RuntimeError) {
        self.state().fail_pull = Some(err);
    }

    pub fn fail_create_with(&self, err: RuntimeError) {
        self.state().fail_create = Some(err);
    }

    pub fn fail_start_with(&self, err: RuntimeError) {
        self.state().fail_start = Some(err);
    }

    pub fn fail_remove_with(&self, err: RuntimeError) {
        self.state().fail_remove = Some(err);
    }

    pub fn fail_list_with(&self, err: RuntimeError) {
        self.state().fail_list = Some(err);
    }

    /// Add an exited container named `name`, as a crashed run would leave it.
    pub fn insert_stopped(&self, name: &str) -> String {
        let mut state = self.state();
        let id = state.allocate_id();
        let spec = ContainerSpec {
            name: name.to_string(),
            image: "cassandra:3.11.1".to_string(),
            ports: Vec::new(),
            env: Vec::new(),
        };
        state.containers.insert(
            id.clone(),
            MemoryContainer {
                name: name.to_string(),
                spec,
                running: false,
            },
        );
        id
    }

    #[must_use]
    pub fn container_named(&self, name: &str) -> Option<RuntimeContainer> {
        self.state()
            .containers
            .iter()
            .find(|(_, c)| c.name == name)
            .map(|(id, c)| to_runtime(id, c))
    }

    /// Every container currently known.
    #[must_use]
    pub fn containers(&self) -> Vec<RuntimeContainer> {
        self.state()
            .containers
            .iter()
            .map(|(id, c)| to_runtime(id, c))
            .collect()
    }

    #[must_use]
    pub fn env_of(&self, name: &str) -> Vec<String> {
        self.state()
            .containers
            .values()
            .find(|c| c.name == name)
            .map(|c| c.spec.env.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn pulled_images(&self) -> Vec<String> {
        self.state().pulled.clone()
    }

    #[must_use]
    pub fn remove_calls(&self) -> usize {
        self.state().remove_calls
    }

    #[must_use]
    pub fn last_stop_grace(&self) -> Option<Duration> {
        self.state().last_stop_grace
    }
}

fn to_runtime(id: &str, c: &MemoryContainer) -> RuntimeContainer {
    RuntimeContainer {
        id: id.to_string(),
        names: vec![format!("/{}", c.name)],
        image: c.spec.image.clone(),
        state: if c.running { "running" } else { "exited" }.to_string(),
        ports: c.spec.ports.clone(),
    }
}

impl ContainerRuntime for MemoryRuntime {
    async fn pull_image(&self, repository: &str, tag: &str) -> Result<(), RuntimeError> {
        let mut state = self.state();
        if let Some(err) = state.fail_pull.clone() {
            return Err(err);
        }
        state.pulled.push(format!("{repository}:{tag}"));
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let mut state = self.state();
        if let Some(err) = state.fail_create.clone() {
            return Err(err);
        }
        if state.containers.values().any(|c| c.name == spec.name) {
            return Err(RuntimeError::api(format!(
                "Conflict. The container name \"/{}\" is already in use",
                spec.name
            )));
        }
        let id = state.allocate_id();
        state.containers.insert(
            id.clone(),
            MemoryContainer {
                name: spec.name.clone(),
                spec: spec.clone(),
                running: false,
            },
        );
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        let mut state = self.state();
        if let Some(err) = state.fail_start.clone() {
            return Err(err);
        }
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| RuntimeError::NotFound { id: id.to_string() })?;
        container.running = true;
        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<RuntimeContainer>, RuntimeError> {
        if let Some(err) = self.state().fail_list.clone() {
            return Err(err);
        }
        Ok(self.containers())
    }

    async fn stop_container(&self, id: &str, grace: Duration) -> Result<(), RuntimeError> {
        let mut state = self.state();
        state.last_stop_grace = Some(grace);
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| RuntimeError::NotFound { id: id.to_string() })?;
        if !container.running {
            return Err(RuntimeError::NotModified { id: id.to_string() });
        }
        container.running = false;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError> {
        let mut state = self.state();
        state.remove_calls += 1;
        if let Some(err) = state.fail_remove.clone() {
            return Err(err);
        }
        state
            .containers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::NotFound { id: id.to_string() })
    }
}
