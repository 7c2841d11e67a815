//! Docker Engine implementation of [`ContainerRuntime`] using `bollard`.

use std::collections::HashMap;
use std::time::Duration;

use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{ContainerSummary, HostConfig, PortBinding};
use bollard::Docker;
use futures_util::TryStreamExt;

use pagerepro_types::PortMapping;

use crate::error::RuntimeError;
use crate::runtime::{ContainerRuntime, ContainerSpec, RuntimeContainer};

/// Client for the local Docker Engine.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect over the default local socket (honours `DOCKER_HOST`).
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Unavailable`] if the client cannot be built.
    pub fn connect_local() -> Result<Self, RuntimeError> {
        let docker =
            Docker::connect_with_socket_defaults().map_err(|e| RuntimeError::Unavailable {
                message: e.to_string(),
            })?;
        Ok(Self { docker })
    }
}

fn map_err(id: &str, err: bollard::errors::Error) -> RuntimeError {
    match err {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => RuntimeError::NotFound { id: id.to_string() },
        bollard::errors::Error::DockerResponseServerError {
            status_code: 304, ..
        } => RuntimeError::NotModified { id: id.to_string() },
        other => RuntimeError::api(other.to_string()),
    }
}

fn port_key(port: &PortMapping) -> String {
    format!("{}/tcp", port.container_port)
}

fn summary_to_container(summary: ContainerSummary) -> RuntimeContainer {
    let ports = summary
        .ports
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| {
            p.public_port.map(|host_port| PortMapping {
                host_port,
                container_port: p.private_port,
            })
        })
        .collect();
    RuntimeContainer {
        id: summary.id.unwrap_or_default(),
        names: summary.names.unwrap_or_default(),
        image: summary.image.unwrap_or_default(),
        state: summary.state.unwrap_or_default(),
        ports,
    }
}

impl ContainerRuntime for DockerRuntime {
    async fn pull_image(&self, repository: &str, tag: &str) -> Result<(), RuntimeError> {
        let options = CreateImageOptions {
            from_image: repository,
            tag,
            ..Default::default()
        };
        let reference = format!("{repository}:{tag}");
        let mut progress = std::pin::pin!(self.docker.create_image(Some(options), None, None));
        while let Some(info) = progress
            .try_next()
            .await
            .map_err(|e| map_err(&reference, e))?
        {
            if let Some(status) = info.status {
                tracing::trace!(image = %reference, status = %status, "pull progress");
            }
        }
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let exposed_ports = spec
            .ports
            .iter()
            .map(|p| (port_key(p), HashMap::new()))
            .collect();
        let port_bindings = spec
            .ports
            .iter()
            .map(|p| {
                (
                    port_key(p),
                    Some(vec![PortBinding {
                        host_ip: None,
                        host_port: Some(p.host_port.to_string()),
                    }]),
                )
            })
            .collect();

        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            exposed_ports: Some(exposed_ports),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                publish_all_ports: Some(false),
                privileged: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| map_err(&spec.name, e))?;
        for warning in &response.warnings {
            tracing::warn!(container = %spec.name, warning = %warning, "container create warning");
        }
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| map_err(id, e))
    }

    async fn list_containers(&self) -> Result<Vec<RuntimeContainer>, RuntimeError> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };
        let summaries = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| map_err("*", e))?;
        Ok(summaries.into_iter().map(summary_to_container).collect())
    }

    async fn stop_container(&self, id: &str, grace: Duration) -> Result<(), RuntimeError> {
        let options = StopContainerOptions {
            t: i64::try_from(grace.as_secs()).unwrap_or(i64::MAX),
        };
        self.docker
            .stop_container(id, Some(options))
            .await
            .map_err(|e| map_err(id, e))
    }

    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptions {
            v: true,
            force: true,
            ..Default::default()
        };
        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(|e| map_err(id, e))
    }
}
