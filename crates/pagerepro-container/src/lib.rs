//! Container lifecycle for the pagerepro harness.
//!
//! [`ContainerLifecycleManager`] pulls, creates, starts, finds, and removes the
//! Cassandra container through the [`ContainerRuntime`] trait.
//! [`DockerRuntime`] talks to the local Docker Engine socket.

#![warn(clippy::pedantic)]

pub mod docker;
pub mod error;
pub mod lifecycle;
pub mod runtime;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use docker::DockerRuntime;
pub use error::{DestroyError, LocateError, ProvisionError, ProvisionStage, RuntimeError};
pub use lifecycle::{ContainerLifecycleManager, ImageRef, CASSANDRA_IMAGE, CQL_PORT};
pub use runtime::{ContainerRuntime, ContainerSpec, RuntimeContainer};
