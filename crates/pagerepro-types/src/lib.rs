//! Shared model types for the pagerepro harness.
//!
//! Kept in their own crate so the CQL, container, and engine crates can
//! share them without depending on each other.

#![warn(clippy::pedantic)]

pub mod container;
pub mod paging;
pub mod record;

pub use container::{ContainerDescriptor, ContainerState, PortMapping};
pub use paging::PageState;
pub use record::UserRecord;
