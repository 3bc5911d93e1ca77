//! Container manager abstraction.
//!
//! A [`ContainerManager`] starts and stops containers and streams their
//! output into a [`LineBridge`]. Everything above it (log checking and
//! fixtures) only talks to this trait.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dockfix_common::error::Result;
use dockfix_common::types::{ContainerId, EnvVar, PortBinding};
use dockfix_logs::LineBridge;

/// Configuration for starting a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Image reference. A missing tag means `latest`.
    pub image: String,
    /// Environment variables, keyed by name.
    pub env: BTreeMap<String, String>,
    /// TCP ports published on the host.
    pub ports: Vec<PortBinding>,
    /// Networks the container joins. Missing networks are created.
    pub networks: Vec<String>,
}

impl ContainerConfig {
    /// Creates a configuration for `image` with nothing else set.
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Self::default()
        }
    }

    /// Returns the environment as `KEY=VALUE` pairs, sorted by key.
    #[must_use]
    pub fn env_vars(&self) -> Vec<EnvVar> {
        self.env
            .iter()
            .map(|(key, value)| EnvVar::new(key.clone(), value.clone()))
            .collect()
    }
}

/// A container started by a [`ContainerManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    /// Identifier assigned by the container manager.
    pub id: ContainerId,
    /// Name given to the container.
    pub name: String,
    /// Networks the container was attached to.
    pub networks: Vec<String>,
    /// When the container was started.
    pub started_at: DateTime<Utc>,
}

impl ContainerInfo {
    /// Describes a container this process did not start, known only by its
    /// identifier. It has no networks to leave.
    #[must_use]
    pub fn from_id(id: ContainerId) -> Self {
        Self {
            name: id.to_string(),
            id,
            networks: Vec::new(),
            started_at: Utc::now(),
        }
    }
}

/// Starts, stops and streams the logs of containers.
///
/// Implementations must be usable from several threads: fixtures may stop
/// containers while another thread reads their logs.
pub trait ContainerManager: Send + Sync {
    /// Starts a container, pulling its image and creating its networks as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be obtained or the container
    /// cannot be created or started.
    fn start(&self, config: &ContainerConfig) -> Result<ContainerInfo>;

    /// Detaches the container from its networks, removing networks that are
    /// no longer in use, then stops and removes the container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be stopped or removed.
    fn stop(&self, container: &ContainerInfo) -> Result<()>;

    /// Follows the output of a container, pushing each line into `bridge`
    /// from a producer thread.
    ///
    /// The producer signals the end of the stream when the container's
    /// output ends and an error when reading fails. Closing the bridge
    /// shuts the stream down. Returns once the producer is running.
    ///
    /// Lines of one output stream arrive in order. Implementations that read
    /// stdout and stderr separately may interleave the two differently from
    /// the container.
    ///
    /// # Errors
    ///
    /// Returns an error if the log stream cannot be opened.
    fn stream_logs(&self, id: &ContainerId, bridge: LineBridge) -> Result<()>;

    /// Returns whether this manager can reach its container engine.
    fn is_available(&self) -> bool;
}
