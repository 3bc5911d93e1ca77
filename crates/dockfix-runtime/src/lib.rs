//! Container fixtures for dockfix: the container manager seam, a Docker CLI
//! implementation, readiness checks on container logs and fixture
//! lifecycle.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod checker;
pub mod docker;
pub mod fixture;
pub mod manager;

pub use checker::{LogChecker, await_first_match, open_line_sequence};
pub use docker::DockerCli;
pub use fixture::{ContainerSpec, Fixture, FixtureSuite};
pub use manager::{ContainerConfig, ContainerInfo, ContainerManager};
