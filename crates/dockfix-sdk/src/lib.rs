//! # dockfix-sdk
//!
//! Public SDK for starting Docker containers as test fixtures.
//!
//! - [`ContainerBuilder`](builder::ContainerBuilder): fluent API describing a
//!   container and the log line that marks it ready.
//! - [`FixtureSuite`]: starts containers before a suite or each case and
//!   stops them afterwards.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use dockfix_sdk::builder::ContainerBuilder;
//! use dockfix_sdk::{DockerCli, FixtureConfig, FixtureSuite, LogChecker};
//!
//! # fn main() -> dockfix_sdk::Result<()> {
//! let config = FixtureConfig::load()?;
//! let docker = Arc::new(DockerCli::new(&config)?);
//! let postgres = ContainerBuilder::new("postgres:16")
//!     .port(15432, 5432)
//!     .env("POSTGRES_PASSWORD", "secret")
//!     .wait_for("database system is ready to accept connections")
//!     .wait_timeout(Duration::from_secs(30))
//!     .build()?;
//!
//! let mut suite = FixtureSuite::new(LogChecker::with_config(docker, &config)).with(postgres);
//! suite.before_all()?;
//! // run tests against localhost:15432
//! suite.after_all()?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod builder;

pub use dockfix_common::config::FixtureConfig;
pub use dockfix_common::error::{FixtureError, Result};
pub use dockfix_common::types::{ContainerId, EnvVar, Lifecycle, PortBinding};
pub use dockfix_logs::interrupt::{self, InterruptHandle};
pub use dockfix_logs::{FirstMatchWaiter, LineSequence, MatchSpec, WaitOutcome};
pub use dockfix_runtime::{
    ContainerConfig, ContainerInfo, ContainerManager, ContainerSpec, DockerCli, Fixture, FixtureSuite,
    LogChecker, await_first_match, open_line_sequence,
};
