//! Containers started for tests and their lifecycle.
//!
//! A [`Fixture`] is one running container that is ready to use: its
//! readiness line, if any, has been seen. A [`FixtureSuite`] starts and stops
//! fixtures around a whole suite or around each case.

use std::sync::Arc;

use dockfix_common::error::Result;
use dockfix_common::types::{ContainerId, Lifecycle};
use dockfix_logs::{MatchSpec, WaitOutcome};

use crate::checker::LogChecker;
use crate::manager::{ContainerConfig, ContainerInfo, ContainerManager};

/// Everything needed to start a fixture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Container to start.
    pub config: ContainerConfig,
    /// Log line to wait for before the fixture counts as ready.
    pub wait: MatchSpec,
    /// Whether the container is shared by a suite or fresh for each case.
    pub lifecycle: Lifecycle,
}

/// A started container, stopped and removed on [`stop`](Self::stop) or drop.
pub struct Fixture {
    manager: Arc<dyn ContainerManager>,
    info: Option<ContainerInfo>,
    config: ContainerConfig,
}

impl Fixture {
    /// Starts the container described by `spec` and waits for its log line.
    ///
    /// If the wait is interrupted, the fixture is returned anyway and the
    /// thread's interrupt flag stays set.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be started, or the wait
    /// fails. In the latter case the container is stopped first.
    pub fn start(checker: &LogChecker, spec: &ContainerSpec) -> Result<Self> {
        let manager = Arc::clone(checker.manager());
        let info = manager.start(&spec.config)?;
        let id = info.id.clone();
        let fixture = Self {
            manager,
            info: Some(info),
            config: spec.config.clone(),
        };

        match checker.wait_for_log(&spec.wait, &id) {
            Ok(WaitOutcome::Found) => Ok(fixture),
            Ok(WaitOutcome::Interrupted) => {
                tracing::warn!(id = %id.short(), "interrupted while waiting for container, keeping it");
                Ok(fixture)
            }
            Err(e) => {
                tracing::warn!(id = %id.short(), error = %e, "container not ready, stopping it");
                if let Err(stop_err) = fixture.stop() {
                    tracing::warn!(id = %id.short(), error = %stop_err, "failed to stop unready container");
                }
                Err(e)
            }
        }
    }

    /// Returns the container, or `None` once stopped.
    #[must_use]
    pub const fn info(&self) -> Option<&ContainerInfo> {
        self.info.as_ref()
    }

    /// Returns the container identifier, or `None` once stopped.
    #[must_use]
    pub fn id(&self) -> Option<&ContainerId> {
        self.info.as_ref().map(|info| &info.id)
    }

    /// Returns the host port published for container port `inner`.
    #[must_use]
    pub fn host_port(&self, inner: u16) -> Option<u16> {
        self.config
            .ports
            .iter()
            .find(|binding| binding.inner == inner)
            .map(|binding| binding.exposed)
    }

    /// Returns the image the container was started from.
    #[must_use]
    pub fn image(&self) -> &str {
        &self.config.image
    }

    /// Releases the container without stopping it and returns it.
    #[must_use]
    pub fn detach(mut self) -> Option<ContainerInfo> {
        self.info.take()
    }

    /// Stops and removes the container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container manager fails to stop it.
    pub fn stop(mut self) -> Result<()> {
        match self.info.take() {
            Some(info) => self.manager.stop(&info),
            None => Ok(()),
        }
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        if let Some(info) = self.info.take() {
            if let Err(e) = self.manager.stop(&info) {
                tracing::warn!(id = %info.id.short(), error = %e, "failed to stop dropped fixture");
            }
        }
    }
}

impl std::fmt::Debug for Fixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fixture")
            .field("info", &self.info)
            .field("image", &self.config.image)
            .finish_non_exhaustive()
    }
}

/// Fixtures of one test suite.
///
/// Call [`before_all`](Self::before_all) and [`after_all`](Self::after_all)
/// around the suite and [`before_each`](Self::before_each) and
/// [`after_each`](Self::after_each) around each case. Fixtures still
/// running when the suite is dropped are stopped.
#[derive(Debug)]
pub struct FixtureSuite {
    checker: LogChecker,
    specs: Vec<ContainerSpec>,
    per_suite: Vec<Fixture>,
    per_case: Vec<Fixture>,
}

impl FixtureSuite {
    /// Creates an empty suite.
    #[must_use]
    pub const fn new(checker: LogChecker) -> Self {
        Self {
            checker,
            specs: Vec::new(),
            per_suite: Vec::new(),
            per_case: Vec::new(),
        }
    }

    /// Adds a container to the suite.
    #[must_use]
    pub fn with(mut self, spec: ContainerSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Starts the per-suite containers, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns the first start failure. Containers started before it keep
    /// running until [`after_all`](Self::after_all).
    pub fn before_all(&mut self) -> Result<()> {
        start_all(&self.checker, &self.specs, Lifecycle::PerSuite, &mut self.per_suite)
    }

    /// Stops the per-suite containers.
    ///
    /// # Errors
    ///
    /// Returns the first stop failure, after trying to stop every container.
    pub fn after_all(&mut self) -> Result<()> {
        stop_all(&mut self.per_suite)
    }

    /// Starts the per-case containers, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns the first start failure. Containers started before it keep
    /// running until [`after_each`](Self::after_each).
    pub fn before_each(&mut self) -> Result<()> {
        start_all(&self.checker, &self.specs, Lifecycle::PerCase, &mut self.per_case)
    }

    /// Stops the per-case containers.
    ///
    /// # Errors
    ///
    /// Returns the first stop failure, after trying to stop every container.
    pub fn after_each(&mut self) -> Result<()> {
        stop_all(&mut self.per_case)
    }

    /// Returns the running fixtures, per-suite ones first.
    pub fn fixtures(&self) -> impl Iterator<Item = &Fixture> {
        self.per_suite.iter().chain(&self.per_case)
    }

    /// Returns the running fixture started from `image`, if any.
    #[must_use]
    pub fn fixture(&self, image: &str) -> Option<&Fixture> {
        self.fixtures().find(|fixture| fixture.image() == image)
    }
}

fn start_all(
    checker: &LogChecker,
    specs: &[ContainerSpec],
    lifecycle: Lifecycle,
    running: &mut Vec<Fixture>,
) -> Result<()> {
    for spec in specs.iter().filter(|spec| spec.lifecycle == lifecycle) {
        running.push(Fixture::start(checker, spec)?);
    }
    tracing::debug!(%lifecycle, running = running.len(), "fixtures started");
    Ok(())
}

fn stop_all(running: &mut Vec<Fixture>) -> Result<()> {
    let mut first_error = None;
    for fixture in running.drain(..) {
        if let Err(e) = fixture.stop() {
            tracing::warn!(error = %e, "failed to stop fixture");
            if first_error.is_none() {
                first_error = Some(e);
            }
        }
    }
    first_error.map_or(Ok(()), Err)
}
