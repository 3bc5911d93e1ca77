//! Waiting for containers to log a readiness line.

use std::sync::Arc;
use std::time::Duration;

use dockfix_common::config::FixtureConfig;
use dockfix_common::error::Result;
use dockfix_common::types::ContainerId;
use dockfix_logs::{FirstMatchWaiter, LineBridge, LineSequence, MatchSpec, WaitOutcome};

use crate::manager::ContainerManager;

/// Opens the log of a container as a sequence of lines.
///
/// The sequence follows the log until the container's output ends.
/// Dropping or closing it stops following.
///
/// # Errors
///
/// Returns an error if the manager cannot open the log stream.
pub fn open_line_sequence(manager: &dyn ContainerManager, id: &ContainerId) -> Result<LineSequence> {
    let bridge = LineBridge::new();
    manager.stream_logs(id, bridge.clone())?;
    Ok(LineSequence::new(bridge))
}

/// Waits up to `timeout` for a line of `sequence` containing `pattern`,
/// using the default waiter.
///
/// # Errors
///
/// See [`FirstMatchWaiter::await_first_match`].
pub fn await_first_match(
    sequence: LineSequence,
    pattern: &str,
    timeout: Duration,
) -> Result<WaitOutcome> {
    FirstMatchWaiter::new().await_first_match(sequence, &MatchSpec::new(pattern, timeout))
}

/// Waits on container logs through a [`ContainerManager`].
#[derive(Clone)]
pub struct LogChecker {
    manager: Arc<dyn ContainerManager>,
    waiter: FirstMatchWaiter,
    poll_interval: Duration,
}

impl LogChecker {
    /// Creates a checker with default settings.
    #[must_use]
    pub fn new(manager: Arc<dyn ContainerManager>) -> Self {
        Self::with_config(manager, &FixtureConfig::default())
    }

    /// Creates a checker following `config`.
    #[must_use]
    pub fn with_config(manager: Arc<dyn ContainerManager>, config: &FixtureConfig) -> Self {
        Self {
            manager,
            waiter: FirstMatchWaiter::from_config(config),
            poll_interval: config.poll_interval(),
        }
    }

    /// Returns the container manager logs are read through.
    #[must_use]
    pub const fn manager(&self) -> &Arc<dyn ContainerManager> {
        &self.manager
    }

    /// Waits for the log line `spec` asks for.
    ///
    /// Does not touch the log stream when `spec` requests no wait.
    ///
    /// # Errors
    ///
    /// Returns an error if the log stream cannot be opened, or the wait
    /// fails as described in [`FirstMatchWaiter::await_first_match`].
    pub fn wait_for_log(&self, spec: &MatchSpec, id: &ContainerId) -> Result<WaitOutcome> {
        if !spec.is_requested() {
            return Ok(WaitOutcome::Found);
        }
        let sequence = open_line_sequence(self.manager.as_ref(), id)?
            .with_poll_interval(self.poll_interval);
        self.waiter.await_first_match(sequence, spec)
    }
}

impl std::fmt::Debug for LogChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogChecker")
            .field("waiter", &self.waiter)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
