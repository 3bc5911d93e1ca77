//! Fluent API for describing container fixtures.

use std::collections::HashSet;
use std::time::Duration;

use dockfix_common::constants::DEFAULT_WAIT_TIMEOUT;
use dockfix_common::error::{FixtureError, Result};
use dockfix_common::types::{Lifecycle, PortBinding};
use dockfix_logs::MatchSpec;
use dockfix_runtime::{ContainerConfig, ContainerSpec};

/// Builder for a container fixture.
#[derive(Debug, Clone)]
pub struct ContainerBuilder {
    config: ContainerConfig,
    wait_for: Option<String>,
    wait_timeout: Duration,
    lifecycle: Lifecycle,
}

impl ContainerBuilder {
    /// Creates a builder for a container of `image`.
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            config: ContainerConfig::new(image),
            wait_for: None,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            lifecycle: Lifecycle::PerSuite,
        }
    }

    /// Publishes container port `inner` on host port `exposed`.
    #[must_use]
    pub fn port(mut self, exposed: u16, inner: u16) -> Self {
        self.config.ports.push(PortBinding::new(exposed, inner));
        self
    }

    /// Sets an environment variable. A later value for the same key wins.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.config.env.insert(key.into(), value.into());
        self
    }

    /// Attaches the container to `network`, creating it if needed.
    #[must_use]
    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.config.networks.push(network.into());
        self
    }

    /// Waits for a log line containing `text` before the fixture is ready.
    #[must_use]
    pub fn wait_for(mut self, text: impl Into<String>) -> Self {
        self.wait_for = Some(text.into());
        self
    }

    /// Sets how long to wait for the log line.
    #[must_use]
    pub const fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Starts a fresh container for each test case instead of one per suite.
    #[must_use]
    pub const fn per_case(mut self) -> Self {
        self.lifecycle = Lifecycle::PerCase;
        self
    }

    /// Validates the description and returns the fixture spec.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Config`] if the image is empty, a port is
    /// zero, or two bindings publish the same host port.
    pub fn build(self) -> Result<ContainerSpec> {
        if self.config.image.trim().is_empty() {
            return Err(FixtureError::Config {
                message: "image is required".into(),
            });
        }
        let mut exposed = HashSet::new();
        for binding in &self.config.ports {
            if binding.exposed == 0 || binding.inner == 0 {
                return Err(FixtureError::Config {
                    message: format!("invalid port binding {binding}: ports must be non-zero"),
                });
            }
            if !exposed.insert(binding.exposed) {
                return Err(FixtureError::Config {
                    message: format!("host port {} is published twice", binding.exposed),
                });
            }
        }

        let wait = match self.wait_for {
            Some(text) => MatchSpec::new(text, self.wait_timeout),
            None => MatchSpec::nothing().with_timeout(self.wait_timeout),
        };
        tracing::debug!(image = %self.config.image, lifecycle = %self.lifecycle, "container fixture described");
        Ok(ContainerSpec {
            config: self.config,
            wait,
            lifecycle: self.lifecycle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_complete_spec() {
        let spec = ContainerBuilder::new("faustxvi/simple-two-ports")
            .port(8801, 8080)
            .port(8802, 8081)
            .env("GREETING", "hello")
            .network("backend")
            .wait_for("started")
            .wait_timeout(Duration::from_secs(3))
            .per_case()
            .build()
            .expect("valid");

        assert_eq!(spec.config.image, "faustxvi/simple-two-ports");
        assert_eq!(spec.config.ports.len(), 2);
        assert_eq!(spec.config.env.get("GREETING").map(String::as_str), Some("hello"));
        assert_eq!(spec.config.networks, vec!["backend"]);
        assert_eq!(spec.wait.pattern(), Some("started"));
        assert_eq!(spec.wait.timeout(), Duration::from_secs(3));
        assert_eq!(spec.lifecycle, Lifecycle::PerCase);
    }

    #[test]
    fn defaults_to_no_wait_per_suite() {
        let spec = ContainerBuilder::new("redis").build().expect("valid");
        assert!(!spec.wait.is_requested());
        assert_eq!(spec.lifecycle, Lifecycle::PerSuite);
    }

    #[test]
    fn later_env_value_wins() {
        let spec = ContainerBuilder::new("app")
            .env("MODE", "dev")
            .env("MODE", "test")
            .build()
            .expect("valid");
        assert_eq!(spec.config.env.len(), 1);
        assert_eq!(spec.config.env["MODE"], "test");
    }

    #[test]
    fn rejects_empty_image() {
        let err = ContainerBuilder::new("  ").build().unwrap_err();
        assert!(matches!(err, FixtureError::Config { .. }));
    }

    #[test]
    fn rejects_zero_ports() {
        let err = ContainerBuilder::new("app").port(0, 80).build().unwrap_err();
        assert!(err.to_string().contains("non-zero"));
    }

    #[test]
    fn rejects_duplicate_host_ports() {
        let err = ContainerBuilder::new("app")
            .port(8080, 80)
            .port(8080, 81)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("8080"));
    }
}
