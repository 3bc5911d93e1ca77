//! Configuration model for fixtures and log waiting.
//!
//! Values come from defaults, an optional JSON file named by
//! `DOCKFIX_CONFIG`, and finally `DOCKFIX_*` environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{FixtureError, Result};

/// Root configuration for dockfix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    /// Explicit path to the container manager binary. Looked up on `PATH`
    /// when unset.
    pub docker_binary: Option<PathBuf>,
    /// Wait timeout used when a wait does not specify one.
    pub default_wait_timeout_ms: u64,
    /// Interval a blocked log reader waits between re-checks.
    pub poll_interval_ms: u64,
    /// Multiple of the wait timeout a cancelled search gets to exit.
    pub grace_factor: u32,
    /// Seconds a container gets to shut down gracefully when stopped.
    pub stop_timeout_secs: u32,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            docker_binary: None,
            default_wait_timeout_ms: duration_ms(constants::DEFAULT_WAIT_TIMEOUT),
            poll_interval_ms: duration_ms(constants::POLL_INTERVAL),
            grace_factor: constants::DEFAULT_GRACE_FACTOR,
            stop_timeout_secs: constants::DEFAULT_STOP_TIMEOUT_SECS,
        }
    }
}

impl FixtureConfig {
    /// Loads configuration from the process environment.
    ///
    /// Reads the file named by `DOCKFIX_CONFIG` when set, then applies the
    /// `DOCKFIX_*` overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an override
    /// is not a valid number.
    pub fn load() -> Result<Self> {
        let base = match std::env::var_os(constants::ENV_CONFIG) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        base.with_overrides(std::env::vars())
    }

    /// Reads a JSON configuration file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading configuration file");
        let content = std::fs::read_to_string(path).map_err(|e| FixtureError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `DOCKFIX_*` overrides from the given key/value pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if an override is not a valid number or the result
    /// fails validation.
    pub fn with_overrides<I, K, V>(mut self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let value = value.into();
            match key.as_ref() {
                constants::ENV_DOCKER => self.docker_binary = Some(PathBuf::from(value)),
                constants::ENV_WAIT_TIMEOUT_MS => {
                    self.default_wait_timeout_ms = parse_override(constants::ENV_WAIT_TIMEOUT_MS, &value)?;
                }
                constants::ENV_POLL_INTERVAL_MS => {
                    self.poll_interval_ms = parse_override(constants::ENV_POLL_INTERVAL_MS, &value)?;
                }
                constants::ENV_GRACE_FACTOR => {
                    self.grace_factor = parse_override(constants::ENV_GRACE_FACTOR, &value)?;
                }
                _ => {}
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks that the configured intervals are usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the poll interval or grace factor is zero.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(FixtureError::Config {
                message: "poll_interval_ms must be greater than zero".into(),
            });
        }
        if self.grace_factor == 0 {
            return Err(FixtureError::Config {
                message: "grace_factor must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Returns the default wait timeout.
    #[must_use]
    pub const fn default_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.default_wait_timeout_ms)
    }

    /// Returns the log poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| FixtureError::Config {
        message: format!("{key} must be a non-negative integer, got {value:?}"),
    })
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
