//! Domain primitive types used across the dockfix workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FixtureError, Result};

/// Identifier of a container as reported by the container manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a new container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first 12 characters, the conventional short form.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A TCP port published from a container to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortBinding {
    /// Port number on the host, used by test code to reach the container.
    pub exposed: u16,
    /// Port number the application listens on inside the container.
    pub inner: u16,
}

impl PortBinding {
    /// Creates a binding from host port `exposed` to container port `inner`.
    #[must_use]
    pub const fn new(exposed: u16, inner: u16) -> Self {
        Self { exposed, inner }
    }
}

impl fmt::Display for PortBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exposed, self.inner)
    }
}

impl FromStr for PortBinding {
    type Err = FixtureError;

    /// Parses `HOST:INNER`, or a single port used for both sides.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || FixtureError::Config {
            message: format!("invalid port binding: {s} (expected HOST:INNER)"),
        };
        let parse = |p: &str| p.trim().parse::<u16>().ok().filter(|&n| n != 0);
        match s.split_once(':') {
            Some((exposed, inner)) => Ok(Self::new(
                parse(exposed).ok_or_else(invalid)?,
                parse(inner).ok_or_else(invalid)?,
            )),
            None => parse(s).map(|p| Self::new(p, p)).ok_or_else(invalid),
        }
    }
}

/// An environment variable passed to a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvVar {
    /// Variable name.
    pub key: String,
    /// Variable value.
    pub value: String,
}

impl EnvVar {
    /// Creates a new environment variable.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for EnvVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

impl FromStr for EnvVar {
    type Err = FixtureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok(Self::new(key, value)),
            _ => Err(FixtureError::Config {
                message: format!("invalid environment variable: {s} (expected KEY=VALUE)"),
            }),
        }
    }
}

/// How long a fixture container lives relative to the tests using it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifecycle {
    /// One container shared by every case of a suite.
    #[default]
    PerSuite,
    /// A fresh container for each test case.
    PerCase,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerSuite => write!(f, "per-suite"),
            Self::PerCase => write!(f, "per-case"),
        }
    }
}
