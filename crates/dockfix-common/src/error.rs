//! Unified error types for the dockfix workspace.
//!
//! Log waiting failures (`Timeout`, `PatternNotFound`, `ThreadLeak`) live
//! next to the container manager failures. Interruption has no variant: it
//! is reported through the thread's interrupt flag.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path or program where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A container manager command exited unsuccessfully.
    #[error("`{program} {args}` failed ({status}): {stderr}")]
    Command {
        /// Program that was invoked.
        program: String,
        /// Space-joined arguments of the invocation.
        args: String,
        /// Exit status description.
        status: String,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// An operation was called in a state that does not allow it.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the violated precondition.
        message: String,
    },

    /// The deadline elapsed before a log line matched.
    #[error("timeout while waiting for log: \"{pattern}\" (after {} ms)", .timeout.as_millis())]
    Timeout {
        /// Text that was waited for.
        pattern: String,
        /// Deadline that elapsed.
        timeout: Duration,
    },

    /// The log stream ended before a line matched.
    #[error("\"{pattern}\" not found in logs and container stopped")]
    PatternNotFound {
        /// Text that was waited for.
        pattern: String,
    },

    /// A background log search did not terminate after cancellation.
    #[error("log matcher thread still running {} ms after cancellation", .grace.as_millis())]
    ThreadLeak {
        /// Grace period the thread was given to terminate.
        grace: Duration,
    },

    /// A worker thread could not be spawned.
    #[error("failed to spawn thread {name}: {source}")]
    Thread {
        /// Name of the thread that failed to start.
        name: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The background log search panicked.
    #[error("log matcher failed: {message}")]
    MatcherFailed {
        /// Panic payload, when it was a string.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl FixtureError {
    /// Returns whether this error came from waiting on container logs.
    #[must_use]
    pub const fn is_wait_failure(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::PatternNotFound { .. } | Self::ThreadLeak { .. }
        )
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, FixtureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_pattern() {
        let err = FixtureError::Timeout {
            pattern: "started".into(),
            timeout: Duration::from_millis(250),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("timeout while waiting for log"));
        assert!(msg.contains("\"started\""));
        assert!(msg.contains("250 ms"));
    }

    #[test]
    fn pattern_not_found_is_distinct_from_timeout() {
        let err = FixtureError::PatternNotFound {
            pattern: "ready".into(),
        };
        assert_eq!(
            err.to_string(),
            "\"ready\" not found in logs and container stopped"
        );
        assert!(!err.to_string().contains("timeout"));
    }

    #[test]
    fn wait_failures_are_classified() {
        assert!(
            FixtureError::ThreadLeak {
                grace: Duration::from_secs(1)
            }
            .is_wait_failure()
        );
        assert!(
            !FixtureError::Config {
                message: "x".into()
            }
            .is_wait_failure()
        );
    }
}
