//! System-wide constants and defaults.

use std::time::Duration;

/// Interval a blocked log reader waits before re-checking closure and
/// interruption.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default time to wait for a log line before giving up.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Multiple of the wait timeout granted to a cancelled log search to exit.
pub const DEFAULT_GRACE_FACTOR: u32 = 2;

/// Seconds the container manager lets a container shut down gracefully.
pub const DEFAULT_STOP_TIMEOUT_SECS: u32 = 10;

/// Tag appended to image references that carry none.
pub const DEFAULT_IMAGE_TAG: &str = "latest";

/// Prefix of the names given to fixture containers.
pub const CONTAINER_NAME_PREFIX: &str = "dockfix-";

/// Name of the background log matcher thread.
pub const MATCHER_THREAD_NAME: &str = "dockfix-log-matcher";

/// Environment variable naming a JSON configuration file.
pub const ENV_CONFIG: &str = "DOCKFIX_CONFIG";
/// Environment variable overriding the container manager binary.
pub const ENV_DOCKER: &str = "DOCKFIX_DOCKER";
/// Environment variable overriding the default wait timeout in milliseconds.
pub const ENV_WAIT_TIMEOUT_MS: &str = "DOCKFIX_WAIT_TIMEOUT_MS";
/// Environment variable overriding the log poll interval in milliseconds.
pub const ENV_POLL_INTERVAL_MS: &str = "DOCKFIX_POLL_INTERVAL_MS";
/// Environment variable overriding the matcher grace factor.
pub const ENV_GRACE_FACTOR: &str = "DOCKFIX_GRACE_FACTOR";

/// Container manager binary looked up on `PATH` by default.
pub const DOCKER_BINARY: &str = "docker";

/// Application name used in CLI output.
pub const APP_NAME: &str = "dockfix";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "dockfix";
