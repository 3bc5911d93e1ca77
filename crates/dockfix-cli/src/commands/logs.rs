//! `dockfix logs`: follow container logs.

use std::time::{Duration, Instant};

use clap::Args;
use dockfix_sdk::{
    ContainerId, FirstMatchWaiter, FixtureConfig, FixtureError, MatchSpec, WaitOutcome, interrupt,
    open_line_sequence,
};

use crate::output::{BOLD, GREEN, RESET, YELLOW, format_elapsed};

/// Arguments for the `logs` command.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Container ID or name.
    pub container: String,

    /// Stop at the first line containing this text and report when it
    /// appeared.
    #[arg(long, value_name = "TEXT")]
    pub wait_for: Option<String>,

    /// How long to wait for the line, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

/// Executes the `logs` command.
///
/// Prints each line until the log ends or Ctrl+C is pressed. With
/// `--wait-for`, waits for the line instead and reports the outcome.
///
/// # Errors
///
/// Returns an error if the log cannot be opened or the awaited line does not
/// appear.
pub fn execute(args: LogsArgs, config: &FixtureConfig) -> anyhow::Result<()> {
    let docker = super::docker(config)?;
    let id = ContainerId::new(&args.container);

    let Some(text) = args.wait_for else {
        let mut lines = open_line_sequence(docker.as_ref(), &id).map_err(|e| anyhow::anyhow!("{e}"))?;
        let mut count = 0_u64;
        while lines.has_next() {
            let line = lines.next_line().map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("{line}");
            count += 1;
        }
        if interrupt::interrupted() {
            tracing::debug!(lines = count, "stopped following logs");
        }
        return Ok(());
    };

    let timeout = args
        .timeout_ms
        .map_or_else(|| config.default_wait_timeout(), Duration::from_millis);
    let spec = MatchSpec::new(text.as_str(), timeout);
    let started = Instant::now();
    let sequence = open_line_sequence(docker.as_ref(), &id)
        .map_err(|e| anyhow::anyhow!("{e}"))?
        .with_poll_interval(config.poll_interval());

    match FirstMatchWaiter::from_config(config).await_first_match(sequence, &spec) {
        Ok(WaitOutcome::Found) => {
            eprintln!(
                "  {GREEN}Found{RESET} {BOLD}\"{text}\"{RESET} after {}",
                format_elapsed(started.elapsed())
            );
            Ok(())
        }
        Ok(WaitOutcome::Interrupted) => {
            let _ = interrupt::interrupted();
            eprintln!("  {YELLOW}Interrupted{RESET} while waiting for \"{text}\"");
            Ok(())
        }
        Err(e @ (FixtureError::Timeout { .. } | FixtureError::PatternNotFound { .. })) => {
            Err(anyhow::anyhow!("{e}"))
        }
        Err(e) => Err(anyhow::anyhow!("log wait failed: {e}")),
    }
}
