//! `dockfix stop`: stop and remove containers.

use clap::Args;
use dockfix_sdk::{ContainerId, ContainerInfo, ContainerManager, FixtureConfig};

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Container IDs or names to stop.
    #[arg(required = true)]
    pub containers: Vec<String>,
}

/// Executes the `stop` command.
///
/// Tries every container before reporting failures.
///
/// # Errors
///
/// Returns an error if any container could not be stopped.
pub fn execute(args: &StopArgs, config: &FixtureConfig) -> anyhow::Result<()> {
    let docker = super::docker(config)?;
    let mut failed = Vec::new();
    for container in &args.containers {
        let info = ContainerInfo::from_id(ContainerId::new(container));
        match docker.stop(&info) {
            Ok(()) => println!("{container}"),
            Err(e) => {
                tracing::warn!(container = %container, error = %e, "failed to stop container");
                failed.push(container.as_str());
            }
        }
    }
    if failed.is_empty() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("failed to stop: {}", failed.join(", ")))
    }
}
