//! CLI command definitions and dispatch.

pub mod logs;
pub mod run;
pub mod stop;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dockfix_common::constants::{BIN_NAME, ENV_CONFIG};
use dockfix_sdk::{DockerCli, FixtureConfig};

/// dockfix: Docker containers as test fixtures.
#[derive(Parser, Debug)]
#[command(name = BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// JSON configuration file.
    #[arg(long, global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a container and wait until it is ready.
    Run(run::RunArgs),
    /// Follow container logs, optionally waiting for a line.
    Logs(logs::LogsArgs),
    /// Stop and remove containers.
    Stop(stop::StopArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the command fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Run(args) => run::execute(args, &config),
        Command::Logs(args) => logs::execute(args, &config),
        Command::Stop(args) => stop::execute(&args, &config),
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<FixtureConfig> {
    let config = match path {
        Some(path) => FixtureConfig::from_file(path)
            .and_then(|base| base.with_overrides(std::env::vars())),
        None => FixtureConfig::load(),
    };
    config.map_err(|e| anyhow::anyhow!("{e}"))
}

/// Connects to the Docker CLI named by `config`.
///
/// # Errors
///
/// Returns an error if the client binary cannot be found.
pub fn docker(config: &FixtureConfig) -> anyhow::Result<Arc<DockerCli>> {
    let docker = DockerCli::new(config).map_err(|e| anyhow::anyhow!("{e}"))?;
    tracing::debug!(binary = %docker.binary().display(), "using container manager");
    Ok(Arc::new(docker))
}
