//! # dockfix
//!
//! Starts containers the way test fixtures do: pull, publish ports, wait
//! for a readiness line in the logs, and clean up on exit.

mod commands;
mod output;

use clap::Parser;
use dockfix_sdk::InterruptHandle;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let main_thread = InterruptHandle::current();
    ctrlc::set_handler(move || main_thread.interrupt())
        .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {e}"))?;

    commands::execute(cli)
}
