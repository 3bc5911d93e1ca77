//! `dockfix run`: start a container and wait until it is ready.

use std::time::{Duration, Instant};

use clap::Args;
use dockfix_common::types::EnvVar;
use dockfix_sdk::builder::ContainerBuilder;
use dockfix_sdk::{Fixture, FixtureConfig, LogChecker, PortBinding, interrupt};

use crate::output::{BOLD, CYAN, DIM, GREEN, RESET, YELLOW, format_elapsed, print_header};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Image to run. Untagged images use `latest`.
    pub image: String,

    /// Publish a container port on the host.
    #[arg(short = 'p', long = "publish", value_name = "HOST:INNER")]
    pub ports: Vec<PortBinding>,

    /// Set an environment variable in the container.
    #[arg(short, long, value_name = "KEY=VALUE")]
    pub env: Vec<EnvVar>,

    /// Attach the container to a network, creating it if needed.
    #[arg(long = "network", value_name = "NAME")]
    pub networks: Vec<String>,

    /// Wait for a log line containing this text.
    #[arg(long, value_name = "TEXT")]
    pub wait_for: Option<String>,

    /// How long to wait for the log line, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Leave the container running and exit once it is ready.
    #[arg(short, long)]
    pub detach: bool,
}

/// Executes the `run` command.
///
/// # Errors
///
/// Returns an error if the container cannot be started or never becomes
/// ready.
pub fn execute(args: RunArgs, config: &FixtureConfig) -> anyhow::Result<()> {
    print_header();
    let started = Instant::now();
    let docker = super::docker(config)?;

    let mut builder = ContainerBuilder::new(&args.image).wait_timeout(
        args.timeout_ms
            .map_or_else(|| config.default_wait_timeout(), Duration::from_millis),
    );
    for port in &args.ports {
        builder = builder.port(port.exposed, port.inner);
    }
    for var in args.env {
        builder = builder.env(var.key, var.value);
    }
    for network in args.networks {
        builder = builder.network(network);
    }
    if let Some(text) = &args.wait_for {
        builder = builder.wait_for(text);
        eprintln!("  Waiting for {BOLD}\"{text}\"{RESET} in the logs of {BOLD}{}{RESET}...", args.image);
    }
    let spec = builder.build().map_err(|e| anyhow::anyhow!("{e}"))?;

    let checker = LogChecker::with_config(docker, config);
    let fixture = match Fixture::start(&checker, &spec) {
        Ok(fixture) => fixture,
        Err(e) => {
            if e.is_wait_failure() {
                eprintln!("  {YELLOW}The container never became ready and was removed.{RESET}");
            }
            return Err(anyhow::anyhow!("{e}"));
        }
    };
    if interrupt::interrupted() {
        eprintln!("  {YELLOW}Interrupted before the container was ready.{RESET}");
        return stop(fixture);
    }
    report_ready(&fixture, &spec.config.ports, started.elapsed());

    if args.detach {
        if let Some(info) = fixture.detach() {
            eprintln!();
            eprintln!("  Running detached. Use {BOLD}dockfix stop {}{RESET} to stop it.", info.id.short());
            println!("{}", info.id);
        }
        return Ok(());
    }

    wait_for_shutdown(fixture)
}

fn report_ready(fixture: &Fixture, ports: &[PortBinding], elapsed: Duration) {
    let id = fixture.id().map_or("-", |id| id.short());
    eprintln!();
    eprintln!(
        "  {GREEN}●{RESET} {BOLD}{}{RESET} {DIM}[{id}]{RESET} ready in {}",
        fixture.image(),
        format_elapsed(elapsed)
    );
    for port in ports {
        eprintln!("    {CYAN}->{RESET} localhost:{} {DIM}(container port {}){RESET}", port.exposed, port.inner);
    }
}

fn wait_for_shutdown(fixture: Fixture) -> anyhow::Result<()> {
    eprintln!();
    eprintln!("  Press {BOLD}Ctrl+C{RESET} to stop the container...");
    while interrupt::sleep(Duration::from_secs(3600)) {}
    let _ = interrupt::interrupted();
    stop(fixture)
}

fn stop(fixture: Fixture) -> anyhow::Result<()> {
    eprintln!();
    eprintln!("  Stopping container...");
    fixture.stop().map_err(|e| anyhow::anyhow!("{e}"))?;
    eprintln!("  {GREEN}Container stopped and removed.{RESET}");
    Ok(())
}
