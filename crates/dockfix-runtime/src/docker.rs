//! Container manager driving the `docker` command-line client.
//!
//! Every operation is one or more invocations of the client binary. Log
//! streaming keeps a `docker logs --follow` child alive: one reader thread per
//! output stream turns its bytes into [`Frame`]s and a single pump thread
//! feeds them through a [`FrameDecoder`] into the consumer's bridge.

use std::collections::HashSet;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::time::Duration;

use chrono::Utc;
use dockfix_common::config::FixtureConfig;
use dockfix_common::constants::{CONTAINER_NAME_PREFIX, DEFAULT_IMAGE_TAG, DOCKER_BINARY};
use dockfix_common::error::{FixtureError, Result};
use dockfix_common::types::ContainerId;
use dockfix_logs::{Frame, FrameDecoder, LineBridge, StreamKind};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::manager::{ContainerConfig, ContainerInfo, ContainerManager};

const FRAME_CHANNEL_CAPACITY: usize = 64;
const LOG_PUMP_THREAD: &str = "dockfix-log-pump";
const LOG_READER_THREAD: &str = "dockfix-log-reader";

/// [`ContainerManager`] implemented over the Docker CLI.
#[derive(Debug)]
pub struct DockerCli {
    binary: PathBuf,
    stop_timeout_secs: u32,
    poll_interval: Duration,
    created_networks: Mutex<HashSet<String>>,
}

impl DockerCli {
    /// Creates a manager using the configured binary, or `docker` from
    /// `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::NotFound`] if no binary is configured and
    /// `docker` is not on `PATH`.
    pub fn new(config: &FixtureConfig) -> Result<Self> {
        let binary = match &config.docker_binary {
            Some(path) => path.clone(),
            None => which::which(DOCKER_BINARY).map_err(|_| FixtureError::NotFound {
                kind: "container manager binary",
                id: format!("{DOCKER_BINARY} (install Docker or set DOCKFIX_DOCKER)"),
            })?,
        };
        Ok(Self::with_binary(binary, config))
    }

    /// Creates a manager invoking `binary`.
    #[must_use]
    pub fn with_binary(binary: impl Into<PathBuf>, config: &FixtureConfig) -> Self {
        Self {
            binary: binary.into(),
            stop_timeout_secs: config.stop_timeout_secs,
            poll_interval: config.poll_interval(),
            created_networks: Mutex::new(HashSet::new()),
        }
    }

    /// Returns the client binary this manager invokes.
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn output(&self, args: &[&str]) -> Result<Output> {
        tracing::trace!(args = %args.join(" "), "invoking docker");
        Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| FixtureError::Io {
                path: self.binary.clone(),
                source: e,
            })
    }

    /// Runs the client and returns its trimmed standard output.
    fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args)?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
        } else {
            Err(FixtureError::Command {
                program: self.binary.display().to_string(),
                args: args.join(" "),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        }
    }

    /// Runs the client and reports only whether it exited successfully.
    fn succeeds(&self, args: &[&str]) -> Result<bool> {
        Ok(self.output(args)?.status.success())
    }

    fn ensure_image(&self, reference: &str) -> Result<()> {
        if self.succeeds(&["image", "inspect", reference])? {
            return Ok(());
        }
        tracing::info!(image = %reference, "pulling image");
        let _ = self.run(&["pull", "--quiet", reference])?;
        Ok(())
    }

    fn ensure_network(&self, name: &str) -> Result<()> {
        if self.succeeds(&["network", "inspect", name])? {
            return Ok(());
        }
        let _ = self.run(&["network", "create", name])?;
        let _ = self.created_networks.lock().insert(name.to_owned());
        tracing::info!(network = %name, "network created");
        Ok(())
    }

    fn leave_network(&self, id: &ContainerId, network: &str) {
        if let Err(e) = self.run(&["network", "disconnect", network, id.as_str()]) {
            tracing::warn!(id = %id.short(), network = %network, error = %e, "failed to disconnect network");
        }
        if !self.created_networks.lock().contains(network) {
            return;
        }
        match self.run(&["network", "rm", network]) {
            Ok(_) => {
                let _ = self.created_networks.lock().remove(network);
                tracing::info!(network = %network, "network removed");
            }
            Err(e) => tracing::debug!(network = %network, error = %e, "network kept, still in use"),
        }
    }

    fn attach_and_start(&self, id: &ContainerId, networks: &[String]) -> Result<()> {
        for network in networks {
            let _ = self.run(&["network", "connect", network, id.as_str()])?;
        }
        let _ = self.run(&["start", id.as_str()])?;
        Ok(())
    }

    fn discard(&self, id: &ContainerId) {
        if let Err(e) = self.run(&["rm", "--force", id.as_str()]) {
            tracing::warn!(id = %id.short(), error = %e, "failed to discard container");
        }
    }
}

impl ContainerManager for DockerCli {
    fn start(&self, config: &ContainerConfig) -> Result<ContainerInfo> {
        let image = image_reference(&config.image);
        self.ensure_image(&image)?;
        for network in &config.networks {
            self.ensure_network(network)?;
        }

        let name = format!("{CONTAINER_NAME_PREFIX}{}", Uuid::new_v4().simple());
        let args = create_args(config, &name, &image);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let id = ContainerId::new(self.run(&args)?);

        if let Err(e) = self.attach_and_start(&id, &config.networks) {
            self.discard(&id);
            return Err(e);
        }
        tracing::info!(id = %id.short(), image = %image, name = %name, "container started");
        Ok(ContainerInfo {
            id,
            name,
            networks: config.networks.clone(),
            started_at: Utc::now(),
        })
    }

    fn stop(&self, container: &ContainerInfo) -> Result<()> {
        let id = &container.id;
        for network in &container.networks {
            self.leave_network(id, network);
        }
        let timeout = self.stop_timeout_secs.to_string();
        let _ = self.run(&["stop", "--time", &timeout, id.as_str()])?;
        let _ = self.run(&["rm", id.as_str()])?;
        tracing::info!(id = %id.short(), "container stopped and removed");
        Ok(())
    }

    /// Follows `docker logs --follow`.
    ///
    /// Stdout and stderr are read on separate threads. Lines keep their order
    /// within each stream, but the interleaving of the two streams is not
    /// preserved.
    fn stream_logs(&self, id: &ContainerId, bridge: LineBridge) -> Result<()> {
        let mut child = Command::new(&self.binary)
            .args(["logs", "--follow", id.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| FixtureError::Io {
                path: self.binary.clone(),
                source: e,
            })?;

        let frames = match start_readers(&mut child) {
            Ok(frames) => frames,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        };

        let poll_interval = self.poll_interval;
        let decoder = FrameDecoder::new(bridge);
        let container = id.clone();
        std::thread::Builder::new()
            .name(LOG_PUMP_THREAD.into())
            .spawn(move || pump(child, &frames, decoder, poll_interval, &container))
            .map(drop)
            .map_err(|e| FixtureError::Thread {
                name: LOG_PUMP_THREAD.into(),
                source: e,
            })?;
        tracing::debug!(id = %id.short(), "following container logs");
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.output(&["version", "--format", "{{.Server.Version}}"])
            .is_ok_and(|output| output.status.success())
    }
}

/// Adds the default tag to an image reference that has neither a tag nor a
/// digest.
#[must_use]
pub fn image_reference(image: &str) -> String {
    let last_segment = image.rsplit('/').next().unwrap_or(image);
    if last_segment.contains(':') || last_segment.contains('@') {
        image.to_owned()
    } else {
        format!("{image}:{DEFAULT_IMAGE_TAG}")
    }
}

fn create_args(config: &ContainerConfig, name: &str, image: &str) -> Vec<String> {
    let mut args = vec!["create".to_owned(), "--name".to_owned(), name.to_owned()];
    for var in config.env_vars() {
        args.push("--env".to_owned());
        args.push(var.to_string());
    }
    for port in &config.ports {
        args.push("--publish".to_owned());
        args.push(format!("{}:{}/tcp", port.exposed, port.inner));
    }
    args.push(image.to_owned());
    args
}

type FrameResult = io::Result<Frame>;

fn start_readers(child: &mut Child) -> Result<Receiver<FrameResult>> {
    let (tx, rx) = mpsc::sync_channel(FRAME_CHANNEL_CAPACITY);
    if let Some(stdout) = child.stdout.take() {
        spawn_reader(stdout, StreamKind::Stdout, tx.clone())?;
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_reader(stderr, StreamKind::Stderr, tx)?;
    }
    Ok(rx)
}

fn spawn_reader<R: Read + Send + 'static>(
    stream: R,
    kind: StreamKind,
    frames: SyncSender<FrameResult>,
) -> Result<()> {
    std::thread::Builder::new()
        .name(format!("{LOG_READER_THREAD}-{kind}"))
        .spawn(move || read_frames(stream, kind, &frames))
        .map(drop)
        .map_err(|e| FixtureError::Thread {
            name: format!("{LOG_READER_THREAD}-{kind}"),
            source: e,
        })
}

/// Sends one frame per output line until the stream ends or the pump is
/// gone.
fn read_frames(stream: impl Read, kind: StreamKind, frames: &SyncSender<FrameResult>) {
    let mut reader = BufReader::new(stream);
    loop {
        let mut payload = Vec::new();
        match reader.read_until(b'\n', &mut payload) {
            Ok(0) => return,
            Ok(_) => {
                if frames.send(Ok(Frame::new(kind, payload))).is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = frames.send(Err(e));
                return;
            }
        }
    }
}

/// Single producer of a bridge: forwards frames until the output ends, the
/// stream fails, or the consumer closes the bridge.
fn pump(
    mut child: Child,
    frames: &Receiver<FrameResult>,
    mut decoder: FrameDecoder,
    poll_interval: Duration,
    id: &ContainerId,
) {
    let mut failure = None;
    while decoder.is_listening() {
        match frames.recv_timeout(poll_interval) {
            Ok(Ok(frame)) => {
                if !decoder.on_frame(&frame) {
                    break;
                }
            }
            Ok(Err(e)) => {
                failure = Some(e.to_string());
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let listening = decoder.is_listening();
    if !listening || failure.is_some() {
        let _ = child.kill();
    }
    let status = child.wait();
    if !listening {
        tracing::debug!(id = %id.short(), lines = decoder.delivered(), "stopped following logs");
        return;
    }
    match (failure, status) {
        (Some(cause), _) => decoder.on_error(cause),
        (None, Ok(status)) if status.success() => decoder.on_complete(),
        (None, Ok(status)) => decoder.on_error(format!("docker logs exited with {status}")),
        (None, Err(e)) => decoder.on_error(e),
    }
}
