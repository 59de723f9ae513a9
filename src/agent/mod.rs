//! Detecting when a freshly started container's agent is serving.
//!
//! The bootstrap command runs attached inside the container. Two watchers
//! race to decide the outcome:
//!
//! - the command watcher streams every output chunk to the caller's
//!   [`LogSink`] and to an in-memory pipe, then reports `Failed` if the
//!   command exits non-zero or the exec breaks;
//! - the line scanner reads the pipe and reports `Ready` on the first line
//!   containing the readiness marker.
//!
//! Both report into a channel with room for both signals, so neither send
//! blocks. The first signal decides; the other watcher keeps running and its
//! signal is discarded. When both finish without a signal the agent exited
//! cleanly but never announced itself, which is reported as a failure.

mod script;

use std::sync::Arc;
use std::time::Duration;

use bollard::container::LogOutput;
use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::DEFAULT_READINESS_MARKER;
use crate::engine::{BootstrapExec, ContainerExecClient, EngineConnector, ExecOutput};
use crate::error::{AgentError, BerthError};
use crate::logging::LogSink;

pub(crate) use script::shell_quote;
pub use script::{bootstrap_exec, project_start_script};

/// Room for one signal from each watcher.
const SIGNAL_CAPACITY: usize = 2;

/// Buffer between the command watcher and the line scanner.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Reason reported when the bootstrap command ends without the marker.
pub const EXITED_WITHOUT_READINESS: &str = "agent exited without reporting readiness";

/// The outcome a watcher reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessSignal {
    /// The readiness marker was seen.
    Ready,
    /// The bootstrap command failed, with the captured reason.
    Failed(String),
}

/// Runs the bootstrap command and waits for the agent to come up.
#[derive(Debug, Clone)]
pub struct ReadinessDetector {
    marker: String,
    timeout: Option<Duration>,
}

impl Default for ReadinessDetector {
    fn default() -> Self {
        Self::new(DEFAULT_READINESS_MARKER)
    }
}

impl ReadinessDetector {
    /// Create a detector looking for `marker` with no time limit.
    #[must_use]
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            timeout: None,
        }
    }

    /// Give up after `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Return the marker this detector scans for.
    #[must_use]
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Run `request` and block until the agent is ready or has failed.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::BootstrapFailed` carrying the command's standard
    /// error when it exits non-zero, the exec failure when the command cannot
    /// run, [`EXITED_WITHOUT_READINESS`] when it exits cleanly without the
    /// marker, or a timeout description.
    pub async fn await_ready<C>(
        &self,
        client: Arc<C>,
        request: &BootstrapExec,
        sink: LogSink,
    ) -> Result<(), BerthError>
    where
        C: ContainerExecClient + Send + Sync + 'static,
    {
        let container_id = request.container_id();
        let bootstrap_failed = |reason: String| {
            BerthError::from(AgentError::BootstrapFailed {
                container_id: String::from(container_id),
                reason,
            })
        };

        let exec = EngineConnector::start_attached_exec_async(client.as_ref(), request)
            .await
            .map_err(|error| bootstrap_failed(error.to_string()))?;
        debug!(container = container_id, exec = %exec.exec_id, "bootstrap command started");

        let (signals, mut decisions) = mpsc::channel(SIGNAL_CAPACITY);
        let (pipe_writer, pipe_reader) = tokio::io::duplex(PIPE_CAPACITY);

        let command_watcher = tokio::spawn(watch_command(
            client,
            String::from(container_id),
            exec,
            CommandOutputs {
                sink,
                pipe: pipe_writer,
            },
            signals.clone(),
        ));
        let line_scanner = tokio::spawn(scan_for_marker(
            pipe_reader,
            self.marker.clone(),
            signals,
        ));

        let decision = match self.timeout {
            None => decisions.recv().await,
            Some(limit) => {
                let Ok(received) = tokio::time::timeout(limit, decisions.recv()).await else {
                    command_watcher.abort();
                    line_scanner.abort();
                    return Err(bootstrap_failed(format!(
                        "agent did not report readiness within {}ms",
                        limit.as_millis()
                    )));
                };
                received
            }
        };

        match decision {
            Some(ReadinessSignal::Ready) => {
                info!(container = container_id, "agent is ready");
                Ok(())
            }
            Some(ReadinessSignal::Failed(reason)) => Err(bootstrap_failed(reason)),
            None => Err(bootstrap_failed(String::from(EXITED_WITHOUT_READINESS))),
        }
    }
}

/// Where the command watcher copies output.
struct CommandOutputs {
    sink: LogSink,
    pipe: DuplexStream,
}

fn report(signals: &mpsc::Sender<ReadinessSignal>, signal: ReadinessSignal) {
    if signals.try_send(signal).is_err() {
        debug!("readiness already decided, discarding signal");
    }
}

async fn watch_command<C>(
    client: Arc<C>,
    container_id: String,
    exec: ExecOutput,
    outputs: CommandOutputs,
    signals: mpsc::Sender<ReadinessSignal>,
) where
    C: ContainerExecClient + Send + Sync + 'static,
{
    let ExecOutput {
        exec_id,
        output: mut stream,
    } = exec;
    let CommandOutputs { sink, pipe } = outputs;
    let mut pipe = Some(pipe);
    let mut stderr = Vec::new();

    while let Some(item) = stream.next().await {
        let chunk = match item {
            Ok(chunk) => chunk,
            Err(error) => {
                report(&signals, ReadinessSignal::Failed(error.to_string()));
                return;
            }
        };

        let bytes = match chunk {
            LogOutput::StdErr { message } => {
                stderr.extend_from_slice(&message);
                message
            }
            other => other.into_bytes(),
        };
        sink.write_chunk(&bytes);

        if let Some(writer) = pipe.as_mut()
            && writer.write_all(&bytes).await.is_err()
        {
            // The scanner has stopped reading.
            pipe = None;
        }
    }
    drop(pipe);

    match EngineConnector::wait_for_exec_exit_async(client.as_ref(), &container_id, &exec_id).await
    {
        Ok(0) => debug!(container = %container_id, "bootstrap command exited cleanly"),
        Ok(code) => {
            let captured = String::from_utf8_lossy(&stderr).into_owned();
            let reason = if captured.trim().is_empty() {
                format!("bootstrap command exited with status {code}")
            } else {
                captured
            };
            report(&signals, ReadinessSignal::Failed(reason));
        }
        Err(error) => report(&signals, ReadinessSignal::Failed(error.to_string())),
    }
}

async fn scan_for_marker(
    pipe: DuplexStream,
    marker: String,
    signals: mpsc::Sender<ReadinessSignal>,
) {
    let mut lines = BufReader::new(pipe).split(b'\n');
    loop {
        match lines.next_segment().await {
            Ok(Some(line)) => {
                if String::from_utf8_lossy(&line).contains(&marker) {
                    report(&signals, ReadinessSignal::Ready);
                    return;
                }
            }
            Ok(None) => return,
            Err(error) => {
                debug!(%error, "stopped scanning bootstrap output");
                return;
            }
        }
    }
}
