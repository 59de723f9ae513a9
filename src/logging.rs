//! Diagnostics and project output sinks.
//!
//! Two separate concerns live here. [`init_tracing`] installs the process-wide
//! `tracing` subscriber used for berth's own diagnostics. [`LogSink`] carries
//! the byte output of provisioned projects (bootstrap output, container logs)
//! to whatever writers the caller supplies, duplicating every chunk to each
//! of them.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter directives applied before `RUST_LOG`.
const BASE_DIRECTIVES: &str = "russh=warn,bollard=warn,hyper=warn,hyper_util=warn";

/// Default level when `RUST_LOG` is unset.
const DEFAULT_LEVEL: &str = "info";

/// Build the diagnostics filter from `RUST_LOG` layered over the base
/// directives.
#[must_use]
pub fn build_filter<E: mockable::Env>(env: &E) -> EnvFilter {
    let requested = env
        .string("RUST_LOG")
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| String::from(DEFAULT_LEVEL));
    EnvFilter::new(format!("{BASE_DIRECTIVES},{requested}"))
}

/// Install the global `tracing` subscriber writing to stderr.
///
/// Calling this more than once is harmless; later calls leave the first
/// subscriber in place.
pub fn init_tracing<E: mockable::Env>(env: &E) {
    let installed = tracing_subscriber::registry()
        .with(build_filter(env))
        .with(tracing_fmt::layer().with_writer(io::stderr))
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// An append-only, cloneable, fan-out byte sink for project output.
///
/// Clones share the same underlying writers. A failing writer is reported
/// through `tracing` and does not stop the others.
#[derive(Clone, Default)]
pub struct LogSink {
    writers: Arc<Vec<SharedWriter>>,
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink")
            .field("writers", &self.writers.len())
            .finish()
    }
}

impl LogSink {
    /// A sink that discards everything.
    #[must_use]
    pub fn discard() -> Self {
        Self::default()
    }

    /// A sink writing to a single writer.
    #[must_use]
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self::discard().with_writer(writer)
    }

    /// Return a sink that also writes to `writer`.
    #[must_use]
    pub fn with_writer(&self, writer: impl Write + Send + 'static) -> Self {
        let boxed: Box<dyn Write + Send> = Box::new(writer);
        let mut writers = self.writers.as_ref().clone();
        writers.push(Arc::new(Mutex::new(boxed)));
        Self {
            writers: Arc::new(writers),
        }
    }

    /// Return a sink duplicating output to both `self` and `other`.
    #[must_use]
    pub fn fan_out(&self, other: &Self) -> Self {
        let mut writers = self.writers.as_ref().clone();
        writers.extend(other.writers.iter().cloned());
        Self {
            writers: Arc::new(writers),
        }
    }

    /// Whether the sink has no writers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }

    /// Append `chunk` to every writer.
    pub fn write_chunk(&self, chunk: &[u8]) {
        for writer in self.writers.iter() {
            let mut guard = writer.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(error) = guard.write_all(chunk).and_then(|()| guard.flush()) {
                warn!(%error, "project log writer failed");
            }
        }
    }
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_chunk(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Forwards project output to `tracing::info!`, one event per line.
///
/// Partial lines are held until their newline arrives or the writer is
/// dropped.
#[derive(Debug)]
pub struct TracingLogWriter {
    project: String,
    pending: Vec<u8>,
}

impl TracingLogWriter {
    /// Create a writer tagging events with `project`.
    #[must_use]
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            pending: Vec::new(),
        }
    }

    fn emit(&self, line: &[u8]) {
        let text = String::from_utf8_lossy(line);
        let trimmed = text.trim_end_matches('\r');
        if !trimmed.is_empty() {
            tracing::info!(target: "berth::project", project = %self.project, "{trimmed}");
        }
    }
}

impl Write for TracingLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(position) = self.pending.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=position).collect();
            self.emit(line.strip_suffix(b"\n").unwrap_or(&line));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for TracingLogWriter {
    fn drop(&mut self) {
        let rest = std::mem::take(&mut self.pending);
        self.emit(&rest);
    }
}
