//! Attached command execution inside running containers.
//!
//! This module wraps Bollard exec APIs behind a small trait seam so command
//! execution behaviour can be unit-tested without a live daemon. Starting an
//! exec and waiting for its exit are separate steps: callers consume the
//! output stream while the process is still running.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bollard::container::LogOutput;
use bollard::exec::{CreateExecOptions, CreateExecResults, StartExecOptions, StartExecResults};
use bollard::{Docker, errors::Error as BollardError};
use futures_util::Stream;
use tokio::time::sleep;

use super::EngineConnector;
use crate::error::{BerthError, ConfigError, ContainerError};

const EXEC_INSPECT_POLL_INTERVAL_MS: u64 = 100;

/// Boxed future type returned by [`ContainerExecClient::create_exec`].
pub type CreateExecFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CreateExecResults, BollardError>> + Send + 'a>>;

/// Boxed future type returned by [`ContainerExecClient::start_exec`].
pub type StartExecFuture<'a> =
    Pin<Box<dyn Future<Output = Result<StartExecResults, BollardError>> + Send + 'a>>;

/// Boxed future type returned by [`ContainerExecClient::inspect_exec`].
pub type InspectExecFuture<'a> = Pin<
    Box<
        dyn Future<Output = Result<bollard::models::ExecInspectResponse, BollardError>> + Send + 'a,
    >,
>;

/// Behaviour required to run and inspect exec sessions.
pub trait ContainerExecClient {
    /// Create an exec session in a running container.
    fn create_exec(
        &self,
        container_id: &str,
        options: CreateExecOptions<String>,
    ) -> CreateExecFuture<'_>;

    /// Start a previously created exec session.
    fn start_exec(&self, exec_id: &str, options: Option<StartExecOptions>) -> StartExecFuture<'_>;

    /// Inspect an exec session for running status and exit code.
    fn inspect_exec(&self, exec_id: &str) -> InspectExecFuture<'_>;
}

impl ContainerExecClient for Docker {
    fn create_exec(
        &self,
        container_id: &str,
        options: CreateExecOptions<String>,
    ) -> CreateExecFuture<'_> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move { Self::create_exec(self, &container_id_owned, options).await })
    }

    fn start_exec(&self, exec_id: &str, options: Option<StartExecOptions>) -> StartExecFuture<'_> {
        let exec_id_owned = String::from(exec_id);
        Box::pin(async move { Self::start_exec(self, &exec_id_owned, options).await })
    }

    fn inspect_exec(&self, exec_id: &str) -> InspectExecFuture<'_> {
        let exec_id_owned = String::from(exec_id);
        Box::pin(async move { Self::inspect_exec(self, &exec_id_owned).await })
    }
}

/// A command to run with stdout and stderr attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapExec {
    container_id: String,
    command: Vec<String>,
    user: Option<String>,
    env: Vec<String>,
}

impl BootstrapExec {
    /// Create an attached execution request.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when `container_id` or `command`
    /// is empty, and `ConfigError::InvalidValue` when the executable is blank.
    pub fn new(container_id: impl Into<String>, command: Vec<String>) -> Result<Self, BerthError> {
        let container_id_value = container_id.into();
        let id = String::from(validate_required_field("container", &container_id_value)?);

        Ok(Self {
            container_id: id,
            command: validate_command(command)?,
            user: None,
            env: Vec::new(),
        })
    }

    /// Run the command as `user`; blank values keep the image default.
    #[must_use]
    pub fn with_user(mut self, user: Option<String>) -> Self {
        self.user = user.filter(|value| !value.trim().is_empty());
        self
    }

    /// Set extra environment variables in `KEY=value` form.
    #[must_use]
    pub fn with_env(mut self, env: Vec<String>) -> Self {
        self.env = env;
        self
    }

    /// Return target container identifier.
    #[must_use]
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Return command argv entries.
    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Return the user the command runs as.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }
}

/// Output stream type of an attached exec session.
pub type ExecOutputStream = Pin<Box<dyn Stream<Item = Result<LogOutput, BollardError>> + Send>>;

/// A started exec session and its combined output.
pub struct ExecOutput {
    /// Daemon-assigned exec identifier.
    pub exec_id: String,
    /// Interleaved stdout and stderr chunks.
    pub output: ExecOutputStream,
}

impl std::fmt::Debug for ExecOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecOutput")
            .field("exec_id", &self.exec_id)
            .finish_non_exhaustive()
    }
}

impl EngineConnector {
    /// Start a command with stdout and stderr attached.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ExecFailed` when the exec cannot be created or
    /// started, or when the daemon does not attach the output streams.
    pub async fn start_attached_exec_async<C: ContainerExecClient + ?Sized>(
        client: &C,
        request: &BootstrapExec,
    ) -> Result<ExecOutput, BerthError> {
        let create_result = client
            .create_exec(request.container_id(), build_create_exec_options(request))
            .await
            .map_err(|error| {
                exec_failed(
                    request.container_id(),
                    format!("create exec failed: {error}"),
                )
            })?;

        let exec_id = create_result.id;
        let start_result = client
            .start_exec(&exec_id, Some(build_start_exec_options()))
            .await
            .map_err(|error| {
                exec_failed(
                    request.container_id(),
                    format!("start exec failed: {error}"),
                )
            })?;

        match start_result {
            StartExecResults::Attached { output, .. } => Ok(ExecOutput { exec_id, output }),
            StartExecResults::Detached => Err(exec_failed(
                request.container_id(),
                "daemon returned detached start result for attached exec",
            )),
        }
    }

    /// Poll an exec session until it stops and return its exit code.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ExecFailed` when inspection fails or the
    /// session ends without an exit code.
    pub async fn wait_for_exec_exit_async<C: ContainerExecClient + ?Sized>(
        client: &C,
        container_id: &str,
        exec_id: &str,
    ) -> Result<i64, BerthError> {
        loop {
            let inspect = client.inspect_exec(exec_id).await.map_err(|error| {
                exec_failed(container_id, format!("inspect exec failed: {error}"))
            })?;

            if inspect.running.unwrap_or(false) {
                sleep(Duration::from_millis(EXEC_INSPECT_POLL_INTERVAL_MS)).await;
                continue;
            }

            return inspect.exit_code.ok_or_else(|| {
                exec_failed(
                    container_id,
                    format!("exec session '{exec_id}' completed without an exit code"),
                )
            });
        }
    }
}

fn build_create_exec_options(request: &BootstrapExec) -> CreateExecOptions<String> {
    CreateExecOptions::<String> {
        attach_stdin: Some(false),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        tty: Some(false),
        env: (!request.env.is_empty()).then(|| request.env.clone()),
        cmd: Some(request.command().to_vec()),
        user: request.user().map(String::from),
        ..CreateExecOptions::default()
    }
}

const fn build_start_exec_options() -> StartExecOptions {
    StartExecOptions {
        detach: false,
        tty: false,
        output_capacity: None,
    }
}

fn validate_command(command: Vec<String>) -> Result<Vec<String>, BerthError> {
    let Some(executable) = command.first() else {
        return Err(BerthError::from(ConfigError::MissingRequired {
            field: String::from("command"),
        }));
    };

    if executable.trim().is_empty() {
        return Err(BerthError::from(ConfigError::InvalidValue {
            field: String::from("command"),
            reason: String::from("command executable must not be empty"),
        }));
    }

    Ok(command)
}

fn validate_required_field<'a>(field: &str, value: &'a str) -> Result<&'a str, BerthError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BerthError::from(ConfigError::MissingRequired {
            field: String::from(field),
        }));
    }

    Ok(trimmed)
}

fn exec_failed(container_id: &str, message: impl Into<String>) -> BerthError {
    BerthError::from(ContainerError::ExecFailed {
        container_id: String::from(container_id),
        message: message.into(),
    })
}
