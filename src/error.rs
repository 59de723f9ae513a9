//! Semantic error types for the berth provisioning client.
//!
//! This module defines the error hierarchy for berth, following the principle of
//! using semantic error enums (via `thiserror`) for conditions the caller might
//! inspect or map to a user-facing status, while reserving opaque errors
//! (`eyre::Report`) for the application boundary.
//!
//! Nothing in the crate retries automatically. Transport failures surface
//! immediately so credential or network misconfiguration is never masked.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A required configuration value is missing.
    #[error("missing required configuration: {field}")]
    MissingRequired {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// The `OrthoConfig` library returned an error during configuration loading.
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

/// Errors raised while interpreting a target option bag.
#[derive(Debug, Error)]
pub enum TargetError {
    /// The option bag is structurally invalid. The caller must fix the request.
    #[error("malformed target options: {message}")]
    MalformedOptions {
        /// A description of what is wrong with the options.
        message: String,
    },

    /// Neither a local socket nor a complete remote endpoint was supplied.
    #[error("container endpoint unreachable: {message}")]
    EndpointUnreachable {
        /// Which part of the endpoint description is missing.
        message: String,
    },
}

/// Errors raised by the secure remote transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote host rejected the supplied credentials.
    #[error("authentication failed for {username}@{hostname}: {message}")]
    AuthenticationFailed {
        /// The remote host.
        hostname: String,
        /// The user that attempted to authenticate.
        username: String,
        /// A description of the failure.
        message: String,
    },

    /// The remote session or the local forward could not be established.
    #[error("connection to {hostname}:{port} failed: {message}")]
    ConnectionFailed {
        /// The remote host.
        hostname: String,
        /// The remote SSH port.
        port: u16,
        /// A description of the connection failure.
        message: String,
    },
}

/// Errors that can occur during container operations.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Failed to connect to the container engine socket.
    #[error("failed to connect to container engine: {message}")]
    ConnectionFailed {
        /// A description of the connection failure.
        message: String,
    },

    /// The container engine socket was not found.
    #[error("container engine socket not found: {path}")]
    SocketNotFound {
        /// The path where the socket was expected.
        path: PathBuf,
    },

    /// Permission denied when accessing the container engine socket.
    #[error("permission denied accessing container socket: {path}")]
    PermissionDenied {
        /// The path to the socket.
        path: PathBuf,
    },

    /// The builder image could not be pulled.
    #[error("failed to pull image '{image}': {message}")]
    ImagePullFailed {
        /// The image reference.
        image: String,
        /// The engine's diagnostic text.
        message: String,
    },

    /// Failed to create a container.
    #[error("failed to create container: {message}")]
    CreateFailed {
        /// The engine's diagnostic text.
        message: String,
    },

    /// Failed to start a container.
    #[error("failed to start container '{container_id}': {message}")]
    StartFailed {
        /// The ID or name of the container that failed to start.
        container_id: String,
        /// The engine's diagnostic text.
        message: String,
    },

    /// Failed to stop a container.
    #[error("failed to stop container '{container_id}': {message}")]
    StopFailed {
        /// The ID or name of the container.
        container_id: String,
        /// The engine's diagnostic text.
        message: String,
    },

    /// Failed to remove a container or its working directory.
    #[error("failed to destroy '{container_id}': {message}")]
    DestroyFailed {
        /// The ID or name of the container.
        container_id: String,
        /// The engine's diagnostic text.
        message: String,
    },

    /// The container record could not be located.
    #[error("container '{container_id}' not found")]
    NotFound {
        /// The ID or name that was looked up.
        container_id: String,
    },

    /// Failed to execute a command in a container.
    #[error("failed to execute command in container '{container_id}': {message}")]
    ExecFailed {
        /// The ID of the container.
        container_id: String,
        /// A description of the execution failure.
        message: String,
    },

    /// Health check timed out.
    #[error("container engine health check timed out after {seconds} seconds")]
    HealthCheckTimeout {
        /// The timeout duration in seconds.
        seconds: u64,
    },

    /// The requested operation is not valid for the project's current phase.
    #[error("cannot {operation} project '{project}' while it is {phase}")]
    InvalidTransition {
        /// The project's container name.
        project: String,
        /// The phase the project is currently in.
        phase: String,
        /// The operation that was refused.
        operation: String,
    },
}

/// Errors raised while bootstrapping the in-container agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent never reported readiness. `reason` carries the captured
    /// process output or the exec failure.
    #[error("agent bootstrap failed in container '{container_id}': {reason}")]
    BootstrapFailed {
        /// The container the agent was started in.
        container_id: String,
        /// The captured error output or failure description.
        reason: String,
    },
}

/// Errors that can occur during filesystem operations.
#[derive(Debug, Error)]
pub enum FilesystemError {
    /// A file or directory was not found.
    #[error("path not found: {path}")]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// Permission denied when accessing a path.
    #[error("permission denied: {path}")]
    PermissionDenied {
        /// The path that could not be accessed.
        path: PathBuf,
    },

    /// An I/O error occurred.
    #[error("I/O error at '{path}': {message}")]
    IoError {
        /// The path where the error occurred.
        path: PathBuf,
        /// A description of the I/O error.
        message: String,
    },
}

impl FilesystemError {
    /// Classify an I/O error raised while touching `path`.
    #[must_use]
    pub fn from_io(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        let path_buf = path.into();
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path: path_buf },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path: path_buf },
            _ => Self::IoError {
                path: path_buf,
                message: error.to_string(),
            },
        }
    }
}

/// Top-level error type for berth.
///
/// This enum aggregates all domain-specific errors into a single type. The
/// provider boundary wraps failures in [`BerthError::Operation`] so the
/// message names the operation and the project or workspace involved.
#[derive(Debug, Error)]
pub enum BerthError {
    /// An error occurred during configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The target options could not be interpreted.
    #[error(transparent)]
    Target(#[from] TargetError),

    /// The secure remote transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An error occurred during container operations.
    #[error(transparent)]
    Container(#[from] ContainerError),

    /// The in-container agent did not become ready.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// An error occurred during filesystem operations.
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    /// A failure annotated with the operation and subject it happened in.
    #[error("{operation} '{subject}': {source}")]
    Operation {
        /// The operation that failed, for example `start project`.
        operation: &'static str,
        /// The project or workspace the operation ran against.
        subject: String,
        /// The underlying failure.
        #[source]
        source: Box<BerthError>,
    },
}

impl BerthError {
    /// Wrap this error with the operation and subject it occurred in.
    #[must_use]
    pub fn in_operation(self, operation: &'static str, subject: impl Into<String>) -> Self {
        Self::Operation {
            operation,
            subject: subject.into(),
            source: Box::new(self),
        }
    }

    /// Return the innermost error, looking through operation context.
    #[must_use]
    pub fn root(&self) -> &Self {
        let mut current = self;
        while let Self::Operation { source, .. } = current {
            current = source;
        }
        current
    }

    /// Whether this error reports a missing container record.
    ///
    /// Callers can treat this as "already gone".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root(),
            Self::Container(ContainerError::NotFound { .. })
        )
    }
}

/// A specialised `Result` type for berth operations.
pub type Result<T> = std::result::Result<T, BerthError>;
