//! Container engine connection and management.
//!
//! This module provides the interface to Docker or Podman engines. A local
//! target's socket is resolved through a priority-based fallback chain:
//!
//! 1. The target's `Sock Path` option
//! 2. `DOCKER_HOST` environment variable
//! 3. `CONTAINER_HOST` environment variable
//! 4. `PODMAN_HOST` environment variable
//! 5. Platform default (`/var/run/docker.sock` on Unix)
//!
//! Remote targets are reached through a forwarding socket opened by
//! [`crate::tunnel`]; see [`EndpointResolver`].

mod connection;
mod endpoint;

pub use connection::{
    BootstrapExec, ContainerCreator, ContainerEngine, ContainerExecClient,
    ContainerLifecycleClient, ContainerLogStream, ContainerSummary, CreateContainerFuture,
    CreateContainerRequest, CreateExecFuture, DOCKER_HOST_GATEWAY, EngineConnector, EngineFuture,
    ExecOutput, ExecOutputStream, InspectExecFuture, LABEL_PROJECT_IMAGE, LABEL_PROJECT_NAME,
    LABEL_WORKSPACE_ID, SocketResolver, StartExecFuture,
};
pub use endpoint::{DEFAULT_REMOTE_SOCKET, Endpoint, EndpointResolver};
