//! Choosing and opening the container engine a request talks to.
//!
//! A local target binds a client straight to a socket on this host. A remote
//! target first opens a [`Tunnel`] and binds the client to its forwarding
//! socket; the [`Endpoint`] then owns the tunnel until it is closed.

use std::sync::Arc;

use bollard::Docker;
use camino::Utf8Path;
use tracing::debug;

use super::{EngineConnector, SocketResolver};
use crate::error::BerthError;
use crate::target::{TargetMode, TargetOptions};
use crate::tunnel::{RemoteSession, SessionConnector, Tunnel, TunnelManager};

/// Remote engine socket used when none is configured.
pub const DEFAULT_REMOTE_SOCKET: &str = "/var/run/docker.sock";

/// A configured engine client and whatever keeps it reachable.
///
/// Clones share the tunnel; it is released when the last clone is closed or
/// dropped.
#[derive(Debug, Clone)]
pub struct Endpoint {
    docker: Docker,
    socket: String,
    tunnel: Option<Arc<Tunnel>>,
}

impl Endpoint {
    /// Return the engine client.
    #[must_use]
    pub const fn docker(&self) -> &Docker {
        &self.docker
    }

    /// Return the socket the client is bound to.
    #[must_use]
    pub fn socket(&self) -> &str {
        &self.socket
    }

    /// Whether the engine is reached without a tunnel.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        self.tunnel.is_none()
    }

    /// Return the remote session behind a tunnelled endpoint.
    #[must_use]
    pub fn session(&self) -> Option<&Arc<dyn RemoteSession>> {
        self.tunnel.as_deref().map(Tunnel::session)
    }

    /// Release this handle, closing the tunnel when no clone still uses it.
    pub async fn close(self) {
        let Some(tunnel) = self.tunnel else {
            return;
        };
        match Arc::try_unwrap(tunnel) {
            Ok(owned) => owned.close().await,
            Err(shared) => {
                debug!(
                    socket = %shared.socket_path(),
                    "tunnel still in use, leaving it open"
                );
            }
        }
    }
}

/// Resolves target options to a connected [`Endpoint`].
#[derive(Debug)]
pub struct EndpointResolver<C, E> {
    tunnels: TunnelManager<C>,
    env: E,
    remote_socket: String,
}

impl<C: SessionConnector, E: mockable::Env> EndpointResolver<C, E> {
    /// Create a resolver opening tunnels through `tunnels` and reading engine
    /// fallbacks from `env`.
    #[must_use]
    pub fn new(tunnels: TunnelManager<C>, env: E) -> Self {
        Self {
            tunnels,
            env,
            remote_socket: String::from(DEFAULT_REMOTE_SOCKET),
        }
    }

    /// Use `socket` as the engine socket on remote hosts.
    #[must_use]
    pub fn with_remote_socket(mut self, socket: impl Into<String>) -> Self {
        self.remote_socket = socket.into();
        self
    }

    /// Return the directory holding forwarding sockets.
    #[must_use]
    pub fn scratch_dir(&self) -> &Utf8Path {
        self.tunnels.scratch_dir()
    }

    /// Return the environment used for local socket fallbacks.
    #[must_use]
    pub const fn env(&self) -> &E {
        &self.env
    }

    /// Parse `options` and open the endpoint they describe.
    ///
    /// # Errors
    ///
    /// Returns the `TargetError` from [`TargetOptions::mode`] and the errors
    /// of [`Self::resolve_mode`].
    pub async fn resolve(&self, options: &TargetOptions) -> Result<Endpoint, BerthError> {
        let mode = options.mode()?;
        self.resolve_mode(&mode).await
    }

    /// Open the endpoint for an already classified target.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ConnectionFailed` when the client cannot be
    /// configured and the `TransportError` of a failed tunnel.
    pub async fn resolve_mode(&self, mode: &TargetMode) -> Result<Endpoint, BerthError> {
        match mode {
            TargetMode::Local { socket } => {
                let resolver = SocketResolver::new(&self.env);
                let resolved = EngineConnector::resolve_socket(socket.as_deref(), &resolver);
                debug!(socket = %resolved, "using local engine socket");
                let docker = EngineConnector::connect(&resolved)?;
                Ok(Endpoint {
                    docker,
                    socket: resolved,
                    tunnel: None,
                })
            }
            TargetMode::Remote(remote) => {
                let tunnel = self.tunnels.open(remote, &self.remote_socket).await?;
                let socket = tunnel.socket_path().to_string();
                debug!(host = %remote.address(), socket, "using tunnelled engine socket");
                // Dropping the tunnel on failure removes its socket.
                let docker = EngineConnector::connect(&socket)?;
                Ok(Endpoint {
                    docker,
                    socket,
                    tunnel: Some(Arc::new(tunnel)),
                })
            }
        }
    }
}
