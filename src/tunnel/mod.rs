//! Forwarding of a remote container engine socket over SSH.
//!
//! A [`TunnelManager`] authenticates to the remote host, binds a fresh Unix
//! socket under its scratch directory and relays every local connection to
//! the remote engine socket through a `direct-streamlocal` channel. The
//! returned [`Tunnel`] owns the session, the relay task and the socket file;
//! all three are released by [`Tunnel::close`] or, failing that, on drop.
//!
//! The SSH transport sits behind [`SessionConnector`] and [`RemoteSession`] so
//! tunnel behaviour can be exercised without a live host.

mod ssh;

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{BerthError, TransportError};
use crate::target::RemoteTarget;

pub use ssh::SshConnector;

/// A bidirectional byte stream to the remote engine socket.
pub trait RemoteIo: AsyncRead + AsyncWrite + Send {}

impl<T: AsyncRead + AsyncWrite + Send + ?Sized> RemoteIo for T {}

/// Stream type returned by [`RemoteSession::open_socket_stream`].
pub type RemoteStream = Pin<Box<dyn RemoteIo>>;

/// Boxed future type returned by [`SessionConnector::connect`].
pub type ConnectFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Arc<dyn RemoteSession>, TransportError>> + Send + 'a>>;

/// Boxed future type returned by [`RemoteSession::open_socket_stream`].
pub type OpenStreamFuture<'a> = Pin<Box<dyn Future<Output = io::Result<RemoteStream>> + Send + 'a>>;

/// Boxed future type returned by [`RemoteSession::run_command`].
pub type RunCommandFuture<'a> =
    Pin<Box<dyn Future<Output = Result<u32, TransportError>> + Send + 'a>>;

/// Boxed future type returned by [`RemoteSession::close`].
pub type CloseFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Opens authenticated sessions to remote hosts.
pub trait SessionConnector: Send + Sync {
    /// Connect and authenticate to `target`.
    fn connect<'a>(&'a self, target: &'a RemoteTarget) -> ConnectFuture<'a>;
}

/// An authenticated session to a remote host.
pub trait RemoteSession: Send + Sync {
    /// Open a stream to a Unix socket on the remote host.
    fn open_socket_stream<'a>(&'a self, remote_socket: &'a str) -> OpenStreamFuture<'a>;

    /// Run a shell command on the remote host and return its exit status.
    fn run_command<'a>(&'a self, command: &'a str) -> RunCommandFuture<'a>;

    /// End the session.
    fn close(&self) -> CloseFuture<'_>;
}

/// Opens tunnels whose local sockets live under one scratch directory.
#[derive(Debug, Clone)]
pub struct TunnelManager<C> {
    connector: C,
    scratch_dir: Utf8PathBuf,
}

impl<C: SessionConnector> TunnelManager<C> {
    /// Create a manager placing sockets under `scratch_dir`.
    #[must_use]
    pub fn new(connector: C, scratch_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            connector,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Return the directory holding forwarding sockets.
    #[must_use]
    pub fn scratch_dir(&self) -> &Utf8Path {
        &self.scratch_dir
    }

    /// Open a tunnel from a new local socket to `remote_socket` on `target`.
    ///
    /// Authentication happens before the local socket is bound, so a rejected
    /// credential leaves nothing on disk.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::AuthenticationFailed` when the host rejects
    /// the credential and `TransportError::ConnectionFailed` when the session
    /// or the local socket cannot be established.
    pub async fn open(
        &self,
        target: &RemoteTarget,
        remote_socket: &str,
    ) -> Result<Tunnel, BerthError> {
        let session = self.connector.connect(target).await?;
        let socket_path = self.scratch_dir.join(format!("{}.sock", Uuid::new_v4()));

        let listener = match UnixListener::bind(&socket_path) {
            Ok(listener) => listener,
            Err(error) => {
                session.close().await;
                return Err(TransportError::ConnectionFailed {
                    hostname: target.hostname.clone(),
                    port: target.port,
                    message: format!("cannot bind forwarding socket '{socket_path}': {error}"),
                }
                .into());
            }
        };

        debug!(
            host = %target.address(),
            socket = %socket_path,
            remote_socket,
            "opened forwarding socket"
        );
        let relay = tokio::spawn(relay_connections(
            listener,
            Arc::clone(&session),
            String::from(remote_socket),
        ));

        Ok(Tunnel {
            socket_path,
            session,
            relay: Some(relay),
        })
    }
}

/// A live forwarding socket and the session behind it.
pub struct Tunnel {
    socket_path: Utf8PathBuf,
    session: Arc<dyn RemoteSession>,
    relay: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Tunnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tunnel")
            .field("socket_path", &self.socket_path)
            .field("relaying", &self.relay.is_some())
            .finish_non_exhaustive()
    }
}

impl Tunnel {
    /// Return the local forwarding socket.
    #[must_use]
    pub fn socket_path(&self) -> &Utf8Path {
        &self.socket_path
    }

    /// Return the session carrying the tunnel.
    #[must_use]
    pub fn session(&self) -> &Arc<dyn RemoteSession> {
        &self.session
    }

    /// Stop relaying, end the session and remove the socket file.
    pub async fn close(mut self) {
        self.stop_relay();
        self.session.close().await;
        debug!(socket = %self.socket_path, "closed tunnel");
    }

    fn stop_relay(&mut self) {
        if let Some(relay) = self.relay.take() {
            relay.abort();
        }
    }
}

impl Drop for Tunnel {
    fn drop(&mut self) {
        self.stop_relay();
        remove_socket_file(&self.socket_path);
    }
}

fn remove_socket_file(path: &Utf8Path) {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return;
    };
    let removed = Dir::open_ambient_dir(parent, ambient_authority())
        .and_then(|dir| dir.remove_file(name));
    match removed {
        Ok(()) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => warn!(socket = %path, %error, "failed to remove forwarding socket"),
    }
}

async fn relay_connections(
    listener: UnixListener,
    session: Arc<dyn RemoteSession>,
    remote_socket: String,
) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((local, _)) => {
                    connections.spawn(relay_connection(
                        local,
                        Arc::clone(&session),
                        remote_socket.clone(),
                    ));
                }
                Err(error) => {
                    warn!(%error, "forwarding socket stopped accepting");
                    break;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn relay_connection(
    mut local: UnixStream,
    session: Arc<dyn RemoteSession>,
    remote_socket: String,
) {
    let mut remote = match session.open_socket_stream(&remote_socket).await {
        Ok(stream) => stream,
        Err(error) => {
            warn!(%error, remote_socket, "cannot open remote socket channel");
            return;
        }
    };

    if let Err(error) = tokio::io::copy_bidirectional(&mut local, &mut remote).await {
        debug!(%error, "forwarded connection ended with error");
    }
}

#[cfg(test)]
pub(crate) mod test_doubles;
