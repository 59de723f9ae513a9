//! `russh` implementation of the session seam.

use std::sync::Arc;
use std::time::Duration;

use russh::client::{self, Handle};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use russh::{ChannelMsg, Disconnect};
use tracing::debug;

use super::{
    CloseFuture, ConnectFuture, OpenStreamFuture, RemoteSession, RemoteStream, RunCommandFuture,
    SessionConnector,
};
use crate::error::TransportError;
use crate::target::{Credential, RemoteTarget};

const KEEPALIVE_INTERVAL_SECS: u64 = 30;

/// Host keys are not pinned; targets are addressed by operator-supplied
/// host names.
struct AcceptingHandler;

impl client::Handler for AcceptingHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Connects to remote hosts with `russh`.
#[derive(Clone)]
pub struct SshConnector {
    config: Arc<client::Config>,
}

impl std::fmt::Debug for SshConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConnector").finish_non_exhaustive()
    }
}

impl Default for SshConnector {
    fn default() -> Self {
        let config = client::Config {
            keepalive_interval: Some(Duration::from_secs(KEEPALIVE_INTERVAL_SECS)),
            ..client::Config::default()
        };
        Self {
            config: Arc::new(config),
        }
    }
}

impl SshConnector {
    async fn connect_session(&self, target: &RemoteTarget) -> Result<SshSession, TransportError> {
        let mut handle = client::connect(
            Arc::clone(&self.config),
            (target.hostname.as_str(), target.port),
            AcceptingHandler,
        )
        .await
        .map_err(|error| connection_failed(target, error))?;

        let outcome = match &target.credential {
            Credential::PrivateKey(path) => {
                let key = load_secret_key(path, None).map_err(|error| {
                    authentication_failed(target, format!("cannot load private key '{path}': {error}"))
                })?;
                let hash = handle
                    .best_supported_rsa_hash()
                    .await
                    .map_err(|error| connection_failed(target, error))?
                    .flatten();
                handle
                    .authenticate_publickey(
                        target.username.as_str(),
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash),
                    )
                    .await
            }
            Credential::Password(secret) => {
                handle
                    .authenticate_password(target.username.as_str(), secret.expose())
                    .await
            }
        }
        .map_err(|error| connection_failed(target, error))?;

        if !outcome.success() {
            drop(
                handle
                    .disconnect(Disconnect::ByApplication, "", "English")
                    .await,
            );
            return Err(authentication_failed(target, "credentials rejected"));
        }

        debug!(host = %target.address(), user = %target.username, "ssh session established");
        Ok(SshSession {
            handle,
            hostname: target.hostname.clone(),
            port: target.port,
        })
    }
}

impl SessionConnector for SshConnector {
    fn connect<'a>(&'a self, target: &'a RemoteTarget) -> ConnectFuture<'a> {
        Box::pin(async move {
            let session: Arc<dyn RemoteSession> = Arc::new(self.connect_session(target).await?);
            Ok(session)
        })
    }
}

struct SshSession {
    handle: Handle<AcceptingHandler>,
    hostname: String,
    port: u16,
}

impl SshSession {
    fn failure(&self, message: impl std::fmt::Display) -> TransportError {
        TransportError::ConnectionFailed {
            hostname: self.hostname.clone(),
            port: self.port,
            message: message.to_string(),
        }
    }
}

impl RemoteSession for SshSession {
    fn open_socket_stream<'a>(&'a self, remote_socket: &'a str) -> OpenStreamFuture<'a> {
        Box::pin(async move {
            let channel = self
                .handle
                .channel_open_direct_streamlocal(remote_socket)
                .await
                .map_err(std::io::Error::other)?;
            let stream: RemoteStream = Box::pin(channel.into_stream());
            Ok(stream)
        })
    }

    fn run_command<'a>(&'a self, command: &'a str) -> RunCommandFuture<'a> {
        Box::pin(async move {
            let mut channel = self
                .handle
                .channel_open_session()
                .await
                .map_err(|error| self.failure(error))?;
            channel
                .exec(true, command)
                .await
                .map_err(|error| self.failure(error))?;

            let mut exit_status = None;
            while let Some(message) = channel.wait().await {
                if let ChannelMsg::ExitStatus { exit_status: status } = message {
                    exit_status = Some(status);
                }
            }

            exit_status.ok_or_else(|| {
                self.failure(format!("remote command ended without an exit status: {command}"))
            })
        })
    }

    fn close(&self) -> CloseFuture<'_> {
        Box::pin(async move {
            if let Err(error) = self
                .handle
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
            {
                debug!(%error, "ssh disconnect failed");
            }
        })
    }
}

fn connection_failed(target: &RemoteTarget, error: impl std::fmt::Display) -> TransportError {
    TransportError::ConnectionFailed {
        hostname: target.hostname.clone(),
        port: target.port,
        message: error.to_string(),
    }
}

fn authentication_failed(target: &RemoteTarget, message: impl Into<String>) -> TransportError {
    TransportError::AuthenticationFailed {
        hostname: target.hostname.clone(),
        username: target.username.clone(),
        message: message.into(),
    }
}
