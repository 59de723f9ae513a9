//! Target option model.
//!
//! A target is a named container-runtime destination. Callers describe it with
//! a flat JSON option bag keyed by human-readable field names (`"Sock Path"`,
//! `"Remote Hostname"` and so on). [`TargetOptions`] is the parsed bag and
//! [`TargetOptions::mode`] turns it into an exhaustive [`TargetMode`], the
//! single point where local versus remote operation is decided.
//!
//! Everything in this module is pure: no I/O, no environment lookups.

mod manifest;

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::TargetError;

pub use manifest::{
    LOCAL_TARGET_NAME, ManifestProperty, PresetTarget, PropertyType, REMOTE_ONLY_PATTERN,
    TargetManifest, preset_targets, target_manifest,
};

/// Option key for the remote SSH host.
pub const REMOTE_HOSTNAME: &str = "Remote Hostname";
/// Option key for the remote SSH port.
pub const REMOTE_PORT: &str = "Remote Port";
/// Option key for the remote SSH user.
pub const REMOTE_USER: &str = "Remote User";
/// Option key for the remote SSH password.
pub const REMOTE_PASSWORD: &str = "Remote Password";
/// Option key for the remote SSH private key path.
pub const REMOTE_PRIVATE_KEY_PATH: &str = "Remote Private Key Path";
/// Option key for the local container engine socket.
pub const SOCK_PATH: &str = "Sock Path";
/// Option key for the remote directory holding project working trees.
pub const WORKSPACE_DATA_DIR: &str = "Workspace Data Dir";

/// A secret string whose `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the secret value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// The parsed target option bag.
///
/// Every field is optional; blank strings are treated as absent when the
/// mode is decided.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetOptions {
    /// Remote SSH host.
    #[serde(rename = "Remote Hostname", default, skip_serializing_if = "Option::is_none")]
    pub remote_hostname: Option<String>,

    /// Remote SSH port.
    #[serde(rename = "Remote Port", default, skip_serializing_if = "Option::is_none")]
    pub remote_port: Option<u16>,

    /// Remote SSH user.
    #[serde(rename = "Remote User", default, skip_serializing_if = "Option::is_none")]
    pub remote_user: Option<String>,

    /// Remote SSH password.
    #[serde(rename = "Remote Password", default, skip_serializing_if = "Option::is_none")]
    pub remote_password: Option<Secret>,

    /// Path to a private key used instead of the password.
    #[serde(
        rename = "Remote Private Key Path",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub remote_private_key_path: Option<Utf8PathBuf>,

    /// Local container engine socket.
    #[serde(rename = "Sock Path", default, skip_serializing_if = "Option::is_none")]
    pub sock_path: Option<String>,

    /// Directory on the remote host that holds project working trees.
    #[serde(
        rename = "Workspace Data Dir",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub workspace_data_dir: Option<Utf8PathBuf>,
}

/// How the remote host should authenticate the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Authenticate with the private key at this path.
    PrivateKey(Utf8PathBuf),
    /// Authenticate with a password.
    Password(Secret),
}

/// A fully specified remote target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    /// Remote SSH host.
    pub hostname: String,
    /// Remote SSH port.
    pub port: u16,
    /// Remote SSH user.
    pub username: String,
    /// The credential presented to the host.
    pub credential: Credential,
    /// Directory on the remote host that holds project working trees.
    pub workspace_data_dir: Option<Utf8PathBuf>,
}

impl RemoteTarget {
    /// Return the remote working-tree root.
    ///
    /// # Errors
    ///
    /// Returns `TargetError::MalformedOptions` when `Workspace Data Dir` was
    /// not supplied.
    pub fn workspace_data_dir(&self) -> Result<&Utf8Path, TargetError> {
        self.workspace_data_dir
            .as_deref()
            .ok_or_else(|| TargetError::MalformedOptions {
                message: format!("'{WORKSPACE_DATA_DIR}' is required for remote targets"),
            })
    }

    /// Return `host:port` for diagnostics.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

/// Where the container engine lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetMode {
    /// The engine socket is on this machine.
    ///
    /// `None` means the socket should be resolved from the environment.
    Local {
        /// The explicitly configured socket, if any.
        socket: Option<String>,
    },
    /// The engine is reached through an SSH tunnel.
    Remote(RemoteTarget),
}

impl TargetMode {
    /// Whether the engine runs on this machine.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local { .. })
    }
}

impl TargetOptions {
    /// Parse a raw JSON option bag.
    ///
    /// An empty or whitespace-only string parses as an empty bag.
    ///
    /// # Errors
    ///
    /// Returns `TargetError::MalformedOptions` for invalid JSON, non-object
    /// payloads and wrongly typed values. Unknown keys are ignored.
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(raw).map_err(|error| TargetError::MalformedOptions {
            message: error.to_string(),
        })
    }

    /// Decide whether this bag describes a local or remote target.
    ///
    /// With no remote fields the target is local, provided a `Sock Path` key
    /// is present (an empty value defers to the environment). A complete
    /// remote set needs a password or a private key; the key wins when both
    /// are given.
    ///
    /// # Errors
    ///
    /// Returns `TargetError::EndpointUnreachable` when neither a local socket
    /// nor a complete set of remote fields and credentials is present, and
    /// `TargetError::MalformedOptions` when a partial remote set is mixed with
    /// a local socket.
    pub fn mode(&self) -> Result<TargetMode, TargetError> {
        let hostname = non_blank(self.remote_hostname.as_deref());
        let username = non_blank(self.remote_user.as_deref());

        match (hostname, self.remote_port, username) {
            (None, None, None) => self.local_mode(),
            (Some(host), Some(port), Some(user)) => Ok(TargetMode::Remote(RemoteTarget {
                hostname: String::from(host),
                port,
                username: String::from(user),
                credential: self.credential()?,
                workspace_data_dir: self
                    .workspace_data_dir
                    .clone()
                    .filter(|dir| !dir.as_str().trim().is_empty()),
            })),
            _ => Err(self.partial_remote_error()),
        }
    }

    fn local_mode(&self) -> Result<TargetMode, TargetError> {
        let Some(socket) = self.sock_path.as_deref() else {
            return Err(TargetError::EndpointUnreachable {
                message: format!(
                    "neither '{SOCK_PATH}' nor '{REMOTE_HOSTNAME}', '{REMOTE_PORT}' and '{REMOTE_USER}' were supplied"
                ),
            });
        };

        Ok(TargetMode::Local {
            socket: non_blank(Some(socket)).map(String::from),
        })
    }

    fn credential(&self) -> Result<Credential, TargetError> {
        let key = self
            .remote_private_key_path
            .as_ref()
            .filter(|path| !path.as_str().trim().is_empty());
        if let Some(path) = key {
            return Ok(Credential::PrivateKey(path.clone()));
        }

        self.remote_password
            .as_ref()
            .filter(|secret| !secret.expose().is_empty())
            .map(|secret| Credential::Password(secret.clone()))
            .ok_or_else(|| TargetError::EndpointUnreachable {
                message: format!(
                    "remote target needs '{REMOTE_PASSWORD}' or '{REMOTE_PRIVATE_KEY_PATH}'"
                ),
            })
    }

    fn partial_remote_error(&self) -> TargetError {
        let message = format!(
            "'{REMOTE_HOSTNAME}', '{REMOTE_PORT}' and '{REMOTE_USER}' must be supplied together"
        );
        if self.sock_path.is_some() {
            TargetError::MalformedOptions { message }
        } else {
            TargetError::EndpointUnreachable { message }
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|trimmed| !trimmed.is_empty())
}

/// A named target and its raw option bag, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    /// Target name, for example `local`.
    pub name: String,
    /// Raw JSON option bag.
    pub options: String,
}

impl TargetDescriptor {
    /// Create a descriptor from a name and raw options.
    #[must_use]
    pub fn new(name: impl Into<String>, options: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: options.into(),
        }
    }

    /// Parse the descriptor's options and decide its mode.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`TargetOptions::parse`] and
    /// [`TargetOptions::mode`].
    pub fn mode(&self) -> Result<TargetMode, TargetError> {
        TargetOptions::parse(&self.options)?.mode()
    }
}
