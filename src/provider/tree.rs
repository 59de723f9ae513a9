//! Project and workspace directories on the engine host.

use std::io;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use tracing::debug;

use crate::agent::shell_quote;
use crate::error::{BerthError, FilesystemError};
use crate::tunnel::RemoteSession;

/// A directory that lives either on this machine or on a tunnelled host.
#[derive(Clone)]
pub enum WorkingTree {
    /// A directory on this machine.
    Local(Utf8PathBuf),
    /// A directory on the remote host behind `session`.
    Remote {
        /// Remote path.
        dir: Utf8PathBuf,
        /// Session used to run shell commands on the host.
        session: Arc<dyn RemoteSession>,
    },
}

impl std::fmt::Debug for WorkingTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(dir) => f.debug_tuple("Local").field(dir).finish(),
            Self::Remote { dir, .. } => f.debug_struct("Remote").field("dir", dir).finish_non_exhaustive(),
        }
    }
}

impl WorkingTree {
    /// Return the directory path.
    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        match self {
            Self::Local(dir) | Self::Remote { dir, .. } => dir,
        }
    }

    /// Whether the directory is on this machine.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// Create the directory and its parents.
    ///
    /// # Errors
    ///
    /// Returns `FilesystemError` when it cannot be created, and the
    /// `TransportError` of a failed remote command.
    pub async fn prepare(&self) -> Result<(), BerthError> {
        match self {
            Self::Local(dir) => Dir::create_ambient_dir_all(dir, ambient_authority())
                .map_err(|error| BerthError::from(FilesystemError::from_io(dir, &error))),
            Self::Remote { dir, session } => {
                run_remote(session.as_ref(), dir, &format!("mkdir -p {}", shell_quote(dir.as_str())))
                    .await
            }
        }
    }

    /// Delete the directory and everything below it. A missing directory is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns `FilesystemError` when removal fails, and the
    /// `TransportError` of a failed remote command.
    pub async fn remove(&self) -> Result<(), BerthError> {
        match self {
            Self::Local(dir) => remove_local(dir),
            Self::Remote { dir, session } => {
                run_remote(session.as_ref(), dir, &format!("rm -rf {}", shell_quote(dir.as_str())))
                    .await
            }
        }
    }
}

fn remove_local(dir: &Utf8Path) -> Result<(), BerthError> {
    let fs_error = |error: &io::Error| BerthError::from(FilesystemError::from_io(dir, error));
    let (Some(parent), Some(name)) = (dir.parent(), dir.file_name()) else {
        return Err(fs_error(&io::Error::new(
            io::ErrorKind::InvalidInput,
            "refusing to remove a filesystem root",
        )));
    };

    let removed = Dir::open_ambient_dir(parent, ambient_authority())
        .and_then(|parent_dir| parent_dir.remove_dir_all(name));
    match removed {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            debug!(dir = %dir, "working tree already absent");
            Ok(())
        }
        Err(error) => Err(fs_error(&error)),
    }
}

async fn run_remote(
    session: &dyn RemoteSession,
    dir: &Utf8Path,
    command: &str,
) -> Result<(), BerthError> {
    let status = session.run_command(command).await?;
    if status == 0 {
        return Ok(());
    }
    Err(FilesystemError::IoError {
        path: dir.as_std_path().to_path_buf(),
        message: format!("remote command `{command}` exited with status {status}"),
    }
    .into())
}
