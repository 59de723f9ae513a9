//! Process-lifetime provider settings.

use std::io;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use tracing::debug;
use uuid::Uuid;

use crate::agent::ReadinessDetector;
use crate::config::{AgentConfig, AppConfig, ServerConfig};
use crate::error::{BerthError, ConfigError, FilesystemError};

/// Scratch directory name used when none is configured.
const DEFAULT_SCRATCH_NAME: &str = "target-socks";

/// Working-tree root used when no base path is configured.
const DEFAULT_BASE_NAME: &str = "berth/workspaces";

/// Settings captured once at start-up and shared by every operation.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    base_path: Utf8PathBuf,
    logs_dir: Option<Utf8PathBuf>,
    scratch_dir: Utf8PathBuf,
    owns_scratch: bool,
    server: ServerConfig,
    agent: AgentConfig,
    builder_image: String,
    remote_socket: String,
}

impl ProviderContext {
    /// Capture `config` and claim a fresh forwarding-socket directory.
    ///
    /// Every call gets its own `<scratch_dir>/<uuid>` subdirectory, so
    /// processes sharing one scratch root never touch each other's sockets.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when the temporary directory is not
    /// UTF-8 and `FilesystemError` when the subdirectory cannot be created.
    pub fn initialize(config: &AppConfig) -> Result<Self, BerthError> {
        let mut context = Self::from_config(config)?;
        context.scratch_dir = create_session_dir(&context.scratch_dir)?;
        context.owns_scratch = true;
        debug!(scratch = %context.scratch_dir, "claimed forwarding socket directory");
        Ok(context)
    }

    /// Remove the forwarding-socket directory claimed by [`Self::initialize`].
    ///
    /// Contexts built with [`Self::from_config`] own nothing and leave the
    /// filesystem alone.
    ///
    /// # Errors
    ///
    /// Returns `FilesystemError` when the directory cannot be removed.
    pub fn release_scratch(&self) -> Result<(), BerthError> {
        if !self.owns_scratch {
            return Ok(());
        }
        let dir = &self.scratch_dir;
        let fs_error = |error: &io::Error| BerthError::from(FilesystemError::from_io(dir, error));
        let (Some(parent), Some(name)) = (dir.parent(), dir.file_name()) else {
            return Ok(());
        };

        let parent_dir =
            Dir::open_ambient_dir(parent, ambient_authority()).map_err(|error| fs_error(&error))?;
        match parent_dir.remove_dir_all(name) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => return Err(fs_error(&error)),
        }
        debug!(scratch = %dir, "released forwarding socket directory");
        Ok(())
    }

    /// Capture `config` without touching the filesystem.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when a default directory is
    /// needed and the temporary directory is not UTF-8.
    pub fn from_config(config: &AppConfig) -> Result<Self, BerthError> {
        let scratch_dir = match config.scratch_dir.clone() {
            Some(dir) => dir,
            None => temp_dir()?.join(DEFAULT_SCRATCH_NAME),
        };
        let base_path = match config.base_path.clone() {
            Some(dir) => dir,
            None => temp_dir()?.join(DEFAULT_BASE_NAME),
        };

        Ok(Self {
            base_path,
            logs_dir: config.logs_dir.clone(),
            scratch_dir,
            owns_scratch: false,
            server: config.server.clone(),
            agent: config.agent.clone(),
            builder_image: config.builder.image.clone(),
            remote_socket: config.remote.docker_socket.clone(),
        })
    }

    /// Root of local working trees.
    #[must_use]
    pub fn base_path(&self) -> &Utf8Path {
        &self.base_path
    }

    /// Directory receiving per-project log files, if any.
    #[must_use]
    pub fn logs_dir(&self) -> Option<&Utf8Path> {
        self.logs_dir.as_deref()
    }

    /// Directory holding forwarding sockets.
    #[must_use]
    pub fn scratch_dir(&self) -> &Utf8Path {
        &self.scratch_dir
    }

    /// Server addresses handed to containers.
    #[must_use]
    pub const fn server(&self) -> &ServerConfig {
        &self.server
    }

    /// Agent download and readiness settings.
    #[must_use]
    pub const fn agent(&self) -> &AgentConfig {
        &self.agent
    }

    /// Image the agent runs in.
    #[must_use]
    pub fn builder_image(&self) -> &str {
        &self.builder_image
    }

    /// Engine socket on remote hosts.
    #[must_use]
    pub fn remote_socket(&self) -> &str {
        &self.remote_socket
    }

    /// Build the readiness detector the agent settings describe.
    #[must_use]
    pub fn readiness_detector(&self) -> ReadinessDetector {
        ReadinessDetector::new(self.agent.readiness_marker.clone())
            .with_timeout(self.agent.ready_timeout_secs.map(Duration::from_secs))
    }
}

fn temp_dir() -> Result<Utf8PathBuf, BerthError> {
    Utf8PathBuf::from_path_buf(std::env::temp_dir()).map_err(|path| {
        BerthError::from(ConfigError::InvalidValue {
            field: String::from("scratch_dir"),
            reason: format!("temporary directory is not UTF-8: {}", path.display()),
        })
    })
}

/// Create `root` if needed and a new, uniquely named directory inside it.
fn create_session_dir(root: &Utf8Path) -> Result<Utf8PathBuf, BerthError> {
    let fs_error = |error: &io::Error| BerthError::from(FilesystemError::from_io(root, error));

    Dir::create_ambient_dir_all(root, ambient_authority()).map_err(|error| fs_error(&error))?;
    let root_dir =
        Dir::open_ambient_dir(root, ambient_authority()).map_err(|error| fs_error(&error))?;

    let name = Uuid::new_v4().simple().to_string();
    root_dir.create_dir(&name).map_err(|error| fs_error(&error))?;
    Ok(root.join(name))
}
