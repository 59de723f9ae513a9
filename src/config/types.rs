//! Configuration data types for berth.

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Default port of the Daytona server.
pub const DEFAULT_SERVER_PORT: u16 = 3987;

/// Default port of the Daytona API.
pub const DEFAULT_API_PORT: u16 = 3986;

/// Text the agent prints once it is serving.
pub const DEFAULT_READINESS_MARKER: &str = "Daytona Agent started";

/// Where the server and API the agent reports to live.
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server URL handed to remote containers.
    pub url: Option<String>,

    /// API URL handed to remote containers.
    pub api_url: Option<String>,

    /// Server port, used to address the host from local containers.
    #[default(DEFAULT_SERVER_PORT)]
    pub port: u16,

    /// API port, used to address the host from local containers.
    #[default(DEFAULT_API_PORT)]
    pub api_port: u16,
}

/// How the in-container agent is fetched and recognised.
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    /// URL of the agent install script.
    #[default("http://localhost:3986/binary/script")]
    pub download_url: String,

    /// Agent version reported alongside provider info.
    pub version: Option<String>,

    /// Output line fragment that marks the agent as ready.
    #[default(String::from(DEFAULT_READINESS_MARKER))]
    pub readiness_marker: String,

    /// Upper bound on the wait for readiness. `None` waits indefinitely.
    pub ready_timeout_secs: Option<u64>,
}

/// The image used to host projects.
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault, Deserialize, Serialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Image reference.
    #[default("daytonaio/workspace-project:latest")]
    pub image: String,
}

/// Settings for targets reached over SSH.
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Engine socket on the remote host.
    #[default("/var/run/docker.sock")]
    pub docker_socket: String,
}

/// Root application configuration.
///
/// This structure is loaded from configuration files, environment variables,
/// and command-line arguments with layered precedence. The precedence order
/// (lowest to highest) is: defaults, configuration file, environment variables,
/// command-line arguments.
///
/// Configuration files are discovered in this order:
/// 1. Path specified via `BERTH_CONFIG_PATH` environment variable
/// 2. `.berth.toml` in the current working directory
/// 3. `.berth.toml` in the home directory
/// 4. `~/.config/berth/config.toml` (XDG default)
#[derive(Debug, Clone, Default, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "BERTH",
    post_merge_hook,
    discovery(
        app_name = "berth",
        env_var = "BERTH_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".berth.toml",
        config_cli_long = "config",
        config_cli_visible = true,
    )
)]
pub struct AppConfig {
    /// Host directory holding local project working trees.
    pub base_path: Option<Utf8PathBuf>,

    /// Directory receiving one log file per project.
    pub logs_dir: Option<Utf8PathBuf>,

    /// Directory holding forwarding sockets. Cleared at start-up.
    pub scratch_dir: Option<Utf8PathBuf>,

    /// Server addresses.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub server: ServerConfig,

    /// Agent bootstrap settings.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub agent: AgentConfig,

    /// Builder image settings.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub builder: BuilderConfig,

    /// Remote target settings.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub remote: RemoteConfig,
}

impl AppConfig {
    /// Check values that would only fail later, deep inside an operation.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> crate::error::Result<()> {
        let blank = [
            ("builder.image", self.builder.image.as_str()),
            ("agent.download_url", self.agent.download_url.as_str()),
            ("agent.readiness_marker", self.agent.readiness_marker.as_str()),
            ("remote.docker_socket", self.remote.docker_socket.as_str()),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty());

        if let Some((field, _)) = blank {
            return Err(crate::error::ConfigError::InvalidValue {
                field: String::from(field),
                reason: String::from("cannot be empty"),
            }
            .into());
        }

        if self.agent.ready_timeout_secs == Some(0) {
            return Err(crate::error::ConfigError::InvalidValue {
                field: String::from("agent.ready_timeout_secs"),
                reason: String::from("must be greater than zero"),
            }
            .into());
        }

        Ok(())
    }
}

impl PostMergeHook for AppConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        for dir in [&mut self.base_path, &mut self.logs_dir, &mut self.scratch_dir] {
            if dir.as_ref().is_some_and(|path| path.as_str().trim().is_empty()) {
                *dir = None;
            }
        }
        Ok(())
    }
}
