//! Configuration system for berth.
//!
//! This module provides the configuration structures and CLI definitions for
//! the berth application. Precedence merging is handled by the `ortho_config`
//! crate: CLI flags override environment variables, which override
//! configuration files, which override defaults.
//!
//! The configuration file is expected at `~/.config/berth/config.toml` by default.
//!
//! # Example Configuration
//!
//! ```toml
//! base_path = "/home/user/.local/share/berth/workspaces"
//! logs_dir = "/home/user/.local/state/berth/logs"
//!
//! [server]
//! url = "https://daytona.example.com"
//! api_url = "https://api.daytona.example.com"
//! port = 3987
//! api_port = 3986
//!
//! [agent]
//! download_url = "https://download.daytona.example.com/script"
//! readiness_marker = "Daytona Agent started"
//! ready_timeout_secs = 300
//!
//! [builder]
//! image = "daytonaio/workspace-project:latest"
//!
//! [remote]
//! docker_socket = "/var/run/docker.sock"
//! ```

mod cli;
mod loader;
mod types;

#[cfg(test)]
mod tests;

pub use cli::{Cli, Commands, ProjectArgs, StartArgs, TargetArgs, WorkspaceArgs};
pub use loader::{env_var_names, load_config, load_config_with_env};
pub use types::{
    AgentConfig, AppConfig, BuilderConfig, DEFAULT_API_PORT, DEFAULT_READINESS_MARKER,
    DEFAULT_SERVER_PORT, RemoteConfig, ServerConfig,
};
