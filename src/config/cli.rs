//! Command-line argument definitions for berth.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Command-line interface for berth.
#[derive(Debug, Parser)]
#[command(name = "berth")]
#[command(
    author,
    version,
    about = "Provision development environments on local or SSH-tunnelled container engines"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file.
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Host directory holding local project working trees.
    #[arg(long, global = true)]
    pub base_path: Option<Utf8PathBuf>,

    /// Image used to host projects.
    #[arg(long, global = true)]
    pub builder_image: Option<String>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create and start a project, waiting for its agent, then follow its
    /// logs until interrupted.
    Start(StartArgs),

    /// Stop a project's container.
    Stop(ProjectArgs),

    /// Remove a project's container and working tree.
    Destroy(ProjectArgs),

    /// Print a project's container state as JSON.
    Info(ProjectArgs),

    /// Remove a workspace's directory.
    DestroyWorkspace(WorkspaceArgs),

    /// Print a workspace's metadata as JSON.
    WorkspaceInfo(WorkspaceArgs),

    /// Print the target option manifest as JSON.
    Manifest,

    /// Print the built-in targets as JSON.
    Presets,

    /// Check that a container engine is reachable.
    Requirements,
}

/// The target a command runs against.
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// Target name.
    #[arg(long, default_value = "local")]
    pub target: String,

    /// Target options as a JSON object.
    #[arg(long, default_value = r#"{"Sock Path":"/var/run/docker.sock"}"#)]
    pub target_options: String,
}

/// Arguments for project subcommands.
#[derive(Debug, Clone, Args)]
pub struct ProjectArgs {
    /// Workspace identifier.
    #[arg(long, required = true)]
    pub workspace: String,

    /// Project name.
    #[arg(long, required = true)]
    pub project: String,

    /// The project's own image.
    #[arg(long)]
    pub image: Option<String>,

    /// User the agent runs as inside the container.
    #[arg(long)]
    pub user: Option<String>,

    /// API key handed to the agent install script.
    #[arg(long)]
    pub api_key: Option<String>,

    /// Extra environment for the container, as `KEY=value`.
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Target selection.
    #[command(flatten)]
    pub target: TargetArgs,
}

/// Arguments for `start`.
#[derive(Debug, Clone, Args)]
pub struct StartArgs {
    /// Project selection.
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Return once the agent is ready instead of following container logs.
    #[arg(long)]
    pub detach: bool,
}

/// Arguments for workspace subcommands.
#[derive(Debug, Clone, Args)]
pub struct WorkspaceArgs {
    /// Workspace identifier.
    #[arg(long, required = true)]
    pub workspace: String,

    /// Target selection.
    #[command(flatten)]
    pub target: TargetArgs,
}
