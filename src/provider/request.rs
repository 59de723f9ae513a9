//! Requests accepted and records returned by the provider.

use std::collections::BTreeMap;

use bollard::auth::DockerCredentials;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::logging::LogSink;
use crate::target::TargetDescriptor;

/// Devcontainer build settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevcontainerConfig {
    /// Path of `devcontainer.json` relative to the project root.
    pub file_path: Utf8PathBuf,
}

/// How a project is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Set when the project builds from a devcontainer definition.
    pub devcontainer: Option<DevcontainerConfig>,
}

/// A project inside a workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project name, unique within its workspace.
    pub name: String,
    /// Owning workspace id.
    pub workspace_id: String,
    /// The project's own image.
    pub image: String,
    /// User the agent runs as. `None` keeps the image default.
    pub user: Option<String>,
    /// Extra container environment.
    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,
    /// Key the agent installer authenticates with.
    pub api_key: String,
    /// Build settings, if the caller supplied any.
    pub build: Option<BuildConfig>,
}

impl Project {
    /// Return the container name, `<workspace>-<project>`.
    #[must_use]
    pub fn container_name(&self) -> String {
        format!("{}-{}", self.workspace_id, self.name)
    }
}

/// Registry credentials, passed to the engine unchanged.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCredentials {
    /// Registry host.
    pub server: String,
    /// Registry user.
    pub username: String,
    /// Registry password or token.
    pub password: String,
}

impl std::fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("server", &self.server)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl From<&RegistryCredentials> for DockerCredentials {
    fn from(credentials: &RegistryCredentials) -> Self {
        Self {
            username: Some(credentials.username.clone()),
            password: Some(credentials.password.clone()),
            serveraddress: Some(credentials.server.clone()),
            ..Self::default()
        }
    }
}

/// A project operation request.
#[derive(Debug, Clone)]
pub struct ProjectRequest {
    /// The project to operate on.
    pub project: Project,
    /// Where the project lives.
    pub target: TargetDescriptor,
    /// Credentials for pulling the builder image.
    pub builder_registry: Option<RegistryCredentials>,
    /// Extra destination for the project's output.
    pub log_sink: Option<LogSink>,
}

impl ProjectRequest {
    /// Create a request with no registry credentials and no extra sink.
    #[must_use]
    pub const fn new(project: Project, target: TargetDescriptor) -> Self {
        Self {
            project,
            target,
            builder_registry: None,
            log_sink: None,
        }
    }

    /// Pull the builder image with `credentials`.
    #[must_use]
    pub fn with_builder_registry(mut self, credentials: RegistryCredentials) -> Self {
        self.builder_registry = Some(credentials);
        self
    }

    /// Also write project output to `sink`.
    #[must_use]
    pub fn with_log_sink(mut self, sink: LogSink) -> Self {
        self.log_sink = Some(sink);
        self
    }
}

/// A workspace operation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceRequest {
    /// Workspace id.
    pub workspace_id: String,
    /// Where the workspace lives.
    pub target: TargetDescriptor,
}

/// Observed state of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectInfo {
    /// Project name.
    pub name: String,
    /// Whether its container is running.
    pub is_running: bool,
    /// Container creation timestamp.
    pub created: String,
    /// JSON document describing the container.
    pub provider_metadata: String,
}

/// Observed state of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceInfo {
    /// Workspace id.
    pub name: String,
    /// JSON document describing the workspace.
    pub provider_metadata: String,
}

/// Identity of this provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    /// Machine name.
    pub name: String,
    /// Display label.
    pub label: String,
    /// Provider version.
    pub version: String,
}

/// Outcome of one host requirement check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementStatus {
    /// Requirement name.
    pub name: String,
    /// Whether it is satisfied.
    pub met: bool,
    /// Explanation.
    pub reason: String,
}
