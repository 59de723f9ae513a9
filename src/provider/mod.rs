//! Provisioning of project environments on local or tunnelled engines.
//!
//! [`Provider`] is the outward surface: each operation parses the request's
//! target, opens an [`Endpoint`], runs the matching [`Pipeline`] step and
//! releases the endpoint again. A successful start leaves one clone of the
//! endpoint with a background task that follows the container's logs, so a
//! tunnel stays open until that stream ends. The returned [`LogFollower`]
//! lets the caller wait for it.

mod context;
mod env;
mod follower;
mod paths;
mod phase;
mod pipeline;
mod request;
mod tree;

use std::sync::Arc;

use bollard::Docker;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs::OpenOptions;
use cap_std::fs_utf8::Dir;
use mockable::DefaultEnv;
use tracing::{debug, info};

use crate::agent::ReadinessDetector;
use crate::engine::{Endpoint, EndpointResolver, EngineConnector, SocketResolver};
use crate::error::{BerthError, FilesystemError};
use crate::logging::{LogSink, TracingLogWriter};
use crate::target::{PresetTarget, TargetDescriptor, TargetManifest, TargetMode};
use crate::tunnel::{SessionConnector, SshConnector, TunnelManager};

pub use context::ProviderContext;
pub use env::{
    HOST_GATEWAY_NAME, PROJECT_NAME_VAR, SERVER_API_URL_VAR, SERVER_URL_VAR, WORKSPACE_ID_VAR,
    agent_download_url, container_env,
};
pub use paths::{container_workdir, is_devcontainer, project_dir, workspace_dir};
pub use follower::{FollowOutcome, LogFollower};
pub use phase::{LifecycleTracker, ProjectPhase};
pub use pipeline::{Pipeline, follow_logs};
pub use request::{
    BuildConfig, DevcontainerConfig, Project, ProjectInfo, ProjectRequest, ProviderInfo,
    RegistryCredentials, RequirementStatus, WorkspaceInfo, WorkspaceRequest,
};
pub use tree::WorkingTree;

/// Machine name of this provider.
pub const PROVIDER_NAME: &str = "berth";

/// Display label of this provider.
pub const PROVIDER_LABEL: &str = "Berth";

/// Requirement reported for a configurable engine client.
pub const ENGINE_REACHABLE: &str = "Engine reachable";

/// Requirement reported for an engine answering pings.
pub const ENGINE_RUNNING: &str = "Engine running";

/// Provisions projects on the targets its requests name.
pub struct Provider<S = SshConnector, E = DefaultEnv> {
    context: ProviderContext,
    resolver: EndpointResolver<S, E>,
    tracker: LifecycleTracker,
    detector: ReadinessDetector,
}

impl Provider {
    /// Create a provider using SSH for remote targets and the process
    /// environment for local socket fallbacks.
    #[must_use]
    pub fn new(context: ProviderContext) -> Self {
        Self::with_parts(context, SshConnector::default(), DefaultEnv::new())
    }
}

impl<S: SessionConnector, E: mockable::Env> Provider<S, E> {
    /// Create a provider from explicit transport and environment parts.
    #[must_use]
    pub fn with_parts(context: ProviderContext, connector: S, env: E) -> Self {
        let tunnels = TunnelManager::new(connector, context.scratch_dir());
        let resolver =
            EndpointResolver::new(tunnels, env).with_remote_socket(context.remote_socket());
        let detector = context.readiness_detector();
        Self {
            context,
            resolver,
            tracker: LifecycleTracker::new(),
            detector,
        }
    }

    /// Return the captured settings.
    #[must_use]
    pub const fn context(&self) -> &ProviderContext {
        &self.context
    }

    /// Return the phase this provider last saw `project` in.
    #[must_use]
    pub fn phase(&self, project: &Project) -> ProjectPhase {
        self.tracker.phase(&project.container_name())
    }

    /// Create the project's container if needed, start it and wait for its
    /// agent.
    ///
    /// On success the container's logs keep flowing into the project sink
    /// from a background task, returned as a [`LogFollower`].
    ///
    /// # Errors
    ///
    /// Any failure, wrapped with `start project` and the container name.
    pub async fn create_and_start(
        &self,
        request: &ProjectRequest,
    ) -> Result<LogFollower, BerthError> {
        self.start_project(request)
            .await
            .map_err(|error| error.in_operation("start project", request.project.container_name()))
    }

    async fn start_project(&self, request: &ProjectRequest) -> Result<LogFollower, BerthError> {
        let (mode, endpoint) = self.resolve(&request.target).await?;
        match self.start_on(&endpoint, &mode, request).await {
            Ok(sink) => {
                let engine = Arc::new(endpoint.docker().clone());
                let container = request.project.container_name();
                let follower = endpoint.clone();
                let task = tokio::spawn(async move {
                    follow_logs(engine, container, sink).await;
                    follower.close().await;
                });
                endpoint.close().await;
                Ok(LogFollower::new(task))
            }
            Err(error) => {
                endpoint.close().await;
                Err(error)
            }
        }
    }

    async fn start_on(
        &self,
        endpoint: &Endpoint,
        mode: &TargetMode,
        request: &ProjectRequest,
    ) -> Result<LogSink, BerthError> {
        let dir = project_dir(mode, self.context.base_path(), &request.project)?;
        let tree = tree_for(endpoint, dir);
        tree.prepare().await?;

        let devcontainer = is_devcontainer(
            request.project.build.as_ref(),
            tree.is_local().then_some(tree.dir()),
        );
        let sink = self.project_sink(request)?;
        self.pipeline(endpoint)
            .create_and_start(request, &tree, devcontainer, &sink)
            .await?;
        Ok(sink)
    }

    /// Stop the project's container.
    ///
    /// # Errors
    ///
    /// Any failure, wrapped with `stop project` and the container name.
    pub async fn stop(&self, request: &ProjectRequest) -> Result<(), BerthError> {
        let outcome = async {
            let (_, endpoint) = self.resolve(&request.target).await?;
            let result = self.pipeline(&endpoint).stop(&request.project).await;
            endpoint.close().await;
            result
        };
        outcome
            .await
            .map_err(|error| error.in_operation("stop project", request.project.container_name()))
    }

    /// Remove the project's container and working tree.
    ///
    /// Destroying an already destroyed project succeeds.
    ///
    /// # Errors
    ///
    /// Any failure, wrapped with `destroy project` and the container name.
    pub async fn destroy(&self, request: &ProjectRequest) -> Result<(), BerthError> {
        let outcome = async {
            let (mode, endpoint) = self.resolve(&request.target).await?;
            let result = async {
                let dir = project_dir(&mode, self.context.base_path(), &request.project)?;
                let tree = tree_for(&endpoint, dir);
                self.pipeline(&endpoint)
                    .destroy(&request.project, &tree)
                    .await
            }
            .await;
            endpoint.close().await;
            result
        };
        outcome.await.map_err(|error| {
            error.in_operation("destroy project", request.project.container_name())
        })
    }

    /// Describe the project's container.
    ///
    /// # Errors
    ///
    /// Any failure, wrapped with `inspect project` and the container name;
    /// [`BerthError::is_not_found`] holds when the container is missing.
    pub async fn info(&self, request: &ProjectRequest) -> Result<ProjectInfo, BerthError> {
        let outcome = async {
            let (_, endpoint) = self.resolve(&request.target).await?;
            let result = self.pipeline(&endpoint).info(&request.project).await;
            endpoint.close().await;
            result
        };
        outcome.await.map_err(|error| {
            error.in_operation("inspect project", request.project.container_name())
        })
    }

    /// Workspaces have no container of their own; starting one succeeds.
    ///
    /// # Errors
    ///
    /// Returns the `TargetError` of an unusable target.
    pub fn start_workspace(&self, request: &WorkspaceRequest) -> Result<(), BerthError> {
        request.target.mode().map_err(|error| {
            BerthError::from(error).in_operation("start workspace", &request.workspace_id)
        })?;
        debug!(workspace = %request.workspace_id, "nothing to start for workspace");
        Ok(())
    }

    /// Workspaces have no container of their own; stopping one succeeds.
    ///
    /// # Errors
    ///
    /// Returns the `TargetError` of an unusable target.
    pub fn stop_workspace(&self, request: &WorkspaceRequest) -> Result<(), BerthError> {
        request.target.mode().map_err(|error| {
            BerthError::from(error).in_operation("stop workspace", &request.workspace_id)
        })?;
        debug!(workspace = %request.workspace_id, "nothing to stop for workspace");
        Ok(())
    }

    /// Remove the workspace directory with every project tree in it.
    ///
    /// # Errors
    ///
    /// Any failure, wrapped with `destroy workspace` and the workspace id.
    pub async fn destroy_workspace(&self, request: &WorkspaceRequest) -> Result<(), BerthError> {
        let outcome = async {
            let (mode, endpoint) = self.resolve(&request.target).await?;
            let result = async {
                let dir = workspace_dir(&mode, self.context.base_path(), &request.workspace_id)?;
                tree_for(&endpoint, dir).remove().await
            }
            .await;
            endpoint.close().await;
            result
        };
        outcome.await.map_err(|error| {
            error.in_operation("destroy workspace", &request.workspace_id)
        })?;
        info!(workspace = %request.workspace_id, "workspace destroyed");
        Ok(())
    }

    /// Describe the workspace.
    ///
    /// # Errors
    ///
    /// Returns the `TargetError` of an unusable target.
    pub fn workspace_info(&self, request: &WorkspaceRequest) -> Result<WorkspaceInfo, BerthError> {
        request.target.mode().map_err(|error| {
            BerthError::from(error).in_operation("inspect workspace", &request.workspace_id)
        })?;
        let metadata = serde_json::json!({
            "workspace_id": request.workspace_id,
            "provider": PROVIDER_NAME,
            "target": request.target.name,
        });
        Ok(WorkspaceInfo {
            name: request.workspace_id.clone(),
            provider_metadata: metadata.to_string(),
        })
    }

    /// Report whether the local engine can be reached and answers.
    ///
    /// Failures are reported as unmet requirements, never as errors.
    pub async fn check_requirements(&self) -> Vec<RequirementStatus> {
        let resolver = SocketResolver::new(self.resolver.env());
        let socket = EngineConnector::resolve_socket(None, &resolver);

        let docker = match EngineConnector::connect(&socket) {
            Ok(docker) => docker,
            Err(error) => {
                return vec![
                    requirement(ENGINE_REACHABLE, false, error.to_string()),
                    requirement(
                        ENGINE_RUNNING,
                        false,
                        format!("no engine client for '{socket}'"),
                    ),
                ];
            }
        };
        let reachable = requirement(ENGINE_REACHABLE, true, format!("engine socket is '{socket}'"));

        let running = match EngineConnector::health_check_async(&docker, &socket).await {
            Ok(()) => requirement(ENGINE_RUNNING, true, String::from("engine answered a ping")),
            Err(error) => requirement(ENGINE_RUNNING, false, error.to_string()),
        };
        vec![reachable, running]
    }

    async fn resolve(
        &self,
        target: &TargetDescriptor,
    ) -> Result<(TargetMode, Endpoint), BerthError> {
        let mode = target.mode()?;
        let endpoint = self.resolver.resolve_mode(&mode).await?;
        Ok((mode, endpoint))
    }

    fn pipeline(&self, endpoint: &Endpoint) -> Pipeline<'_, Docker> {
        Pipeline::new(
            Arc::new(endpoint.docker().clone()),
            &self.context,
            &self.tracker,
            &self.detector,
        )
    }

    /// Build the sink project output goes to: diagnostics, the caller's sink
    /// and, when configured, `<logs_dir>/<ws>-<project>.log`.
    fn project_sink(&self, request: &ProjectRequest) -> Result<LogSink, BerthError> {
        let name = request.project.container_name();
        let mut sink = LogSink::new(TracingLogWriter::new(name.clone()));
        if let Some(extra) = request.log_sink.as_ref() {
            sink = sink.fan_out(extra);
        }
        if let Some(dir) = self.context.logs_dir() {
            sink = sink.with_writer(open_log_file(dir, &format!("{name}.log"))?);
        }
        Ok(sink)
    }
}

/// Identity of this provider.
#[must_use]
pub fn provider_info() -> ProviderInfo {
    ProviderInfo {
        name: String::from(PROVIDER_NAME),
        label: String::from(PROVIDER_LABEL),
        version: String::from(env!("CARGO_PKG_VERSION")),
    }
}

/// Options accepted in a target's JSON bag.
#[must_use]
pub fn target_manifest() -> TargetManifest {
    crate::target::target_manifest()
}

/// Targets available without configuration.
#[must_use]
pub fn preset_targets() -> Vec<PresetTarget> {
    crate::target::preset_targets()
}

fn requirement(name: &str, met: bool, reason: String) -> RequirementStatus {
    RequirementStatus {
        name: String::from(name),
        met,
        reason,
    }
}

fn tree_for(endpoint: &Endpoint, dir: Utf8PathBuf) -> WorkingTree {
    match endpoint.session() {
        Some(session) => WorkingTree::Remote {
            dir,
            session: Arc::clone(session),
        },
        None => WorkingTree::Local(dir),
    }
}

fn open_log_file(dir: &Utf8Path, name: &str) -> Result<std::fs::File, BerthError> {
    let fs_error = |error: &std::io::Error| {
        BerthError::from(FilesystemError::from_io(dir.join(name), error))
    };
    Dir::create_ambient_dir_all(dir, ambient_authority()).map_err(|error| fs_error(&error))?;
    let logs = Dir::open_ambient_dir(dir, ambient_authority()).map_err(|error| fs_error(&error))?;
    let file = logs
        .open_with(name, OpenOptions::new().create(true).append(true))
        .map_err(|error| fs_error(&error))?;
    Ok(file.into_std())
}
