//! Project lifecycle against one connected engine.

use std::sync::Arc;

use bollard::auth::DockerCredentials;
use tracing::{debug, info, warn};

use super::env::{agent_download_url, container_env};
use super::paths::container_workdir;
use super::phase::{LifecycleTracker, ProjectPhase};
use super::request::{Project, ProjectInfo, ProjectRequest};
use super::tree::WorkingTree;
use super::ProviderContext;
use crate::agent::{ReadinessDetector, bootstrap_exec};
use crate::engine::{
    ContainerEngine, CreateContainerRequest, EngineConnector, LABEL_PROJECT_IMAGE,
    LABEL_PROJECT_NAME, LABEL_WORKSPACE_ID,
};
use crate::error::BerthError;
use crate::logging::LogSink;

/// Drives projects through their phases on a single engine.
pub struct Pipeline<'a, C> {
    engine: Arc<C>,
    context: &'a ProviderContext,
    tracker: &'a LifecycleTracker,
    detector: &'a ReadinessDetector,
}

impl<'a, C: ContainerEngine + 'static> Pipeline<'a, C> {
    /// Create a pipeline over `engine`.
    #[must_use]
    pub const fn new(
        engine: Arc<C>,
        context: &'a ProviderContext,
        tracker: &'a LifecycleTracker,
        detector: &'a ReadinessDetector,
    ) -> Self {
        Self {
            engine,
            context,
            tracker,
            detector,
        }
    }

    /// Ensure the project's container exists and is running with a ready
    /// agent.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::InvalidTransition` while the project is
    /// mid-operation, image and container failures, and
    /// `AgentError::BootstrapFailed` when the agent never becomes ready.
    pub async fn create_and_start(
        &self,
        request: &ProjectRequest,
        tree: &WorkingTree,
        devcontainer: bool,
        sink: &LogSink,
    ) -> Result<(), BerthError> {
        let project = &request.project;
        let name = project.container_name();
        self.tracker
            .ensure_allowed(&name, ProjectPhase::Created, "start")?;

        let credentials = request
            .builder_registry
            .as_ref()
            .map(DockerCredentials::from);
        let engine = self.engine.as_ref();
        EngineConnector::ensure_image_async(engine, self.context.builder_image(), credentials)
            .await?;

        match EngineConnector::find_container_async(engine, &name).await? {
            Some(summary)
                if summary.running && self.tracker.phase(&name) == ProjectPhase::Running =>
            {
                debug!(container = %name, "project already running");
                return Ok(());
            }
            Some(summary) => debug!(container = %name, id = %summary.id, "reusing container"),
            None => {
                let id = EngineConnector::create_container_async(
                    engine,
                    &self.container_request(project, tree)?,
                )
                .await?;
                info!(container = %name, id = %id, "created container");
            }
        }
        self.tracker.transition(&name, ProjectPhase::Created, "start")?;

        self.tracker.transition(&name, ProjectPhase::Starting, "start")?;
        if let Err(error) = EngineConnector::start_container_async(engine, &name).await {
            self.tracker.fail(&name);
            return Err(error);
        }

        self.tracker
            .transition(&name, ProjectPhase::Bootstrapping, "start")?;
        if let Err(error) = self.bootstrap(project, tree.is_local(), devcontainer, sink).await {
            self.tracker.fail(&name);
            return Err(error);
        }

        self.tracker.transition(&name, ProjectPhase::Running, "start")?;
        info!(container = %name, "project running");
        Ok(())
    }

    fn container_request(
        &self,
        project: &Project,
        tree: &WorkingTree,
    ) -> Result<CreateContainerRequest, BerthError> {
        let workdir = container_workdir(&project.name);
        let local = tree.is_local();
        Ok(
            CreateContainerRequest::new(self.context.builder_image(), project.container_name())?
                .with_env(container_env(project, self.context.server(), local))
                .with_label(LABEL_WORKSPACE_ID, &project.workspace_id)
                .with_label(LABEL_PROJECT_NAME, &project.name)
                .with_label(LABEL_PROJECT_IMAGE, &project.image)
                .with_bind(tree.dir().as_str(), &workdir)
                .with_working_dir(workdir)
                .with_host_gateway(local),
        )
    }

    async fn bootstrap(
        &self,
        project: &Project,
        local: bool,
        devcontainer: bool,
        sink: &LogSink,
    ) -> Result<(), BerthError> {
        let agent = self.context.agent();
        let download_url = agent_download_url(
            &agent.download_url,
            self.context.server().api_port,
            local,
            devcontainer,
        )?;
        let exec = bootstrap_exec(
            &project.container_name(),
            project.user.clone(),
            &download_url,
            &project.api_key,
        )?;
        self.detector
            .await_ready(Arc::clone(&self.engine), &exec, sink.clone())
            .await
    }

    /// Stop the project's container. Stopping a stopped container succeeds.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::InvalidTransition` for failed or busy
    /// projects, `ContainerError::NotFound` and `ContainerError::StopFailed`.
    pub async fn stop(&self, project: &Project) -> Result<(), BerthError> {
        let name = project.container_name();
        let previous = self
            .tracker
            .transition(&name, ProjectPhase::Stopping, "stop")?;

        match EngineConnector::stop_container_async(self.engine.as_ref(), &name).await {
            Ok(()) => {
                self.tracker.transition(&name, ProjectPhase::Stopped, "stop")?;
                info!(container = %name, "project stopped");
                Ok(())
            }
            Err(error) => {
                self.tracker.restore(&name, previous);
                Err(error)
            }
        }
    }

    /// Remove the project's container and working tree. Missing pieces are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::DestroyFailed` and the errors of
    /// [`WorkingTree::remove`].
    pub async fn destroy(&self, project: &Project, tree: &WorkingTree) -> Result<(), BerthError> {
        let name = project.container_name();
        if EngineConnector::remove_container_async(self.engine.as_ref(), &name).await? {
            info!(container = %name, "removed container");
        } else {
            debug!(container = %name, "container already absent");
        }

        tree.remove().await?;
        self.tracker
            .transition(&name, ProjectPhase::Destroyed, "destroy")?;
        Ok(())
    }

    /// Describe the project's container.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::NotFound` when it does not exist.
    pub async fn info(&self, project: &Project) -> Result<ProjectInfo, BerthError> {
        let name = project.container_name();
        let summary = EngineConnector::inspect_container_async(self.engine.as_ref(), &name).await?;
        let metadata = serde_json::json!({
            "container_id": summary.id,
            "container_name": summary.name,
            "image": summary.image,
            "status": summary.status,
            "phase": self.tracker.phase(&name),
        });

        Ok(ProjectInfo {
            name: project.name.clone(),
            is_running: summary.running,
            created: summary.created,
            provider_metadata: metadata.to_string(),
        })
    }
}

/// Copy the container's log stream into `sink` until it ends.
///
/// A failing stream is reported into the sink as well as through
/// `tracing`.
pub async fn follow_logs<C: ContainerEngine>(engine: Arc<C>, container: String, sink: LogSink) {
    let mut stream = engine.container_logs(&container);
    loop {
        match EngineConnector::next_log_chunk(&mut stream).await {
            Ok(Some(chunk)) => sink.write_chunk(&chunk.into_bytes()),
            Ok(None) => {
                debug!(container = %container, "log stream ended");
                return;
            }
            Err(error) => {
                sink.write_chunk(error.to_string().as_bytes());
                warn!(container = %container, %error, "log stream failed");
                return;
            }
        }
    }
}
