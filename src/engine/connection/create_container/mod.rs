//! Container creation for project environments.
//!
//! This module translates a project container description into a `Bollard`
//! container-create payload and provides the async helper for creating it.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use bollard::Docker;
use bollard::models::{ContainerCreateBody, ContainerCreateResponse, HostConfig};
use bollard::query_parameters::{CreateContainerOptions, CreateContainerOptionsBuilder};

use super::EngineConnector;
use crate::error::{BerthError, ConfigError, ContainerError};

/// Label carrying the owning workspace id.
pub const LABEL_WORKSPACE_ID: &str = "berth.workspace.id";
/// Label carrying the project name.
pub const LABEL_PROJECT_NAME: &str = "berth.project.name";
/// Label carrying the project's own source image.
pub const LABEL_PROJECT_IMAGE: &str = "berth.project.image";

/// Host mapping that lets a container reach services on the engine host.
pub const DOCKER_HOST_GATEWAY: &str = "host.docker.internal:host-gateway";

/// Keeps the container alive until the agent takes over.
const KEEP_ALIVE_CMD: [&str; 2] = ["sleep", "infinity"];

/// Boxed future type returned by [`ContainerCreator`] implementors.
pub type CreateContainerFuture<'a> = Pin<
    Box<dyn Future<Output = Result<ContainerCreateResponse, bollard::errors::Error>> + Send + 'a>,
>;

/// Behaviour required to create a container via a backing engine client.
///
/// This abstraction exists to keep container-creation logic testable without a
/// running daemon.
pub trait ContainerCreator {
    /// Create a container from `Bollard` options and body payload.
    fn create_container(
        &self,
        options: Option<CreateContainerOptions>,
        config: ContainerCreateBody,
    ) -> CreateContainerFuture<'_>;
}

impl ContainerCreator for Docker {
    fn create_container(
        &self,
        options: Option<CreateContainerOptions>,
        config: ContainerCreateBody,
    ) -> CreateContainerFuture<'_> {
        Box::pin(async move { Self::create_container(self, options, config).await })
    }
}

/// Container-creation request parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateContainerRequest {
    image: String,
    name: String,
    env: Vec<String>,
    labels: HashMap<String, String>,
    binds: Vec<String>,
    working_dir: Option<String>,
    host_gateway: bool,
}

impl CreateContainerRequest {
    /// Create a request for a named container running `image`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when `image` or `name` is empty
    /// or whitespace-only.
    pub fn new(image: impl Into<String>, name: impl Into<String>) -> Result<Self, BerthError> {
        let image_value = image.into();
        let name_value = name.into();

        Ok(Self {
            image: String::from(validate_required("image", &image_value)?),
            name: String::from(validate_required("container name", &name_value)?),
            env: Vec::new(),
            labels: HashMap::new(),
            binds: Vec::new(),
            working_dir: None,
            host_gateway: false,
        })
    }

    /// Attach environment entries in `KEY=value` form.
    #[must_use]
    pub fn with_env(mut self, env: Vec<String>) -> Self {
        self.env = env;
        self
    }

    /// Attach a label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Bind-mount `host_path` at `container_path`.
    #[must_use]
    pub fn with_bind(mut self, host_path: &str, container_path: &str) -> Self {
        self.binds.push(format!("{host_path}:{container_path}"));
        self
    }

    /// Set the working directory of the container's processes.
    #[must_use]
    pub fn with_working_dir(mut self, working_dir: impl Into<String>) -> Self {
        self.working_dir = Some(working_dir.into());
        self
    }

    /// Map `host.docker.internal` to the engine host's gateway.
    #[must_use]
    pub const fn with_host_gateway(mut self, enabled: bool) -> Self {
        self.host_gateway = enabled;
        self
    }

    /// Return the configured image.
    #[must_use]
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Return the container name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the configured environment list.
    #[must_use]
    pub fn env(&self) -> &[String] {
        &self.env
    }

    /// Return the configured labels.
    #[must_use]
    pub const fn labels(&self) -> &HashMap<String, String> {
        &self.labels
    }

    /// Return the configured bind mounts.
    #[must_use]
    pub fn binds(&self) -> &[String] {
        &self.binds
    }
}

impl EngineConnector {
    /// Create a container using a provided client abstraction.
    ///
    /// Returns the engine-assigned container id.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::CreateFailed` when the engine rejects the
    /// create request.
    pub async fn create_container_async<C: ContainerCreator + ?Sized>(
        creator: &C,
        request: &CreateContainerRequest,
    ) -> Result<String, BerthError> {
        let options = build_create_options(request.name());
        let config = build_create_body(request);

        let response = creator
            .create_container(Some(options), config)
            .await
            .map_err(|error| {
                BerthError::from(ContainerError::CreateFailed {
                    message: error.to_string(),
                })
            })?;

        Ok(response.id)
    }
}

fn validate_required<'a>(field: &str, value: &'a str) -> Result<&'a str, BerthError> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(BerthError::from(ConfigError::MissingRequired {
            field: String::from(field),
        }));
    }

    Ok(trimmed)
}

fn build_create_options(name: &str) -> CreateContainerOptions {
    CreateContainerOptionsBuilder::new().name(name).build()
}

fn build_create_body(request: &CreateContainerRequest) -> ContainerCreateBody {
    ContainerCreateBody {
        image: Some(String::from(request.image())),
        cmd: Some(KEEP_ALIVE_CMD.iter().map(|part| String::from(*part)).collect()),
        env: (!request.env.is_empty()).then(|| request.env.clone()),
        labels: (!request.labels.is_empty()).then(|| request.labels.clone()),
        working_dir: request.working_dir.clone(),
        host_config: Some(build_host_config(request)),
        ..ContainerCreateBody::default()
    }
}

fn build_host_config(request: &CreateContainerRequest) -> HostConfig {
    HostConfig {
        binds: (!request.binds.is_empty()).then(|| request.binds.clone()),
        extra_hosts: request
            .host_gateway
            .then(|| vec![String::from(DOCKER_HOST_GATEWAY)]),
        ..HostConfig::default()
    }
}
