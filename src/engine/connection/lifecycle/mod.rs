//! Container start, stop, removal, inspection, logs and image presence.
//!
//! The engine's "already in that state" answers are folded into success here:
//! starting a running container (304), stopping a stopped one (304) and
//! removing a missing one (404) are not errors.

use std::future::Future;
use std::pin::Pin;

use bollard::auth::DockerCredentials;
use bollard::container::LogOutput;
use bollard::models::ContainerInspectResponse;
use bollard::query_parameters::{
    CreateImageOptionsBuilder, InspectContainerOptions, LogsOptionsBuilder,
    RemoveContainerOptionsBuilder, StartContainerOptions, StopContainerOptions,
};
use bollard::{Docker, errors::Error as BollardError};
use futures_util::{Stream, StreamExt, TryStreamExt};
use serde::Serialize;

use super::{ContainerCreator, ContainerExecClient, EngineConnector};
use crate::error::{BerthError, ContainerError};

const HTTP_NOT_MODIFIED: u16 = 304;
const HTTP_NOT_FOUND: u16 = 404;

/// Boxed future type returned by [`ContainerLifecycleClient`] methods.
pub type EngineFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BollardError>> + Send + 'a>>;

/// Stream of log chunks from a container.
pub type ContainerLogStream = Pin<Box<dyn Stream<Item = Result<LogOutput, BollardError>> + Send>>;

/// Behaviour required to drive a container through its lifecycle.
pub trait ContainerLifecycleClient {
    /// Start a created container.
    fn start_container(&self, name: &str) -> EngineFuture<'_, ()>;

    /// Stop a running container.
    fn stop_container(&self, name: &str) -> EngineFuture<'_, ()>;

    /// Force-remove a container together with its anonymous volumes.
    fn remove_container(&self, name: &str) -> EngineFuture<'_, ()>;

    /// Inspect a container.
    fn inspect_container(&self, name: &str) -> EngineFuture<'_, ContainerInspectResponse>;

    /// Follow the container's stdout and stderr.
    fn container_logs(&self, name: &str) -> ContainerLogStream;

    /// Succeed when `image` is present locally.
    fn inspect_image(&self, image: &str) -> EngineFuture<'_, ()>;

    /// Pull `image`, passing registry credentials through unchanged.
    fn pull_image(
        &self,
        image: &str,
        credentials: Option<DockerCredentials>,
    ) -> EngineFuture<'_, ()>;

    /// Ping the engine.
    fn ping(&self) -> EngineFuture<'_, ()>;
}

impl ContainerLifecycleClient for Docker {
    fn start_container(&self, name: &str) -> EngineFuture<'_, ()> {
        let name_owned = String::from(name);
        Box::pin(async move {
            Self::start_container(self, &name_owned, None::<StartContainerOptions>).await
        })
    }

    fn stop_container(&self, name: &str) -> EngineFuture<'_, ()> {
        let name_owned = String::from(name);
        Box::pin(async move {
            Self::stop_container(self, &name_owned, None::<StopContainerOptions>).await
        })
    }

    fn remove_container(&self, name: &str) -> EngineFuture<'_, ()> {
        let name_owned = String::from(name);
        let options = RemoveContainerOptionsBuilder::new()
            .force(true)
            .v(true)
            .build();
        Box::pin(async move { Self::remove_container(self, &name_owned, Some(options)).await })
    }

    fn inspect_container(&self, name: &str) -> EngineFuture<'_, ContainerInspectResponse> {
        let name_owned = String::from(name);
        Box::pin(async move {
            Self::inspect_container(self, &name_owned, None::<InspectContainerOptions>).await
        })
    }

    fn container_logs(&self, name: &str) -> ContainerLogStream {
        let options = LogsOptionsBuilder::new()
            .follow(true)
            .stdout(true)
            .stderr(true)
            .tail("all")
            .build();
        Box::pin(Self::logs(self, name, Some(options)))
    }

    fn inspect_image(&self, image: &str) -> EngineFuture<'_, ()> {
        let image_owned = String::from(image);
        Box::pin(async move { Self::inspect_image(self, &image_owned).await.map(|_| ()) })
    }

    fn pull_image(
        &self,
        image: &str,
        credentials: Option<DockerCredentials>,
    ) -> EngineFuture<'_, ()> {
        let options = CreateImageOptionsBuilder::new().from_image(image).build();
        Box::pin(async move {
            Self::create_image(self, Some(options), None, credentials)
                .try_for_each(|_| async { Ok(()) })
                .await
        })
    }

    fn ping(&self) -> EngineFuture<'_, ()> {
        Box::pin(async move { Self::ping(self).await.map(|_| ()) })
    }
}

/// Everything the provisioning pipeline needs from an engine client.
pub trait ContainerEngine:
    ContainerCreator + ContainerExecClient + ContainerLifecycleClient + Send + Sync
{
}

impl<T> ContainerEngine for T where
    T: ContainerCreator + ContainerExecClient + ContainerLifecycleClient + Send + Sync
{
}

/// The parts of a container inspection reported to callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContainerSummary {
    /// Engine-assigned id.
    pub id: String,
    /// Container name without the leading slash.
    pub name: String,
    /// Image the container was created from.
    pub image: String,
    /// Engine status text, for example `running` or `exited`.
    pub status: String,
    /// Whether the container is running.
    pub running: bool,
    /// Creation timestamp as reported by the engine.
    pub created: String,
}

impl ContainerSummary {
    /// Extract a summary from an inspection response.
    #[must_use]
    pub fn from_inspect(response: &ContainerInspectResponse) -> Self {
        let state = response.state.as_ref();
        Self {
            id: response.id.clone().unwrap_or_default(),
            name: response
                .name
                .as_deref()
                .map(|name| name.trim_start_matches('/'))
                .map(String::from)
                .unwrap_or_default(),
            image: response
                .config
                .as_ref()
                .and_then(|config| config.image.clone())
                .unwrap_or_default(),
            status: state
                .and_then(|s| s.status.as_ref())
                .map(ToString::to_string)
                .unwrap_or_default(),
            running: state.and_then(|s| s.running).unwrap_or(false),
            created: response.created.clone().unwrap_or_default(),
        }
    }
}

fn status_code(error: &BollardError) -> Option<u16> {
    match error {
        BollardError::DockerResponseServerError { status_code, .. } => Some(*status_code),
        _ => None,
    }
}

fn not_found(name: &str) -> BerthError {
    BerthError::from(ContainerError::NotFound {
        container_id: String::from(name),
    })
}

impl EngineConnector {
    /// Start a container; an already running container is left as is.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::NotFound` when the container does not exist
    /// and `ContainerError::StartFailed` for other engine errors.
    pub async fn start_container_async<C: ContainerLifecycleClient + ?Sized>(
        client: &C,
        name: &str,
    ) -> Result<(), BerthError> {
        match client.start_container(name).await {
            Ok(()) => Ok(()),
            Err(error) => match status_code(&error) {
                Some(HTTP_NOT_MODIFIED) => Ok(()),
                Some(HTTP_NOT_FOUND) => Err(not_found(name)),
                _ => Err(BerthError::from(ContainerError::StartFailed {
                    container_id: String::from(name),
                    message: error.to_string(),
                })),
            },
        }
    }

    /// Stop a container; an already stopped container is left as is.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::NotFound` when the container does not exist
    /// and `ContainerError::StopFailed` for other engine errors.
    pub async fn stop_container_async<C: ContainerLifecycleClient + ?Sized>(
        client: &C,
        name: &str,
    ) -> Result<(), BerthError> {
        match client.stop_container(name).await {
            Ok(()) => Ok(()),
            Err(error) => match status_code(&error) {
                Some(HTTP_NOT_MODIFIED) => Ok(()),
                Some(HTTP_NOT_FOUND) => Err(not_found(name)),
                _ => Err(BerthError::from(ContainerError::StopFailed {
                    container_id: String::from(name),
                    message: error.to_string(),
                })),
            },
        }
    }

    /// Force-remove a container and its volumes.
    ///
    /// Returns `false` when there was nothing to remove.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::DestroyFailed` when the engine refuses.
    pub async fn remove_container_async<C: ContainerLifecycleClient + ?Sized>(
        client: &C,
        name: &str,
    ) -> Result<bool, BerthError> {
        match client.remove_container(name).await {
            Ok(()) => Ok(true),
            Err(error) if status_code(&error) == Some(HTTP_NOT_FOUND) => Ok(false),
            Err(error) => Err(BerthError::from(ContainerError::DestroyFailed {
                container_id: String::from(name),
                message: error.to_string(),
            })),
        }
    }

    /// Look a container up by name.
    ///
    /// Returns `None` when no such container exists.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ConnectionFailed` when the engine cannot be
    /// queried.
    pub async fn find_container_async<C: ContainerLifecycleClient + ?Sized>(
        client: &C,
        name: &str,
    ) -> Result<Option<ContainerSummary>, BerthError> {
        match client.inspect_container(name).await {
            Ok(response) => Ok(Some(ContainerSummary::from_inspect(&response))),
            Err(error) if status_code(&error) == Some(HTTP_NOT_FOUND) => Ok(None),
            Err(error) => Err(BerthError::from(ContainerError::ConnectionFailed {
                message: error.to_string(),
            })),
        }
    }

    /// Inspect a container that must exist.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::NotFound` when it does not, and the errors of
    /// [`Self::find_container_async`].
    pub async fn inspect_container_async<C: ContainerLifecycleClient + ?Sized>(
        client: &C,
        name: &str,
    ) -> Result<ContainerSummary, BerthError> {
        Self::find_container_async(client, name)
            .await?
            .ok_or_else(|| not_found(name))
    }

    /// Pull `image` unless it is already present.
    ///
    /// Returns `true` when a pull happened.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ImagePullFailed` when the image is missing and
    /// cannot be pulled.
    pub async fn ensure_image_async<C: ContainerLifecycleClient + ?Sized>(
        client: &C,
        image: &str,
        credentials: Option<DockerCredentials>,
    ) -> Result<bool, BerthError> {
        let pull_failed = |error: BollardError| {
            BerthError::from(ContainerError::ImagePullFailed {
                image: String::from(image),
                message: error.to_string(),
            })
        };

        match client.inspect_image(image).await {
            Ok(()) => return Ok(false),
            Err(error) if status_code(&error) == Some(HTTP_NOT_FOUND) => {}
            Err(error) => return Err(pull_failed(error)),
        }

        tracing::info!(image, "pulling image");
        client
            .pull_image(image, credentials)
            .await
            .map_err(pull_failed)?;
        Ok(true)
    }

    /// Collect the next chunk of a log stream, if any.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ConnectionFailed` when the stream fails.
    pub async fn next_log_chunk(
        stream: &mut ContainerLogStream,
    ) -> Result<Option<LogOutput>, BerthError> {
        stream.next().await.transpose().map_err(|error| {
            BerthError::from(ContainerError::ConnectionFailed {
                message: error.to_string(),
            })
        })
    }
}
