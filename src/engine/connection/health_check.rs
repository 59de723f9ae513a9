//! Engine health checks.
//!
//! A successful [`EngineConnector::connect`] only configures a client; these
//! helpers confirm the engine behind the socket actually answers.

use std::time::Duration;

use bollard::Docker;

use super::error_classification::classify_connection_error;
use super::{EngineConnector, HEALTH_CHECK_TIMEOUT_SECS};
use crate::error::{BerthError, ContainerError};

impl EngineConnector {
    /// Perform a ping with timeout.
    ///
    /// Failures are classified against `socket` so a missing or unreadable
    /// socket is reported as such.
    async fn ping_with_timeout(docker: &Docker, socket: &str) -> Result<(), BerthError> {
        let timeout = Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS);

        tokio::time::timeout(timeout, docker.ping())
            .await
            .map_err(|_| {
                BerthError::from(ContainerError::HealthCheckTimeout {
                    seconds: HEALTH_CHECK_TIMEOUT_SECS,
                })
            })?
            .map_err(|e| BerthError::from(classify_connection_error(&e, socket)))?;
        Ok(())
    }

    /// Verify the container engine is responsive.
    ///
    /// Sends a ping request to the engine and waits for a response.
    /// This confirms the engine is operational, not just that the socket
    /// is configured.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::SocketNotFound` or
    /// `ContainerError::PermissionDenied` when the socket cannot be used,
    /// `ContainerError::ConnectionFailed` for other transport failures and
    /// `ContainerError::HealthCheckTimeout` if the check times out.
    pub async fn health_check_async(docker: &Docker, socket: &str) -> Result<(), BerthError> {
        Self::ping_with_timeout(docker, socket).await
    }
}
