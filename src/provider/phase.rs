//! Per-project lifecycle phases.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::error::{BerthError, ContainerError};

/// Where a project is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectPhase {
    /// No container has been created by this provider.
    #[default]
    NotCreated,
    /// The container exists.
    Created,
    /// The container is being started.
    Starting,
    /// The agent is being installed and launched.
    Bootstrapping,
    /// The agent reported readiness.
    Running,
    /// The container is being stopped.
    Stopping,
    /// The container is stopped.
    Stopped,
    /// The container and working tree were removed.
    Destroyed,
    /// Start-up failed. Only create and destroy are accepted.
    Failed,
}

impl fmt::Display for ProjectPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotCreated => "not created",
            Self::Created => "created",
            Self::Starting => "starting",
            Self::Bootstrapping => "bootstrapping",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Destroyed => "destroyed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

impl ProjectPhase {
    /// Whether a project in `self` may move to `next`.
    #[must_use]
    pub const fn allows(self, next: Self) -> bool {
        match next {
            Self::NotCreated => false,
            Self::Created => !matches!(self, Self::Starting | Self::Bootstrapping | Self::Stopping),
            Self::Starting => matches!(self, Self::Created),
            Self::Bootstrapping => matches!(self, Self::Starting),
            Self::Running => matches!(self, Self::Bootstrapping),
            Self::Stopping => matches!(
                self,
                Self::NotCreated | Self::Created | Self::Running | Self::Stopped
            ),
            Self::Stopped => matches!(self, Self::Stopping),
            Self::Destroyed => true,
            Self::Failed => matches!(self, Self::Starting | Self::Bootstrapping),
        }
    }
}

/// Tracks the phase of every project this process has touched.
///
/// The lock is held only for the lookup and update.
#[derive(Debug, Default)]
pub struct LifecycleTracker {
    phases: Mutex<HashMap<String, ProjectPhase>>,
}

impl LifecycleTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the phase of `project`.
    #[must_use]
    pub fn phase(&self, project: &str) -> ProjectPhase {
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(project)
            .copied()
            .unwrap_or_default()
    }

    /// Fail unless `project` may move to `next`.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::InvalidTransition` naming `operation`.
    pub fn ensure_allowed(
        &self,
        project: &str,
        next: ProjectPhase,
        operation: &str,
    ) -> Result<(), BerthError> {
        let current = self.phase(project);
        if current.allows(next) {
            Ok(())
        } else {
            Err(invalid_transition(project, current, operation))
        }
    }

    /// Move `project` to `next`, returning the phase it left.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::InvalidTransition` naming `operation` when
    /// the move is not allowed; the phase is left unchanged.
    pub fn transition(
        &self,
        project: &str,
        next: ProjectPhase,
        operation: &str,
    ) -> Result<ProjectPhase, BerthError> {
        let mut phases = self.phases.lock().unwrap_or_else(PoisonError::into_inner);
        let current = phases.get(project).copied().unwrap_or_default();
        if !current.allows(next) {
            return Err(invalid_transition(project, current, operation));
        }
        phases.insert(String::from(project), next);
        Ok(current)
    }

    /// Mark a start-up of `project` as failed.
    pub fn fail(&self, project: &str) {
        if let Err(error) = self.transition(project, ProjectPhase::Failed, "start") {
            tracing::debug!(%error, "project was not starting, forcing failed phase");
            self.restore(project, ProjectPhase::Failed);
        }
    }

    /// Put `project` back into `phase` after an operation failed midway.
    pub fn restore(&self, project: &str, phase: ProjectPhase) {
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(String::from(project), phase);
    }
}

fn invalid_transition(project: &str, current: ProjectPhase, operation: &str) -> BerthError {
    BerthError::from(ContainerError::InvalidTransition {
        project: String::from(project),
        phase: current.to_string(),
        operation: String::from(operation),
    })
}
