//! Hand-written transport doubles shared by unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{ConnectFuture, RemoteSession, SessionConnector};
use crate::error::TransportError;
use crate::target::RemoteTarget;

/// A connector that either hands out one shared session or rejects every
/// login, counting the attempts either way.
pub(crate) struct ScriptedConnector {
    session: Option<Arc<dyn RemoteSession>>,
    attempts: AtomicUsize,
}

impl ScriptedConnector {
    /// Accept every login with `session`.
    pub(crate) fn accepting(session: Arc<dyn RemoteSession>) -> Self {
        Self {
            session: Some(session),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Reject every login as bad credentials.
    pub(crate) const fn rejecting() -> Self {
        Self {
            session: None,
            attempts: AtomicUsize::new(0),
        }
    }

    /// Number of `connect` calls so far.
    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl SessionConnector for ScriptedConnector {
    fn connect<'a>(&'a self, target: &'a RemoteTarget) -> ConnectFuture<'a> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .session
            .clone()
            .ok_or_else(|| TransportError::AuthenticationFailed {
                hostname: target.hostname.clone(),
                username: target.username.clone(),
                message: String::from("credentials rejected"),
            });
        Box::pin(async move { outcome })
    }
}

impl SessionConnector for Arc<ScriptedConnector> {
    fn connect<'a>(&'a self, target: &'a RemoteTarget) -> ConnectFuture<'a> {
        self.as_ref().connect(target)
    }
}
