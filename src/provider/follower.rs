//! Handle on the task streaming a started container's logs.

use std::future::Future;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How a followed log stream came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    /// The container's log stream ended on its own.
    StreamEnded,
    /// The caller asked to stop following first.
    Interrupted,
}

/// The background log follower of a started project.
///
/// The follower holds a clone of the project's endpoint, so a tunnelled
/// engine stays reachable while it runs. Dropping the handle detaches the
/// task; it then lives as long as the runtime does.
#[derive(Debug)]
pub struct LogFollower {
    task: JoinHandle<()>,
}

impl LogFollower {
    pub(crate) const fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    /// Return whether the log stream has already ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Follow the logs until the stream ends or `shutdown` completes.
    ///
    /// An interrupted follower is aborted, which releases its endpoint.
    pub async fn follow_until<F>(mut self, shutdown: F) -> FollowOutcome
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            joined = &mut self.task => {
                if let Err(error) = joined {
                    warn!(%error, "log follower stopped abnormally");
                }
                FollowOutcome::StreamEnded
            }
            () = shutdown => {
                self.task.abort();
                debug!("stopped following project logs");
                FollowOutcome::Interrupted
            }
        }
    }
}
