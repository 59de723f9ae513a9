//! Scenario state for project lifecycle behavioural tests.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

use berth::provider::{LifecycleTracker, Project};
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;

use crate::log_capture::LogBuffer;

/// The container the fake engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EngineContainer {
    Missing,
    Stopped,
    Running,
}

/// What the bootstrap command does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AgentScript {
    Ready,
    Fails(String),
}

#[derive(Default, ScenarioState)]
pub(crate) struct LifecycleState {
    pub(crate) project: Slot<Project>,
    pub(crate) container: Slot<EngineContainer>,
    pub(crate) agent: Slot<AgentScript>,
    pub(crate) tracker: Slot<Arc<LifecycleTracker>>,
    pub(crate) output: Slot<LogBuffer>,
    /// Containers created across the scenario.
    pub(crate) creates: Slot<Arc<AtomicUsize>>,
    /// Rendered error of the last operation, or `None` on success.
    pub(crate) outcome: Slot<Option<String>>,
}

#[fixture]
pub(crate) fn lifecycle_state() -> LifecycleState {
    let state = LifecycleState::default();
    state.container.set(EngineContainer::Missing);
    state.agent.set(AgentScript::Ready);
    state.tracker.set(Arc::new(LifecycleTracker::new()));
    state.output.set(LogBuffer::new());
    state.creates.set(Arc::new(AtomicUsize::new(0)));
    state
}
