//! Assertion helpers for project lifecycle behavioural tests.

use std::sync::atomic::Ordering;

use rstest_bdd_macros::then;

use super::StepResult;
use super::state::LifecycleState;

#[then("the operation succeeds")]
fn operation_succeeds(lifecycle_state: &LifecycleState) -> StepResult<()> {
    match lifecycle_state.outcome.get() {
        Some(None) => Ok(()),
        Some(Some(error)) => Err(format!("expected success, got error: {error}")),
        None => Err(String::from("no operation has run")),
    }
}

#[then("the operation fails mentioning {fragment}")]
fn operation_fails_mentioning(lifecycle_state: &LifecycleState, fragment: String) -> StepResult<()> {
    match lifecycle_state.outcome.get() {
        Some(Some(error)) if error.contains(&fragment) => Ok(()),
        Some(Some(error)) => Err(format!("expected error mentioning {fragment}, got: {error}")),
        Some(None) => Err(String::from("expected a failure, got success")),
        None => Err(String::from("no operation has run")),
    }
}

#[then("the project phase is {phase}")]
fn project_phase_is(lifecycle_state: &LifecycleState, phase: String) -> StepResult<()> {
    let project = lifecycle_state
        .project
        .get()
        .ok_or_else(|| String::from("project should be configured"))?;
    let tracker = lifecycle_state
        .tracker
        .get()
        .ok_or_else(|| String::from("tracker should be configured"))?;
    let actual = tracker.phase(&project.container_name()).to_string();
    if actual == phase {
        Ok(())
    } else {
        Err(format!("expected phase {phase}, got {actual}"))
    }
}

#[then("the project output contains {text}")]
fn project_output_contains(lifecycle_state: &LifecycleState, text: String) -> StepResult<()> {
    let output = lifecycle_state.output.get().unwrap_or_default().contents();
    if output.contains(&text) {
        Ok(())
    } else {
        Err(format!("expected output containing {text}, got: {output}"))
    }
}

#[then("the engine created {count} containers")]
fn engine_created(lifecycle_state: &LifecycleState, count: usize) -> StepResult<()> {
    let actual = lifecycle_state
        .creates
        .get()
        .map_or(0, |creates| creates.load(Ordering::SeqCst));
    if actual == count {
        Ok(())
    } else {
        Err(format!("expected {count} containers created, got {actual}"))
    }
}
