//! Assertion helpers for readiness behavioural tests.

use rstest_bdd_macros::then;

use super::StepResult;
use super::state::ReadinessState;

#[then("the agent is ready")]
fn agent_is_ready(readiness_state: &ReadinessState) -> StepResult<()> {
    match readiness_state.outcome.get() {
        Some(None) => Ok(()),
        Some(Some(reason)) => Err(format!("expected readiness, got failure: {reason}")),
        None => Err(String::from("readiness was not awaited")),
    }
}

#[then("bootstrap fails with {fragment}")]
fn bootstrap_fails_with(readiness_state: &ReadinessState, fragment: String) -> StepResult<()> {
    match readiness_state.outcome.get() {
        Some(Some(reason)) if reason.contains(&fragment) => Ok(()),
        Some(Some(reason)) => Err(format!("expected reason containing {fragment}, got {reason}")),
        Some(None) => Err(String::from("expected a failure, got readiness")),
        None => Err(String::from("readiness was not awaited")),
    }
}

#[then("the sink received {text}")]
fn sink_received(readiness_state: &ReadinessState, text: String) -> StepResult<()> {
    let contents = readiness_state.sink.get().unwrap_or_default().contents();
    if contents.contains(&text) {
        Ok(())
    } else {
        Err(format!("expected sink to contain {text}, got {contents}"))
    }
}
