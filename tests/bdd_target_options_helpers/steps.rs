//! Given/when steps for target option scenarios.

use berth::error::TargetError;
use berth::target::{TargetDescriptor, target_manifest};
use rstest_bdd_macros::{given, when};

use super::state::{ModeOutcome, TargetState};

#[given("target options {options}")]
fn given_target_options(target_state: &TargetState, options: String) {
    target_state.options.set(options);
}

#[given("the target option manifest")]
fn given_manifest(target_state: &TargetState) {
    target_state.manifest.set(target_manifest());
}

#[when("the target mode is decided")]
fn when_mode_is_decided(target_state: &TargetState) {
    let options = target_state.options.get().unwrap_or_default();
    let outcome = match TargetDescriptor::new("build-box", options).mode() {
        Ok(mode) => ModeOutcome::Decided(mode),
        Err(TargetError::MalformedOptions { message }) => ModeOutcome::Malformed(message),
        Err(TargetError::EndpointUnreachable { message }) => ModeOutcome::Unreachable(message),
    };
    target_state.outcome.set(outcome);
}
