//! Assertion helpers for target option behavioural tests.

use berth::target::{Credential, ManifestProperty, RemoteTarget, TargetMode};
use rstest_bdd_macros::then;

use super::StepResult;
use super::state::{ModeOutcome, TargetState};

fn decided(target_state: &TargetState) -> StepResult<TargetMode> {
    match target_state.outcome.get() {
        Some(ModeOutcome::Decided(mode)) => Ok(mode),
        other => Err(format!("expected a decided mode, got {other:?}")),
    }
}

fn remote(target_state: &TargetState) -> StepResult<RemoteTarget> {
    match decided(target_state)? {
        TargetMode::Remote(remote) => Ok(remote),
        TargetMode::Local { .. } => Err(String::from("expected a remote target")),
    }
}

fn property(target_state: &TargetState, name: &str) -> StepResult<ManifestProperty> {
    target_state
        .manifest
        .get()
        .and_then(|manifest| manifest.property(name).cloned())
        .ok_or_else(|| format!("manifest should list {name}"))
}

#[then("the target is local with socket {socket}")]
fn target_is_local_with_socket(target_state: &TargetState, socket: String) -> StepResult<()> {
    match decided(target_state)? {
        TargetMode::Local {
            socket: Some(actual),
        } if actual == socket => Ok(()),
        other => Err(format!("expected local socket {socket}, got {other:?}")),
    }
}

#[then("the target is local without a socket")]
fn target_is_local_without_socket(target_state: &TargetState) -> StepResult<()> {
    match decided(target_state)? {
        TargetMode::Local { socket: None } => Ok(()),
        other => Err(format!("expected local mode without socket, got {other:?}")),
    }
}

#[then("the target is remote at {address} as {user}")]
fn target_is_remote(target_state: &TargetState, address: String, user: String) -> StepResult<()> {
    let remote = remote(target_state)?;
    if remote.address() == address && remote.username == user {
        Ok(())
    } else {
        Err(format!(
            "expected {user}@{address}, got {}@{}",
            remote.username,
            remote.address()
        ))
    }
}

#[then("the remote target authenticates with a password")]
fn authenticates_with_password(target_state: &TargetState) -> StepResult<()> {
    match remote(target_state)?.credential {
        Credential::Password(_) => Ok(()),
        Credential::PrivateKey(path) => Err(format!("expected a password, got key {path}")),
    }
}

#[then("the remote target authenticates with a private key")]
fn authenticates_with_private_key(target_state: &TargetState) -> StepResult<()> {
    match remote(target_state)?.credential {
        Credential::PrivateKey(_) => Ok(()),
        Credential::Password(_) => Err(String::from("expected a private key, got a password")),
    }
}

#[then("the remote workspace data dir is {dir}")]
fn remote_workspace_data_dir_is(target_state: &TargetState, dir: String) -> StepResult<()> {
    let remote = remote(target_state)?;
    let actual = remote.workspace_data_dir().map_err(|e| e.to_string())?;
    if actual.as_str() == dir {
        Ok(())
    } else {
        Err(format!("expected data dir {dir}, got {actual}"))
    }
}

#[then("the target is rejected as unreachable")]
fn rejected_as_unreachable(target_state: &TargetState) -> StepResult<()> {
    match target_state.outcome.get() {
        Some(ModeOutcome::Unreachable(_)) => Ok(()),
        other => Err(format!("expected an unreachable target, got {other:?}")),
    }
}

#[then("the target is rejected as malformed")]
fn rejected_as_malformed(target_state: &TargetState) -> StepResult<()> {
    match target_state.outcome.get() {
        Some(ModeOutcome::Malformed(_)) => Ok(()),
        other => Err(format!("expected malformed options, got {other:?}")),
    }
}

#[then("the property {name} is masked")]
fn property_is_masked(target_state: &TargetState, name: String) -> StepResult<()> {
    if property(target_state, &name)?.input_masked {
        Ok(())
    } else {
        Err(format!("{name} should be masked"))
    }
}

/// The predicate is the anchored `^local$` pattern.
fn disabled_for(property: &ManifestProperty, target: &str) -> bool {
    property
        .disabled_predicate
        .and_then(|pattern| pattern.strip_prefix('^'))
        .and_then(|pattern| pattern.strip_suffix('$'))
        .is_some_and(|literal| literal == target)
}

#[then("the property {name} is disabled for target {target}")]
fn property_is_disabled(target_state: &TargetState, name: String, target: String) -> StepResult<()> {
    if disabled_for(&property(target_state, &name)?, &target) {
        Ok(())
    } else {
        Err(format!("{name} should be disabled for {target}"))
    }
}

#[then("the property {name} is enabled for target {target}")]
fn property_is_enabled(target_state: &TargetState, name: String, target: String) -> StepResult<()> {
    if disabled_for(&property(target_state, &name)?, &target) {
        Err(format!("{name} should be enabled for {target}"))
    } else {
        Ok(())
    }
}
