//! Assertion helpers for configuration behavioural tests.

use berth::config::AppConfig;
use rstest_bdd_macros::then;

use super::StepResult;
use super::state::ConfigState;

fn config(config_state: &ConfigState) -> StepResult<AppConfig> {
    config_state
        .config
        .get()
        .ok_or_else(|| String::from("configuration should be set"))
}

#[then("the builder image is {image}")]
fn builder_image_is(config_state: &ConfigState, image: String) -> StepResult<()> {
    let actual = config(config_state)?.builder.image;
    if actual == image {
        Ok(())
    } else {
        Err(format!("expected builder image {image}, got {actual}"))
    }
}

#[then("the readiness marker is {marker}")]
fn readiness_marker_is(config_state: &ConfigState, marker: String) -> StepResult<()> {
    let actual = config(config_state)?.agent.readiness_marker;
    if actual == marker {
        Ok(())
    } else {
        Err(format!("expected marker '{marker}', got '{actual}'"))
    }
}

#[then("the readiness timeout is unset")]
fn readiness_timeout_is_unset(config_state: &ConfigState) -> StepResult<()> {
    match config(config_state)?.agent.ready_timeout_secs {
        None => Ok(()),
        Some(secs) => Err(format!("expected no timeout, got {secs}s")),
    }
}

#[then("the base path is {path}")]
fn base_path_is(config_state: &ConfigState, path: String) -> StepResult<()> {
    let actual = config(config_state)?.base_path;
    if actual.as_ref().is_some_and(|p| p.as_str() == path) {
        Ok(())
    } else {
        Err(format!("expected base path {path}, got {actual:?}"))
    }
}

#[then("the server port is {port}")]
fn server_port_is(config_state: &ConfigState, port: u16) -> StepResult<()> {
    let actual = config(config_state)?.server.port;
    if actual == port {
        Ok(())
    } else {
        Err(format!("expected server port {port}, got {actual}"))
    }
}

#[then("the server API port is {port}")]
fn server_api_port_is(config_state: &ConfigState, port: u16) -> StepResult<()> {
    let actual = config(config_state)?.server.api_port;
    if actual == port {
        Ok(())
    } else {
        Err(format!("expected API port {port}, got {actual}"))
    }
}

#[then("loading fails mentioning {fragment}")]
fn loading_fails_mentioning(config_state: &ConfigState, fragment: String) -> StepResult<()> {
    let error = config_state
        .error
        .get()
        .ok_or_else(|| String::from("loading should have failed"))?;
    if error.contains(&fragment) {
        Ok(())
    } else {
        Err(format!("expected error mentioning {fragment}, got: {error}"))
    }
}
