//! Container environment and agent download address.

use std::collections::BTreeMap;

use url::Url;

use crate::config::ServerConfig;
use crate::error::{BerthError, ConfigError};
use crate::provider::request::Project;

/// Host name containers use to reach the machine running the engine.
pub const HOST_GATEWAY_NAME: &str = "host.docker.internal";

/// Server URL handed to the agent.
pub const SERVER_URL_VAR: &str = "DAYTONA_SERVER_URL";

/// Server API URL handed to the agent.
pub const SERVER_API_URL_VAR: &str = "DAYTONA_SERVER_API_URL";

/// Config field reported when the agent download URL is unusable.
const DOWNLOAD_URL_FIELD: &str = "agent.download_url";

/// Workspace identity variable.
pub const WORKSPACE_ID_VAR: &str = "BERTH_WORKSPACE_ID";

/// Project identity variable.
pub const PROJECT_NAME_VAR: &str = "BERTH_PROJECT_NAME";

fn gateway_url(port: u16) -> String {
    format!("http://{HOST_GATEWAY_NAME}:{port}")
}

/// Build the `KEY=value` environment for a project container.
///
/// Local containers always reach the server through the host gateway.
/// Remote containers keep the project's own server URLs and only fall back
/// to the configured ones.
#[must_use]
pub fn container_env(project: &Project, server: &ServerConfig, local: bool) -> Vec<String> {
    let mut vars: BTreeMap<String, String> = project.env_vars.clone();

    if local {
        vars.insert(String::from(SERVER_URL_VAR), gateway_url(server.port));
        vars.insert(String::from(SERVER_API_URL_VAR), gateway_url(server.api_port));
    } else {
        if let Some(url) = server.url.as_ref() {
            vars.entry(String::from(SERVER_URL_VAR))
                .or_insert_with(|| url.clone());
        }
        if let Some(url) = server.api_url.as_ref() {
            vars.entry(String::from(SERVER_API_URL_VAR))
                .or_insert_with(|| url.clone());
        }
    }

    vars.insert(String::from(WORKSPACE_ID_VAR), project.workspace_id.clone());
    vars.insert(String::from(PROJECT_NAME_VAR), project.name.clone());

    vars.into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect()
}

/// Return the URL the agent installer is fetched from.
///
/// Plain local projects fetch it through the host gateway on `api_port`
/// over plain HTTP. User info, path, query and fragment are kept. Remote
/// and devcontainer projects use the configured URL unchanged.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` when the configured URL cannot be
/// parsed or cannot carry a host.
pub fn agent_download_url(
    configured: &str,
    api_port: u16,
    local: bool,
    devcontainer: bool,
) -> Result<String, BerthError> {
    if !local || devcontainer {
        return Ok(String::from(configured));
    }

    let invalid = |reason: String| {
        BerthError::from(ConfigError::InvalidValue {
            field: String::from(DOWNLOAD_URL_FIELD),
            reason,
        })
    };

    let mut url = Url::parse(configured)
        .map_err(|error| invalid(format!("cannot parse '{configured}': {error}")))?;
    url.set_scheme("http")
        .map_err(|()| invalid(format!("cannot switch '{configured}' to http")))?;
    url.set_host(Some(HOST_GATEWAY_NAME))
        .map_err(|error| invalid(format!("cannot rewrite host of '{configured}': {error}")))?;
    url.set_port(Some(api_port))
        .map_err(|()| invalid(format!("cannot set a port on '{configured}'")))?;
    Ok(url.into())
}
