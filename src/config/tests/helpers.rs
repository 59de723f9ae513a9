//! Shared fixtures and helper functions for config tests.

#![expect(clippy::expect_used, reason = "expect is standard practice in tests")]

use crate::config::{AppConfig, DEFAULT_API_PORT, DEFAULT_READINESS_MARKER, DEFAULT_SERVER_PORT};
use ortho_config::MergeComposer;
use rstest::fixture;
use std::sync::Arc;

/// Fixture providing an `AppConfig` parsed from a full TOML example.
#[fixture]
pub fn app_config_from_full_toml() -> AppConfig {
    let toml = r#"
        base_path = "/srv/berth/workspaces"
        logs_dir = "/var/log/berth"
        scratch_dir = "/run/berth/socks"

        [server]
        url = "https://daytona.example.com"
        api_url = "https://api.daytona.example.com"
        port = 8080
        api_port = 8081

        [agent]
        download_url = "https://download.example.com/script"
        version = "0.24.0"
        readiness_marker = "agent ready"
        ready_timeout_secs = 120

        [builder]
        image = "registry.example.com/builder:1"

        [remote]
        docker_socket = "/run/user/1000/docker.sock"
    "#;

    toml::from_str(toml).expect("TOML parsing should succeed")
}

/// Fixture providing an `AppConfig` parsed from a minimal TOML example.
#[fixture]
pub fn app_config_from_partial_toml() -> AppConfig {
    let toml = r#"
        base_path = "/tmp/berth"

        [server]
        api_port = 9000
    "#;

    toml::from_str(toml).expect("TOML parsing should succeed")
}

/// Helper: Creates a `MergeComposer` with defaults layer already pushed.
pub fn create_composer_with_defaults() -> Result<MergeComposer, serde_json::Error> {
    let mut composer = MergeComposer::new();
    let defaults = ortho_config::serde_json::to_value(AppConfig::default())?;
    composer.push_defaults(defaults);
    Ok(composer)
}

/// Helper: Merges layers from a composer into `AppConfig`.
pub fn merge_config(composer: MergeComposer) -> Result<AppConfig, Arc<ortho_config::OrthoError>> {
    AppConfig::merge_from_layers(composer.layers())
}

/// Helper: Asserts that a config's server section has default values.
pub fn assert_server_defaults(config: &AppConfig) {
    assert!(config.server.url.is_none(), "server.url should be None");
    assert!(config.server.api_url.is_none(), "server.api_url should be None");
    assert_eq!(config.server.port, DEFAULT_SERVER_PORT);
    assert_eq!(config.server.api_port, DEFAULT_API_PORT);
}

/// Helper: Asserts that a config has all default values.
pub fn assert_config_has_defaults(config: &AppConfig) {
    assert!(config.base_path.is_none(), "base_path should be None");
    assert!(config.logs_dir.is_none(), "logs_dir should be None");
    assert!(config.scratch_dir.is_none(), "scratch_dir should be None");
    assert_server_defaults(config);
    assert_eq!(
        config.agent.download_url,
        "http://localhost:3986/binary/script"
    );
    assert_eq!(config.agent.readiness_marker, DEFAULT_READINESS_MARKER);
    assert!(config.agent.ready_timeout_secs.is_none());
    assert_eq!(config.builder.image, "daytonaio/workspace-project:latest");
    assert_eq!(config.remote.docker_socket, "/var/run/docker.sock");
}
