//! Configuration loading with layered precedence.
//!
//! Precedence order (lowest to highest): application defaults, configuration
//! file, environment variables, command-line arguments.
//!
//! Layers are composed with `MergeComposer` directly rather than through the
//! derived `load()`. The `Cli` struct owns subcommand dispatch, and the
//! environment layer here rejects unparseable typed values instead of
//! silently falling back to defaults.
//!
//! # Environment Variable Handling
//!
//! String fields (e.g., `BERTH_BUILDER_IMAGE`) are always accepted. Typed
//! fields such as `BERTH_SERVER_PORT` or `BERTH_AGENT_READY_TIMEOUT_SECS` must
//! parse or loading fails with `ConfigError::InvalidValue`.

use camino::Utf8PathBuf;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use ortho_config::discovery::ConfigDiscovery;
use ortho_config::serde_json::{self, Map, Value};
use ortho_config::{MergeComposer, toml};

use crate::config::{AppConfig, Cli};
use crate::error::{ConfigError, Result};

/// The type of value expected from an environment variable.
#[derive(Clone, Copy)]
enum EnvVarType {
    /// String value (always accepted).
    String,
    /// TCP port.
    Port,
    /// Unsigned 64-bit integer.
    U64,
}

/// Specification for a single environment variable mapping.
struct EnvVarSpec {
    /// The environment variable name (e.g., `BERTH_SERVER_PORT`).
    env_var: &'static str,
    /// The JSON path segments (e.g., `["server", "port"]`).
    path: &'static [&'static str],
    /// The expected value type.
    var_type: EnvVarType,
}

const ENV_VAR_SPECS: &[EnvVarSpec] = &[
    EnvVarSpec {
        env_var: "BERTH_BASE_PATH",
        path: &["base_path"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "BERTH_LOGS_DIR",
        path: &["logs_dir"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "BERTH_SCRATCH_DIR",
        path: &["scratch_dir"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "BERTH_SERVER_URL",
        path: &["server", "url"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "BERTH_SERVER_API_URL",
        path: &["server", "api_url"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "BERTH_SERVER_PORT",
        path: &["server", "port"],
        var_type: EnvVarType::Port,
    },
    EnvVarSpec {
        env_var: "BERTH_SERVER_API_PORT",
        path: &["server", "api_port"],
        var_type: EnvVarType::Port,
    },
    EnvVarSpec {
        env_var: "BERTH_AGENT_DOWNLOAD_URL",
        path: &["agent", "download_url"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "BERTH_AGENT_VERSION",
        path: &["agent", "version"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "BERTH_AGENT_READINESS_MARKER",
        path: &["agent", "readiness_marker"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "BERTH_AGENT_READY_TIMEOUT_SECS",
        path: &["agent", "ready_timeout_secs"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "BERTH_BUILDER_IMAGE",
        path: &["builder", "image"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "BERTH_REMOTE_DOCKER_SOCKET",
        path: &["remote", "docker_socket"],
        var_type: EnvVarType::String,
    },
];

/// Returns the list of environment variable names recognised by the config loader.
///
/// Tests use this to clear every `BERTH_*` variable the loader reads.
#[must_use]
pub fn env_var_names() -> Vec<&'static str> {
    ENV_VAR_SPECS.iter().map(|spec| spec.env_var).collect()
}

/// Load a configuration file and push it to the composer.
fn load_config_file(path: &Utf8PathBuf, composer: &mut MergeComposer) -> Result<()> {
    let current_dir = Utf8PathBuf::from(".");
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| current_dir.as_ref());
    let file_name = path.file_name().unwrap_or(path.as_str());

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|e| {
        ConfigError::ParseError {
            message: format!("failed to open directory {parent}: {e}"),
        }
    })?;

    let content = dir
        .read_to_string(file_name)
        .map_err(|e| ConfigError::ParseError {
            message: format!("failed to read {path}: {e}"),
        })?;

    let value =
        toml::from_str::<serde_json::Value>(&content).map_err(|e| ConfigError::ParseError {
            message: format!("failed to parse {path}: {e}"),
        })?;

    composer.push_file(value, Some(path.clone()));
    Ok(())
}

/// Load configuration with full layer precedence from the process
/// environment.
///
/// # Errors
///
/// See [`load_config_with_env`].
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    load_config_with_env(cli, &mockable::DefaultEnv::new())
}

/// Load configuration with full layer precedence.
///
/// 1. Application defaults defined in the struct
/// 2. Configuration file (`--config`, `BERTH_CONFIG_PATH` or discovery)
/// 3. Environment variables prefixed with `BERTH_`, read through `env`
/// 4. Command-line arguments
///
/// Later sources override earlier ones. The merged result is validated.
///
/// # Errors
///
/// Returns `ConfigError` if a configuration file is malformed, a typed
/// environment variable does not parse, or a merged value is invalid.
pub fn load_config_with_env<E: mockable::Env>(cli: &Cli, env: &E) -> Result<AppConfig> {
    let mut composer = MergeComposer::new();

    let defaults =
        serde_json::to_value(AppConfig::default()).map_err(|e| ConfigError::ParseError {
            message: format!("failed to serialise defaults: {e}"),
        })?;
    composer.push_defaults(defaults);

    let config_path: Option<Utf8PathBuf> =
        cli.config.clone().filter(|p| p.exists()).or_else(|| {
            let discovery = ConfigDiscovery::builder("berth")
                .env_var("BERTH_CONFIG_PATH")
                .config_file_name("config.toml")
                .dotfile_name(".berth.toml")
                .build();
            discovery
                .candidates()
                .into_iter()
                .filter(|p| p.exists())
                .find_map(|p| Utf8PathBuf::try_from(p).ok())
        });

    if let Some(ref path) = config_path {
        load_config_file(path, &mut composer)?;
    }

    let env_values = collect_env_vars(env)?;
    if !env_values.is_null() {
        composer.push_environment(env_values);
    }

    let cli_overrides = build_cli_overrides(cli);
    if !cli_overrides.is_null() {
        composer.push_cli(cli_overrides);
    }

    let config =
        AppConfig::merge_from_layers(composer.layers()).map_err(ConfigError::OrthoConfig)?;
    config.validate()?;
    Ok(config)
}

/// Collect `BERTH_*` variables into a JSON value, failing on unparseable
/// typed values.
fn collect_env_vars<E: mockable::Env>(env: &E) -> Result<Value> {
    let mut root = Map::new();

    for spec in ENV_VAR_SPECS {
        let Some(raw_value) = env.string(spec.env_var) else {
            continue;
        };

        let json_value = match spec.var_type {
            EnvVarType::String => Value::String(raw_value),
            EnvVarType::Port => match raw_value.parse::<u16>() {
                Ok(port) => Value::Number(port.into()),
                Err(_) => {
                    return Err(invalid_env(spec, "expected a port number", &raw_value));
                }
            },
            EnvVarType::U64 => match raw_value.parse::<u64>() {
                Ok(n) => Value::Number(n.into()),
                Err(_) => {
                    return Err(invalid_env(spec, "expected unsigned integer", &raw_value));
                }
            },
        };

        insert_at_path(&mut root, spec.path, json_value);
    }

    if root.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::Object(root))
    }
}

fn invalid_env(spec: &EnvVarSpec, expected: &str, raw_value: &str) -> crate::error::BerthError {
    ConfigError::InvalidValue {
        field: String::from(spec.env_var),
        reason: format!("{expected}, got '{raw_value}'"),
    }
    .into()
}

/// Insert a value at a nested path in a JSON map.
fn insert_at_path(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((&field, parents)) = path.split_last() else {
        return;
    };

    let mut current = root;
    for &segment in parents {
        let entry = current
            .entry(String::from(segment))
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(obj) = entry.as_object_mut() else {
            return;
        };
        current = obj;
    }

    current.insert(String::from(field), value);
}

/// Build a JSON value containing CLI overrides.
fn build_cli_overrides(cli: &Cli) -> Value {
    let mut overrides = Map::new();

    if let Some(ref base_path) = cli.base_path {
        overrides.insert(
            String::from("base_path"),
            Value::String(base_path.to_string()),
        );
    }

    if let Some(ref image) = cli.builder_image {
        let mut builder = Map::new();
        builder.insert(String::from("image"), Value::String(image.clone()));
        overrides.insert(String::from("builder"), Value::Object(builder));
    }

    if overrides.is_empty() {
        Value::Null
    } else {
        Value::Object(overrides)
    }
}
