//! Given/when steps for configuration scenarios.

use berth::config::{AppConfig, Cli, Commands, load_config_with_env};
use mockable::MockEnv;
use ortho_config::MergeComposer;
use ortho_config::serde_json::{self, Map, Value};
use rstest_bdd_macros::{given, when};

use super::StepResult;
use super::state::ConfigState;

/// Build a JSON object holding `value` at the dotted `path`.
fn nested(path: &str, value: Value) -> Value {
    path.rsplit('.').fold(value, |inner, segment| {
        let mut map = Map::new();
        map.insert(String::from(segment), inner);
        Value::Object(map)
    })
}

fn merge(existing: Option<Value>, update: Value) -> Value {
    match (existing, update) {
        (Some(Value::Object(mut base)), Value::Object(update)) => {
            for (key, value) in update {
                let merged = merge(base.remove(&key), value);
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, update) => update,
    }
}

/// Numbers stay numbers so typed fields deserialise.
fn scalar(raw: &str) -> Value {
    raw.parse::<u64>()
        .map_or_else(|_| Value::String(String::from(raw)), |n| Value::Number(n.into()))
}

#[given("no configuration is provided")]
fn no_configuration_provided(config_state: &ConfigState) {
    config_state.config.set(AppConfig::default());
}

#[given("a file layer provides {path} as {value}")]
fn file_layer_provides(config_state: &ConfigState, path: String, value: String) {
    let layer = merge(config_state.file_layer.get(), nested(&path, scalar(&value)));
    config_state.file_layer.set(layer);
}

#[given("an environment layer provides {path} as {value}")]
fn env_layer_provides(config_state: &ConfigState, path: String, value: String) {
    let layer = merge(config_state.env_layer.get(), nested(&path, scalar(&value)));
    config_state.env_layer.set(layer);
}

#[given("a CLI layer provides {path} as {value}")]
fn cli_layer_provides(config_state: &ConfigState, path: String, value: String) {
    let layer = merge(config_state.cli_layer.get(), nested(&path, scalar(&value)));
    config_state.cli_layer.set(layer);
}

#[given("the environment sets {name} to {value}")]
fn environment_sets(config_state: &ConfigState, name: String, value: String) {
    let mut vars = config_state.env_vars.get().unwrap_or_default();
    vars.insert(name, String::from(value.trim_matches('"')));
    config_state.env_vars.set(vars);
}

#[when("configuration is merged")]
fn configuration_is_merged(config_state: &ConfigState) -> StepResult<()> {
    let mut composer = MergeComposer::new();
    let defaults = serde_json::to_value(AppConfig::default())
        .map_err(|e| format!("defaults should serialise: {e}"))?;
    composer.push_defaults(defaults);

    if let Some(layer) = config_state.file_layer.get() {
        composer.push_file(layer, None);
    }
    if let Some(layer) = config_state.env_layer.get() {
        composer.push_environment(layer);
    }
    if let Some(layer) = config_state.cli_layer.get() {
        composer.push_cli(layer);
    }

    let config = AppConfig::merge_from_layers(composer.layers())
        .map_err(|e| format!("merge should succeed: {e}"))?;
    config_state.config.set(config);
    Ok(())
}

#[when("configuration is loaded from the environment")]
fn configuration_is_loaded(config_state: &ConfigState) {
    let vars = config_state.env_vars.get().unwrap_or_default();
    let mut env = MockEnv::new();
    env.expect_string()
        .returning(move |name| vars.get(name).cloned());

    let cli = Cli {
        command: Commands::Manifest,
        config: None,
        base_path: None,
        builder_image: None,
    };
    match load_config_with_env(&cli, &env) {
        Ok(config) => config_state.config.set(config),
        Err(error) => config_state.error.set(error.to_string()),
    }
}
