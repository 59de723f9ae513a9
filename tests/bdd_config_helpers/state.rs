//! Scenario state for configuration behavioural tests.

use std::collections::BTreeMap;

use berth::config::AppConfig;
use ortho_config::serde_json::Value;
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;

#[derive(Default, ScenarioState)]
pub(crate) struct ConfigState {
    /// The merged or loaded configuration.
    pub(crate) config: Slot<AppConfig>,
    /// The rendered loading error.
    pub(crate) error: Slot<String>,
    pub(crate) file_layer: Slot<Value>,
    pub(crate) env_layer: Slot<Value>,
    pub(crate) cli_layer: Slot<Value>,
    /// Variables visible to `load_config_with_env`.
    pub(crate) env_vars: Slot<BTreeMap<String, String>>,
}

#[fixture]
pub(crate) fn config_state() -> ConfigState {
    let state = ConfigState::default();
    state.env_vars.set(BTreeMap::new());
    state
}
