//! Static option manifest and built-in targets.

use serde::Serialize;

use super::{
    REMOTE_HOSTNAME, REMOTE_PASSWORD, REMOTE_PORT, REMOTE_PRIVATE_KEY_PATH, REMOTE_USER,
    SOCK_PATH, WORKSPACE_DATA_DIR,
};

/// Name of the built-in local target.
pub const LOCAL_TARGET_NAME: &str = "local";

/// Target-name pattern for which remote-only fields are disabled.
pub const REMOTE_ONLY_PATTERN: &str = "^local$";

const DEFAULT_SOCK_PATH: &str = "/var/run/docker.sock";

/// Value type of a manifest property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    /// Free text.
    String,
    /// Integer.
    Int,
}

/// Description of one recognised option key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestProperty {
    /// The option key.
    pub name: &'static str,
    /// The value type.
    #[serde(rename = "type")]
    pub kind: PropertyType,
    /// Default value shown to the user, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<&'static str>,
    /// Help text, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
    /// Whether input should be masked.
    pub input_masked: bool,
    /// Regex over target names for which the property is disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled_predicate: Option<&'static str>,
}

impl ManifestProperty {
    const fn remote(name: &'static str, kind: PropertyType) -> Self {
        Self {
            name,
            kind,
            default_value: None,
            description: None,
            input_masked: false,
            disabled_predicate: Some(REMOTE_ONLY_PATTERN),
        }
    }

    const fn with_default(mut self, value: &'static str) -> Self {
        self.default_value = Some(value);
        self
    }

    const fn with_description(mut self, text: &'static str) -> Self {
        self.description = Some(text);
        self
    }

    const fn masked(mut self) -> Self {
        self.input_masked = true;
        self
    }
}

/// The ordered list of recognised option keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TargetManifest {
    properties: Vec<ManifestProperty>,
}

impl TargetManifest {
    /// All properties in display order.
    #[must_use]
    pub fn properties(&self) -> &[ManifestProperty] {
        &self.properties
    }

    /// Look up a property by option key.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&ManifestProperty> {
        self.properties.iter().find(|property| property.name == name)
    }
}

/// Return the manifest describing every recognised option key.
#[must_use]
pub fn target_manifest() -> TargetManifest {
    TargetManifest {
        properties: vec![
            ManifestProperty::remote(REMOTE_HOSTNAME, PropertyType::String)
                .with_default("localhost"),
            ManifestProperty::remote(REMOTE_PORT, PropertyType::Int).with_default("2223"),
            ManifestProperty::remote(REMOTE_USER, PropertyType::String)
                .with_default("Docker")
                .with_description("Note: non-root user required"),
            ManifestProperty::remote(REMOTE_PASSWORD, PropertyType::String)
                .with_default("daytona123")
                .masked(),
            ManifestProperty::remote(REMOTE_PRIVATE_KEY_PATH, PropertyType::String)
                .with_description("Used instead of the password when set"),
            ManifestProperty {
                name: SOCK_PATH,
                kind: PropertyType::String,
                default_value: Some(DEFAULT_SOCK_PATH),
                description: None,
                input_masked: false,
                disabled_predicate: None,
            },
            ManifestProperty::remote(WORKSPACE_DATA_DIR, PropertyType::String)
                .with_description("Directory on the remote host that holds project files"),
        ],
    }
}

/// A target shipped with the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresetTarget {
    /// Target name.
    pub name: &'static str,
    /// Raw JSON option bag.
    pub options: String,
}

/// Return the built-in targets.
#[must_use]
pub fn preset_targets() -> Vec<PresetTarget> {
    vec![PresetTarget {
        name: LOCAL_TARGET_NAME,
        options: serde_json::json!({ SOCK_PATH: DEFAULT_SOCK_PATH }).to_string(),
    }]
}
