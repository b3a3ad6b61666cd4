//! Parser configuration and the configuration store interface.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::MarkdownError;
use crate::allowlist::TagAllowlist;
use crate::settings::SettingsMap;
use crate::strategy::RenderStrategy;

/// Top-level keys of a serialized [`ParserConfiguration`].
const CONFIGURATION_KEYS: &[&str] = &[
    "render_strategy",
    "allowed_html",
    "allowed_html_plugins",
    "settings",
    "extensions",
];

/// Stored state of one extension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtensionConfiguration {
    /// The extension's own enabled flag.
    #[serde(default)]
    pub enabled: bool,
    /// Settings that differ from the extension defaults.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub settings: SettingsMap,
}

impl ExtensionConfiguration {
    /// Enabled configuration without settings.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            settings: SettingsMap::new(),
        }
    }

    /// Disabled configuration without settings.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Adds a setting.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }
}

/// Everything a parser persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfiguration {
    /// Trust boundary applied around conversion.
    pub render_strategy: RenderStrategy,
    /// Base allowlist for [`RenderStrategy::FilterOutput`]. Built-in default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_html: Option<TagAllowlist>,
    /// Standalone allowed-HTML providers to include, in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_html_plugins: Vec<String>,
    /// Parser and backend settings.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub settings: SettingsMap,
    /// Extension state keyed by extension id.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, ExtensionConfiguration>,
}

impl ParserConfiguration {
    /// Reads a configuration from YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, MarkdownError> {
        serde_yaml::from_str(yaml).map_err(MarkdownError::config)
    }

    /// Reads a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, MarkdownError> {
        serde_json::from_str(json).map_err(MarkdownError::config)
    }

    /// Writes the configuration as YAML.
    pub fn to_yaml_string(&self) -> Result<String, MarkdownError> {
        serde_yaml::to_string(self).map_err(MarkdownError::config)
    }

    /// Stable string identifying this configuration, used in cache keys.
    pub fn fingerprint(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Loads the configuration from a store, falling back to its defaults
    /// for every key it does not hold.
    pub fn load(store: &dyn ConfigStore) -> Result<Self, MarkdownError> {
        let defaults = serde_json::to_value(store.defaults()).map_err(MarkdownError::config)?;
        let mut root = match defaults {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for key in CONFIGURATION_KEYS {
            if let Some(value) = store.get(key) {
                root.insert((*key).to_string(), value);
            }
        }
        serde_json::from_value(Value::Object(root)).map_err(MarkdownError::config)
    }

    /// Writes every key of the configuration into a store.
    pub fn save(&self, store: &mut dyn ConfigStore) -> Result<(), MarkdownError> {
        let root = serde_json::to_value(self).map_err(MarkdownError::config)?;
        for key in CONFIGURATION_KEYS {
            let value = root.get(*key).cloned().unwrap_or(Value::Null);
            store.set(key, value)?;
        }
        Ok(())
    }
}

/// Key/value configuration storage. Keys are dotted paths such as
/// `extensions.strikethrough.enabled`.
pub trait ConfigStore {
    /// Reads a value.
    fn get(&self, key: &str) -> Option<Value>;

    /// Writes a value. A `null` value removes the key.
    fn set(&mut self, key: &str, value: Value) -> Result<(), MarkdownError>;

    /// Configuration used for keys the store does not hold.
    fn defaults(&self) -> ParserConfiguration;
}

/// In-memory [`ConfigStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    data: Map<String, Value>,
    defaults: ParserConfiguration,
}

impl MemoryConfigStore {
    /// Creates an empty store with the given defaults.
    pub fn new(defaults: ParserConfiguration) -> Self {
        Self {
            data: Map::new(),
            defaults,
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Option<Value> {
        let mut segments = key.split('.');
        let first = segments.next()?;
        let mut current = self.data.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current.clone())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), MarkdownError> {
        let segments: Vec<&str> = key.split('.').collect();
        let Some((last, parents)) = segments.split_last() else {
            return Err(MarkdownError::Config("empty configuration key".to_string()));
        };

        let mut current = &mut self.data;
        for segment in parents {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            current = entry.as_object_mut().ok_or_else(|| {
                MarkdownError::Config(format!("'{segment}' in '{key}' is not a mapping"))
            })?;
        }

        if value.is_null() {
            current.remove(*last);
        } else {
            current.insert(last.to_string(), value);
        }
        Ok(())
    }

    fn defaults(&self) -> ParserConfiguration {
        self.defaults.clone()
    }
}
