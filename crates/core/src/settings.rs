//! Settings capability shared by parsers and extensions.
//!
//! A [`Settings`] value holds the declared defaults of its owner next to the
//! values explicitly stored for it. Lookups fall back to the defaults, and
//! only values that differ from the defaults are reported as overrides, which
//! keeps persisted configuration minimal.

use serde_json::{Map, Value};

/// JSON object used for settings blobs.
pub type SettingsMap = Map<String, Value>;

/// Converts a JSON value into a settings map, discarding non-object values.
pub fn settings_map(value: Value) -> SettingsMap {
    match value {
        Value::Object(map) => map,
        _ => SettingsMap::new(),
    }
}

/// Defaults plus stored values for one settings owner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    defaults: SettingsMap,
    values: SettingsMap,
}

impl Settings {
    /// Creates settings with the given defaults and no stored values.
    pub fn new(defaults: SettingsMap) -> Self {
        Self {
            defaults,
            values: SettingsMap::new(),
        }
    }

    /// Creates settings with defaults and an initial set of stored values.
    pub fn with_values(defaults: SettingsMap, values: SettingsMap) -> Self {
        let mut settings = Self::new(defaults);
        settings.replace(values);
        settings
    }

    /// Returns the stored value for `key`, falling back to its default.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).or_else(|| self.defaults.get(key))
    }

    /// Returns the value for `key` as a string slice.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Returns the value for `key` as a boolean, `false` when unset.
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Stores a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Replaces all stored values.
    pub fn replace(&mut self, values: SettingsMap) {
        self.values = values;
    }

    /// Declared defaults.
    pub fn defaults(&self) -> &SettingsMap {
        &self.defaults
    }

    /// Defaults overlaid with stored values.
    pub fn merged(&self) -> SettingsMap {
        let mut merged = self.defaults.clone();
        for (key, value) in &self.values {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Stored values that differ from their defaults.
    pub fn overrides(&self) -> SettingsMap {
        self.values
            .iter()
            .filter(|(key, value)| self.defaults.get(key.as_str()) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn link_settings() -> Settings {
        Settings::new(settings_map(json!({
            "external_new_window": true,
            "no_follow": "external",
        })))
    }

    #[test]
    fn falls_back_to_defaults() {
        let settings = link_settings();
        assert!(settings.get_bool("external_new_window"));
        assert_eq!(settings.get_str("no_follow"), Some("external"));
        assert_eq!(settings.get("missing"), None);
    }

    #[test]
    fn stored_values_win_over_defaults() {
        let mut settings = link_settings();
        settings.set("no_follow", "all");
        assert_eq!(settings.get_str("no_follow"), Some("all"));
        assert_eq!(settings.merged()["no_follow"], json!("all"));
        assert_eq!(settings.merged()["external_new_window"], json!(true));
    }

    #[test]
    fn overrides_skip_values_equal_to_defaults() {
        let mut settings = link_settings();
        settings.set("external_new_window", true);
        settings.set("no_follow", "internal");
        let overrides = settings.overrides();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides["no_follow"], json!("internal"));
    }

    #[test]
    fn non_object_values_become_empty_maps() {
        assert!(settings_map(json!([1, 2])).is_empty());
    }
}
