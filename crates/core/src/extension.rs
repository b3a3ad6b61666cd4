//! Extension contract.
//!
//! An extension is a unit of rendering behavior. Besides its identity and
//! relations, every capability is optional: the defaults below mean "not
//! provided", and the registry only consults capabilities of extensions it
//! resolved as enabled.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::MarkdownError;
use crate::allowlist::TagAllowlist;
use crate::guidelines::{GuideGroup, Guidelines};
use crate::hooks::HookContext;
use crate::settings::{Settings, SettingsMap};

/// Backend configuration assembled for one conversion.
///
/// Starts from the parser settings; enabled extensions then switch on
/// features and merge their own settings in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    settings: SettingsMap,
    features: BTreeSet<String>,
}

impl Environment {
    /// Creates an environment from parser settings.
    pub fn new(settings: SettingsMap) -> Self {
        Self {
            settings,
            features: BTreeSet::new(),
        }
    }

    /// Switches on a backend feature.
    pub fn enable(&mut self, feature: impl Into<String>) {
        self.features.insert(feature.into());
    }

    /// Whether a backend feature is on.
    pub fn has(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    /// Enabled features in sorted order.
    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(String::as_str)
    }

    /// Looks up a setting.
    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    /// Looks up a boolean setting, using `default` when unset.
    pub fn flag(&self, key: &str, default: bool) -> bool {
        self.settings
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    /// Stores a setting, replacing any previous value.
    pub fn set_setting(&mut self, key: impl Into<String>, value: Value) {
        self.settings.insert(key.into(), value);
    }

    /// All settings.
    pub fn settings(&self) -> &SettingsMap {
        &self.settings
    }
}

/// A pluggable unit of rendering behavior.
pub trait Extension: Send + Sync {
    /// Unique id within a parser bundle.
    fn id(&self) -> &str;

    /// Human readable name.
    fn label(&self) -> &str;

    /// Short explanation of what the extension does.
    fn description(&self) -> &str {
        ""
    }

    /// Whether the extension starts enabled when no configuration exists.
    fn enabled_by_default(&self) -> bool {
        false
    }

    /// Extensions this one needs enabled.
    fn requires(&self) -> &[&str] {
        &[]
    }

    /// Extensions that need this one enabled.
    fn required_by(&self) -> &[&str] {
        &[]
    }

    /// Settings defaults.
    fn default_settings(&self) -> SettingsMap {
        SettingsMap::new()
    }

    /// Key under which the settings are merged into the backend environment.
    fn settings_key(&self) -> Option<&str> {
        None
    }

    /// Called after the stored settings changed. Reset cached state here.
    fn settings_changed(&mut self) {}

    /// Adjusts the backend environment. By default merges the settings under
    /// [`Extension::settings_key`] when one is declared.
    fn alter_environment(&self, environment: &mut Environment, settings: &Settings) {
        if let Some(key) = self.settings_key() {
            environment.set_setting(key, Value::Object(settings.merged()));
        }
    }

    /// Tags and attributes the extension's output needs.
    fn allowed_html(&self, _settings: &Settings) -> Option<TagAllowlist> {
        None
    }

    /// Guideline group documenting the extension's syntax.
    fn guidelines(&self, _settings: &Settings) -> Option<GuideGroup> {
        None
    }

    /// Alters the existing guidelines.
    fn alter_guidelines(&self, _guidelines: &mut Guidelines, _settings: &Settings) {}

    /// Rewrites Markdown before conversion.
    fn before_convert(
        &self,
        _markdown: &mut String,
        _settings: &Settings,
        _context: &HookContext<'_>,
    ) -> Result<(), MarkdownError> {
        Ok(())
    }

    /// Rewrites HTML after conversion.
    fn after_convert(
        &self,
        _html: &mut String,
        _settings: &Settings,
        _context: &HookContext<'_>,
    ) -> Result<(), MarkdownError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::settings_map;
    use serde_json::json;

    struct Quotes;

    impl Extension for Quotes {
        fn id(&self) -> &str {
            "quotes"
        }

        fn label(&self) -> &str {
            "Quotes"
        }

        fn default_settings(&self) -> SettingsMap {
            settings_map(json!({ "opener": "\u{201c}" }))
        }

        fn settings_key(&self) -> Option<&str> {
            Some("quotes")
        }
    }

    struct Plain;

    impl Extension for Plain {
        fn id(&self) -> &str {
            "plain"
        }

        fn label(&self) -> &str {
            "Plain"
        }
    }

    #[test]
    fn settings_key_merges_settings_into_environment() {
        let extension = Quotes;
        let mut settings = Settings::new(extension.default_settings());
        settings.set("closer", "\u{201d}");

        let mut environment = Environment::default();
        extension.alter_environment(&mut environment, &settings);
        assert_eq!(
            environment.setting("quotes"),
            Some(&json!({ "opener": "\u{201c}", "closer": "\u{201d}" }))
        );
    }

    #[test]
    fn capabilities_default_to_absent() {
        let extension = Plain;
        let settings = Settings::default();
        let mut environment = Environment::default();
        extension.alter_environment(&mut environment, &settings);
        assert!(environment.settings().is_empty());
        assert!(extension.allowed_html(&settings).is_none());
        assert!(extension.guidelines(&settings).is_none());
        assert!(extension.requires().is_empty());
    }

    #[test]
    fn environment_flags_fall_back() {
        let mut environment = Environment::new(settings_map(json!({ "allow_raw_html": false })));
        environment.enable("strikethrough");
        assert!(environment.has("strikethrough"));
        assert!(!environment.flag("allow_raw_html", true));
        assert!(environment.flag("code_indented", true));
    }
}
