//! Extension registry and enablement resolution.
//!
//! The registry is built from an explicit list of extensions. Each extension
//! keeps its own stored `enabled` flag and settings; the effective active set
//! is computed on demand as the closure of the flagged extensions over the
//! `requires` / `required_by` relations.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::MarkdownError;
use crate::config::ExtensionConfiguration;
use crate::extension::Extension;
use crate::settings::Settings;

/// An extension together with its per-parser state.
pub struct ExtensionInstance {
    plugin: Box<dyn Extension>,
    enabled: bool,
    settings: Settings,
}

impl ExtensionInstance {
    fn new(plugin: Box<dyn Extension>) -> Self {
        let enabled = plugin.enabled_by_default();
        let settings = Settings::new(plugin.default_settings());
        Self {
            plugin,
            enabled,
            settings,
        }
    }

    /// Extension id.
    pub fn id(&self) -> &str {
        self.plugin.id()
    }

    /// The extension itself.
    pub fn extension(&self) -> &dyn Extension {
        self.plugin.as_ref()
    }

    /// The stored flag. An extension can be active without it when another
    /// active extension requires it; see [`ExtensionRegistry::is_enabled`].
    pub fn enabled_flag(&self) -> bool {
        self.enabled
    }

    /// Current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Stored state, with settings reduced to the non-default values.
    pub fn configuration(&self) -> ExtensionConfiguration {
        ExtensionConfiguration {
            enabled: self.enabled,
            settings: self.settings.overrides(),
        }
    }

    fn apply(&mut self, configuration: ExtensionConfiguration) {
        self.enabled = configuration.enabled;
        self.settings.replace(configuration.settings);
        self.plugin.settings_changed();
    }
}

impl fmt::Debug for ExtensionInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionInstance")
            .field("id", &self.id())
            .field("enabled", &self.enabled)
            .field("settings", &self.settings)
            .finish()
    }
}

/// The extensions available to one parser.
#[derive(Debug, Default)]
pub struct ExtensionRegistry {
    instances: Vec<ExtensionInstance>,
    index: HashMap<String, usize>,
}

impl ExtensionRegistry {
    /// Builds a registry. Ids must be unique and every relation must point
    /// at an extension of the same bundle.
    pub fn new(extensions: Vec<Box<dyn Extension>>) -> Result<Self, MarkdownError> {
        let mut instances = Vec::with_capacity(extensions.len());
        let mut index = HashMap::with_capacity(extensions.len());
        for plugin in extensions {
            let id = plugin.id().to_string();
            if index.contains_key(&id) {
                return Err(MarkdownError::DuplicateExtension(id));
            }
            index.insert(id, instances.len());
            instances.push(ExtensionInstance::new(plugin));
        }

        for instance in &instances {
            let plugin = instance.extension();
            for related in plugin.requires().iter().chain(plugin.required_by()) {
                if !index.contains_key(*related) {
                    return Err(MarkdownError::UnknownExtension(format!(
                        "{related} (referenced by {})",
                        plugin.id()
                    )));
                }
            }
        }

        Ok(Self { instances, index })
    }

    /// Number of registered extensions.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the registry holds no extensions.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// All extensions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ExtensionInstance> {
        self.instances.iter()
    }

    /// Looks up an extension by id.
    pub fn extension(&self, id: &str) -> Result<&ExtensionInstance, MarkdownError> {
        self.index
            .get(id)
            .map(|&position| &self.instances[position])
            .ok_or_else(|| MarkdownError::UnknownExtension(id.to_string()))
    }

    fn extension_mut(&mut self, id: &str) -> Result<&mut ExtensionInstance, MarkdownError> {
        let position = *self
            .index
            .get(id)
            .ok_or_else(|| MarkdownError::UnknownExtension(id.to_string()))?;
        Ok(&mut self.instances[position])
    }

    /// Computes the active set: every flagged extension plus everything they
    /// require, transitively.
    pub fn resolve_enabled(&self) -> BTreeSet<String> {
        self.closure(|instance| instance.enabled)
    }

    /// Whether `id` is in the active set.
    pub fn is_enabled(&self, id: &str) -> bool {
        self.resolve_enabled().contains(id)
    }

    /// Active extensions in registration order.
    pub fn enabled(&self) -> Vec<&ExtensionInstance> {
        let active = self.resolve_enabled();
        self.instances
            .iter()
            .filter(|instance| active.contains(instance.id()))
            .collect()
    }

    /// Sets the stored flag of one extension.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<(), MarkdownError> {
        let instance = self.extension_mut(id)?;
        let configuration = ExtensionConfiguration {
            enabled,
            settings: instance.settings.overrides(),
        };
        instance.apply(configuration);
        Ok(())
    }

    /// Replaces the stored state of one extension and notifies it.
    pub fn set_extension_config(
        &mut self,
        id: &str,
        configuration: ExtensionConfiguration,
    ) -> Result<(), MarkdownError> {
        self.extension_mut(id)?.apply(configuration);
        Ok(())
    }

    /// Replaces the stored state of every extension. Extensions missing from
    /// `configuration` are stored as disabled with default settings.
    pub fn set_configuration(
        &mut self,
        configuration: &BTreeMap<String, ExtensionConfiguration>,
    ) -> Result<(), MarkdownError> {
        if let Some(unknown) = configuration.keys().find(|id| !self.index.contains_key(*id)) {
            return Err(MarkdownError::UnknownExtension(unknown.clone()));
        }
        for instance in &mut self.instances {
            let stored = configuration.get(instance.id()).cloned().unwrap_or_default();
            instance.apply(stored);
        }
        Ok(())
    }

    /// Stored state of the active extensions only.
    pub fn configuration(&self) -> BTreeMap<String, ExtensionConfiguration> {
        let active = self.resolve_enabled();
        self.instances
            .iter()
            .filter(|instance| active.contains(instance.id()))
            .map(|instance| (instance.id().to_string(), instance.configuration()))
            .collect()
    }

    /// Configuration a fresh registry of the same bundle would report.
    pub fn default_configuration(&self) -> BTreeMap<String, ExtensionConfiguration> {
        let active = self.closure(|instance| instance.plugin.enabled_by_default());
        self.instances
            .iter()
            .filter(|instance| active.contains(instance.id()))
            .map(|instance| {
                let configuration = ExtensionConfiguration {
                    enabled: instance.plugin.enabled_by_default(),
                    settings: Default::default(),
                };
                (instance.id().to_string(), configuration)
            })
            .collect()
    }

    fn closure<F>(&self, seed: F) -> BTreeSet<String>
    where
        F: Fn(&ExtensionInstance) -> bool,
    {
        let mut active: BTreeSet<&str> = self
            .instances
            .iter()
            .filter(|instance| seed(*instance))
            .map(ExtensionInstance::id)
            .collect();

        loop {
            let forced: Vec<&str> = self
                .instances
                .iter()
                .map(ExtensionInstance::id)
                .filter(|id| !active.contains(id))
                .filter(|id| self.is_required(id, &active))
                .collect();
            if forced.is_empty() {
                break;
            }
            active.extend(forced);
        }

        active.into_iter().map(str::to_string).collect()
    }

    fn is_required(&self, id: &str, active: &BTreeSet<&str>) -> bool {
        let Ok(candidate) = self.extension(id) else {
            return false;
        };
        let by_declaration = candidate
            .extension()
            .required_by()
            .iter()
            .any(|dependent| active.contains(dependent));
        by_declaration
            || self.instances.iter().any(|dependent| {
                active.contains(dependent.id()) && dependent.extension().requires().contains(&id)
            })
    }
}
