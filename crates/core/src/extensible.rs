//! Parser that composes extensions into the pipeline.

use std::fmt;

use crate::MarkdownError;
use crate::allowlist::TagAllowlist;
use crate::config::{ExtensionConfiguration, ParserConfiguration};
use crate::extension::{Environment, Extension};
use crate::guidelines::Guidelines;
use crate::parsed::{LanguageTag, ParsedMarkdown};
use crate::parser::{BaseParser, MarkdownParser, ParserBackend};
use crate::registry::{ExtensionInstance, ExtensionRegistry};
use crate::strategy::RenderStrategy;

/// A [`BaseParser`] plus an [`ExtensionRegistry`].
///
/// Only extensions in the resolved active set take part in a parse: they
/// alter the environment, contribute allowed HTML and guidelines, and run
/// their convert hooks in registration order.
pub struct ExtensibleParser<B> {
    base: BaseParser<B>,
    registry: ExtensionRegistry,
}

impl<B: ParserBackend> ExtensibleParser<B> {
    /// Wraps a parser with a bundle of extensions.
    pub fn new(
        base: BaseParser<B>,
        extensions: Vec<Box<dyn Extension>>,
    ) -> Result<Self, MarkdownError> {
        Ok(Self {
            base,
            registry: ExtensionRegistry::new(extensions)?,
        })
    }

    /// The wrapped parser.
    pub fn base(&self) -> &BaseParser<B> {
        &self.base
    }

    /// The wrapped parser, for registering hooks.
    pub fn base_mut(&mut self) -> &mut BaseParser<B> {
        &mut self.base
    }

    /// The extension registry.
    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    /// Looks up an extension by id.
    pub fn extension(&self, id: &str) -> Result<&ExtensionInstance, MarkdownError> {
        self.registry.extension(id)
    }

    /// Sets the stored flag of one extension.
    pub fn set_extension_enabled(&mut self, id: &str, enabled: bool) -> Result<(), MarkdownError> {
        self.registry.set_enabled(id, enabled)
    }

    /// Replaces the stored state of one extension.
    pub fn set_extension_config(
        &mut self,
        id: &str,
        configuration: ExtensionConfiguration,
    ) -> Result<(), MarkdownError> {
        self.registry.set_extension_config(id, configuration)
    }

    /// Builder form of [`ExtensibleParser::set_extension_enabled`].
    pub fn with_extension(mut self, id: &str) -> Result<Self, MarkdownError> {
        self.registry.set_enabled(id, true)?;
        Ok(self)
    }

    /// Environment the backend receives with the current active set.
    pub fn environment(&self) -> Environment {
        self.base.environment(&self.registry.enabled())
    }
}

impl<B: ParserBackend> MarkdownParser for ExtensibleParser<B> {
    fn id(&self) -> &str {
        self.base.id()
    }

    fn parse(
        &self,
        markdown: &str,
        language: Option<&LanguageTag>,
    ) -> Result<ParsedMarkdown, MarkdownError> {
        let active = self.registry.enabled();
        log::debug!(
            "{}: active extensions [{}]",
            self.id(),
            active
                .iter()
                .map(|instance| instance.id())
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.base.run(markdown, language, &active)
    }

    fn convert_to_html(
        &self,
        markdown: &str,
        language: Option<&LanguageTag>,
    ) -> Result<String, MarkdownError> {
        self.base.convert(markdown, language, &self.registry.enabled())
    }

    fn render_strategy(&self) -> RenderStrategy {
        self.base.render_strategy()
    }

    fn allowed_html(&self) -> TagAllowlist {
        self.base.effective_allowlist(&self.registry.enabled())
    }

    fn configuration(&self) -> ParserConfiguration {
        ParserConfiguration {
            extensions: self.registry.configuration(),
            ..self.base.base_configuration()
        }
    }

    fn set_configuration(
        &mut self,
        mut configuration: ParserConfiguration,
    ) -> Result<(), MarkdownError> {
        self.base.check_providers(&configuration.allowed_html_plugins)?;
        let extensions = std::mem::take(&mut configuration.extensions);
        self.registry.set_configuration(&extensions)?;
        self.base.apply_configuration(configuration);
        Ok(())
    }

    fn default_configuration(&self) -> ParserConfiguration {
        ParserConfiguration {
            extensions: self.registry.default_configuration(),
            ..self.base.default_configuration()
        }
    }

    fn guidelines(&self) -> Guidelines {
        let mut guidelines = self.base.base_guidelines();
        for instance in self.registry.enabled() {
            let extension = instance.extension();
            extension.alter_guidelines(&mut guidelines, instance.settings());
            if let Some(group) = extension.guidelines(instance.settings()) {
                guidelines.extensions.push(group);
            }
        }
        guidelines
    }

    fn cache_key(&self) -> String {
        self.base.cache_key_for(&self.configuration())
    }
}

impl<B: ParserBackend> fmt::Debug for ExtensibleParser<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensibleParser")
            .field("base", &self.base)
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guidelines::{GuideGroup, GuideItem};
    use crate::hooks::HookContext;
    use crate::parser::tests::ToyBackend;
    use crate::settings::{Settings, SettingsMap, settings_map};
    use serde_json::json;

    struct Strike;

    impl Extension for Strike {
        fn id(&self) -> &str {
            "strikethrough"
        }

        fn label(&self) -> &str {
            "Strikethrough"
        }

        fn required_by(&self) -> &[&str] {
            &["bundle"]
        }

        fn alter_environment(&self, environment: &mut Environment, _settings: &Settings) {
            environment.enable("strikethrough");
        }

        fn allowed_html(&self, _settings: &Settings) -> Option<TagAllowlist> {
            TagAllowlist::parse("<del>").ok()
        }

        fn guidelines(&self, _settings: &Settings) -> Option<GuideGroup> {
            Some(
                GuideGroup::new("strikethrough", "Strikethrough")
                    .item(GuideItem::new().tag("del", ["~~gone~~"])),
            )
        }

        fn after_convert(
            &self,
            html: &mut String,
            _settings: &Settings,
            _context: &HookContext<'_>,
        ) -> Result<(), MarkdownError> {
            *html = html.replace("gone", "<del>gone</del>");
            Ok(())
        }
    }

    struct Signature;

    impl Extension for Signature {
        fn id(&self) -> &str {
            "signature"
        }

        fn label(&self) -> &str {
            "Signature"
        }

        fn default_settings(&self) -> SettingsMap {
            settings_map(json!({ "text": "-- sig" }))
        }

        fn before_convert(
            &self,
            markdown: &mut String,
            settings: &Settings,
            _context: &HookContext<'_>,
        ) -> Result<(), MarkdownError> {
            markdown.push(' ');
            markdown.push_str(settings.get_str("text").unwrap_or_default());
            Ok(())
        }

        fn alter_guidelines(&self, guidelines: &mut Guidelines, _settings: &Settings) {
            guidelines.groups.retain(|group| group.id != "images");
        }
    }

    struct Bundle;

    impl Extension for Bundle {
        fn id(&self) -> &str {
            "bundle"
        }

        fn label(&self) -> &str {
            "Bundle"
        }
    }

    fn parser() -> ExtensibleParser<ToyBackend> {
        ExtensibleParser::new(
            BaseParser::new(ToyBackend),
            vec![Box::new(Strike), Box::new(Signature), Box::new(Bundle)],
        )
        .unwrap()
    }

    #[test]
    fn disabled_extensions_do_not_contribute() {
        let parser = parser();
        assert!(!parser.allowed_html().allows_tag("del"));
        assert!(!parser.environment().has("strikethrough"));
        assert_eq!(parser.parse("gone", None).unwrap().html(), "<p>gone</p>");
        assert!(parser.guidelines().extensions.is_empty());
    }

    #[test]
    fn required_extensions_join_the_pipeline() {
        let parser = parser().with_extension("bundle").unwrap();
        assert!(parser.allowed_html().allows_tag("del"));
        assert!(parser.environment().has("strikethrough"));
        assert_eq!(
            parser.parse("gone", None).unwrap().html(),
            "<p><del>gone</del></p>"
        );
        assert!(parser.guidelines().extension("strikethrough").is_some());
    }

    #[test]
    fn extension_contributions_are_still_filtered() {
        let mut parser = parser().with_extension("strikethrough").unwrap();
        parser
            .set_configuration(ParserConfiguration {
                allowed_html: Some(TagAllowlist::parse("<p>").unwrap()),
                ..parser.configuration()
            })
            .unwrap();
        let parsed = parser.parse("gone <script>x</script>", None).unwrap();
        assert_eq!(parsed.html(), "<p><del>gone</del> x</p>");
    }

    #[test]
    fn before_convert_uses_extension_settings() {
        let mut parser = parser();
        parser
            .set_extension_config(
                "signature",
                ExtensionConfiguration::enabled().with_setting("text", "bye"),
            )
            .unwrap();
        assert_eq!(parser.parse("hi", None).unwrap().html(), "<p>hi bye</p>");
        assert!(parser.guidelines().group("images").is_none());
    }

    #[test]
    fn configuration_round_trips_through_a_fresh_parser() {
        let mut original = parser().with_extension("bundle").unwrap();
        original
            .set_extension_config(
                "signature",
                ExtensionConfiguration::enabled().with_setting("text", "bye"),
            )
            .unwrap();
        let configuration = original.configuration();
        assert_eq!(configuration.extensions.len(), 3);

        let mut restored = parser();
        restored.set_configuration(configuration.clone()).unwrap();
        assert_eq!(restored.configuration(), configuration);
        assert_eq!(
            restored.registry().resolve_enabled(),
            original.registry().resolve_enabled()
        );
    }

    #[test]
    fn unknown_extensions_are_reported() {
        let parser = parser();
        assert!(matches!(
            parser.extension("emoji"),
            Err(MarkdownError::UnknownExtension(_))
        ));
    }
}
