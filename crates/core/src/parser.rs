//! Parser contract and the render-strategy pipeline.

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use serde_json::Value;

use crate::MarkdownError;
use crate::allowlist::TagAllowlist;
use crate::config::ParserConfiguration;
use crate::extension::Environment;
use crate::guidelines::{GuideSite, Guidelines};
use crate::hooks::{HookBus, HookContext};
use crate::parsed::{LanguageTag, ParsedMarkdown};
use crate::registry::ExtensionInstance;
use crate::sanitize::{AmmoniaSanitizer, Sanitizer};
use crate::settings::{Settings, SettingsMap};
use crate::strategy::RenderStrategy;

/// Parser setting holding the absolute front page URL.
pub const BASE_URL_SETTING: &str = "base_url";
/// Parser setting holding the site name used in guidelines.
pub const SITE_NAME_SETTING: &str = "site_name";

/// Markdown-to-HTML conversion engine.
pub trait ParserBackend: Send + Sync {
    /// Backend id, also used as the parser id.
    fn id(&self) -> &str;

    /// Settings defaults understood by [`ParserBackend::convert_to_html`].
    fn default_settings(&self) -> SettingsMap {
        SettingsMap::new()
    }

    /// Converts Markdown to raw HTML.
    ///
    /// Must be deterministic for fixed input and environment and must not
    /// touch shared state.
    fn convert_to_html(
        &self,
        markdown: &str,
        language: Option<&LanguageTag>,
        environment: &Environment,
    ) -> Result<String, MarkdownError>;
}

/// Standalone contributor of allowed HTML, selected by id through
/// [`ParserConfiguration::allowed_html_plugins`].
pub trait AllowedHtmlProvider: Send + Sync {
    /// Provider id.
    fn id(&self) -> &str;

    /// Tags and attributes the provider needs.
    fn allowed_html(&self) -> TagAllowlist;
}

/// Options for [`MarkdownParser::parse_batch_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Size of a dedicated thread pool. Uses the global pool when unset.
    pub max_threads: Option<usize>,
}

/// A configured Markdown parser.
pub trait MarkdownParser: Send + Sync {
    /// Parser id.
    fn id(&self) -> &str;

    /// Runs the full pipeline and applies the render strategy.
    fn parse(
        &self,
        markdown: &str,
        language: Option<&LanguageTag>,
    ) -> Result<ParsedMarkdown, MarkdownError>;

    /// Raw backend output with the parser environment applied.
    ///
    /// Neither the input stage nor the output filter runs, so the result is
    /// unsafe to render.
    fn convert_to_html(
        &self,
        markdown: &str,
        language: Option<&LanguageTag>,
    ) -> Result<String, MarkdownError>;

    /// Active render strategy.
    fn render_strategy(&self) -> RenderStrategy;

    /// Effective allowlist used by [`RenderStrategy::FilterOutput`].
    fn allowed_html(&self) -> TagAllowlist;

    /// Current configuration.
    fn configuration(&self) -> ParserConfiguration;

    /// Replaces the configuration.
    fn set_configuration(
        &mut self,
        configuration: ParserConfiguration,
    ) -> Result<(), MarkdownError>;

    /// Configuration of a freshly built parser.
    fn default_configuration(&self) -> ParserConfiguration;

    /// Writing guidelines for the supported syntax.
    fn guidelines(&self) -> Guidelines;

    /// String identifying everything that shapes [`MarkdownParser::parse`]
    /// output. Parsers with equal keys render equal input identically.
    fn cache_key(&self) -> String {
        format!("{}:{}", self.id(), self.configuration().fingerprint())
    }

    /// Parses many documents in parallel. Results keep the input order.
    fn parse_batch(
        &self,
        inputs: &[&str],
        language: Option<&LanguageTag>,
    ) -> Vec<Result<ParsedMarkdown, MarkdownError>> {
        self.parse_batch_with(inputs, language, BatchOptions::default())
    }

    /// [`MarkdownParser::parse_batch`] with explicit options.
    fn parse_batch_with(
        &self,
        inputs: &[&str],
        language: Option<&LanguageTag>,
        options: BatchOptions,
    ) -> Vec<Result<ParsedMarkdown, MarkdownError>> {
        let process = || -> Vec<Result<ParsedMarkdown, MarkdownError>> {
            inputs
                .par_iter()
                .map(|markdown| self.parse(markdown, language))
                .collect()
        };

        let pool = options.max_threads.and_then(|threads| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .ok()
        });
        match pool {
            Some(pool) => pool.install(process),
            None => process(),
        }
    }
}

/// Parser over a backend without extensions.
pub struct BaseParser<B> {
    backend: B,
    sanitizer: Box<dyn Sanitizer>,
    hooks: HookBus,
    providers: Vec<Arc<dyn AllowedHtmlProvider>>,
    render_strategy: RenderStrategy,
    allowed_html: Option<TagAllowlist>,
    allowed_html_plugins: Vec<String>,
    settings: Settings,
}

impl<B: ParserBackend> BaseParser<B> {
    /// Creates a parser with the default configuration and the ammonia
    /// sanitizer.
    pub fn new(backend: B) -> Self {
        let settings = Settings::new(backend.default_settings());
        Self {
            backend,
            sanitizer: Box::new(AmmoniaSanitizer::new()),
            hooks: HookBus::new(),
            providers: Vec::new(),
            render_strategy: RenderStrategy::default(),
            allowed_html: None,
            allowed_html_plugins: Vec::new(),
            settings,
        }
    }

    /// Replaces the sanitizer.
    pub fn with_sanitizer(mut self, sanitizer: impl Sanitizer + 'static) -> Self {
        self.sanitizer = Box::new(sanitizer);
        self
    }

    /// Replaces the hook bus.
    pub fn with_hooks(mut self, hooks: HookBus) -> Self {
        self.hooks = hooks;
        self
    }

    /// Makes an allowed-HTML provider available for selection.
    pub fn with_provider(mut self, provider: Arc<dyn AllowedHtmlProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Sets the render strategy.
    pub fn with_render_strategy(mut self, strategy: RenderStrategy) -> Self {
        self.render_strategy = strategy;
        self
    }

    /// Sets the base allowlist.
    pub fn with_allowed_html(mut self, allowlist: TagAllowlist) -> Self {
        self.allowed_html = Some(allowlist);
        self
    }

    /// Stores a parser setting.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.set(key, value);
        self
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Hook bus, for registering hooks after construction.
    pub fn hooks_mut(&mut self) -> &mut HookBus {
        &mut self.hooks
    }

    /// Parser settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Site base URL, if configured.
    pub fn base_url(&self) -> Option<&str> {
        self.settings.get_str(BASE_URL_SETTING)
    }

    pub(crate) fn check_providers(&self, ids: &[String]) -> Result<(), MarkdownError> {
        match ids
            .iter()
            .find(|id| !self.providers.iter().any(|provider| provider.id() == id.as_str()))
        {
            Some(id) => Err(MarkdownError::Config(format!(
                "unknown allowed HTML provider '{id}'"
            ))),
            None => Ok(()),
        }
    }

    pub(crate) fn apply_configuration(&mut self, configuration: ParserConfiguration) {
        self.render_strategy = configuration.render_strategy;
        self.allowed_html = configuration.allowed_html;
        self.allowed_html_plugins = configuration.allowed_html_plugins;
        self.settings.replace(configuration.settings);
    }

    /// Allowlist keys are only written under [`RenderStrategy::FilterOutput`],
    /// the one strategy that reads them.
    pub(crate) fn base_configuration(&self) -> ParserConfiguration {
        let filters = self.render_strategy.filters_output();
        ParserConfiguration {
            render_strategy: self.render_strategy,
            allowed_html: self.allowed_html.clone().filter(|_| filters),
            allowed_html_plugins: if filters {
                self.allowed_html_plugins.clone()
            } else {
                Vec::new()
            },
            settings: self.settings.overrides(),
            extensions: Default::default(),
        }
    }

    /// Cache identity: parser id, sanitizer, hook count and configuration.
    pub(crate) fn cache_key_for(&self, configuration: &ParserConfiguration) -> String {
        format!(
            "{}:{}:{}:{}",
            self.backend.id(),
            self.sanitizer.fingerprint(),
            self.hooks.len(),
            configuration.fingerprint()
        )
    }

    /// Environment handed to the backend: parser settings, altered by each
    /// active extension in order.
    pub(crate) fn environment(&self, extensions: &[&ExtensionInstance]) -> Environment {
        let mut environment = Environment::new(self.settings.merged());
        for instance in extensions {
            instance
                .extension()
                .alter_environment(&mut environment, instance.settings());
        }
        environment
    }

    /// Base allowlist, selected providers, then active extensions.
    pub(crate) fn effective_allowlist(&self, extensions: &[&ExtensionInstance]) -> TagAllowlist {
        let mut allowlist = self
            .allowed_html
            .clone()
            .unwrap_or_else(TagAllowlist::markdown_default);
        for id in &self.allowed_html_plugins {
            match self.providers.iter().find(|provider| provider.id() == id) {
                Some(provider) => allowlist.merge(&provider.allowed_html()),
                None => log::warn!("allowed HTML provider '{id}' is not registered"),
            }
        }
        for instance in extensions {
            if let Some(contribution) = instance.extension().allowed_html(instance.settings()) {
                allowlist.merge(&contribution);
            }
        }
        allowlist
    }

    pub(crate) fn base_guidelines(&self) -> Guidelines {
        let defaults = GuideSite::default();
        Guidelines::base(GuideSite {
            base_url: self.base_url().unwrap_or(defaults.base_url),
            site_name: self
                .settings
                .get_str(SITE_NAME_SETTING)
                .unwrap_or(defaults.site_name),
        })
    }

    pub(crate) fn convert(
        &self,
        markdown: &str,
        language: Option<&LanguageTag>,
        extensions: &[&ExtensionInstance],
    ) -> Result<String, MarkdownError> {
        let environment = self.environment(extensions);
        self.backend.convert_to_html(markdown, language, &environment)
    }

    /// Runs every stage in order: input strategy, pre-convert hooks,
    /// conversion, post-convert hooks, output filter.
    pub(crate) fn run(
        &self,
        markdown: &str,
        language: Option<&LanguageTag>,
        extensions: &[&ExtensionInstance],
    ) -> Result<ParsedMarkdown, MarkdownError> {
        let strategy = self.render_strategy;
        log::debug!(
            "{}: parsing {} bytes with the {strategy} strategy",
            self.backend.id(),
            markdown.len()
        );

        let mut source = strategy.prepare_input(markdown)?.into_owned();
        let context = HookContext {
            parser: self.backend.id(),
            language,
            base_url: self.base_url(),
            markdown: None,
        };
        self.hooks.alter_markdown(&mut source, &context)?;
        for instance in extensions {
            instance
                .extension()
                .before_convert(&mut source, instance.settings(), &context)?;
        }

        let mut html = self.convert(&source, language, extensions)?;

        let context = HookContext {
            markdown: Some(&source),
            ..context
        };
        for instance in extensions {
            instance
                .extension()
                .after_convert(&mut html, instance.settings(), &context)?;
        }
        self.hooks.alter_html(&mut html, &context)?;

        if strategy.filters_output() {
            let allowlist = self.effective_allowlist(extensions);
            html = self.sanitizer.sanitize(&html, &allowlist, language);
        } else if strategy == RenderStrategy::None {
            log::debug!("{}: output filtering disabled", self.backend.id());
        }

        Ok(ParsedMarkdown::new(
            markdown.to_string(),
            html,
            language.cloned(),
        ))
    }
}

impl<B: ParserBackend> MarkdownParser for BaseParser<B> {
    fn id(&self) -> &str {
        self.backend.id()
    }

    fn parse(
        &self,
        markdown: &str,
        language: Option<&LanguageTag>,
    ) -> Result<ParsedMarkdown, MarkdownError> {
        self.run(markdown, language, &[])
    }

    fn convert_to_html(
        &self,
        markdown: &str,
        language: Option<&LanguageTag>,
    ) -> Result<String, MarkdownError> {
        self.convert(markdown, language, &[])
    }

    fn render_strategy(&self) -> RenderStrategy {
        self.render_strategy
    }

    fn allowed_html(&self) -> TagAllowlist {
        self.effective_allowlist(&[])
    }

    fn configuration(&self) -> ParserConfiguration {
        self.base_configuration()
    }

    fn set_configuration(
        &mut self,
        configuration: ParserConfiguration,
    ) -> Result<(), MarkdownError> {
        if let Some(id) = configuration.extensions.keys().next() {
            return Err(MarkdownError::UnknownExtension(id.clone()));
        }
        self.check_providers(&configuration.allowed_html_plugins)?;
        self.apply_configuration(configuration);
        Ok(())
    }

    fn default_configuration(&self) -> ParserConfiguration {
        ParserConfiguration::default()
    }

    fn guidelines(&self) -> Guidelines {
        self.base_guidelines()
    }

    fn cache_key(&self) -> String {
        self.cache_key_for(&self.configuration())
    }
}

impl<B: ParserBackend> fmt::Debug for BaseParser<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseParser")
            .field("backend", &self.backend.id())
            .field("render_strategy", &self.render_strategy)
            .field("hooks", &self.hooks)
            .field("settings", &self.settings)
            .finish()
    }
}
