#![deny(missing_docs)]
//! Markguard core: the Markdown rendering pipeline, render strategies,
//! extension composition and the output sanitizer integration.

/// Allowed-HTML tag lists.
pub mod allowlist;
/// Parse result memoization.
pub mod cache;
/// Trusted-callback gate.
pub mod callback;
/// Parser configuration and configuration stores.
pub mod config;
/// Core error types.
pub mod error;
/// Parser composing extensions into the pipeline.
pub mod extensible;
/// Extension contract and backend environment.
pub mod extension;
/// Writing guidelines.
pub mod guidelines;
/// Alteration hooks run around conversion.
pub mod hooks;
/// Parse results and language tags.
pub mod parsed;
/// Parser contract and pipeline.
pub mod parser;
/// Extension registry and enablement resolution.
pub mod registry;
/// HTML sanitizer integration.
pub mod sanitize;
/// Settings shared by parsers and extensions.
pub mod settings;
/// Render strategies.
pub mod strategy;

pub use allowlist::{AttributeRule, GLOBAL_ATTRIBUTES, TagAllowlist};
pub use cache::ParseCache;
pub use callback::{
    CALLBACK_PLACEHOLDER, Callback, CallbackFn, CallbackTarget, ErrorPolicy, TrustedCallbackGate,
};
pub use config::{ConfigStore, ExtensionConfiguration, MemoryConfigStore, ParserConfiguration};
pub use error::{MarkdownError, SourceLocation};
pub use extensible::ExtensibleParser;
pub use extension::{Environment, Extension};
pub use guidelines::{GuideGroup, GuideItem, GuideSite, GuideTag, Guidelines};
pub use hooks::{CallbackHook, HookBus, HookContext, HookPoint, MarkdownHook};
pub use parsed::{LanguageTag, ParsedMarkdown};
pub use parser::{
    AllowedHtmlProvider, BASE_URL_SETTING, BaseParser, BatchOptions, MarkdownParser,
    ParserBackend, SITE_NAME_SETTING,
};
pub use registry::{ExtensionInstance, ExtensionRegistry};
pub use sanitize::{AmmoniaSanitizer, DisallowedTagPolicy, Sanitizer};
pub use settings::{Settings, SettingsMap, settings_map};
pub use strategy::{RenderStrategy, escape_input, strip_input};
