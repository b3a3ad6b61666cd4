//! Memoization of parse results.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::MarkdownError;
use crate::parsed::{LanguageTag, ParsedMarkdown};
use crate::parser::MarkdownParser;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    markdown: String,
    language: Option<LanguageTag>,
    parser: String,
}

/// Cache of [`ParsedMarkdown`] values keyed on the markdown, the language
/// and [`MarkdownParser::cache_key`].
///
/// One cache may serve many parsers. Holds at most one entry per key and
/// never invalidates; a configuration or sanitizer change yields a new key
/// instead.
#[derive(Debug, Default)]
pub struct ParseCache {
    entries: RwLock<HashMap<CacheKey, ParsedMarkdown>>,
}

impl ParseCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached result or parses and stores it. Errors are not
    /// cached.
    pub fn get_or_parse(
        &self,
        parser: &dyn MarkdownParser,
        markdown: &str,
        language: Option<&LanguageTag>,
    ) -> Result<ParsedMarkdown, MarkdownError> {
        let key = CacheKey {
            markdown: markdown.to_string(),
            language: language.cloned(),
            parser: parser.cache_key(),
        };

        if let Some(parsed) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            log::debug!("parse cache hit for {} bytes", markdown.len());
            return Ok(parsed.clone());
        }

        let parsed = parser.parse(markdown, language)?;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.entry(key).or_insert(parsed).clone())
    }

    /// Number of cached results.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allowlist::TagAllowlist;
    use crate::parser::BaseParser;
    use crate::parser::tests::ToyBackend;
    use crate::sanitize::{AmmoniaSanitizer, DisallowedTagPolicy};
    use crate::strategy::RenderStrategy;

    #[test]
    fn repeated_parses_share_one_entry() {
        let cache = ParseCache::new();
        let parser = BaseParser::new(ToyBackend);
        let first = cache.get_or_parse(&parser, "**a**", None).unwrap();
        let second = cache.get_or_parse(&parser, "**a**", None).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn language_and_configuration_are_part_of_the_key() {
        let cache = ParseCache::new();
        let parser = BaseParser::new(ToyBackend);
        let english = LanguageTag::new("en");
        cache.get_or_parse(&parser, "<b>a</b>", None).unwrap();
        cache.get_or_parse(&parser, "<b>a</b>", Some(&english)).unwrap();

        let escaping =
            BaseParser::new(ToyBackend).with_render_strategy(RenderStrategy::EscapeInput);
        let escaped = cache.get_or_parse(&escaping, "<b>a</b>", None).unwrap();
        assert_eq!(cache.len(), 3);
        assert!(escaped.html().contains("&lt;b&gt;"));
        assert_eq!(escaping.render_strategy(), RenderStrategy::EscapeInput);
    }

    #[test]
    fn parsers_with_different_sanitizers_do_not_share_entries() {
        let cache = ParseCache::new();
        let source = "**b** <script>alert(1)</script>";
        let strong = TagAllowlist::parse("<strong>").unwrap();
        let unwrapping = BaseParser::new(ToyBackend).with_allowed_html(strong.clone());
        let stripping = BaseParser::new(ToyBackend)
            .with_allowed_html(strong)
            .with_sanitizer(AmmoniaSanitizer::with_policy(DisallowedTagPolicy::StripContent));

        let unwrapped = cache.get_or_parse(&unwrapping, source, None).unwrap();
        assert!(unwrapped.html().contains("alert(1)"));
        let stripped = cache.get_or_parse(&stripping, source, None).unwrap();
        assert_eq!(stripped, stripping.parse(source, None).unwrap());
        assert!(!stripped.html().contains("alert(1)"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn errors_are_not_cached() {
        let cache = ParseCache::new();
        let parser = BaseParser::new(ToyBackend);
        assert!(cache.get_or_parse(&parser, "\u{0}", None).is_err());
        assert!(cache.is_empty());
    }
}
