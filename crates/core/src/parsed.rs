//! Parse results.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Language of a document, e.g. `en` or `pt-BR`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageTag(String);

impl LanguageTag {
    /// Wraps a language identifier.
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LanguageTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// Immutable result of one [`crate::MarkdownParser::parse`] call.
///
/// The HTML has passed through the parser's render strategy; it is only
/// unsanitized when the strategy is [`crate::RenderStrategy::None`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedMarkdown {
    markdown: String,
    html: String,
    language: Option<LanguageTag>,
}

impl ParsedMarkdown {
    pub(crate) fn new(markdown: String, html: String, language: Option<LanguageTag>) -> Self {
        Self {
            markdown,
            html,
            language,
        }
    }

    /// The Markdown source as given to `parse`.
    pub fn markdown(&self) -> &str {
        &self.markdown
    }

    /// The rendered HTML.
    pub fn html(&self) -> &str {
        &self.html
    }

    /// The language the document was parsed with.
    pub fn language(&self) -> Option<&LanguageTag> {
        self.language.as_ref()
    }

    /// Length of the rendered HTML in bytes.
    pub fn len(&self) -> usize {
        self.html.len()
    }

    /// Whether the rendered HTML is blank.
    pub fn is_empty(&self) -> bool {
        self.html.trim().is_empty()
    }

    /// Consumes the result, returning the HTML.
    pub fn into_html(self) -> String {
        self.html
    }
}

impl fmt::Display for ParsedMarkdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.html)
    }
}
