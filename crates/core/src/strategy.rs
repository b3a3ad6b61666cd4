//! Render strategies: the trust boundary applied around conversion.

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use lol_html::{RewriteStrSettings, doc_comments, element, rewrite_str};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::MarkdownError;

/// How untrusted Markdown is made safe for rendering.
///
/// Input strategies act on the Markdown source before the backend sees it;
/// [`RenderStrategy::FilterOutput`] sanitizes the final HTML instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStrategy {
    /// Sanitize the rendered HTML against the effective allowlist.
    #[default]
    FilterOutput,
    /// HTML-escape the source so no markup in it can survive.
    EscapeInput,
    /// Remove every HTML tag from the source before conversion.
    StripInput,
    /// No protection at all. The caller takes full responsibility.
    None,
}

impl RenderStrategy {
    /// Applies the input stage of this strategy.
    pub fn prepare_input(self, markdown: &str) -> Result<Cow<'_, str>, MarkdownError> {
        match self {
            RenderStrategy::EscapeInput => Ok(escape_input(markdown)),
            RenderStrategy::StripInput => strip_input(markdown).map(Cow::Owned),
            RenderStrategy::FilterOutput | RenderStrategy::None => Ok(Cow::Borrowed(markdown)),
        }
    }

    /// Whether the final HTML goes through the sanitizer.
    pub fn filters_output(self) -> bool {
        self == RenderStrategy::FilterOutput
    }

    /// Stable identifier used in configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            RenderStrategy::FilterOutput => "filter_output",
            RenderStrategy::EscapeInput => "escape_input",
            RenderStrategy::StripInput => "strip_input",
            RenderStrategy::None => "none",
        }
    }
}

impl fmt::Display for RenderStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Escapes `&`, `<`, `>`, `"` and `'` so the source can never produce markup.
pub fn escape_input(markdown: &str) -> Cow<'_, str> {
    html_escape::encode_quoted_attribute(markdown)
}

/// End tags, which lol_html element handlers never see on their own.
static END_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</[A-Za-z][^<>]*>").expect("valid end tag pattern"));

/// Removes HTML tags and comments from the source, keeping their text.
///
/// The content of raw text elements such as `script`, `title` and
/// `textarea` comes back as source, so passes repeat until nothing changes.
/// Every pass only removes, which bounds the loop.
pub fn strip_input(markdown: &str) -> Result<String, MarkdownError> {
    let mut stripped = markdown.to_string();
    while stripped.contains('<') {
        let next = strip_pass(&stripped)?;
        if next == stripped {
            break;
        }
        stripped = next;
    }
    Ok(stripped)
}

fn strip_pass(markdown: &str) -> Result<String, MarkdownError> {
    let rewritten = rewrite_str(
        markdown,
        RewriteStrSettings {
            element_content_handlers: vec![element!("*", |el| {
                el.remove_and_keep_content();
                Ok(())
            })],
            document_content_handlers: vec![doc_comments!(|comment| {
                comment.remove();
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| MarkdownError::Rewrite(err.to_string()))?;
    Ok(END_TAG.replace_all(&rewritten, "").into_owned())
}
