#![deny(missing_docs)]
//! CommonMark parser for markguard: a markdown-rs backend plus the bundled
//! extensions (enhanced links, smart punctuation and the GFM constructs).

/// markdown-rs backend.
pub mod backend;
/// Bundled extensions.
pub mod extensions;

pub use backend::CommonMarkBackend;
pub use extensions::bundled_extensions;

use markguard_core::{BaseParser, ExtensibleParser, MarkdownError};

/// Extensible parser over the CommonMark backend.
pub type CommonMarkParser = ExtensibleParser<CommonMarkBackend>;

/// Builds a parser with the default configuration and every bundled
/// extension registered. No extension is enabled.
pub fn commonmark_parser() -> Result<CommonMarkParser, MarkdownError> {
    commonmark_parser_with(BaseParser::new(CommonMarkBackend))
}

/// Registers the bundled extensions on a preconfigured base parser.
pub fn commonmark_parser_with(
    base: BaseParser<CommonMarkBackend>,
) -> Result<CommonMarkParser, MarkdownError> {
    ExtensibleParser::new(base, bundled_extensions())
}
