//! CommonMark conversion through markdown-rs.

use markdown::message::{Message, Place};
use markguard_core::{
    Environment, LanguageTag, MarkdownError, ParserBackend, SettingsMap, SourceLocation,
    settings_map,
};
use serde_json::json;

/// Environment feature switching on `~~strikethrough~~`.
pub const FEATURE_STRIKETHROUGH: &str = "strikethrough";
/// Environment feature switching on GFM tables.
pub const FEATURE_TABLE: &str = "table";
/// Environment feature switching on literal autolinks.
pub const FEATURE_AUTOLINK: &str = "autolink";
/// Environment feature switching on task list items.
pub const FEATURE_TASK_LIST: &str = "task_list";

/// Keep raw HTML from the source in the output.
pub const ALLOW_RAW_HTML: &str = "allow_raw_html";
/// Keep `javascript:` and other non-safe link protocols.
pub const ALLOW_UNSAFE_LINKS: &str = "allow_unsafe_links";
/// Recognize indented code blocks.
pub const CODE_INDENTED: &str = "code_indented";

/// CommonMark backend. GFM constructs stay off until an extension enables
/// the matching feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonMarkBackend;

impl CommonMarkBackend {
    /// Backend id.
    pub const ID: &'static str = "commonmark";

    /// Builds markdown-rs options for an environment.
    pub fn options(environment: &Environment) -> markdown::Options {
        let raw_html = environment.flag(ALLOW_RAW_HTML, true);
        let constructs = markdown::Constructs {
            code_indented: environment.flag(CODE_INDENTED, true),
            html_flow: raw_html,
            html_text: raw_html,
            gfm_strikethrough: environment.has(FEATURE_STRIKETHROUGH),
            gfm_table: environment.has(FEATURE_TABLE),
            gfm_autolink_literal: environment.has(FEATURE_AUTOLINK),
            gfm_task_list_item: environment.has(FEATURE_TASK_LIST),
            ..markdown::Constructs::default()
        };

        markdown::Options {
            parse: markdown::ParseOptions {
                constructs,
                ..markdown::ParseOptions::default()
            },
            compile: markdown::CompileOptions {
                allow_dangerous_html: raw_html,
                allow_dangerous_protocol: environment.flag(ALLOW_UNSAFE_LINKS, false),
                ..markdown::CompileOptions::default()
            },
        }
    }
}

impl ParserBackend for CommonMarkBackend {
    fn id(&self) -> &str {
        Self::ID
    }

    fn default_settings(&self) -> SettingsMap {
        settings_map(json!({
            ALLOW_RAW_HTML: true,
            ALLOW_UNSAFE_LINKS: false,
            CODE_INDENTED: true,
        }))
    }

    fn convert_to_html(
        &self,
        markdown: &str,
        _language: Option<&LanguageTag>,
        environment: &Environment,
    ) -> Result<String, MarkdownError> {
        let options = Self::options(environment);
        markdown::to_html_with_options(markdown, &options).map_err(|err| {
            let location = message_location(&err);
            MarkdownError::backend(err.reason, location.line, location.column)
        })
    }
}

fn message_location(message: &Message) -> SourceLocation {
    match &message.place {
        Some(place) => match place.as_ref() {
            Place::Point(point) => SourceLocation::new(point.line, point.column),
            Place::Position(position) => {
                SourceLocation::new(position.start.line, position.start.column)
            }
        },
        None => SourceLocation::new(1, 1),
    }
}
