//! Smart punctuation (curly quotes, dashes, ellipsis) applied to rendered
//! HTML text.

use std::iter::Peekable;
use std::str::Chars;

use markguard_core::{
    Extension, GuideGroup, GuideItem, HookContext, MarkdownError, Settings, SettingsMap,
    settings_map,
};
use serde_json::json;

const DOUBLE_QUOTE_OPENER: &str = "double_quote_opener";
const DOUBLE_QUOTE_CLOSER: &str = "double_quote_closer";
const SINGLE_QUOTE_OPENER: &str = "single_quote_opener";
const SINGLE_QUOTE_CLOSER: &str = "single_quote_closer";

/// Elements whose text is left untouched.
const VERBATIM_ELEMENTS: &[&str] = &["code", "kbd", "pre", "script", "style"];

/// Replacement quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quotes {
    /// Opening double quote.
    pub double_opener: String,
    /// Closing double quote.
    pub double_closer: String,
    /// Opening single quote.
    pub single_opener: String,
    /// Closing single quote, also used for apostrophes.
    pub single_closer: String,
}

impl Default for Quotes {
    fn default() -> Self {
        Self {
            double_opener: "\u{201c}".to_string(),
            double_closer: "\u{201d}".to_string(),
            single_opener: "\u{2018}".to_string(),
            single_closer: "\u{2019}".to_string(),
        }
    }
}

impl Quotes {
    fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();
        let pick = |key: &str, fallback: String| {
            settings
                .get_str(key)
                .map(str::to_string)
                .unwrap_or(fallback)
        };
        Self {
            double_opener: pick(DOUBLE_QUOTE_OPENER, defaults.double_opener),
            double_closer: pick(DOUBLE_QUOTE_CLOSER, defaults.double_closer),
            single_opener: pick(SINGLE_QUOTE_OPENER, defaults.single_opener),
            single_closer: pick(SINGLE_QUOTE_CLOSER, defaults.single_closer),
        }
    }
}

/// Smart punctuation extension.
#[derive(Debug, Default)]
pub struct SmartPunctuation;

impl SmartPunctuation {
    /// Extension id.
    pub const ID: &'static str = "smart_punctuation";
}

impl Extension for SmartPunctuation {
    fn id(&self) -> &str {
        Self::ID
    }

    fn label(&self) -> &str {
        "Smart Punctuation"
    }

    fn description(&self) -> &str {
        "Converts straight quotes to curly quotes, dashes to en and em dashes and three dots to an ellipsis."
    }

    fn default_settings(&self) -> SettingsMap {
        let quotes = Quotes::default();
        settings_map(json!({
            DOUBLE_QUOTE_OPENER: quotes.double_opener,
            DOUBLE_QUOTE_CLOSER: quotes.double_closer,
            SINGLE_QUOTE_OPENER: quotes.single_opener,
            SINGLE_QUOTE_CLOSER: quotes.single_closer,
        }))
    }

    fn settings_key(&self) -> Option<&str> {
        Some("smartpunct")
    }

    fn guidelines(&self, settings: &Settings) -> Option<GuideGroup> {
        let quotes = Quotes::from_settings(settings);
        Some(
            GuideGroup::new(Self::ID, "Smart Punctuation").item(
                GuideItem::new()
                    .description(format!(
                        "Straight quotes become {}curly{} quotes; -- and --- become dashes; ... becomes an ellipsis.",
                        quotes.double_opener, quotes.double_closer
                    ))
                    .tag("p", ["\"Double\" and 'single' quotes -- and --- dashes..."]),
            ),
        )
    }

    fn after_convert(
        &self,
        html: &mut String,
        settings: &Settings,
        _context: &HookContext<'_>,
    ) -> Result<(), MarkdownError> {
        *html = apply_smart_punctuation(html, &Quotes::from_settings(settings));
        Ok(())
    }
}

/// Replaces punctuation in HTML text, skipping markup and the contents of
/// code, kbd, pre, script and style elements.
pub fn apply_smart_punctuation(input: &str, quotes: &Quotes) -> String {
    if !input.contains(['"', '\'', '-', '&']) && !input.contains("...") {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut verbatim_depth = 0usize;
    // Last text character, used to decide between opening and closing quotes.
    let mut previous: Option<char> = None;

    while let Some(c) = chars.next() {
        if c == '<' {
            consume_markup(&mut chars, &mut out, &mut verbatim_depth);
            continue;
        }

        if verbatim_depth > 0 {
            out.push(c);
            continue;
        }

        if c == '&' {
            let entity = consume_entity(&mut chars);
            match entity_quote(&entity) {
                Some(quote) => {
                    push_quote(quote, previous, quotes, &mut out);
                    previous = Some(quote);
                }
                None => {
                    out.push_str(&entity);
                    previous = Some('&');
                }
            }
            continue;
        }

        let emitted = match c {
            '"' | '\'' => {
                push_quote(c, previous, quotes, &mut out);
                c
            }
            '-' if chars.next_if_eq(&'-').is_some() => {
                let dash = match chars.next_if_eq(&'-') {
                    Some(_) => '\u{2014}',
                    None => '\u{2013}',
                };
                out.push(dash);
                dash
            }
            '.' if chars.clone().take(2).eq(['.', '.']) => {
                chars.next();
                chars.next();
                out.push('\u{2026}');
                '\u{2026}'
            }
            _ => {
                out.push(c);
                c
            }
        };
        previous = Some(emitted);
    }

    out
}

/// Copies a tag or comment, tracking verbatim element depth. A `>` inside a
/// quoted attribute value does not end the tag.
fn consume_markup(chars: &mut Peekable<Chars<'_>>, out: &mut String, verbatim_depth: &mut usize) {
    let mut markup = String::from("<");
    let is_comment = chars.clone().take(3).eq("!--".chars());
    let mut quote: Option<char> = None;
    let mut last: Option<char> = None;
    for n in chars.by_ref() {
        markup.push(n);
        if is_comment {
            if markup.ends_with("-->") {
                break;
            }
            continue;
        }
        match quote {
            Some(open) if n == open => quote = None,
            Some(_) => {}
            None if matches!(n, '"' | '\'') && last == Some('=') => quote = Some(n),
            None if n == '>' => break,
            None => {}
        }
        if !n.is_whitespace() {
            last = Some(n);
        }
    }

    if !is_comment {
        let closing = markup.starts_with("</");
        let name: String = markup
            .trim_start_matches(['<', '/'])
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        if VERBATIM_ELEMENTS.contains(&name.as_str()) {
            if closing {
                *verbatim_depth = verbatim_depth.saturating_sub(1);
            } else {
                *verbatim_depth += 1;
            }
        }
    }
    out.push_str(&markup);
}

/// Reads a character reference after `&`. Returns `&` alone when the text
/// does not form one.
fn consume_entity(chars: &mut Peekable<Chars<'_>>) -> String {
    let lookahead: String = chars
        .clone()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '#')
        .take(10)
        .collect();
    let mut entity = String::from("&");
    if chars.clone().nth(lookahead.chars().count()) == Some(';') && !lookahead.is_empty() {
        for _ in 0..=lookahead.chars().count() {
            if let Some(n) = chars.next() {
                entity.push(n);
            }
        }
    }
    entity
}

fn entity_quote(entity: &str) -> Option<char> {
    match entity {
        "&quot;" | "&#34;" | "&#x22;" | "&#X22;" => Some('"'),
        "&apos;" | "&#39;" | "&#x27;" | "&#X27;" => Some('\''),
        _ => None,
    }
}

fn push_quote(quote: char, previous: Option<char>, quotes: &Quotes, out: &mut String) {
    let opening =
        previous.is_none_or(|c| c.is_whitespace() || "([{\"'\u{2014}\u{2013}".contains(c));
    let replacement = match (quote, opening) {
        ('"', true) => &quotes.double_opener,
        ('"', false) => &quotes.double_closer,
        (_, true) => &quotes.single_opener,
        (_, false) => &quotes.single_closer,
    };
    out.push_str(replacement);
}
