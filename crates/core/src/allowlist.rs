//! Allowed-HTML tag lists used by the output sanitizer.
//!
//! Allowlists are written in the familiar filter notation:
//!
//! ```text
//! <a href hreflang> <em> <ol start type="1 a A"> <* lang dir>
//! ```
//!
//! Each `<...>` group names a tag followed by its permitted attributes. An
//! attribute with a quoted value list only accepts those values. The `*` tag
//! holds attributes permitted on every allowed tag.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::MarkdownError;

/// Tag entry holding attributes that are permitted on every tag.
pub const GLOBAL_ATTRIBUTES: &str = "*";

/// Tags and attributes allowed when a parser has no explicit allowlist.
const DEFAULT_TAGS: &[(&str, &[&str])] = &[
    ("a", &["href", "hreflang", "title"]),
    ("abbr", &[]),
    ("blockquote", &["cite"]),
    ("br", &[]),
    ("cite", &[]),
    ("code", &["class"]),
    ("dd", &[]),
    ("dl", &[]),
    ("dt", &[]),
    ("em", &[]),
    ("h1", &["id"]),
    ("h2", &["id"]),
    ("h3", &["id"]),
    ("h4", &["id"]),
    ("h5", &["id"]),
    ("h6", &["id"]),
    ("hr", &[]),
    ("img", &["alt", "height", "src", "title", "width"]),
    ("li", &[]),
    ("ol", &["start", "type"]),
    ("p", &[]),
    ("pre", &[]),
    ("span", &[]),
    ("strong", &[]),
    ("ul", &["type"]),
];

/// Permitted values of one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeRule {
    /// Any value is accepted.
    Any,
    /// Only the listed values are accepted.
    Values(BTreeSet<String>),
}

impl AttributeRule {
    fn union(&mut self, other: &AttributeRule) {
        match (&mut *self, other) {
            (AttributeRule::Any, _) => {}
            (_, AttributeRule::Any) => *self = AttributeRule::Any,
            (AttributeRule::Values(mine), AttributeRule::Values(theirs)) => {
                mine.extend(theirs.iter().cloned());
            }
        }
    }
}

/// Mapping of allowed tag names to their permitted attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TagAllowlist {
    tags: BTreeMap<String, BTreeMap<String, AttributeRule>>,
}

impl TagAllowlist {
    /// Creates an empty allowlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// The allowlist used when no explicit one is configured.
    pub fn markdown_default() -> Self {
        let mut allowlist = Self::new();
        for (tag, attributes) in DEFAULT_TAGS {
            allowlist.allow_tag(tag);
            for attribute in *attributes {
                allowlist.allow_attribute(tag, attribute);
            }
        }
        allowlist
    }

    /// Parses the `<tag attr attr="v1 v2">` notation.
    pub fn parse(input: &str) -> Result<Self, MarkdownError> {
        let mut allowlist = Self::new();
        let mut rest = input.trim_start();

        while !rest.is_empty() {
            let Some(body) = rest.strip_prefix('<') else {
                return Err(MarkdownError::invalid_allowlist(
                    "expected '<'",
                    snippet(rest),
                ));
            };
            let end = body
                .find('>')
                .ok_or_else(|| MarkdownError::invalid_allowlist("missing '>'", snippet(rest)))?;
            parse_declaration(&body[..end], &mut allowlist)?;
            rest = body[end + 1..].trim_start();
        }

        Ok(allowlist)
    }

    /// Allows a tag without adding attributes.
    pub fn allow_tag(&mut self, tag: &str) -> &mut Self {
        self.tags.entry(tag.to_ascii_lowercase()).or_default();
        self
    }

    /// Allows an attribute with any value on a tag, allowing the tag too.
    pub fn allow_attribute(&mut self, tag: &str, attribute: &str) -> &mut Self {
        self.insert_rule(tag, attribute, AttributeRule::Any);
        self
    }

    /// Allows an attribute on a tag restricted to the given values.
    pub fn allow_attribute_values<I, S>(
        &mut self,
        tag: &str,
        attribute: &str,
        values: I,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.insert_rule(tag, attribute, AttributeRule::Values(values));
        self
    }

    fn insert_rule(&mut self, tag: &str, attribute: &str, rule: AttributeRule) {
        let attributes = self.tags.entry(tag.to_ascii_lowercase()).or_default();
        match attributes.get_mut(&attribute.to_ascii_lowercase()) {
            Some(existing) => existing.union(&rule),
            None => {
                attributes.insert(attribute.to_ascii_lowercase(), rule);
            }
        }
    }

    /// Adds every tag and attribute of `other` to this allowlist.
    pub fn merge(&mut self, other: &TagAllowlist) {
        for (tag, attributes) in &other.tags {
            self.allow_tag(tag);
            for (attribute, rule) in attributes {
                self.insert_rule(tag, attribute, rule.clone());
            }
        }
    }

    /// Returns the union of two allowlists.
    pub fn union(mut self, other: &TagAllowlist) -> Self {
        self.merge(other);
        self
    }

    /// Whether `tag` is allowed. The global attribute entry is not a tag.
    pub fn allows_tag(&self, tag: &str) -> bool {
        tag != GLOBAL_ATTRIBUTES && self.tags.contains_key(&tag.to_ascii_lowercase())
    }

    /// Permitted attributes of a tag, if the tag is allowed.
    pub fn attributes(&self, tag: &str) -> Option<&BTreeMap<String, AttributeRule>> {
        self.tags.get(&tag.to_ascii_lowercase())
    }

    /// Attributes permitted on every tag.
    pub fn global_attributes(&self) -> impl Iterator<Item = (&str, &AttributeRule)> {
        self.tags
            .get(GLOBAL_ATTRIBUTES)
            .into_iter()
            .flat_map(|attributes| attributes.iter().map(|(name, rule)| (name.as_str(), rule)))
    }

    /// Allowed tag names, excluding the global attribute entry.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags
            .keys()
            .map(String::as_str)
            .filter(|tag| *tag != GLOBAL_ATTRIBUTES)
    }

    /// All entries including the global attribute entry.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, AttributeRule>)> {
        self.tags.iter().map(|(tag, attributes)| (tag.as_str(), attributes))
    }

    /// Whether nothing is allowed.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl fmt::Display for TagAllowlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (tag, attributes)) in self.tags.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "<{tag}")?;
            for (attribute, rule) in attributes {
                match rule {
                    AttributeRule::Any => write!(f, " {attribute}")?,
                    AttributeRule::Values(values) => {
                        let values: Vec<&str> = values.iter().map(String::as_str).collect();
                        write!(f, " {attribute}=\"{}\"", values.join(" "))?;
                    }
                }
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

impl From<TagAllowlist> for String {
    fn from(allowlist: TagAllowlist) -> Self {
        allowlist.to_string()
    }
}

impl TryFrom<String> for TagAllowlist {
    type Error = MarkdownError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TagAllowlist::parse(&value)
    }
}

impl std::str::FromStr for TagAllowlist {
    type Err = MarkdownError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TagAllowlist::parse(s)
    }
}

/// Parses the inside of one `<...>` group.
fn parse_declaration(declaration: &str, allowlist: &mut TagAllowlist) -> Result<(), MarkdownError> {
    let declaration = declaration.trim();
    let name_end = declaration
        .find(char::is_whitespace)
        .unwrap_or(declaration.len());
    let tag = &declaration[..name_end];
    if !is_valid_name(tag) && tag != GLOBAL_ATTRIBUTES {
        return Err(MarkdownError::invalid_allowlist(
            "invalid tag name",
            declaration,
        ));
    }
    allowlist.allow_tag(tag);

    let mut rest = declaration[name_end..].trim_start();
    while !rest.is_empty() {
        let attr_end = rest
            .find(|c: char| c.is_whitespace() || c == '=')
            .unwrap_or(rest.len());
        let attribute = &rest[..attr_end];
        if !is_valid_name(attribute) {
            return Err(MarkdownError::invalid_allowlist(
                "invalid attribute name",
                declaration,
            ));
        }
        rest = &rest[attr_end..];

        match rest.strip_prefix('=') {
            Some(value_part) => {
                let (values, remaining) = take_value(value_part)
                    .ok_or_else(|| {
                        MarkdownError::invalid_allowlist("unterminated value", declaration)
                    })?;
                allowlist.allow_attribute_values(tag, attribute, values.split_whitespace());
                rest = remaining.trim_start();
            }
            None => {
                allowlist.allow_attribute(tag, attribute);
                rest = rest.trim_start();
            }
        }
    }

    Ok(())
}

/// Splits a quoted or bare attribute value from the remaining input.
fn take_value(input: &str) -> Option<(&str, &str)> {
    let quote = input.chars().next()?;
    if quote == '"' || quote == '\'' {
        let body = &input[1..];
        let end = body.find(quote)?;
        Some((&body[..end], &body[end + 1..]))
    } else {
        let end = input.find(char::is_whitespace).unwrap_or(input.len());
        Some((&input[..end], &input[end..]))
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
}

fn snippet(input: &str) -> String {
    input.chars().take(24).collect()
}
