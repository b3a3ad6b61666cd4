//! Output sanitization against an allowlist.

use std::collections::{BTreeSet, HashMap, HashSet};

use ammonia::Builder;
use serde::{Deserialize, Serialize};

use crate::allowlist::{AttributeRule, GLOBAL_ATTRIBUTES, TagAllowlist};
use crate::parsed::LanguageTag;

/// Replaceable HTML sanitizer used by [`crate::RenderStrategy::FilterOutput`].
pub trait Sanitizer: Send + Sync {
    /// Reduces `html` to the tags and attributes permitted by `allowlist`.
    fn sanitize(&self, html: &str, allowlist: &TagAllowlist, language: Option<&LanguageTag>)
    -> String;

    /// Identifies the sanitizer and its options. Sanitizers with equal
    /// fingerprints produce equal output.
    fn fingerprint(&self) -> String;
}

/// What happens to a tag that is not in the allowlist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisallowedTagPolicy {
    /// Drop the tag and keep its text content.
    #[default]
    Unwrap,
    /// Drop content-bearing tags (see [`AmmoniaSanitizer::strip_content_of`])
    /// together with their content; other disallowed tags are unwrapped.
    StripContent,
}

const DEFAULT_STRIP_CONTENT_TAGS: &[&str] = &["script", "style"];

/// Allowlist sanitizer backed by `ammonia`.
#[derive(Debug, Clone)]
pub struct AmmoniaSanitizer {
    policy: DisallowedTagPolicy,
    strip_content_tags: BTreeSet<String>,
}

impl AmmoniaSanitizer {
    /// Sanitizer with the default [`DisallowedTagPolicy::Unwrap`] policy.
    pub fn new() -> Self {
        Self::with_policy(DisallowedTagPolicy::default())
    }

    /// Sanitizer with an explicit disallowed-tag policy.
    pub fn with_policy(policy: DisallowedTagPolicy) -> Self {
        Self {
            policy,
            strip_content_tags: DEFAULT_STRIP_CONTENT_TAGS
                .iter()
                .map(|tag| tag.to_string())
                .collect(),
        }
    }

    /// Replaces the tags removed together with their content under
    /// [`DisallowedTagPolicy::StripContent`].
    pub fn strip_content_of<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strip_content_tags = tags
            .into_iter()
            .map(|tag| tag.into().to_ascii_lowercase())
            .collect();
        self
    }

    /// The configured policy.
    pub fn policy(&self) -> DisallowedTagPolicy {
        self.policy
    }

    fn builder<'a>(&'a self, allowlist: &'a TagAllowlist) -> Builder<'a> {
        let tags: HashSet<&str> = allowlist.tags().collect();

        let mut tag_attributes: HashMap<&str, HashSet<&str>> = HashMap::new();
        let mut tag_attribute_values: HashMap<&str, HashMap<&str, HashSet<&str>>> = HashMap::new();
        for (tag, attributes) in allowlist.entries() {
            if tag == GLOBAL_ATTRIBUTES {
                continue;
            }
            for (attribute, rule) in attributes {
                match rule {
                    AttributeRule::Any => {
                        tag_attributes
                            .entry(tag)
                            .or_default()
                            .insert(attribute.as_str());
                    }
                    AttributeRule::Values(values) => {
                        tag_attribute_values
                            .entry(tag)
                            .or_default()
                            .insert(
                                attribute.as_str(),
                                values.iter().map(String::as_str).collect(),
                            );
                    }
                }
            }
        }

        let mut generic_attributes: HashSet<&str> = HashSet::new();
        for (attribute, rule) in allowlist.global_attributes() {
            match rule {
                AttributeRule::Any => {
                    generic_attributes.insert(attribute);
                }
                // ammonia has no generic value constraints, so apply them per tag.
                AttributeRule::Values(values) => {
                    for tag in &tags {
                        let unconstrained = tag_attributes
                            .get(tag)
                            .is_some_and(|allowed| allowed.contains(attribute));
                        if !unconstrained {
                            tag_attribute_values
                                .entry(*tag)
                                .or_default()
                                .entry(attribute)
                                .or_insert_with(|| values.iter().map(String::as_str).collect());
                        }
                    }
                }
            }
        }

        let clean_content_tags: HashSet<&str> = match self.policy {
            DisallowedTagPolicy::Unwrap => HashSet::new(),
            DisallowedTagPolicy::StripContent => self
                .strip_content_tags
                .iter()
                .map(String::as_str)
                .filter(|tag| !tags.contains(tag))
                .collect(),
        };

        let mut builder = Builder::default();
        builder
            .tags(tags)
            .clean_content_tags(clean_content_tags)
            .tag_attributes(tag_attributes)
            .tag_attribute_values(tag_attribute_values)
            .generic_attributes(generic_attributes)
            .link_rel(None)
            .strip_comments(true);
        builder
    }
}

impl Default for AmmoniaSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sanitizer for AmmoniaSanitizer {
    fn sanitize(
        &self,
        html: &str,
        allowlist: &TagAllowlist,
        _language: Option<&LanguageTag>,
    ) -> String {
        self.builder(allowlist).clean(html).to_string()
    }

    fn fingerprint(&self) -> String {
        let tags: Vec<&str> = self.strip_content_tags.iter().map(String::as_str).collect();
        format!("ammonia:{:?}:{}", self.policy, tags.join(","))
    }
}
