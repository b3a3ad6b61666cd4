//! GitHub Flavored Markdown constructs.
//!
//! Each construct is its own extension that switches on one backend
//! feature. `github_flavored_markdown` enables nothing itself; it only
//! requires the others.

use markguard_core::{
    Environment, Extension, GuideGroup, GuideItem, Guidelines, Settings, TagAllowlist,
};

use crate::backend::{FEATURE_AUTOLINK, FEATURE_STRIKETHROUGH, FEATURE_TABLE, FEATURE_TASK_LIST};

/// Id of the meta extension.
pub const GFM_ID: &str = "github_flavored_markdown";

/// Description of one GFM construct.
#[derive(Debug, Clone, Copy)]
pub struct GfmFeature {
    id: &'static str,
    label: &'static str,
    description: &'static str,
    allowed_html: Option<&'static str>,
    example: (&'static str, &'static str),
}

impl GfmFeature {
    /// `~~text~~` as `<del>`.
    pub const STRIKETHROUGH: GfmFeature = GfmFeature {
        id: FEATURE_STRIKETHROUGH,
        label: "Strikethrough",
        description: "Renders ~~text~~ as deleted text.",
        allowed_html: Some("<del>"),
        example: ("del", "~~Deleted~~"),
    };

    /// Pipe tables.
    pub const TABLE: GfmFeature = GfmFeature {
        id: FEATURE_TABLE,
        label: "Tables",
        description: "Renders pipe tables.",
        allowed_html: Some(
            "<table> <thead> <tbody> <tr> <th align=\"left center right\"> <td align=\"left center right\">",
        ),
        example: ("table", "| Name | Value |\n| :--- | ----: |\n| a | 1 |"),
    };

    /// Bare URLs and email addresses as links.
    pub const AUTOLINK: GfmFeature = GfmFeature {
        id: FEATURE_AUTOLINK,
        label: "Autolinks",
        description: "Turns bare URLs and email addresses into links.",
        allowed_html: None,
        example: ("a", "www.example.com"),
    };

    /// `- [x]` list items as checkboxes.
    pub const TASK_LIST: GfmFeature = GfmFeature {
        id: FEATURE_TASK_LIST,
        label: "Task Lists",
        description: "Renders - [ ] and - [x] list items as checkboxes.",
        allowed_html: Some("<input checked disabled type=\"checkbox\">"),
        example: ("input", "- [x] Done\n- [ ] Pending"),
    };

    /// Every construct, in registration order.
    pub const ALL: [GfmFeature; 4] = [
        GfmFeature::STRIKETHROUGH,
        GfmFeature::TABLE,
        GfmFeature::AUTOLINK,
        GfmFeature::TASK_LIST,
    ];
}

impl Extension for GfmFeature {
    fn id(&self) -> &str {
        self.id
    }

    fn label(&self) -> &str {
        self.label
    }

    fn description(&self) -> &str {
        self.description
    }

    fn required_by(&self) -> &[&str] {
        &[GFM_ID]
    }

    fn alter_environment(&self, environment: &mut Environment, _settings: &Settings) {
        environment.enable(self.id);
    }

    fn allowed_html(&self, _settings: &Settings) -> Option<TagAllowlist> {
        let allowed = self.allowed_html?;
        match TagAllowlist::parse(allowed) {
            Ok(allowlist) => Some(allowlist),
            Err(err) => {
                log::warn!("{}: {err}", self.id);
                None
            }
        }
    }

    fn guidelines(&self, _settings: &Settings) -> Option<GuideGroup> {
        let (tag, example) = self.example;
        Some(
            GuideGroup::new(self.id, self.label)
                .item(GuideItem::new().description(self.description).tag(tag, [example])),
        )
    }

    fn alter_guidelines(&self, guidelines: &mut Guidelines, _settings: &Settings) {
        if self.id != FEATURE_STRIKETHROUGH {
            return;
        }
        if let Some(general) = guidelines.group_mut("general") {
            for item in &mut general.items {
                if item.title.as_deref() == Some("Deleted text") {
                    item.description = None;
                    for tag in &mut item.tags {
                        tag.examples.push("~~Deleted~~".to_string());
                    }
                }
            }
        }
    }
}

/// Meta extension enabling every GFM construct.
#[derive(Debug, Default)]
pub struct GithubFlavoredMarkdown;

impl Extension for GithubFlavoredMarkdown {
    fn id(&self) -> &str {
        GFM_ID
    }

    fn label(&self) -> &str {
        "GitHub Flavored Markdown"
    }

    fn description(&self) -> &str {
        "Enables strikethrough, tables, autolinks and task lists."
    }

    fn requires(&self) -> &[&str] {
        &[
            FEATURE_STRIKETHROUGH,
            FEATURE_TABLE,
            FEATURE_AUTOLINK,
            FEATURE_TASK_LIST,
        ]
    }
}
