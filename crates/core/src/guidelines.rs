//! Markdown writing guidelines shown next to text inputs.
//!
//! Guidelines are presentation data: groups of items, each pairing an HTML
//! tag with example Markdown that produces it. Extensible parsers let enabled
//! extensions alter the base groups and append groups of their own.

use serde::Serialize;

/// One example entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuideItem {
    /// Optional heading of the entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Optional explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the wrapping `<p>` is stripped when previewing the example.
    pub strip_p: bool,
    /// Examples keyed by the tag they produce, in display order.
    pub tags: Vec<GuideTag>,
}

/// Examples producing one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuideTag {
    /// Tag name, e.g. `strong`.
    pub tag: String,
    /// Markdown examples.
    pub examples: Vec<String>,
}

impl GuideItem {
    /// Creates an untitled entry.
    pub fn new() -> Self {
        Self {
            title: None,
            description: None,
            strip_p: true,
            tags: Vec::new(),
        }
    }

    /// Sets the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Keeps the wrapping paragraph in previews.
    pub fn keep_paragraphs(mut self) -> Self {
        self.strip_p = false;
        self
    }

    /// Adds examples for a tag.
    pub fn tag<I, S>(mut self, tag: impl Into<String>, examples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.push(GuideTag {
            tag: tag.into(),
            examples: examples.into_iter().map(Into::into).collect(),
        });
        self
    }
}

impl Default for GuideItem {
    fn default() -> Self {
        Self::new()
    }
}

/// A titled group of entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuideGroup {
    /// Machine name, e.g. `links` or an extension id.
    pub id: String,
    /// Human readable title.
    pub title: String,
    /// Entries in display order.
    pub items: Vec<GuideItem>,
}

impl GuideGroup {
    /// Creates an empty group.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            items: Vec::new(),
        }
    }

    /// Appends an entry.
    pub fn item(mut self, item: GuideItem) -> Self {
        self.items.push(item);
        self
    }
}

/// Site details referenced by link examples.
#[derive(Debug, Clone, Copy)]
pub struct GuideSite<'a> {
    /// Absolute front page URL.
    pub base_url: &'a str,
    /// Site name used as link text.
    pub site_name: &'a str,
}

impl Default for GuideSite<'_> {
    fn default() -> Self {
        Self {
            base_url: "https://example.com/",
            site_name: "Example",
        }
    }
}

/// Complete guidelines for a parser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Guidelines {
    /// Base groups.
    pub groups: Vec<GuideGroup>,
    /// Groups contributed by extensions, keyed by extension id.
    pub extensions: Vec<GuideGroup>,
}

impl Guidelines {
    /// Looks up a base group.
    pub fn group(&self, id: &str) -> Option<&GuideGroup> {
        self.groups.iter().find(|group| group.id == id)
    }

    /// Looks up a base group for modification.
    pub fn group_mut(&mut self, id: &str) -> Option<&mut GuideGroup> {
        self.groups.iter_mut().find(|group| group.id == id)
    }

    /// Looks up an extension group.
    pub fn extension(&self, id: &str) -> Option<&GuideGroup> {
        self.extensions.iter().find(|group| group.id == id)
    }

    /// Guidelines every CommonMark-compatible parser supports.
    pub fn base(site: GuideSite<'_>) -> Self {
        let GuideSite {
            base_url,
            site_name,
        } = site;

        let general = GuideGroup::new("general", "General")
            .item(
                GuideItem::new()
                    .title("Paragraphs")
                    .description("Paragraphs are simply one or more consecutive lines of text, separated by one or more blank lines.")
                    .keep_paragraphs()
                    .tag("p", ["Paragraph one.\n\nParagraph two."]),
            )
            .item(
                GuideItem::new()
                    .title("Line Breaks")
                    .description("If you want to insert a <kbd>&lt;br /&gt;</kbd> break tag, end a line with two or more spaces, then type return.")
                    .keep_paragraphs()
                    .tag("br", ["Text with  \nline break"]),
            )
            .item(GuideItem::new().title("Horizontal Rule").tag("hr", ["---", "___", "***"]))
            .item(
                GuideItem::new()
                    .title("Deleted text")
                    .description("CommonMark has no syntax for <kbd>&lt;del&gt;</kbd> formatting. You must manually specify them.")
                    .tag("del", ["<del>Deleted</del>"]),
            )
            .item(
                GuideItem::new()
                    .title("Emphasized text")
                    .tag("em", ["_Emphasized_", "*Emphasized*"]),
            )
            .item(
                GuideItem::new()
                    .title("Strong text")
                    .tag("strong", ["__Strong__", "**Strong**"]),
            );

        let blockquotes = GuideGroup::new("blockquotes", "Block Quotes").item(GuideItem::new().tag(
            "blockquote",
            [
                "> Block quoted\n\nNormal text",
                "> Nested block quotes\n>> Nested block quotes\n>>> Nested block quotes\n\nNormal text",
            ],
        ));

        let code = GuideGroup::new("code", "Code")
            .item(GuideItem::new().title("Inline code").tag("code", ["`Inline code`"]))
            .item(GuideItem::new().title("Fenced code blocks").tag(
                "pre",
                [
                    "```\nFenced code block\n```",
                    "~~~\nFenced code block\n~~~",
                    "    Fenced code block - indented using 4+ spaces",
                    "\tFenced code block - indented using tab",
                ],
            ))
            .item(GuideItem::new().title("Fenced code blocks (using languages)").tag(
                "pre",
                [
                    "```css\n.selector {\n  color: #ff0;\n}\n```",
                    "```js\nconst selector = document.querySelector('#id');\n```",
                ],
            ));

        let mut heading_item = GuideItem::new();
        for level in 1..=6 {
            heading_item = heading_item.tag(
                format!("h{level}"),
                [format!("{} Heading {level}", "#".repeat(level))],
            );
        }
        let headings = GuideGroup::new("headings", "Headings").item(heading_item);

        let images = GuideGroup::new("images", "Images")
            .item(GuideItem::new().title("Images").tag(
                "img",
                [format!("![Alt text]({base_url}image.png \"Title text\")")],
            ))
            .item(
                GuideItem::new()
                    .title("Referenced images")
                    .keep_paragraphs()
                    .tag(
                        "img",
                        [format!(
                            "Lorem ipsum dolor sit amet\n\n![Alt text]\n\n[Alt text]: {base_url}image.png \"Title text\""
                        )],
                    ),
            );

        let links = GuideGroup::new("links", "Links")
            .item(GuideItem::new().title("Links").tag(
                "a",
                [
                    format!("<{base_url}>"),
                    format!("[{site_name}]({base_url})"),
                    "<john.doe@example.com>".to_string(),
                    format!("[Email: {site_name}](mailto:john.doe@example.com)"),
                ],
            ))
            .item(
                GuideItem::new()
                    .title("Referenced links")
                    .description("Link references are very useful if you use the same words through out a document and wish to link them all to the same link.")
                    .tag("a", [format!("[{site_name}]\n\n[{site_name}]: {base_url} \"My title\"")]),
            )
            .item(GuideItem::new().title("Fragments (anchors)").tag(
                "a",
                [
                    format!("[{site_name}]({base_url}#fragment)"),
                    format!("[{site_name}](#element-id)"),
                ],
            ));

        let lists = GuideGroup::new("lists", "Lists")
            .item(GuideItem::new().title("Ordered lists").tag(
                "ol",
                [
                    "1. First item\n2. Second item\n3. Third item",
                    "1) First item\n2) Second item\n3) Third item",
                    "1. All start with 1\n1. All start with 1\n1. Rendered with correct numbers",
                    "5. Start at fifth item\n6. Sixth item",
                ],
            ))
            .item(GuideItem::new().title("Unordered lists").tag(
                "ul",
                [
                    "- First item\n- Second item",
                    "- First item\n  - First nested item\n    - Deep nested item",
                    "* First item\n* Second item",
                    "+ First item\n+ Second item",
                ],
            ));

        Self {
            groups: vec![general, blockquotes, code, headings, images, links, lists],
            extensions: Vec::new(),
        }
    }
}
