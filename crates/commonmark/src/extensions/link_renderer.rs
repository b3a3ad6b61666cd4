//! Enhanced link rendering: new windows and `rel="nofollow"` for links by
//! host.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use lol_html::{RewriteStrSettings, element, rewrite_str};
use markguard_core::{
    Extension, GuideGroup, GuideItem, Guidelines, HookContext, MarkdownError, Settings, SettingsMap,
    TagAllowlist, settings_map,
};
use serde_json::json;

const EXTERNAL_NEW_WINDOW: &str = "external_new_window";
const INTERNAL_HOST_WHITELIST: &str = "internal_host_whitelist";
const NO_FOLLOW: &str = "no_follow";

/// Which links receive `rel="nofollow"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoFollow {
    None,
    All,
    External,
    Internal,
}

impl NoFollow {
    fn from_setting(value: Option<&str>) -> Self {
        match value {
            Some("all") => NoFollow::All,
            Some("external") => NoFollow::External,
            Some("internal") => NoFollow::Internal,
            Some("") | None => NoFollow::None,
            Some(other) => {
                log::warn!("ignoring unknown {NO_FOLLOW} value '{other}'");
                NoFollow::None
            }
        }
    }

    fn applies(self, external: bool) -> bool {
        match self {
            NoFollow::None => false,
            NoFollow::All => true,
            NoFollow::External => external,
            NoFollow::Internal => !external,
        }
    }
}

/// Marks links to hosts outside the site.
///
/// The host whitelist is parsed on first use and kept until the settings
/// change. The host of the parser's `base_url` always counts as internal.
#[derive(Debug, Default)]
pub struct LinkRenderer {
    internal_hosts: OnceLock<BTreeSet<String>>,
}

impl LinkRenderer {
    /// Extension id.
    pub const ID: &'static str = "enhanced_links";

    /// Creates the extension.
    pub fn new() -> Self {
        Self::default()
    }

    fn internal_hosts(&self, settings: &Settings) -> &BTreeSet<String> {
        self.internal_hosts.get_or_init(|| {
            settings
                .get_str(INTERNAL_HOST_WHITELIST)
                .unwrap_or_default()
                .lines()
                .map(|line| line.trim().to_ascii_lowercase())
                .filter(|host| !host.is_empty())
                .collect()
        })
    }

    fn is_external(&self, href: &str, settings: &Settings, base_host: Option<&str>) -> bool {
        let Some(host) = url_host(href) else {
            return false;
        };
        if base_host == Some(host.as_str()) {
            return false;
        }
        !self.internal_hosts(settings).contains(&host)
    }
}

impl Extension for LinkRenderer {
    fn id(&self) -> &str {
        Self::ID
    }

    fn label(&self) -> &str {
        "Enhanced Links"
    }

    fn description(&self) -> &str {
        "Opens external links in new windows and adds rel=\"nofollow\" by host."
    }

    fn default_settings(&self) -> SettingsMap {
        settings_map(json!({
            EXTERNAL_NEW_WINDOW: true,
            INTERNAL_HOST_WHITELIST: "",
            NO_FOLLOW: "external",
        }))
    }

    fn settings_changed(&mut self) {
        self.internal_hosts = OnceLock::new();
    }

    fn allowed_html(&self, _settings: &Settings) -> Option<TagAllowlist> {
        TagAllowlist::parse("<a href hreflang rel target title>").ok()
    }

    fn alter_guidelines(&self, guidelines: &mut Guidelines, settings: &Settings) {
        if !settings.get_bool(EXTERNAL_NEW_WINDOW) {
            return;
        }
        if let Some(links) = guidelines.group_mut("links") {
            links.items.push(
                GuideItem::new()
                    .title("External links")
                    .description("Links to other sites open in a new window.")
                    .tag("a", ["[Rust](https://www.rust-lang.org)"]),
            );
        }
    }

    fn guidelines(&self, settings: &Settings) -> Option<GuideGroup> {
        let no_follow = NoFollow::from_setting(settings.get_str(NO_FOLLOW));
        let description = match no_follow {
            NoFollow::None => return None,
            NoFollow::All => "Every link is marked rel=\"nofollow\".",
            NoFollow::External => "Links to other sites are marked rel=\"nofollow\".",
            NoFollow::Internal => "Links within this site are marked rel=\"nofollow\".",
        };
        Some(
            GuideGroup::new(Self::ID, "Enhanced Links").item(
                GuideItem::new()
                    .description(description)
                    .tag("a", ["<https://example.org>"]),
            ),
        )
    }

    fn after_convert(
        &self,
        html: &mut String,
        settings: &Settings,
        context: &HookContext<'_>,
    ) -> Result<(), MarkdownError> {
        if !html.contains("<a") {
            return Ok(());
        }

        let new_window = settings.get_bool(EXTERNAL_NEW_WINDOW);
        let no_follow = NoFollow::from_setting(settings.get_str(NO_FOLLOW));
        let base_host = context.base_url.and_then(url_host);

        let rewritten = rewrite_str(
            html,
            RewriteStrSettings {
                element_content_handlers: vec![element!("a[href]", |el| {
                    let href = el.get_attribute("href").unwrap_or_default();
                    let external = self.is_external(&href, settings, base_host.as_deref());
                    if new_window && external {
                        el.set_attribute("target", "_blank")?;
                    }
                    if no_follow.applies(external) {
                        el.set_attribute("rel", "nofollow")?;
                    }
                    Ok(())
                })],
                ..RewriteStrSettings::default()
            },
        )
        .map_err(|err| MarkdownError::Rewrite(err.to_string()))?;

        *html = rewritten;
        Ok(())
    }
}

/// Lowercased host of an absolute or protocol-relative URL.
fn url_host(url: &str) -> Option<String> {
    let rest = match url.strip_prefix("//") {
        Some(rest) => rest,
        None => {
            let (scheme, rest) = url.split_once(':')?;
            let valid_scheme = scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
            if !valid_scheme {
                return None;
            }
            rest.strip_prefix("//")?
        }
    };

    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host);
    let host = if host_port.starts_with('[') {
        host_port
            .find(']')
            .map_or(host_port, |end| &host_port[..=end])
    } else {
        host_port.split(':').next().unwrap_or_default()
    };

    (!host.is_empty()).then(|| host.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(base_url: Option<&'static str>) -> HookContext<'static> {
        HookContext {
            parser: "commonmark",
            language: None,
            base_url,
            markdown: None,
        }
    }

    fn render(html: &str, settings: &Settings, base_url: Option<&'static str>) -> String {
        let extension = LinkRenderer::new();
        let mut html = html.to_string();
        extension
            .after_convert(&mut html, settings, &context(base_url))
            .unwrap();
        html
    }

    fn defaults() -> Settings {
        Settings::new(LinkRenderer::new().default_settings())
    }

    #[test]
    fn extracts_hosts() {
        assert_eq!(url_host("https://Example.com/a?b#c").as_deref(), Some("example.com"));
        assert_eq!(url_host("//cdn.test:8080/x").as_deref(), Some("cdn.test"));
        assert_eq!(url_host("http://user@[::1]:80/").as_deref(), Some("[::1]"));
        assert_eq!(url_host("/relative/path"), None);
        assert_eq!(url_host("#fragment"), None);
        assert_eq!(url_host("mailto:john.doe@example.com"), None);
    }

    #[test]
    fn external_links_open_in_new_windows_with_nofollow() {
        let html = render("<p><a href=\"https://other.test/\">x</a></p>", &defaults(), None);
        assert_eq!(
            html,
            "<p><a href=\"https://other.test/\" target=\"_blank\" rel=\"nofollow\">x</a></p>"
        );
    }

    #[test]
    fn base_url_host_is_internal() {
        let html = render(
            "<a href=\"https://site.test/page\">x</a>",
            &defaults(),
            Some("https://site.test/"),
        );
        assert_eq!(html, "<a href=\"https://site.test/page\">x</a>");
    }

    #[test]
    fn relative_links_are_internal() {
        let mut settings = defaults();
        settings.set(NO_FOLLOW, "internal");
        let html = render("<a href=\"/about\">x</a>", &settings, None);
        assert_eq!(html, "<a href=\"/about\" rel=\"nofollow\">x</a>");
    }

    #[test]
    fn whitelisted_hosts_are_internal() {
        let mut settings = defaults();
        settings.set(INTERNAL_HOST_WHITELIST, "docs.site.test\r\n\nblog.site.test");
        settings.set(NO_FOLLOW, "all");
        let html = render("<a href=\"https://blog.site.test/\">x</a>", &settings, None);
        assert_eq!(html, "<a href=\"https://blog.site.test/\" rel=\"nofollow\">x</a>");
    }

    #[test]
    fn host_list_resets_when_settings_change() {
        let mut extension = LinkRenderer::new();
        let mut settings = defaults();
        assert!(extension.is_external("https://blog.site.test/", &settings, None));

        settings.set(INTERNAL_HOST_WHITELIST, "blog.site.test");
        assert!(extension.is_external("https://blog.site.test/", &settings, None));
        extension.settings_changed();
        assert!(!extension.is_external("https://blog.site.test/", &settings, None));
    }

    #[test]
    fn no_follow_can_be_disabled() {
        let mut settings = defaults();
        settings.set(NO_FOLLOW, "");
        settings.set(EXTERNAL_NEW_WINDOW, false);
        let html = "<a href=\"https://other.test/\">x</a>";
        assert_eq!(render(html, &settings, None), html);
    }
}
