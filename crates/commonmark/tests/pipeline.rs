use std::sync::Arc;

use markguard_commonmark::extensions::{GFM_ID, LinkRenderer, SmartPunctuation};
use markguard_commonmark::{
    CommonMarkBackend, CommonMarkParser, commonmark_parser, commonmark_parser_with,
};
use markguard_core::{
    AmmoniaSanitizer, BASE_URL_SETTING, BaseParser, CallbackHook, CallbackTarget, ConfigStore,
    DisallowedTagPolicy, ExtensionConfiguration, HookPoint, LanguageTag, MarkdownError,
    MarkdownParser, MemoryConfigStore, ParseCache, ParserConfiguration, RenderStrategy,
    TagAllowlist, TrustedCallbackGate,
};
use once_cell::sync::Lazy;
use serde_json::Value;

const SCRIPT: &str = "**bold** <script>alert(1)</script>";

/// Parser with every bundled extension enabled.
static FULL: Lazy<CommonMarkParser> = Lazy::new(|| {
    let mut parser = commonmark_parser().expect("bundled extensions register");
    for id in [LinkRenderer::ID, SmartPunctuation::ID, GFM_ID] {
        parser.set_extension_enabled(id, true).expect("bundled id");
    }
    parser
});

const HOSTILE_INPUTS: &[&str] = &[
    SCRIPT,
    "<img src=x onerror=alert(1)>",
    "[click](javascript:alert(1))",
    "<div style=\"position:fixed\" onclick=\"steal()\">*hi*</div>",
    "<iframe src=\"https://evil.test\"></iframe>\n\n- [x] done\n\n| a |\n| - |\n| 1 |",
    "<a href=\"https://other.test\" onmouseover=\"x()\">link</a> ~~gone~~",
    "<!-- comment --><svg><script>alert(1)</script></svg>",
    "\"quoted\" -- text... <style>p{}</style>",
];

fn tag_names(html: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = html;
    while let Some(start) = rest.find('<') {
        rest = &rest[start + 1..];
        let name: String = rest
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        if !name.is_empty() {
            names.push(name.to_ascii_lowercase());
        }
    }
    names
}

fn strong_only() -> CommonMarkParser {
    let allowlist = TagAllowlist::parse("<strong>").unwrap();
    commonmark_parser_with(BaseParser::new(CommonMarkBackend).with_allowed_html(allowlist)).unwrap()
}

#[test]
fn filter_output_unwraps_script_keeping_text() {
    let parsed = strong_only().parse(SCRIPT, None).unwrap();
    insta::assert_snapshot!(parsed.html(), @"<strong>bold</strong> alert(1)");
    assert_eq!(parsed.markdown(), SCRIPT);
}

#[test]
fn filter_output_can_drop_script_content() {
    let parser = commonmark_parser_with(
        BaseParser::new(CommonMarkBackend)
            .with_allowed_html(TagAllowlist::parse("<strong>").unwrap())
            .with_sanitizer(AmmoniaSanitizer::with_policy(DisallowedTagPolicy::StripContent)),
    )
    .unwrap();
    let html = parser.parse(SCRIPT, None).unwrap().into_html();
    assert!(html.contains("<strong>bold</strong>"));
    assert!(!html.contains("alert(1)"));
    assert!(!html.contains("<script"));
}

#[test]
fn escape_input_renders_source_as_text() {
    let parser = commonmark_parser_with(
        BaseParser::new(CommonMarkBackend).with_render_strategy(RenderStrategy::EscapeInput),
    )
    .unwrap();
    let parsed = parser.parse(SCRIPT, None).unwrap();
    insta::assert_snapshot!(
        parsed.html(),
        @"<p><strong>bold</strong> &lt;script&gt;alert(1)&lt;/script&gt;</p>"
    );
}

#[test]
fn escape_input_never_emits_source_markup() {
    let mut parser = commonmark_parser().unwrap();
    let configuration = ParserConfiguration {
        render_strategy: RenderStrategy::EscapeInput,
        ..FULL.configuration()
    };
    parser.set_configuration(configuration).unwrap();

    for input in HOSTILE_INPUTS {
        let html = parser.parse(input, None).unwrap().into_html();
        for tag in ["script", "img", "div", "iframe", "svg", "style"] {
            assert!(!tag_names(&html).contains(&tag.to_string()), "{input:?} -> {html}");
        }
    }
}

#[test]
fn strip_input_removes_raw_html_before_conversion() {
    let parser = commonmark_parser_with(
        BaseParser::new(CommonMarkBackend).with_render_strategy(RenderStrategy::StripInput),
    )
    .unwrap();
    let parsed = parser.parse("<div>*hi*</div> <b>there</b>", None).unwrap();
    assert_eq!(parsed.html(), "<p><em>hi</em> there</p>");
}

#[test]
fn strip_input_leaves_no_markup_from_raw_text_elements() {
    let parser = commonmark_parser_with(
        BaseParser::new(CommonMarkBackend).with_render_strategy(RenderStrategy::StripInput),
    )
    .unwrap();
    for source in [
        "<script><img src=x onerror=alert(1)></script>",
        "<title><img src=x onerror=alert(1)></title>",
        "<textarea><img src=x onerror=alert(1)></textarea>",
    ] {
        let html = parser.parse(source, None).unwrap().into_html();
        assert!(!html.contains('<'), "{source:?} -> {html}");
    }
    assert_eq!(parser.parse("</div>\n\ntext", None).unwrap().html(), "<p>text</p>");
}

#[test]
fn none_strategy_is_an_explicit_opt_out() {
    let parser = commonmark_parser_with(
        BaseParser::new(CommonMarkBackend).with_render_strategy(RenderStrategy::None),
    )
    .unwrap();
    let parsed = parser.parse(SCRIPT, None).unwrap();
    assert_eq!(
        parsed.html(),
        "<p><strong>bold</strong> <script>alert(1)</script></p>"
    );
}

#[test]
fn filter_output_only_emits_allowed_tags() {
    let allowlist = FULL.allowed_html();
    for input in HOSTILE_INPUTS {
        let html = FULL.parse(input, None).unwrap().into_html();
        for name in tag_names(&html) {
            assert!(allowlist.allows_tag(&name), "<{name}> from {input:?} in {html}");
        }
        assert!(!html.contains("onerror"));
        assert!(!html.contains("javascript:"));
    }
}

#[test]
fn gfm_enables_every_construct() {
    let mut parser = commonmark_parser().unwrap();
    parser.set_extension_enabled(GFM_ID, true).unwrap();
    let active: Vec<String> = parser.registry().resolve_enabled().into_iter().collect();
    assert_eq!(
        active,
        vec!["autolink", GFM_ID, "strikethrough", "table", "task_list"]
    );

    let html = parser
        .parse("~~gone~~ www.example.com\n\n- [x] done\n\n| a |\n| :- |\n| 1 |", None)
        .unwrap()
        .into_html();
    assert!(html.contains("<del>gone</del>"));
    assert!(html.contains("<a href=\"http://www.example.com\">www.example.com</a>"));
    assert!(html.contains("type=\"checkbox\""));
    assert!(html.contains("checked"));
    assert!(html.contains("<th align=\"left\">a</th>"));
    assert!(html.contains("<td align=\"left\">1</td>"));
}

#[test]
fn disabled_gfm_constructs_stay_literal() {
    let parser = commonmark_parser().unwrap();
    let html = parser.parse("~~gone~~", None).unwrap().into_html();
    assert_eq!(html, "<p>~~gone~~</p>");
    assert!(!parser.allowed_html().allows_tag("del"));
}

#[test]
fn enhanced_links_respect_the_site_host() {
    let mut parser = commonmark_parser_with(
        BaseParser::new(CommonMarkBackend).with_setting(BASE_URL_SETTING, "https://site.test/"),
    )
    .unwrap();
    parser.set_extension_enabled(LinkRenderer::ID, true).unwrap();

    let html = parser
        .parse("[in](https://site.test/a) [out](https://other.test/b)", None)
        .unwrap()
        .into_html();
    assert_eq!(
        html,
        "<p><a href=\"https://site.test/a\">in</a> <a href=\"https://other.test/b\" target=\"_blank\" rel=\"nofollow\">out</a></p>"
    );
}

#[test]
fn enhanced_links_pick_up_new_settings() {
    let mut parser = commonmark_parser().unwrap();
    let link = "[docs](https://docs.site.test/)";
    parser
        .set_extension_config(LinkRenderer::ID, ExtensionConfiguration::enabled())
        .unwrap();
    assert!(parser.parse(link, None).unwrap().html().contains("target=\"_blank\""));

    parser
        .set_extension_config(
            LinkRenderer::ID,
            ExtensionConfiguration::enabled()
                .with_setting("internal_host_whitelist", "docs.site.test"),
        )
        .unwrap();
    assert_eq!(
        parser.parse(link, None).unwrap().html(),
        "<p><a href=\"https://docs.site.test/\">docs</a></p>"
    );
}

#[test]
fn smart_punctuation_runs_after_conversion() {
    let mut parser = commonmark_parser().unwrap();
    parser.set_extension_enabled(SmartPunctuation::ID, true).unwrap();
    let html = parser
        .parse("\"Hello\" -- it's `\"code\"`...", None)
        .unwrap()
        .into_html();
    assert_eq!(
        html,
        "<p>\u{201c}Hello\u{201d} \u{2013} it\u{2019}s <code>\"code\"</code>\u{2026}</p>"
    );
    assert!(parser.environment().setting("smartpunct").is_some());
}

#[test]
fn smart_punctuation_keeps_raw_html_attributes_intact() {
    let html = FULL
        .parse("<span title=\"x>y\">\"q\"</span>", None)
        .unwrap()
        .into_html();
    assert_eq!(html, "<p><span>\u{201c}q\u{201d}</span></p>");
}

#[test]
fn configuration_round_trips_through_yaml_and_stores() {
    let mut parser = commonmark_parser().unwrap();
    parser.set_extension_enabled(GFM_ID, true).unwrap();
    parser
        .set_extension_config(
            LinkRenderer::ID,
            ExtensionConfiguration::enabled().with_setting("no_follow", "all"),
        )
        .unwrap();
    let configuration = parser.configuration();
    assert!(!configuration.extensions.contains_key(SmartPunctuation::ID));

    let yaml = configuration.to_yaml_string().unwrap();
    let mut restored = commonmark_parser().unwrap();
    restored
        .set_configuration(ParserConfiguration::from_yaml_str(&yaml).unwrap())
        .unwrap();
    assert_eq!(restored.configuration(), configuration);
    assert_eq!(
        restored.registry().resolve_enabled(),
        parser.registry().resolve_enabled()
    );

    let mut store = MemoryConfigStore::new(parser.default_configuration());
    configuration.save(&mut store).unwrap();
    assert_eq!(
        store.get("extensions.enhanced_links.settings.no_follow"),
        Some(Value::from("all"))
    );
    assert_eq!(ParserConfiguration::load(&store).unwrap(), configuration);
}

#[test]
fn unknown_extension_lookup_fails() {
    let parser = commonmark_parser().unwrap();
    assert!(matches!(
        parser.extension("footnotes"),
        Err(MarkdownError::UnknownExtension(id)) if id == "footnotes"
    ));
}

#[test]
fn guidelines_include_enabled_extensions_only() {
    let guidelines = commonmark_parser().unwrap().guidelines();
    assert!(guidelines.extensions.is_empty());
    assert!(guidelines.group("links").is_some());

    let guidelines = FULL.guidelines();
    let expected = [
        "strikethrough",
        "table",
        "autolink",
        "task_list",
        SmartPunctuation::ID,
        LinkRenderer::ID,
    ];
    for id in expected {
        assert!(guidelines.extension(id).is_some(), "missing {id}");
    }
}

struct Footer;

impl CallbackTarget for Footer {
    fn type_name(&self) -> &str {
        "Footer"
    }

    fn trusted_callbacks(&self) -> Option<&[&str]> {
        Some(&["append"])
    }

    fn call(&self, method: &str, args: &[Value]) -> Result<Value, MarkdownError> {
        let html = args.first().and_then(Value::as_str).unwrap_or_default();
        Ok(Value::String(format!("{html}<p>{method}</p>")))
    }
}

#[test]
fn callback_hooks_are_gated() {
    let mut gate = TrustedCallbackGate::new();
    gate.register(Arc::new(Footer));
    let gate = Arc::new(gate);

    let mut parser = commonmark_parser().unwrap();
    parser
        .base_mut()
        .hooks_mut()
        .register(Arc::new(CallbackHook::new(
            Arc::clone(&gate),
            "Footer::append",
            HookPoint::Html,
        )));
    assert_eq!(parser.parse("text", None).unwrap().html(), "<p>text</p><p>append</p>");

    parser
        .base_mut()
        .hooks_mut()
        .register(Arc::new(CallbackHook::new(gate, "Footer::remove", HookPoint::Html)));
    assert!(matches!(
        parser.parse("text", None),
        Err(MarkdownError::UntrustedCallback { callback, .. }) if callback == "Footer::remove"
    ));
}

#[test]
fn cache_separates_sanitizer_policies() {
    let cache = ParseCache::new();
    let stripping = commonmark_parser_with(
        BaseParser::new(CommonMarkBackend)
            .with_allowed_html(TagAllowlist::parse("<strong>").unwrap())
            .with_sanitizer(AmmoniaSanitizer::with_policy(DisallowedTagPolicy::StripContent)),
    )
    .unwrap();
    let unwrapped = cache.get_or_parse(&strong_only(), SCRIPT, None).unwrap();
    let stripped = cache.get_or_parse(&stripping, SCRIPT, None).unwrap();
    assert!(unwrapped.html().contains("alert(1)"));
    assert!(!stripped.html().contains("alert(1)"));
    assert_eq!(cache.len(), 2);
}

#[test]
fn cache_and_batches_share_the_pipeline() {
    let cache = ParseCache::new();
    let english = LanguageTag::new("en");
    let first = cache.get_or_parse(&*FULL, "*a*", Some(&english)).unwrap();
    let second = cache.get_or_parse(&*FULL, "*a*", Some(&english)).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.language(), Some(&english));
    assert_eq!(cache.len(), 1);

    let results = FULL.parse_batch(HOSTILE_INPUTS, None);
    assert_eq!(results.len(), HOSTILE_INPUTS.len());
    for (input, result) in HOSTILE_INPUTS.iter().zip(results) {
        assert_eq!(result.unwrap(), FULL.parse(input, None).unwrap());
    }
}
