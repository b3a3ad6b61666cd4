//! Alteration hooks run around conversion.

use std::fmt;
use std::sync::Arc;

use serde_json::{Value, json};

use crate::MarkdownError;
use crate::callback::{Callback, ErrorPolicy, TrustedCallbackGate};
use crate::parsed::LanguageTag;

/// Information handed to hooks during one parse.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    /// Id of the parser running the pipeline.
    pub parser: &'a str,
    /// Language passed to `parse`.
    pub language: Option<&'a LanguageTag>,
    /// Site base URL from the parser settings, if configured.
    pub base_url: Option<&'a str>,
    /// Markdown that was converted. Only set for post-convert hooks.
    pub markdown: Option<&'a str>,
}

impl HookContext<'_> {
    /// JSON form handed to callback hooks.
    pub fn to_value(&self) -> Value {
        json!({
            "parser": self.parser,
            "language": self.language.map(LanguageTag::as_str),
            "base_url": self.base_url,
            "markdown": self.markdown,
        })
    }
}

/// Alters Markdown before conversion or HTML after it.
pub trait MarkdownHook: Send + Sync {
    /// Rewrites the Markdown in place before conversion.
    fn alter_markdown(
        &self,
        _markdown: &mut String,
        _context: &HookContext<'_>,
    ) -> Result<(), MarkdownError> {
        Ok(())
    }

    /// Rewrites the HTML in place after conversion.
    fn alter_html(
        &self,
        _html: &mut String,
        _context: &HookContext<'_>,
    ) -> Result<(), MarkdownError> {
        Ok(())
    }
}

type AlterFn = dyn Fn(&mut String, &HookContext<'_>) + Send + Sync;

struct MarkdownAlter(Box<AlterFn>);

impl MarkdownHook for MarkdownAlter {
    fn alter_markdown(
        &self,
        markdown: &mut String,
        context: &HookContext<'_>,
    ) -> Result<(), MarkdownError> {
        (self.0)(markdown, context);
        Ok(())
    }
}

struct HtmlAlter(Box<AlterFn>);

impl MarkdownHook for HtmlAlter {
    fn alter_html(
        &self,
        html: &mut String,
        context: &HookContext<'_>,
    ) -> Result<(), MarkdownError> {
        (self.0)(html, context);
        Ok(())
    }
}

/// Ordered set of hooks. Hooks run sequentially in registration order.
#[derive(Default, Clone)]
pub struct HookBus {
    hooks: Vec<Arc<dyn MarkdownHook>>,
}

impl HookBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hook.
    pub fn register(&mut self, hook: Arc<dyn MarkdownHook>) -> &mut Self {
        self.hooks.push(hook);
        self
    }

    /// Registers a closure that rewrites Markdown before conversion.
    pub fn on_markdown<F>(&mut self, alter: F) -> &mut Self
    where
        F: Fn(&mut String, &HookContext<'_>) + Send + Sync + 'static,
    {
        self.register(Arc::new(MarkdownAlter(Box::new(alter))))
    }

    /// Registers a closure that rewrites HTML after conversion.
    pub fn on_html<F>(&mut self, alter: F) -> &mut Self
    where
        F: Fn(&mut String, &HookContext<'_>) + Send + Sync + 'static,
    {
        self.register(Arc::new(HtmlAlter(Box::new(alter))))
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Runs every `alter_markdown` hook.
    pub fn alter_markdown(
        &self,
        markdown: &mut String,
        context: &HookContext<'_>,
    ) -> Result<(), MarkdownError> {
        for hook in &self.hooks {
            hook.alter_markdown(markdown, context)?;
        }
        Ok(())
    }

    /// Runs every `alter_html` hook.
    pub fn alter_html(
        &self,
        html: &mut String,
        context: &HookContext<'_>,
    ) -> Result<(), MarkdownError> {
        for hook in &self.hooks {
            hook.alter_html(html, context)?;
        }
        Ok(())
    }
}

impl fmt::Debug for HookBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookBus").field("hooks", &self.hooks.len()).finish()
    }
}

/// Which subject a [`CallbackHook`] alters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// Before conversion.
    Markdown,
    /// After conversion.
    Html,
}

/// Hook registered by `Type::method` path and invoked through the gate.
///
/// The callback receives `[subject, context]` and may return a string that
/// replaces the subject; any other return value leaves it unchanged.
pub struct CallbackHook {
    gate: Arc<TrustedCallbackGate>,
    path: String,
    point: HookPoint,
    policy: ErrorPolicy,
}

impl CallbackHook {
    /// Creates a hook that fails hard on untrusted callbacks.
    pub fn new(gate: Arc<TrustedCallbackGate>, path: impl Into<String>, point: HookPoint) -> Self {
        Self {
            gate,
            path: path.into(),
            point,
            policy: ErrorPolicy::Throw,
        }
    }

    /// Overrides the untrusted-callback policy.
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn run(&self, subject: &mut String, context: &HookContext<'_>) -> Result<(), MarkdownError> {
        let args = [Value::String(subject.clone()), context.to_value()];
        let result = self.gate.invoke(
            Callback::Path(&self.path),
            &args,
            "Markdown hook {callback} is not a trusted callback",
            self.policy,
            None,
        )?;
        if let Value::String(altered) = result {
            *subject = altered;
        }
        Ok(())
    }
}

impl MarkdownHook for CallbackHook {
    fn alter_markdown(
        &self,
        markdown: &mut String,
        context: &HookContext<'_>,
    ) -> Result<(), MarkdownError> {
        match self.point {
            HookPoint::Markdown => self.run(markdown, context),
            HookPoint::Html => Ok(()),
        }
    }

    fn alter_html(
        &self,
        html: &mut String,
        context: &HookContext<'_>,
    ) -> Result<(), MarkdownError> {
        match self.point {
            HookPoint::Html => self.run(html, context),
            HookPoint::Markdown => Ok(()),
        }
    }
}
