//! Gate for callbacks that cross a plugin trust boundary.
//!
//! A callback is trusted when it is a closure, when its target lists the
//! invoked method in [`CallbackTarget::trusted_callbacks`], or when the target
//! implements a capability the caller names as trusted. Trust is declared
//! data checked by lookup; nothing is inferred from types at runtime.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::MarkdownError;

/// Placeholder replaced with `Type::method` in untrusted-callback messages.
pub const CALLBACK_PLACEHOLDER: &str = "{callback}";

/// Closure callback signature.
pub type CallbackFn = dyn Fn(&[Value]) -> Result<Value, MarkdownError> + Send + Sync;

/// A component whose methods can be invoked by name.
pub trait CallbackTarget: Send + Sync {
    /// Name used in `Type::method` paths and messages.
    fn type_name(&self) -> &str;

    /// Methods declared safe to invoke as callbacks.
    ///
    /// `None` means the component does not take part in trusted callbacks at
    /// all, which differs from declaring an empty list only in intent.
    fn trusted_callbacks(&self) -> Option<&[&str]> {
        None
    }

    /// Whether the component implements a named capability.
    fn implements(&self, _capability: &str) -> bool {
        false
    }

    /// Invokes `method` with `args`.
    fn call(&self, method: &str, args: &[Value]) -> Result<Value, MarkdownError>;
}

/// The forms a callback can take.
pub enum Callback<'a> {
    /// Anonymous function. Always trusted, it cannot be substituted externally.
    Closure(&'a CallbackFn),
    /// Bound method on a target.
    Method(&'a dyn CallbackTarget, &'a str),
    /// `Type::method` path resolved through the gate's registered targets.
    Path(&'a str),
}

impl fmt::Debug for Callback<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Closure(_) => f.write_str("Closure"),
            Callback::Method(target, method) => {
                write!(f, "Method({}::{})", target.type_name(), method)
            }
            Callback::Path(path) => write!(f, "Path({path})"),
        }
    }
}

/// What to do when a callback is not trusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Fail without invoking the callback.
    #[default]
    Throw,
    /// Log a warning, then invoke.
    Warn,
    /// Log a silenced deprecation notice, then invoke.
    Silent,
}

/// Validates and invokes callbacks.
#[derive(Default, Clone)]
pub struct TrustedCallbackGate {
    targets: HashMap<String, Arc<dyn CallbackTarget>>,
}

impl TrustedCallbackGate {
    /// Creates a gate with no path targets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a target so `Type::method` paths can resolve to it.
    pub fn register(&mut self, target: Arc<dyn CallbackTarget>) -> &mut Self {
        self.targets.insert(target.type_name().to_string(), target);
        self
    }

    /// Looks up a registered target.
    pub fn target(&self, type_name: &str) -> Option<&Arc<dyn CallbackTarget>> {
        self.targets.get(type_name)
    }

    /// Invokes `callback` if trusted, otherwise applies `policy`.
    ///
    /// `message` may contain [`CALLBACK_PLACEHOLDER`], which is replaced with
    /// the resolved `Type::method`. Targets implementing `extra_capability`
    /// are trusted for every method.
    pub fn invoke(
        &self,
        callback: Callback<'_>,
        args: &[Value],
        message: &str,
        policy: ErrorPolicy,
        extra_capability: Option<&str>,
    ) -> Result<Value, MarkdownError> {
        let (target, method) = match callback {
            Callback::Closure(closure) => return closure(args),
            Callback::Method(target, method) => (target, method),
            Callback::Path(path) => {
                let (type_name, method) = path
                    .split_once("::")
                    .ok_or_else(|| MarkdownError::UnknownCallback(path.to_string()))?;
                let target = self
                    .targets
                    .get(type_name)
                    .ok_or_else(|| MarkdownError::UnknownCallback(path.to_string()))?;
                (target.as_ref(), method)
            }
        };

        if !is_trusted(target, method, extra_capability) {
            let description = format!("{}::{}", target.type_name(), method);
            let message = message.replace(CALLBACK_PLACEHOLDER, &description);
            match policy {
                ErrorPolicy::Throw => {
                    return Err(MarkdownError::UntrustedCallback {
                        message,
                        callback: description,
                    });
                }
                ErrorPolicy::Warn => log::warn!("{message}"),
                ErrorPolicy::Silent => log::debug!("deprecated: {message}"),
            }
        }

        target.call(method, args)
    }
}

fn is_trusted(target: &dyn CallbackTarget, method: &str, extra_capability: Option<&str>) -> bool {
    if extra_capability.is_some_and(|capability| target.implements(capability)) {
        return true;
    }
    target
        .trusted_callbacks()
        .is_some_and(|methods| methods.contains(&method))
}

impl fmt::Debug for TrustedCallbackGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.targets.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("TrustedCallbackGate")
            .field("targets", &names)
            .finish()
    }
}
