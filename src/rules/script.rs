use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{RuleCompileError, RuleField};
use crate::page::{ElementId, Page};

/// What a script body is invoked with.
#[derive(Debug, Clone)]
pub enum ScriptInput<'a> {
    /// A `to` or `url` body, called with the match of the rule's pattern.
    /// `captures[0]` is the whole match.
    Rewrite { captures: Vec<Option<&'a str>>, input: &'a str },
    /// A `res` body, called with the fetched document.
    Response { url: &'a str, body: &'a str, base: &'a str, groups: &'a [String] },
}

pub struct ScriptCall<'a> {
    pub rule: &'a str,
    pub input: ScriptInput<'a>,
    pub page: &'a dyn Page,
    /// The hovered element the rule is being evaluated for.
    pub element: Option<ElementId>,
}

/// A compiled script body. Runtime failures are reported as `Err(message)`.
pub type ScriptFn = Arc<dyn Fn(&ScriptCall<'_>) -> Result<Value, String> + Send + Sync>;

/// Compiles `:`-prefixed rule bodies.
pub trait ScriptEngine {
    fn compile(&self, rule: &str, field: RuleField, body: &str) -> Result<ScriptFn, RuleCompileError>;
}

/// Script engine backed by native functions registered by name.
///
/// A body such as `":\nimgur_album"` compiles to the function registered as
/// `imgur_album`.
#[derive(Clone, Default)]
pub struct NativeScripts {
    registry: HashMap<String, ScriptFn>,
}

impl NativeScripts {
    pub fn new() -> Self {
        NativeScripts::default()
    }

    pub fn register<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&ScriptCall<'_>) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.registry.insert(name.to_string(), Arc::new(f));
        self
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}

impl fmt::Debug for NativeScripts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.registry.keys().collect();
        names.sort();
        f.debug_struct("NativeScripts").field("registry", &names).finish()
    }
}

impl ScriptEngine for NativeScripts {
    fn compile(&self, rule: &str, field: RuleField, body: &str) -> Result<ScriptFn, RuleCompileError> {
        let name = body.strip_prefix(':').unwrap_or(body).trim();
        if name.is_empty() {
            return Err(RuleCompileError { rule: rule.to_string(), field, reason: "empty script body".to_string() });
        }
        self.registry.get(name).cloned().ok_or_else(|| RuleCompileError {
            rule: rule.to_string(),
            field,
            reason: format!("unknown script `{name}`"),
        })
    }
}

/// String conversion applied to script results used as URLs.
pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Array(items) => items.iter().map(value_to_text).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

/// `true` for `:`-prefixed bodies. Bodies starting with `:\n` are the usual form.
pub(crate) fn is_script(body: &str) -> bool {
    body.strip_prefix(':').is_some_and(|rest| !rest.trim().is_empty())
}
