//! `{{path}}` rendering and `when` conditions against the execution context.

use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::LazyLock;

use crate::context::WorkflowContext;

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").unwrap());

/// Resolve a dotted path. `task` and `task.*` read the current task.
pub fn resolve(ctx: &WorkflowContext, path: &str) -> Option<Value> {
    let mut segments = path.splitn(2, '.');
    if segments.next() == Some("task") {
        let task = serde_json::to_value(ctx.current_task()?).ok()?;
        return match segments.next() {
            None => Some(task),
            Some(rest) => rest
                .split('.')
                .try_fold(&task, |value, key| value.get(key))
                .cloned(),
        };
    }
    ctx.lookup_path(path).cloned()
}

/// Substitute every `{{path}}`. Strings are inserted verbatim, other values as
/// pretty JSON, unresolved paths as the empty string.
pub fn render(template: &str, ctx: &WorkflowContext) -> String {
    PLACEHOLDER_REGEX
        .replace_all(template, |caps: &Captures| match resolve(ctx, &caps[1]) {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => String::new(),
            Some(other) => serde_json::to_string_pretty(&other).unwrap_or_default(),
        })
        .into_owned()
}

/// JSON truthiness: null, false, 0, "" and empty collections are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Evaluate a `when` expression: a dotted path, optionally prefixed by `!`.
pub fn evaluate_condition(expr: &str, ctx: &WorkflowContext) -> bool {
    let expr = expr.trim();
    let (negate, path) = match expr.strip_prefix('!') {
        Some(rest) => (true, rest.trim()),
        None => (false, expr),
    };
    let truthy = resolve(ctx, path).as_ref().is_some_and(is_truthy);
    truthy != negate
}
