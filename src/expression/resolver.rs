//! `${name}` variable substitution inside arbitrary strings.

use serde_json::Value;

use super::context::EvaluationContext;

/// Performs `${name}` expansion inside arbitrary strings.
///
/// Missing variables resolve to empty strings, per spec §4.2.
pub struct VariableResolver;

impl VariableResolver {
    /// Replace every `${...}` placeholder in `input` with its resolved
    /// string form.
    #[must_use]
    pub fn resolve_string(input: &str, ctx: &EvaluationContext) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after_open = &rest[start + 2..];
            match after_open.find('}') {
                Some(end) => {
                    let path = &after_open[..end];
                    out.push_str(&value_to_string(resolve_raw(path, ctx)));
                    rest = &after_open[end + 1..];
                }
                None => {
                    // Unterminated placeholder: emit the rest verbatim.
                    out.push_str(&rest[start..]);
                    rest = "";
                    break;
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Resolve a single `${name}` (or bare `name`) reference to its raw
    /// JSON value, without stringifying. Returns `None` if the path is
    /// absent from the context.
    #[must_use]
    pub fn resolve_value<'a>(path: &str, ctx: &'a EvaluationContext) -> Option<&'a Value> {
        ctx.resolve_path(path)
    }

    /// Walk a JSON value, applying [`VariableResolver::resolve_string`] to
    /// every string leaf. Used by leaf executors (HTTP/DB/MQ) to expand
    /// `${...}` placeholders across an entire config sub-tree before it
    /// reaches an adapter.
    #[must_use]
    pub fn resolve_json(value: &Value, ctx: &EvaluationContext) -> Value {
        match value {
            Value::String(s) => Value::String(Self::resolve_string(s, ctx)),
            Value::Array(items) => Value::Array(items.iter().map(|v| Self::resolve_json(v, ctx)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::resolve_json(v, ctx)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

fn resolve_raw<'a>(path: &str, ctx: &'a EvaluationContext) -> Option<&'a Value> {
    ctx.resolve_path(path)
}

fn value_to_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}
