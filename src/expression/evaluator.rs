//! Boolean expression evaluation: `${name}` substitution, comparison
//! operators, and the additive `&&`/`||` logical combinators (SPEC_FULL §4.2).

use serde_json::Value;

use crate::error::RuntimeError;

use super::context::EvaluationContext;
use super::resolver::VariableResolver;

/// Evaluates boolean expressions against an [`EvaluationContext`].
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    /// Evaluate a boolean expression, per spec §4.2.
    pub fn evaluate_string(expr: &str, ctx: &EvaluationContext) -> Result<bool, RuntimeError> {
        evaluate(expr.trim(), ctx)
    }
}

fn evaluate(expr: &str, ctx: &EvaluationContext) -> Result<bool, RuntimeError> {
    if let Some((left, right)) = split_top_level(expr, " || ") {
        return Ok(evaluate(left, ctx)? || evaluate(right, ctx)?);
    }
    if let Some((left, right)) = split_top_level(expr, " && ") {
        return Ok(evaluate(left, ctx)? && evaluate(right, ctx)?);
    }
    evaluate_comparison_or_literal(expr, ctx)
}

/// Split on the first top-level occurrence of `sep`, skipping over anything
/// inside single/double quotes so literal strings can contain `&&`/`||`.
fn split_top_level<'a>(expr: &'a str, sep: &str) -> Option<(&'a str, &'a str)> {
    let bytes = expr.as_bytes();
    let mut in_quote: Option<u8> = None;
    let mut i = 0;
    while i + sep.len() <= bytes.len() {
        let b = bytes[i];
        match in_quote {
            Some(q) if b == q => in_quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => in_quote = Some(b),
            None if expr[i..].starts_with(sep) => {
                return Some((&expr[..i], &expr[i + sep.len()..]));
            }
            None => {}
        }
        i += 1;
    }
    None
}

const OPERATORS: [&str; 6] = [">=", "<=", "==", "!=", ">", "<"];

fn evaluate_comparison_or_literal(expr: &str, ctx: &EvaluationContext) -> Result<bool, RuntimeError> {
    for op in OPERATORS {
        if let Some(idx) = find_operator(expr, op) {
            let left = resolve_operand(expr[..idx].trim(), ctx);
            let right = resolve_operand(expr[idx + op.len()..].trim(), ctx);
            return compare(&left, op, &right);
        }
    }

    // No comparison operator: a literal boolean or a bare `${flag}`.
    match expr {
        "true" => return Ok(true),
        "false" => return Ok(false),
        _ => {}
    }

    if is_placeholder(expr) {
        let path = &expr[2..expr.len() - 1];
        return Ok(match VariableResolver::resolve_value(path, ctx) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            _ => false,
        });
    }

    Err(RuntimeError::execution(format!(
        "cannot parse expression: {expr}"
    )))
}

fn is_placeholder(expr: &str) -> bool {
    expr.starts_with("${") && expr.ends_with('}')
}

fn find_operator(expr: &str, op: &str) -> Option<usize> {
    // `==`/`!=`/`>=`/`<=` must not match inside an already-consumed
    // two-character operator; scanning left-to-right and checking
    // longer operators first (OPERATORS order) avoids ">" matching
    // inside ">=".
    expr.find(op)
}

/// Typed operand for comparison: numbers compare numerically, everything
/// else compares lexicographically (spec §4.2: "comparisons against empty
/// strings follow lexicographic order").
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Number(f64),
    Bool(bool),
    Str(String),
}

fn resolve_operand(token: &str, ctx: &EvaluationContext) -> Operand {
    if is_placeholder(token) {
        let path = &token[2..token.len() - 1];
        return match VariableResolver::resolve_value(path, ctx) {
            Some(Value::Number(n)) => Operand::Number(n.as_f64().unwrap_or(0.0)),
            Some(Value::Bool(b)) => Operand::Bool(*b),
            Some(Value::String(s)) => Operand::Str(s.clone()),
            Some(other) => Operand::Str(other.to_string()),
            None => Operand::Str(String::new()),
        };
    }
    parse_literal(token)
}

fn parse_literal(token: &str) -> Operand {
    if let Ok(n) = token.parse::<f64>() {
        return Operand::Number(n);
    }
    match token {
        "true" => return Operand::Bool(true),
        "false" => return Operand::Bool(false),
        _ => {}
    }
    if (token.starts_with('"') && token.ends_with('"') && token.len() >= 2)
        || (token.starts_with('\'') && token.ends_with('\'') && token.len() >= 2)
    {
        return Operand::Str(token[1..token.len() - 1].to_string());
    }
    Operand::Str(token.to_string())
}

fn compare(left: &Operand, op: &str, right: &Operand) -> Result<bool, RuntimeError> {
    match (left, right) {
        (Operand::Number(l), Operand::Number(r)) => Ok(match op {
            "==" => (l - r).abs() < f64::EPSILON,
            "!=" => (l - r).abs() >= f64::EPSILON,
            ">" => l > r,
            "<" => l < r,
            ">=" => l >= r,
            "<=" => l <= r,
            _ => unreachable!("operator set is exhaustive"),
        }),
        (Operand::Bool(l), Operand::Bool(r)) => match op {
            "==" => Ok(l == r),
            "!=" => Ok(l != r),
            _ => Err(RuntimeError::execution(format!(
                "operator {op} is not defined for booleans"
            ))),
        },
        _ => {
            let l = operand_to_string(left);
            let r = operand_to_string(right);
            Ok(match op {
                "==" => l == r,
                "!=" => l != r,
                ">" => l > r,
                "<" => l < r,
                ">=" => l >= r,
                "<=" => l <= r,
                _ => unreachable!("operator set is exhaustive"),
            })
        }
    }
}

fn operand_to_string(value: &Operand) -> String {
    match value {
        Operand::Number(n) => n.to_string(),
        Operand::Bool(b) => b.to_string(),
        Operand::Str(s) => s.clone(),
    }
}
