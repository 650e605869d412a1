//! Guard evaluation for task `when` clauses.
//!
//! This is a truthiness lookup, not an expression language: each expression
//! is either the name of a bound variable or the literal `true`. All
//! expressions of a guard must hold.

use serde_json::Value;

use crate::parser::When;
use crate::vars::Vars;

/// Evaluate a task guard against one host's bindings.
///
/// An empty guard is true. Evaluation stops at the first falsy expression.
pub fn evaluate_when(when: &When, vars: &Vars) -> bool {
    when.expressions()
        .iter()
        .all(|expr| evaluate_expression(expr, vars))
}

/// Evaluate a single guard expression.
pub fn evaluate_expression(expr: &str, vars: &Vars) -> bool {
    let expr = expr.trim();
    if expr.is_empty() {
        return true;
    }
    match vars.get(expr) {
        Some(value) => is_truthy(value),
        None => expr == "true",
    }
}

/// Truthiness of a bound value.
///
/// Strings are false only for `""`, `"false"` and `"0"` (so `"no"` is true),
/// numbers only at zero, and mappings or sequences only when null.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::String(s) => !matches!(s.as_str(), "" | "false" | "0"),
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    }
}
