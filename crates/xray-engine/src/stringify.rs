//! Value-to-string collaborator for trace events.
//!
//! [`stringify`] never fails: values beyond the nesting cap degrade to a
//! placeholder instead of aborting tracing. Strings render quoted and
//! escaped so `"1"` (a string) and `1` (an integer) stay distinguishable
//! in a trace.

use crate::interpreter::Value;

/// Nesting depth beyond which list contents degrade to a placeholder.
const MAX_DEPTH: usize = 8;

/// Placeholder used when a value cannot be rendered in full.
pub const PLACEHOLDER: &str = "<...>";

/// Renders a runtime value as display text for a trace event.
pub fn stringify(value: &Value) -> String {
    render(value, 0)
}

fn render(value: &Value, depth: usize) -> String {
    if depth > MAX_DEPTH {
        return PLACEHOLDER.to_string();
    }
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(v) => v.to_string(),
        Value::Float(v) => format!("{:?}", v),
        Value::Str(s) => format!("{:?}", s),
        Value::List(items) => {
            let inner: Vec<String> = items.iter().map(|v| render(v, depth + 1)).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Generator(g) => format!("<generator {}>", g.function),
        Value::Deferred(d) => format!("<deferred {}>", d.function),
    }
}
