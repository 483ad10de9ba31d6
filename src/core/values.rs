use crate::utils::{format_grouped, format_ticks};
use serde_json::Value;

/// Turns any scalar read from a storage dump into an integer.
///
/// Integers are taken as-is, floats (or strings holding one) are truncated
/// toward zero, everything else is `0`.
pub fn coerce_value(raw: &Value) -> i64 {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(truncate))
            .unwrap_or_default(),
        Value::String(s) => coerce_str(s),
        Value::Bool(b) => *b as i64,
        Value::Null | Value::Array(_) | Value::Object(_) => 0,
    }
}

fn coerce_str(s: &str) -> i64 {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().map(truncate))
        .unwrap_or_default()
}

fn truncate(f: f64) -> i64 {
    match f.is_finite() {
        // `as` saturates at the i64 bounds
        true => f.trunc() as i64,
        false => 0,
    }
}

/// Display string of a coerced value, pure in `(value, is_duration)`.
pub fn format_value(value: i64, is_duration: bool) -> String {
    match is_duration {
        true => format_ticks(value),
        false => format_grouped(value),
    }
}
