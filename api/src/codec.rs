// Helpers for the value encodings used by the device REST interface. Decimal attributes travel
// as 16.16 fixed point integers, and 'extra' pages are plain JSON arrays of numbers or strings.
use crate::error::{Result, YoctoError};
use serde_json::Value;

/// Converts a 16.16 fixed point attribute to a decimal, keeping three decimals (half up).
pub fn decode_fixed(raw: f64) -> f64 {
    (raw * 1000.0 / 65536.0 + 0.5).floor() / 1000.0
}

/// Converts a decimal to the 16.16 fixed point form expected by attribute writes.
pub fn encode_fixed(value: f64) -> String {
    format!("{}", (value * 65536.0 + 0.5).floor() as i64)
}

/// Scales a value to thousandths, rounding half up, as used by table commands.
pub fn milli(value: f64) -> i64 {
    (1000.0 * value + 0.5).floor() as i64
}

pub fn json_array(body: &[u8]) -> Result<Vec<Value>> {
    match serde_json::from_slice::<Value>(body)? {
        Value::Array(items) => Ok(items),
        other => Err(YoctoError::UnexpectedValue {
            attribute: String::from("array"),
            value: other.to_string(),
        }),
    }
}

/// Reads a number which may have been sent either as a JSON number or as a string.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Turns a raw attribute written as text back into the JSON form the device would report.
pub fn attribute_from_text(text: &str) -> Value {
    if let Ok(integer) = text.parse::<i64>() {
        return Value::from(integer);
    }
    Value::from(text)
}
