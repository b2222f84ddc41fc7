use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar cell value as it appears in a JSON/CSV-shaped dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric reading of the cell. Text is accepted when it parses as a
    /// finite number, since CSV-sourced datasets carry numbers as strings.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(value) => Some(*value as f64),
            Value::Float(value) if value.is_finite() => Some(*value),
            Value::Text(text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite()),
            _ => None,
        }
    }

    /// UTF-8 text that gets encrypted or hashed for this cell; `None` for null.
    pub fn plaintext(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Integer(value) => write!(f, "{value}"),
            Value::Float(value) => f.write_str(&format_number(*value)),
            Value::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Renders whole floats without a fractional part (`25.0` -> `25`).
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_json_scalars() {
        let values: Vec<Value> = serde_json::from_str(r#"[null, true, 7, 2.5, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Bool(true),
                Value::Integer(7),
                Value::Float(2.5),
                Value::text("x"),
            ]
        );
    }

    #[test]
    fn numeric_text_is_a_number() {
        assert_eq!(Value::text(" 42.5 ").as_number(), Some(42.5));
        assert_eq!(Value::text("4a").as_number(), None);
        assert_eq!(Value::text("NaN").as_number(), None);
        assert_eq!(Value::Bool(true).as_number(), None);
        assert_eq!(Value::Null.as_number(), None);
    }

    #[test]
    fn plaintext_skips_null() {
        assert_eq!(Value::Null.plaintext(), None);
        assert_eq!(Value::Integer(3).plaintext().as_deref(), Some("3"));
        assert_eq!(Value::Float(3.0).plaintext().as_deref(), Some("3"));
        assert_eq!(Value::text("a b").plaintext().as_deref(), Some("a b"));
    }

    #[test]
    fn formats_numbers_compactly() {
        assert_eq!(format_number(25.0), "25");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(2.75), "2.75");
    }
}
