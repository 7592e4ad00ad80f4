//! Loosely typed command parameters.
//!
//! Requests carry a JSON object of parameters. Values stay tagged until a
//! command decodes them into its typed form, at which point numbers are
//! coerced to integers and range-checked.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CommandError, Result};

/// A single parameter value as received on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Arrays and objects. Never coerces to a number or string.
    Other(serde_json::Value),
}

impl ParamValue {
    /// Integer coercion: bools map to 0/1, floats truncate toward zero,
    /// strings must hold a decimal integer (surrounding whitespace allowed).
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Self::Float(_) => None,
            Self::Text(s) => s.trim().parse().ok(),
            Self::Other(_) => None,
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u8> for ParamValue {
    fn from(v: u8) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Parameter mapping for one command invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Look up a value; JSON `null` counts as absent.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name).filter(|v| !matches!(v, ParamValue::Null))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Integer value of `name`, or `default` when absent.
    pub fn int_or(&self, name: &str, default: i64) -> Result<i64> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value.as_int().ok_or_else(|| {
                CommandError::validation(format!("'{}' must be an integer, got {:?}", name, value))
            }),
        }
    }

    /// Byte value of `name` (0-255), or 0 when absent.
    pub fn byte(&self, name: &str) -> Result<u8> {
        to_byte(name, self.int_or(name, 0)?)
    }

    /// Integer value of `name`; absence is a validation error.
    pub fn require_int(&self, name: &str) -> Result<i64> {
        if self.get(name).is_none() {
            return Err(CommandError::validation(format!("'{}' is required", name)));
        }
        self.int_or(name, 0)
    }

    /// Non-empty string value of `name`.
    pub fn require_text(&self, name: &str) -> Result<&str> {
        match self.get(name) {
            Some(ParamValue::Text(s)) if !s.is_empty() => Ok(s.as_str()),
            Some(ParamValue::Text(_)) | None => {
                Err(CommandError::validation(format!("'{}' is required", name)))
            }
            Some(other) => Err(CommandError::validation(format!(
                "'{}' must be a string, got {:?}",
                name, other
            ))),
        }
    }

    /// Bytes decoded from the hex string in `name`. Whitespace between digits is ignored.
    pub fn hex_bytes(&self, name: &str) -> Result<Vec<u8>> {
        let raw = self.require_text(name)?;
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(CommandError::validation(format!("'{}' is required", name)));
        }
        hex::decode(&compact).map_err(|e| {
            CommandError::validation(format!("'{}' must be valid hex ({}): {}", name, raw, e))
        })
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Range-check an integer into a byte.
pub fn to_byte(name: &str, value: i64) -> Result<u8> {
    u8::try_from(value).map_err(|_| {
        CommandError::validation(format!("'{}' must be between 0 and 255, got {}", name, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_coercion() {
        assert_eq!(ParamValue::Int(7).as_int(), Some(7));
        assert_eq!(ParamValue::Float(3.9).as_int(), Some(3));
        assert_eq!(ParamValue::Float(-3.9).as_int(), Some(-3));
        assert_eq!(ParamValue::Bool(true).as_int(), Some(1));
        assert_eq!(ParamValue::Text(" 42 ".into()).as_int(), Some(42));
        assert_eq!(ParamValue::Text("4.2".into()).as_int(), None);
        assert_eq!(ParamValue::Text("red".into()).as_int(), None);
    }

    #[test]
    fn test_deserialize_from_json() {
        let params: Params =
            serde_json::from_str(r#"{"red": 255, "name": "x", "f": 1.5, "b": false, "n": null}"#)
                .unwrap();
        assert_eq!(params.get("red"), Some(&ParamValue::Int(255)));
        assert_eq!(params.get("f"), Some(&ParamValue::Float(1.5)));
        assert_eq!(params.get("b"), Some(&ParamValue::Bool(false)));
        assert_eq!(params.get("n"), None);
        assert_eq!(params.int_or("n", -1).unwrap(), -1);
    }

    #[test]
    fn test_nested_values_fail_coercion() {
        let params: Params =
            serde_json::from_str(r#"{"red": [1], "cmd": {"hex": "14"}, "blue": 3}"#).unwrap();
        assert!(matches!(params.get("red"), Some(ParamValue::Other(_))));
        assert!(matches!(params.byte("red"), Err(CommandError::Validation(_))));
        assert!(matches!(params.hex_bytes("cmd"), Err(CommandError::Validation(_))));
        assert_eq!(params.byte("blue").unwrap(), 3);
    }

    #[test]
    fn test_byte_range() {
        let params = Params::new().with("red", 256).with("green", -1).with("blue", "12");
        assert!(params.byte("red").is_err());
        assert!(params.byte("green").is_err());
        assert_eq!(params.byte("blue").unwrap(), 12);
        assert_eq!(params.byte("missing").unwrap(), 0);
    }

    #[test]
    fn test_hex_bytes() {
        let params = Params::new().with("cmd", "14 ff 00 0a").with("bad", "zz").with("empty", "");
        assert_eq!(params.hex_bytes("cmd").unwrap(), vec![0x14, 0xFF, 0x00, 0x0A]);
        assert!(params.hex_bytes("bad").is_err());
        assert!(params.hex_bytes("empty").is_err());
        assert!(params.hex_bytes("missing").is_err());
    }
}
