//! Session values.
//!
//! A session record maps string keys onto [`Value`]s. The enum is tagged so
//! the default JSON codec round-trips every variant exactly: an `I64` written
//! into a record comes back as an `I64` after a store round-trip, never as a
//! float or a string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single value held in a session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
pub enum Value {
    String(String),
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Bytes(Vec<u8>),
    Time(DateTime<Utc>),
}

impl Value {
    /// Borrow the inner string, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// Consume the value, returning the inner string if this is a `String`.
    pub fn into_string(self) -> Option<String> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Consume the value, returning the inner bytes if this is a `Bytes`.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::I32(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::I64(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::F64(x)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Time(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_round_trip_preserves_variant() {
        let values = vec![
            Value::from("hello"),
            Value::from(true),
            Value::from(7_i32),
            Value::from(7_i64),
            Value::from(2.5_f64),
            Value::from(vec![0_u8, 159, 146, 150]),
            Value::from(Utc::now()),
        ];

        for value in values {
            let json = serde_json::to_vec(&value).unwrap();
            let back: Value = serde_json::from_slice(&json).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn integer_widths_stay_distinct() {
        let json = serde_json::to_vec(&Value::I32(7)).unwrap();
        let back: Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, Value::I32(7));
        assert_ne!(back, Value::I64(7));
    }

    #[test]
    fn strict_accessors_reject_other_variants() {
        let v = Value::from("text");
        assert_eq!(v.as_str(), Some("text"));
        assert_eq!(v.as_bool(), None);
        assert_eq!(v.as_i64(), None);

        let n = Value::from(42_i64);
        assert_eq!(n.as_i64(), Some(42));
        assert_eq!(n.as_i32(), None);
        assert_eq!(n.as_str(), None);
    }
}
