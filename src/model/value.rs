// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Core value types for expression evaluation

use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

use super::types::{NumericKind, TypeInfo, ValueType};

/// A runtime value produced or consumed by a compiled expression
///
/// String and byte array payloads are reference counted so that literal
/// constants can be shared between cloned node trees without copying.
#[derive(Clone, PartialEq)]
pub enum Value {
    /// Boolean value
    Boolean(bool),
    /// Integer value (64-bit signed)
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(Arc<str>),
    /// Byte array value
    ByteArray(Arc<[u8]>),
}

impl Value {
    /// Create a string value
    pub fn string(value: impl Into<Arc<str>>) -> Self {
        Value::String(value.into())
    }

    /// Create a byte array value
    pub fn bytes(value: impl Into<Arc<[u8]>>) -> Self {
        Value::ByteArray(value.into())
    }

    /// The value type of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Boolean(_) => ValueType::Boolean,
            Value::Integer(_) | Value::Float(_) => ValueType::Numeric,
            Value::String(_) => ValueType::String,
            Value::ByteArray(_) => ValueType::ByteArray,
        }
    }

    /// The fully refined type of this value
    pub fn type_info(&self) -> TypeInfo {
        match self {
            Value::Integer(_) => TypeInfo::numeric(NumericKind::Integer),
            Value::Float(_) => TypeInfo::numeric(NumericKind::Float),
            other => TypeInfo::of(other.value_type()),
        }
    }

    /// Human readable type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::ByteArray(_) => "ByteArray",
        }
    }

    /// Boolean payload
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer payload (floats are not truncated)
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric payload as a float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// String payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Byte array payload
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::ByteArray(b) => Some(b),
            _ => None,
        }
    }

    /// Whether this value can stand in for a parameter of the given type
    pub fn conforms_to(&self, type_info: &TypeInfo) -> bool {
        if self.value_type() != type_info.value_type {
            return false;
        }
        match (self, type_info.numeric) {
            (Value::Float(_), NumericKind::Integer) => false,
            _ => true,
        }
    }

    /// Convert to a JSON value
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Integer(i) => JsonValue::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::String(s) => JsonValue::String(s.to_string()),
            Value::ByteArray(_) => JsonValue::String(self.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "{s}"),
            Value::ByteArray(b) => write!(f, "0x{}", hex::encode_upper(b)),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "String({s:?})"),
            other => write!(f, "{}({other})", other.type_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Arc::from(value))
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::ByteArray(Arc::from(value))
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::ByteArray(Arc::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_types() {
        assert_eq!(Value::from(3).type_info(), TypeInfo::INTEGER);
        assert_eq!(Value::from(3.5).type_info(), TypeInfo::FLOAT);
        assert_eq!(Value::from("x").value_type(), ValueType::String);
        assert_eq!(Value::from(vec![1u8]).value_type(), ValueType::ByteArray);
    }

    #[test]
    fn test_conformance() {
        assert!(Value::from(3).conforms_to(&TypeInfo::FLOAT));
        assert!(!Value::from(3.0).conforms_to(&TypeInfo::INTEGER));
        assert!(Value::from(3.0).conforms_to(&TypeInfo::NUMERIC));
        assert!(!Value::from("3").conforms_to(&TypeInfo::NUMERIC));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from(vec![0x0Au8, 0xFF]).to_string(), "0x0AFF");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::from(true).to_string(), "true");
        assert_eq!(Value::from(7).to_json(), serde_json::json!(7));
    }
}
