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

//! Type system definitions for expression nodes

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of value types an expression node can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Boolean value (true/false)
    Boolean,
    /// Integer or floating point number
    Numeric,
    /// String value
    String,
    /// Raw byte array
    ByteArray,
}

impl ValueType {
    /// All value types, in the order used when a preference is needed
    pub const ALL: [ValueType; 4] = [
        ValueType::Numeric,
        ValueType::Boolean,
        ValueType::String,
        ValueType::ByteArray,
    ];
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Boolean => write!(f, "Boolean"),
            ValueType::Numeric => write!(f, "Numeric"),
            ValueType::String => write!(f, "String"),
            ValueType::ByteArray => write!(f, "ByteArray"),
        }
    }
}

/// Refinement of a numeric type: not yet known, integer or floating point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NumericKind {
    /// Either integer or float is acceptable
    #[default]
    Unknown,
    /// 64-bit signed integer
    Integer,
    /// 64-bit float
    Float,
}

impl NumericKind {
    /// Kind of an arithmetic result over two operands of these kinds
    pub fn promote(self, other: NumericKind) -> NumericKind {
        match (self, other) {
            (NumericKind::Float, _) | (_, NumericKind::Float) => NumericKind::Float,
            (NumericKind::Integer, NumericKind::Integer) => NumericKind::Integer,
            _ => NumericKind::Unknown,
        }
    }
}

bitflags! {
    /// Bit-set of value types a node may still resolve to while its type is narrowed
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SupportedValueTypes: u8 {
        /// Boolean values
        const BOOLEAN = 0b0001;
        /// Numeric values
        const NUMERIC = 0b0010;
        /// String values
        const STRING = 0b0100;
        /// Byte array values
        const BYTE_ARRAY = 0b1000;
    }
}

impl SupportedValueTypes {
    /// Whether the given value type is a member of this set
    pub fn supports(self, value_type: ValueType) -> bool {
        self.contains(SupportedValueTypes::from(value_type))
    }

    /// The type to settle on when a choice is forced
    pub fn preferred(self) -> Option<ValueType> {
        ValueType::ALL.into_iter().find(|t| self.supports(*t))
    }

    /// The only member of the set, if there is exactly one
    pub fn single(self) -> Option<ValueType> {
        if self.bits().count_ones() == 1 {
            self.preferred()
        } else {
            None
        }
    }
}

impl From<ValueType> for SupportedValueTypes {
    fn from(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Boolean => SupportedValueTypes::BOOLEAN,
            ValueType::Numeric => SupportedValueTypes::NUMERIC,
            ValueType::String => SupportedValueTypes::STRING,
            ValueType::ByteArray => SupportedValueTypes::BYTE_ARRAY,
        }
    }
}

/// A fully determined node type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeInfo {
    /// The value type
    pub value_type: ValueType,
    /// Numeric refinement; always `Unknown` for non-numeric types
    pub numeric: NumericKind,
}

impl TypeInfo {
    /// Boolean type
    pub const BOOLEAN: TypeInfo = TypeInfo::of(ValueType::Boolean);
    /// String type
    pub const STRING: TypeInfo = TypeInfo::of(ValueType::String);
    /// Byte array type
    pub const BYTE_ARRAY: TypeInfo = TypeInfo::of(ValueType::ByteArray);
    /// Numeric type of unknown refinement
    pub const NUMERIC: TypeInfo = TypeInfo::numeric(NumericKind::Unknown);
    /// Integer numeric type
    pub const INTEGER: TypeInfo = TypeInfo::numeric(NumericKind::Integer);
    /// Floating point numeric type
    pub const FLOAT: TypeInfo = TypeInfo::numeric(NumericKind::Float);

    /// Type info for a value type with no numeric refinement
    pub const fn of(value_type: ValueType) -> Self {
        Self {
            value_type,
            numeric: NumericKind::Unknown,
        }
    }

    /// Numeric type info with the given refinement
    pub const fn numeric(kind: NumericKind) -> Self {
        Self {
            value_type: ValueType::Numeric,
            numeric: kind,
        }
    }

    /// Whether this is a numeric type
    pub fn is_numeric(&self) -> bool {
        self.value_type == ValueType::Numeric
    }

    /// Whether this is known to be an integer
    pub fn is_integer(&self) -> bool {
        self.is_numeric() && self.numeric == NumericKind::Integer
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.value_type, self.numeric) {
            (ValueType::Numeric, NumericKind::Integer) => write!(f, "Numeric(Integer)"),
            (ValueType::Numeric, NumericKind::Float) => write!(f, "Numeric(Float)"),
            (value_type, _) => write!(f, "{value_type}"),
        }
    }
}
