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

//! Built-in operator implementations

mod arithmetic;
mod comparison;
mod conditional;
mod logical;

// Re-export all operators
pub use arithmetic::*;
pub use comparison::*;
pub use conditional::*;
pub use logical::*;

use crate::definition::MathDefinition;
use crate::error::{EvaluationError, EvaluationResult};
use crate::model::{NumericKind, TypeInfo, Value};
use crate::registry::operator::OperatorRegistry;

/// Precedence of `|`
pub const OR: u8 = 1;
/// Precedence of `#`
pub const XOR: u8 = 2;
/// Precedence of `&`
pub const AND: u8 = 3;
/// Precedence of `=` and `!=`
pub const EQUALITY: u8 = 4;
/// Precedence of `<`, `<=`, `>` and `>=`
pub const RELATIONAL: u8 = 5;
/// Precedence of `<<` and `>>`
pub const SHIFT: u8 = 6;
/// Precedence of `+` and `-`
pub const ADDITIVE: u8 = 7;
/// Precedence of `*`, `/` and `%`
pub const MULTIPLICATIVE: u8 = 8;
/// Precedence of `^`
pub const POWER: u8 = 9;

/// Register all built-in operators
pub fn register_builtin_operators(registry: &mut OperatorRegistry, definition: &MathDefinition) {
    // Arithmetic operators
    arithmetic::register_arithmetic_operators(registry, definition);

    // Comparison operators
    comparison::register_comparison_operators(registry, definition);

    // Logical and bitwise operators
    logical::register_logical_operators(registry, definition);

    // Conditional
    conditional::register_conditional_operators(registry, definition);
}

/// Two numeric operands brought to a common representation
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum NumericPair {
    Integers(i64, i64),
    Floats(f64, f64),
}

impl NumericPair {
    /// Pair up two numeric values; mixing an integer with a float promotes both
    pub(crate) fn of(symbol: &str, left: &Value, right: &Value) -> EvaluationResult<Self> {
        match (left, right) {
            (Value::Integer(l), Value::Integer(r)) => Ok(NumericPair::Integers(*l, *r)),
            (Value::Integer(l), Value::Float(r)) => Ok(NumericPair::Floats(*l as f64, *r)),
            (Value::Float(l), Value::Integer(r)) => Ok(NumericPair::Floats(*l, *r as f64)),
            (Value::Float(l), Value::Float(r)) => Ok(NumericPair::Floats(*l, *r)),
            _ => Err(EvaluationError::invalid_operands(
                symbol,
                operand_names(left, right),
            )),
        }
    }

    /// Both operands as floats
    pub(crate) fn as_floats(self) -> (f64, f64) {
        match self {
            NumericPair::Integers(l, r) => (l as f64, r as f64),
            NumericPair::Floats(l, r) => (l, r),
        }
    }
}

/// Description of an operand pair for error messages
pub(crate) fn operand_names(left: &Value, right: &Value) -> String {
    format!("{} and {}", left.type_name(), right.type_name())
}

/// Result type of an operation defined on integers only
pub(crate) fn integer_result(left: TypeInfo, right: TypeInfo) -> Option<TypeInfo> {
    let float = left.numeric == NumericKind::Float || right.numeric == NumericKind::Float;
    (left.is_numeric() && right.is_numeric() && !float).then_some(TypeInfo::INTEGER)
}
