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

//! Logical and bitwise operators
//!
//! `&`, `|`, `#` and `!` are logical on booleans and bitwise on integers and
//! byte arrays. Shifts apply to integers and to byte arrays as a whole.

use super::{AND, OR, SHIFT, XOR, integer_result, operand_names};
use crate::definition::MathDefinition;
use crate::error::{EvaluationError, EvaluationResult};
use crate::model::{SupportedValueTypes, Tolerance, TypeInfo, Value, ValueType};
use crate::registry::operator::{BinaryOperator, OperatorRegistry, UnaryOperator};

const LOGICAL_PREFERENCE: [ValueType; 3] =
    [ValueType::Boolean, ValueType::Numeric, ValueType::ByteArray];

const SHIFT_PREFERENCE: [ValueType; 2] = [ValueType::Numeric, ValueType::ByteArray];

/// Register the logical and bitwise operators under the definition's tokens
pub fn register_logical_operators(registry: &mut OperatorRegistry, definition: &MathDefinition) {
    registry.register_binary(BitwiseOperator::new(&definition.and, BitwiseKind::And));
    registry.register_binary(BitwiseOperator::new(&definition.or, BitwiseKind::Or));
    registry.register_binary(BitwiseOperator::new(&definition.xor, BitwiseKind::Xor));
    registry.register_binary(ShiftOperator::new(&definition.left_shift, ShiftDirection::Left));
    registry.register_binary(ShiftOperator::new(&definition.right_shift, ShiftDirection::Right));
    registry.register_unary(NotOperator::new(&definition.not));
}

/// Which combination a [`BitwiseOperator`] applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitwiseKind {
    /// Conjunction
    And,
    /// Disjunction
    Or,
    /// Exclusive or
    Xor,
}

impl BitwiseKind {
    fn apply_bool(self, l: bool, r: bool) -> bool {
        match self {
            BitwiseKind::And => l & r,
            BitwiseKind::Or => l | r,
            BitwiseKind::Xor => l ^ r,
        }
    }

    fn apply_int(self, l: i64, r: i64) -> i64 {
        match self {
            BitwiseKind::And => l & r,
            BitwiseKind::Or => l | r,
            BitwiseKind::Xor => l ^ r,
        }
    }

    fn apply_byte(self, l: u8, r: u8) -> u8 {
        match self {
            BitwiseKind::And => l & r,
            BitwiseKind::Or => l | r,
            BitwiseKind::Xor => l ^ r,
        }
    }
}

/// Logical/bitwise and (&), or (|) and xor (#)
pub struct BitwiseOperator {
    symbol: String,
    kind: BitwiseKind,
}

impl BitwiseOperator {
    /// Create the operator for a combination
    pub fn new(symbol: impl Into<String>, kind: BitwiseKind) -> Self {
        Self {
            symbol: symbol.into(),
            kind,
        }
    }
}

impl BinaryOperator for BitwiseOperator {
    fn symbol(&self) -> &str {
        &self.symbol
    }
    fn human_friendly_name(&self) -> &str {
        match self.kind {
            BitwiseKind::And => "And",
            BitwiseKind::Or => "Or",
            BitwiseKind::Xor => "Exclusive Or",
        }
    }
    fn precedence(&self) -> u8 {
        match self.kind {
            BitwiseKind::And => AND,
            BitwiseKind::Or => OR,
            BitwiseKind::Xor => XOR,
        }
    }
    fn operand_types(&self) -> SupportedValueTypes {
        SupportedValueTypes::BOOLEAN | SupportedValueTypes::NUMERIC | SupportedValueTypes::BYTE_ARRAY
    }
    fn preferred_types(&self) -> &[ValueType] {
        &LOGICAL_PREFERENCE
    }
    fn integer_operands(&self) -> bool {
        true
    }

    fn result_type(&self, left: TypeInfo, right: TypeInfo) -> Option<TypeInfo> {
        match (left.value_type, right.value_type) {
            (ValueType::Boolean, ValueType::Boolean) => Some(TypeInfo::BOOLEAN),
            (ValueType::Numeric, ValueType::Numeric) => integer_result(left, right),
            (ValueType::ByteArray, ValueType::ByteArray) => Some(TypeInfo::BYTE_ARRAY),
            _ => None,
        }
    }

    fn evaluate(
        &self,
        left: &Value,
        right: &Value,
        _tolerance: Option<&Tolerance>,
    ) -> EvaluationResult<Value> {
        match (left, right) {
            (Value::Boolean(l), Value::Boolean(r)) => Ok(Value::Boolean(self.kind.apply_bool(*l, *r))),
            (Value::Integer(l), Value::Integer(r)) => Ok(Value::Integer(self.kind.apply_int(*l, *r))),
            (Value::ByteArray(l), Value::ByteArray(r)) if l.len() == r.len() => Ok(Value::from(
                l.iter()
                    .zip(r.iter())
                    .map(|(l, r)| self.kind.apply_byte(*l, *r))
                    .collect::<Vec<u8>>(),
            )),
            (Value::ByteArray(l), Value::ByteArray(r)) => Err(EvaluationError::invalid_operands(
                &self.symbol,
                format!("byte arrays of length {} and {}", l.len(), r.len()),
            )),
            _ => Err(EvaluationError::invalid_operands(
                &self.symbol,
                operand_names(left, right),
            )),
        }
    }
}

/// Direction of a [`ShiftOperator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftDirection {
    /// Towards the most significant bit
    Left,
    /// Towards the least significant bit
    Right,
}

/// Bit shifts (<< and >>)
///
/// Integers shift arithmetically; a negative amount shifts the other way and
/// shifting by 64 or more yields zero (or -1 for a negative value shifted
/// right). Byte arrays keep their length and shift in zero bits.
pub struct ShiftOperator {
    symbol: String,
    direction: ShiftDirection,
}

impl ShiftOperator {
    /// Create the operator for a direction
    pub fn new(symbol: impl Into<String>, direction: ShiftDirection) -> Self {
        Self {
            symbol: symbol.into(),
            direction,
        }
    }

    fn shift_integer(value: i64, amount: i64, direction: ShiftDirection) -> i64 {
        let (direction, amount) = match (direction, amount < 0) {
            (ShiftDirection::Left, true) => (ShiftDirection::Right, amount.unsigned_abs()),
            (ShiftDirection::Right, true) => (ShiftDirection::Left, amount.unsigned_abs()),
            (direction, false) => (direction, amount.unsigned_abs()),
        };
        match direction {
            ShiftDirection::Left if amount >= 64 => 0,
            ShiftDirection::Left => value << amount,
            ShiftDirection::Right if amount >= 64 => value >> 63,
            ShiftDirection::Right => value >> amount,
        }
    }

    fn shift_bytes(bytes: &[u8], amount: i64, direction: ShiftDirection) -> Vec<u8> {
        let width = bytes.len() as u64 * 8;
        let (direction, amount) = match (direction, amount < 0) {
            (ShiftDirection::Left, true) => (ShiftDirection::Right, amount.unsigned_abs()),
            (ShiftDirection::Right, true) => (ShiftDirection::Left, amount.unsigned_abs()),
            (direction, false) => (direction, amount.unsigned_abs()),
        };
        if amount >= width {
            return vec![0; bytes.len()];
        }

        // Bit `i` counts from the most significant bit of the first byte
        let bit = |i: u64| -> u8 { (bytes[(i / 8) as usize] >> (7 - i % 8)) & 1 };
        let mut shifted = vec![0u8; bytes.len()];
        for i in 0..width {
            let source = match direction {
                ShiftDirection::Left => i.checked_add(amount).filter(|s| *s < width),
                ShiftDirection::Right => i.checked_sub(amount),
            };
            if let Some(source) = source {
                shifted[(i / 8) as usize] |= bit(source) << (7 - i % 8);
            }
        }
        shifted
    }
}

impl BinaryOperator for ShiftOperator {
    fn symbol(&self) -> &str {
        &self.symbol
    }
    fn human_friendly_name(&self) -> &str {
        match self.direction {
            ShiftDirection::Left => "Left Shift",
            ShiftDirection::Right => "Right Shift",
        }
    }
    fn precedence(&self) -> u8 {
        SHIFT
    }
    fn operand_types(&self) -> SupportedValueTypes {
        SupportedValueTypes::NUMERIC | SupportedValueTypes::BYTE_ARRAY
    }
    fn preferred_types(&self) -> &[ValueType] {
        &SHIFT_PREFERENCE
    }
    fn integer_operands(&self) -> bool {
        true
    }

    fn result_type(&self, left: TypeInfo, right: TypeInfo) -> Option<TypeInfo> {
        match left.value_type {
            ValueType::Numeric => integer_result(left, right),
            ValueType::ByteArray => integer_result(TypeInfo::INTEGER, right).map(|_| TypeInfo::BYTE_ARRAY),
            _ => None,
        }
    }

    fn evaluate(
        &self,
        left: &Value,
        right: &Value,
        _tolerance: Option<&Tolerance>,
    ) -> EvaluationResult<Value> {
        match (left, right) {
            (Value::Integer(value), Value::Integer(amount)) => Ok(Value::Integer(
                Self::shift_integer(*value, *amount, self.direction),
            )),
            (Value::ByteArray(bytes), Value::Integer(amount)) => Ok(Value::from(
                Self::shift_bytes(bytes, *amount, self.direction),
            )),
            _ => Err(EvaluationError::invalid_operands(
                &self.symbol,
                operand_names(left, right),
            )),
        }
    }
}

/// Logical/bitwise negation (unary !)
pub struct NotOperator {
    symbol: String,
}

impl NotOperator {
    /// Create the operator with the given token
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
        }
    }
}

impl UnaryOperator for NotOperator {
    fn symbol(&self) -> &str {
        &self.symbol
    }
    fn human_friendly_name(&self) -> &str {
        "Not"
    }
    fn operand_types(&self) -> SupportedValueTypes {
        SupportedValueTypes::BOOLEAN | SupportedValueTypes::NUMERIC | SupportedValueTypes::BYTE_ARRAY
    }
    fn preferred_types(&self) -> &[ValueType] {
        &LOGICAL_PREFERENCE
    }
    fn integer_operands(&self) -> bool {
        true
    }

    fn result_type(&self, operand: TypeInfo) -> Option<TypeInfo> {
        match operand.value_type {
            ValueType::Boolean => Some(TypeInfo::BOOLEAN),
            ValueType::Numeric => integer_result(operand, operand),
            ValueType::ByteArray => Some(TypeInfo::BYTE_ARRAY),
            ValueType::String => None,
        }
    }

    fn evaluate(&self, operand: &Value) -> EvaluationResult<Value> {
        match operand {
            Value::Boolean(b) => Ok(Value::Boolean(!b)),
            Value::Integer(i) => Ok(Value::Integer(!i)),
            Value::ByteArray(bytes) => Ok(Value::from(
                bytes.iter().map(|b| !b).collect::<Vec<u8>>(),
            )),
            other => Err(EvaluationError::invalid_operands(
                &self.symbol,
                other.type_name(),
            )),
        }
    }
}
