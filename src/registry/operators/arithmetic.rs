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

//! Arithmetic operators

use super::{ADDITIVE, MULTIPLICATIVE, NumericPair, POWER};
use crate::definition::MathDefinition;
use crate::error::{EvaluationError, EvaluationResult};
use crate::model::{SupportedValueTypes, Tolerance, TypeInfo, Value, ValueType};
use crate::registry::operator::{Associativity, BinaryOperator, OperatorRegistry, UnaryOperator};

/// Register the arithmetic operators under the definition's tokens
pub fn register_arithmetic_operators(registry: &mut OperatorRegistry, definition: &MathDefinition) {
    registry.register_binary(AddOperator::new(&definition.add));
    registry.register_binary(SubtractOperator::new(&definition.subtract));
    registry.register_binary(MultiplyOperator::new(&definition.multiply));
    registry.register_binary(DivideOperator::new(&definition.divide));
    registry.register_binary(ModuloOperator::new(&definition.modulo));
    registry.register_binary(PowerOperator::new(&definition.power));
    registry.register_unary(NegateOperator::new(&definition.subtract));
}

const ADD_PREFERENCE: [ValueType; 4] = [
    ValueType::Numeric,
    ValueType::String,
    ValueType::ByteArray,
    ValueType::Boolean,
];

fn numeric_result(left: TypeInfo, right: TypeInfo) -> Option<TypeInfo> {
    if left.is_numeric() && right.is_numeric() {
        Some(TypeInfo::numeric(left.numeric.promote(right.numeric)))
    } else {
        None
    }
}

/// Addition (+) of numbers, concatenation of strings and byte arrays
pub struct AddOperator {
    symbol: String,
}

impl AddOperator {
    /// Create the operator with the given token
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
        }
    }
}

impl BinaryOperator for AddOperator {
    fn symbol(&self) -> &str {
        &self.symbol
    }
    fn human_friendly_name(&self) -> &str {
        "Addition"
    }
    fn precedence(&self) -> u8 {
        ADDITIVE
    }
    fn operand_types(&self) -> SupportedValueTypes {
        SupportedValueTypes::all()
    }
    fn preferred_types(&self) -> &[ValueType] {
        &ADD_PREFERENCE
    }

    fn result_type(&self, left: TypeInfo, right: TypeInfo) -> Option<TypeInfo> {
        use ValueType::*;
        match (left.value_type, right.value_type) {
            (Numeric, Numeric) => numeric_result(left, right),
            (String, String | Numeric | Boolean) | (Numeric | Boolean, String) => {
                Some(TypeInfo::STRING)
            }
            (ByteArray, ByteArray) => Some(TypeInfo::BYTE_ARRAY),
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
            (Value::String(_), _) | (_, Value::String(_)) => Ok(Value::from(format!("{left}{right}"))),
            (Value::ByteArray(l), Value::ByteArray(r)) => {
                let mut bytes = Vec::with_capacity(l.len() + r.len());
                bytes.extend_from_slice(l);
                bytes.extend_from_slice(r);
                Ok(Value::from(bytes))
            }
            _ => match NumericPair::of(&self.symbol, left, right)? {
                NumericPair::Integers(l, r) => l
                    .checked_add(r)
                    .map(Value::Integer)
                    .ok_or_else(|| EvaluationError::Overflow {
                        operator: self.symbol.clone(),
                    }),
                NumericPair::Floats(l, r) => Ok(Value::Float(l + r)),
            },
        }
    }
}

/// Subtraction (-)
pub struct SubtractOperator {
    symbol: String,
}

impl SubtractOperator {
    /// Create the operator with the given token
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
        }
    }
}

impl BinaryOperator for SubtractOperator {
    fn symbol(&self) -> &str {
        &self.symbol
    }
    fn human_friendly_name(&self) -> &str {
        "Subtraction"
    }
    fn precedence(&self) -> u8 {
        ADDITIVE
    }
    fn operand_types(&self) -> SupportedValueTypes {
        SupportedValueTypes::NUMERIC
    }
    fn result_type(&self, left: TypeInfo, right: TypeInfo) -> Option<TypeInfo> {
        numeric_result(left, right)
    }

    fn evaluate(
        &self,
        left: &Value,
        right: &Value,
        _tolerance: Option<&Tolerance>,
    ) -> EvaluationResult<Value> {
        match NumericPair::of(&self.symbol, left, right)? {
            NumericPair::Integers(l, r) => {
                l.checked_sub(r)
                    .map(Value::Integer)
                    .ok_or_else(|| EvaluationError::Overflow {
                        operator: self.symbol.clone(),
                    })
            }
            NumericPair::Floats(l, r) => Ok(Value::Float(l - r)),
        }
    }
}

/// Multiplication (*)
pub struct MultiplyOperator {
    symbol: String,
}

impl MultiplyOperator {
    /// Create the operator with the given token
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
        }
    }
}

impl BinaryOperator for MultiplyOperator {
    fn symbol(&self) -> &str {
        &self.symbol
    }
    fn human_friendly_name(&self) -> &str {
        "Multiplication"
    }
    fn precedence(&self) -> u8 {
        MULTIPLICATIVE
    }
    fn operand_types(&self) -> SupportedValueTypes {
        SupportedValueTypes::NUMERIC
    }
    fn result_type(&self, left: TypeInfo, right: TypeInfo) -> Option<TypeInfo> {
        numeric_result(left, right)
    }

    fn evaluate(
        &self,
        left: &Value,
        right: &Value,
        _tolerance: Option<&Tolerance>,
    ) -> EvaluationResult<Value> {
        match NumericPair::of(&self.symbol, left, right)? {
            NumericPair::Integers(l, r) => {
                l.checked_mul(r)
                    .map(Value::Integer)
                    .ok_or_else(|| EvaluationError::Overflow {
                        operator: self.symbol.clone(),
                    })
            }
            NumericPair::Floats(l, r) => Ok(Value::Float(l * r)),
        }
    }
}

/// Division (/); always produces a floating point result
pub struct DivideOperator {
    symbol: String,
}

impl DivideOperator {
    /// Create the operator with the given token
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
        }
    }
}

impl BinaryOperator for DivideOperator {
    fn symbol(&self) -> &str {
        &self.symbol
    }
    fn human_friendly_name(&self) -> &str {
        "Division"
    }
    fn precedence(&self) -> u8 {
        MULTIPLICATIVE
    }
    fn operand_types(&self) -> SupportedValueTypes {
        SupportedValueTypes::NUMERIC
    }
    fn result_type(&self, left: TypeInfo, right: TypeInfo) -> Option<TypeInfo> {
        numeric_result(left, right).map(|_| TypeInfo::FLOAT)
    }

    fn evaluate(
        &self,
        left: &Value,
        right: &Value,
        _tolerance: Option<&Tolerance>,
    ) -> EvaluationResult<Value> {
        let (l, r) = NumericPair::of(&self.symbol, left, right)?.as_floats();
        Ok(Value::Float(l / r))
    }
}

/// Remainder (%)
pub struct ModuloOperator {
    symbol: String,
}

impl ModuloOperator {
    /// Create the operator with the given token
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
        }
    }
}

impl BinaryOperator for ModuloOperator {
    fn symbol(&self) -> &str {
        &self.symbol
    }
    fn human_friendly_name(&self) -> &str {
        "Remainder"
    }
    fn precedence(&self) -> u8 {
        MULTIPLICATIVE
    }
    fn operand_types(&self) -> SupportedValueTypes {
        SupportedValueTypes::NUMERIC
    }
    fn result_type(&self, left: TypeInfo, right: TypeInfo) -> Option<TypeInfo> {
        numeric_result(left, right)
    }

    fn evaluate(
        &self,
        left: &Value,
        right: &Value,
        _tolerance: Option<&Tolerance>,
    ) -> EvaluationResult<Value> {
        match NumericPair::of(&self.symbol, left, right)? {
            NumericPair::Integers(_, 0) => Err(EvaluationError::DivisionByZero {
                operator: self.symbol.clone(),
            }),
            NumericPair::Integers(l, r) => {
                l.checked_rem(r)
                    .map(Value::Integer)
                    .ok_or_else(|| EvaluationError::Overflow {
                        operator: self.symbol.clone(),
                    })
            }
            NumericPair::Floats(l, r) => Ok(Value::Float(l % r)),
        }
    }
}

/// Exponentiation (^); right associative, always produces a floating point result
pub struct PowerOperator {
    symbol: String,
}

impl PowerOperator {
    /// Create the operator with the given token
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
        }
    }
}

impl BinaryOperator for PowerOperator {
    fn symbol(&self) -> &str {
        &self.symbol
    }
    fn human_friendly_name(&self) -> &str {
        "Exponentiation"
    }
    fn precedence(&self) -> u8 {
        POWER
    }
    fn associativity(&self) -> Associativity {
        Associativity::Right
    }
    fn operand_types(&self) -> SupportedValueTypes {
        SupportedValueTypes::NUMERIC
    }
    fn result_type(&self, left: TypeInfo, right: TypeInfo) -> Option<TypeInfo> {
        numeric_result(left, right).map(|_| TypeInfo::FLOAT)
    }

    fn evaluate(
        &self,
        left: &Value,
        right: &Value,
        _tolerance: Option<&Tolerance>,
    ) -> EvaluationResult<Value> {
        match NumericPair::of(&self.symbol, left, right)? {
            NumericPair::Integers(l, r) => match i32::try_from(r) {
                Ok(exponent) => Ok(Value::Float((l as f64).powi(exponent))),
                Err(_) => Ok(Value::Float((l as f64).powf(r as f64))),
            },
            NumericPair::Floats(l, r) => Ok(Value::Float(l.powf(r))),
        }
    }
}

/// Numeric negation (unary -)
pub struct NegateOperator {
    symbol: String,
}

impl NegateOperator {
    /// Create the operator with the given token
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
        }
    }
}

impl UnaryOperator for NegateOperator {
    fn symbol(&self) -> &str {
        &self.symbol
    }
    fn human_friendly_name(&self) -> &str {
        "Negation"
    }
    fn operand_types(&self) -> SupportedValueTypes {
        SupportedValueTypes::NUMERIC
    }
    fn result_type(&self, operand: TypeInfo) -> Option<TypeInfo> {
        operand.is_numeric().then_some(operand)
    }

    fn evaluate(&self, operand: &Value) -> EvaluationResult<Value> {
        match operand {
            Value::Integer(i) => {
                i.checked_neg()
                    .map(Value::Integer)
                    .ok_or_else(|| EvaluationError::Overflow {
                        operator: self.symbol.clone(),
                    })
            }
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(EvaluationError::invalid_operands(
                &self.symbol,
                other.type_name(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_type_rules() {
        let add = AddOperator::new("+");
        assert_eq!(
            add.result_type(TypeInfo::INTEGER, TypeInfo::INTEGER),
            Some(TypeInfo::INTEGER)
        );
        assert_eq!(
            add.result_type(TypeInfo::INTEGER, TypeInfo::FLOAT),
            Some(TypeInfo::FLOAT)
        );
        assert_eq!(
            add.result_type(TypeInfo::STRING, TypeInfo::INTEGER),
            Some(TypeInfo::STRING)
        );
        assert_eq!(
            add.result_type(TypeInfo::BYTE_ARRAY, TypeInfo::BYTE_ARRAY),
            Some(TypeInfo::BYTE_ARRAY)
        );
        assert_eq!(add.result_type(TypeInfo::STRING, TypeInfo::BYTE_ARRAY), None);
        assert_eq!(add.result_type(TypeInfo::BOOLEAN, TypeInfo::INTEGER), None);
    }

    #[test]
    fn test_add_evaluation() {
        let add = AddOperator::new("+");
        assert_eq!(
            add.evaluate(&Value::from(2), &Value::from(3), None),
            Ok(Value::from(5))
        );
        assert_eq!(
            add.evaluate(&Value::from(2), &Value::from(0.5), None),
            Ok(Value::from(2.5))
        );
        assert_eq!(
            add.evaluate(&Value::from("n="), &Value::from(3), None),
            Ok(Value::from("n=3"))
        );
        assert_eq!(
            add.evaluate(&Value::from(vec![1u8]), &Value::from(vec![2u8]), None),
            Ok(Value::from(vec![1u8, 2]))
        );
        assert!(matches!(
            add.evaluate(&Value::from(i64::MAX), &Value::from(1), None),
            Err(EvaluationError::Overflow { .. })
        ));
    }

    #[test]
    fn test_division_and_remainder() {
        let divide = DivideOperator::new("/");
        assert_eq!(
            divide.evaluate(&Value::from(7), &Value::from(2), None),
            Ok(Value::from(3.5))
        );
        let modulo = ModuloOperator::new("%");
        assert_eq!(
            modulo.evaluate(&Value::from(7), &Value::from(3), None),
            Ok(Value::from(1))
        );
        assert!(matches!(
            modulo.evaluate(&Value::from(7), &Value::from(0), None),
            Err(EvaluationError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_power_and_negation() {
        let power = PowerOperator::new("^");
        assert_eq!(
            power.evaluate(&Value::from(2), &Value::from(10), None),
            Ok(Value::from(1024.0))
        );
        assert_eq!(
            power.evaluate(&Value::from(2), &Value::from(-1), None),
            Ok(Value::from(0.5))
        );
        assert_eq!(power.associativity(), Associativity::Right);

        let negate = NegateOperator::new("-");
        assert_eq!(negate.evaluate(&Value::from(4)), Ok(Value::from(-4)));
        assert_eq!(negate.result_type(TypeInfo::STRING), None);
    }
}
