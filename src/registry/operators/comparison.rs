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

//! Comparison operators
//!
//! Both equality and ordering comparisons are tolerant: when the expression
//! is evaluated with a [`Tolerance`], numeric operands within the tolerance
//! compare equal.

use super::{EQUALITY, NumericPair, RELATIONAL, operand_names};
use crate::definition::MathDefinition;
use crate::error::{EvaluationError, EvaluationResult};
use crate::model::{SupportedValueTypes, Tolerance, TypeInfo, Value};
use crate::registry::operator::{BinaryOperator, OperatorRegistry};
use std::cmp::Ordering;

/// Register the comparison operators under the definition's tokens
pub fn register_comparison_operators(registry: &mut OperatorRegistry, definition: &MathDefinition) {
    registry.register_binary(EqualOperator::new(&definition.equals, false));
    registry.register_binary(EqualOperator::new(&definition.not_equals, true));
    registry.register_binary(RelationalOperator::new(&definition.less_than, Relation::Less));
    registry.register_binary(RelationalOperator::new(
        &definition.less_than_or_equal,
        Relation::LessOrEqual,
    ));
    registry.register_binary(RelationalOperator::new(
        &definition.greater_than,
        Relation::Greater,
    ));
    registry.register_binary(RelationalOperator::new(
        &definition.greater_than_or_equal,
        Relation::GreaterOrEqual,
    ));
}

fn numeric_ordering(pair: NumericPair, tolerance: Option<&Tolerance>) -> Option<Ordering> {
    match (pair, tolerance) {
        (NumericPair::Integers(l, r), None) => Some(l.cmp(&r)),
        (pair, None) => {
            let (l, r) = pair.as_floats();
            l.partial_cmp(&r)
        }
        (pair, Some(tolerance)) => {
            let (l, r) = pair.as_floats();
            tolerance.compare(l, r)
        }
    }
}

/// Equality (=) and inequality (!=)
pub struct EqualOperator {
    symbol: String,
    negated: bool,
}

impl EqualOperator {
    /// Create the operator; `negated` turns it into inequality
    pub fn new(symbol: impl Into<String>, negated: bool) -> Self {
        Self {
            symbol: symbol.into(),
            negated,
        }
    }

    fn equals(
        &self,
        left: &Value,
        right: &Value,
        tolerance: Option<&Tolerance>,
    ) -> EvaluationResult<bool> {
        match (left, right) {
            (Value::Boolean(l), Value::Boolean(r)) => Ok(l == r),
            (Value::String(l), Value::String(r)) => Ok(l == r),
            (Value::ByteArray(l), Value::ByteArray(r)) => Ok(l == r),
            _ => {
                let pair = NumericPair::of(&self.symbol, left, right)?;
                Ok(numeric_ordering(pair, tolerance) == Some(Ordering::Equal))
            }
        }
    }
}

impl BinaryOperator for EqualOperator {
    fn symbol(&self) -> &str {
        &self.symbol
    }
    fn human_friendly_name(&self) -> &str {
        if self.negated {
            "Inequality"
        } else {
            "Equality"
        }
    }
    fn precedence(&self) -> u8 {
        EQUALITY
    }
    fn is_tolerant(&self) -> bool {
        true
    }
    fn operand_types(&self) -> SupportedValueTypes {
        SupportedValueTypes::all()
    }

    fn result_type(&self, left: TypeInfo, right: TypeInfo) -> Option<TypeInfo> {
        (left.value_type == right.value_type).then_some(TypeInfo::BOOLEAN)
    }

    fn evaluate(
        &self,
        left: &Value,
        right: &Value,
        tolerance: Option<&Tolerance>,
    ) -> EvaluationResult<Value> {
        let equal = self.equals(left, right, tolerance)?;
        Ok(Value::Boolean(equal != self.negated))
    }
}

/// Ordering relation tested by a [`RelationalOperator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterOrEqual,
}

impl Relation {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Relation::Less => ordering == Ordering::Less,
            Relation::LessOrEqual => ordering != Ordering::Greater,
            Relation::Greater => ordering == Ordering::Greater,
            Relation::GreaterOrEqual => ordering != Ordering::Less,
        }
    }
}

/// Ordering comparison of numbers or strings
pub struct RelationalOperator {
    symbol: String,
    relation: Relation,
}

impl RelationalOperator {
    /// Create the operator for a relation
    pub fn new(symbol: impl Into<String>, relation: Relation) -> Self {
        Self {
            symbol: symbol.into(),
            relation,
        }
    }
}

impl BinaryOperator for RelationalOperator {
    fn symbol(&self) -> &str {
        &self.symbol
    }
    fn human_friendly_name(&self) -> &str {
        match self.relation {
            Relation::Less => "Less Than",
            Relation::LessOrEqual => "Less Than Or Equal",
            Relation::Greater => "Greater Than",
            Relation::GreaterOrEqual => "Greater Than Or Equal",
        }
    }
    fn precedence(&self) -> u8 {
        RELATIONAL
    }
    fn is_tolerant(&self) -> bool {
        true
    }
    fn operand_types(&self) -> SupportedValueTypes {
        SupportedValueTypes::NUMERIC | SupportedValueTypes::STRING
    }

    fn result_type(&self, left: TypeInfo, right: TypeInfo) -> Option<TypeInfo> {
        let comparable = self.operand_types().supports(left.value_type);
        (comparable && left.value_type == right.value_type).then_some(TypeInfo::BOOLEAN)
    }

    fn evaluate(
        &self,
        left: &Value,
        right: &Value,
        tolerance: Option<&Tolerance>,
    ) -> EvaluationResult<Value> {
        let ordering = match (left, right) {
            (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
            (Value::String(_), _) | (_, Value::String(_)) => {
                return Err(EvaluationError::invalid_operands(
                    &self.symbol,
                    operand_names(left, right),
                ));
            }
            _ => numeric_ordering(NumericPair::of(&self.symbol, left, right)?, tolerance),
        };
        // NaN compares false against everything
        Ok(Value::Boolean(
            ordering.is_some_and(|ordering| self.relation.holds(ordering)),
        ))
    }
}
