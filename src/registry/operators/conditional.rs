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

//! Conditional operator (`condition ? then : else`)

use crate::definition::MathDefinition;
use crate::error::{EvaluationError, EvaluationResult};
use crate::model::{SupportedValueTypes, TypeInfo, Value};
use crate::registry::operator::{OperatorRegistry, TernaryOperator, Thunk};

/// Register the conditional operator under the definition's tokens
pub fn register_conditional_operators(registry: &mut OperatorRegistry, definition: &MathDefinition) {
    registry.register_ternary(ConditionalOperator::new(
        &definition.conditional,
        &definition.conditional_else,
    ));
}

/// Selects the second or third operand; only the selected branch is evaluated
pub struct ConditionalOperator {
    symbol: String,
    else_symbol: String,
}

impl ConditionalOperator {
    /// Create the operator with its two tokens
    pub fn new(symbol: impl Into<String>, else_symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            else_symbol: else_symbol.into(),
        }
    }
}

impl TernaryOperator for ConditionalOperator {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn second_symbol(&self) -> &str {
        &self.else_symbol
    }

    fn human_friendly_name(&self) -> &str {
        "Conditional"
    }

    fn operand_types(&self, position: usize) -> SupportedValueTypes {
        match position {
            0 => SupportedValueTypes::BOOLEAN,
            _ => SupportedValueTypes::all(),
        }
    }

    fn result_type(&self, operands: &[TypeInfo]) -> Option<TypeInfo> {
        let [condition, then, otherwise] = operands else {
            return None;
        };
        if *condition != TypeInfo::BOOLEAN || then.value_type != otherwise.value_type {
            return None;
        }
        if then.is_numeric() {
            Some(TypeInfo::numeric(then.numeric.promote(otherwise.numeric)))
        } else {
            Some(*then)
        }
    }

    fn evaluate(
        &self,
        first: Thunk<'_>,
        second: Thunk<'_>,
        third: Thunk<'_>,
    ) -> EvaluationResult<Value> {
        match first()? {
            Value::Boolean(true) => second(),
            Value::Boolean(false) => third(),
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
    fn test_only_selected_branch_is_evaluated() {
        let conditional = ConditionalOperator::new("?", ":");
        let condition = || Ok(Value::from(true));
        let then = || Ok(Value::from(1));
        let otherwise = || Err(EvaluationError::function("boom", "evaluated"));
        assert_eq!(
            conditional.evaluate(&condition, &then, &otherwise),
            Ok(Value::from(1))
        );
    }

    #[test]
    fn test_branch_types_must_agree() {
        let conditional = ConditionalOperator::new("?", ":");
        assert_eq!(
            conditional.result_type(&[TypeInfo::BOOLEAN, TypeInfo::INTEGER, TypeInfo::FLOAT]),
            Some(TypeInfo::FLOAT)
        );
        assert_eq!(
            conditional.result_type(&[TypeInfo::BOOLEAN, TypeInfo::STRING, TypeInfo::INTEGER]),
            None
        );
        assert_eq!(
            conditional.result_type(&[TypeInfo::INTEGER, TypeInfo::STRING, TypeInfo::STRING]),
            None
        );
    }
}
