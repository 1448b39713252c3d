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

//! Operator registry and operator traits

use crate::definition::MathDefinition;
use crate::error::{DefinitionError, EvaluationResult};
use crate::model::{SupportedValueTypes, Tolerance, TypeInfo, Value, ValueType};
use crate::registry::operators;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Operator associativity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    /// Left-associative operator (evaluated left to right)
    Left,
    /// Right-associative operator (evaluated right to left)
    Right,
}

/// Lazily evaluated operand handed to ternary operators
pub type Thunk<'a> = &'a dyn Fn() -> EvaluationResult<Value>;

/// A prefix operator
pub trait UnaryOperator: Send + Sync {
    /// The operator symbol (e.g. "-", "!")
    fn symbol(&self) -> &str;

    /// Human-friendly name of the operator
    fn human_friendly_name(&self) -> &str;

    /// Types the operand may take
    fn operand_types(&self) -> SupportedValueTypes;

    /// Order in which to try types for an undetermined operand
    fn preferred_types(&self) -> &[ValueType] {
        &ValueType::ALL
    }

    /// Whether numeric operands must be integers
    fn integer_operands(&self) -> bool {
        false
    }

    /// Result type for an operand type; `None` rejects the combination
    fn result_type(&self, operand: TypeInfo) -> Option<TypeInfo>;

    /// Apply the operator
    fn evaluate(&self, operand: &Value) -> EvaluationResult<Value>;
}

/// An infix operator
pub trait BinaryOperator: Send + Sync {
    /// The operator symbol (e.g. "+", "<=")
    fn symbol(&self) -> &str;

    /// Human-friendly name of the operator
    fn human_friendly_name(&self) -> &str;

    /// Precedence level; higher values bind tighter
    fn precedence(&self) -> u8;

    /// Associativity within the precedence level
    fn associativity(&self) -> Associativity {
        Associativity::Left
    }

    /// Whether evaluation honours a comparison tolerance
    fn is_tolerant(&self) -> bool {
        false
    }

    /// Types either operand may take
    fn operand_types(&self) -> SupportedValueTypes;

    /// Order in which to try types for undetermined operands
    fn preferred_types(&self) -> &[ValueType] {
        &ValueType::ALL
    }

    /// Whether numeric operands must be integers
    fn integer_operands(&self) -> bool {
        false
    }

    /// Result type for operand types; `None` rejects the combination
    fn result_type(&self, left: TypeInfo, right: TypeInfo) -> Option<TypeInfo>;

    /// Apply the operator; `tolerance` is only passed in tolerant mode
    fn evaluate(
        &self,
        left: &Value,
        right: &Value,
        tolerance: Option<&Tolerance>,
    ) -> EvaluationResult<Value>;
}

/// A mixfix operator with three operands, e.g. `cond ? a : b`
pub trait TernaryOperator: Send + Sync {
    /// Token between the first and second operand
    fn symbol(&self) -> &str;

    /// Token between the second and third operand
    fn second_symbol(&self) -> &str;

    /// Human-friendly name of the operator
    fn human_friendly_name(&self) -> &str;

    /// Types the operand at `position` may take
    fn operand_types(&self, position: usize) -> SupportedValueTypes;

    /// Result type for operand types; `None` rejects the combination
    fn result_type(&self, operands: &[TypeInfo]) -> Option<TypeInfo>;

    /// Apply the operator to lazily evaluated operands
    fn evaluate(
        &self,
        first: Thunk<'_>,
        second: Thunk<'_>,
        third: Thunk<'_>,
    ) -> EvaluationResult<Value>;
}

/// Registry of the operators known to an engine, grouped by precedence level
#[derive(Clone, Default)]
pub struct OperatorRegistry {
    binary_levels: BTreeMap<u8, Vec<Arc<dyn BinaryOperator>>>,
    binary_operators: FxHashMap<String, Arc<dyn BinaryOperator>>,
    unary_operators: FxHashMap<String, Arc<dyn UnaryOperator>>,
    ternary_operators: FxHashMap<String, Arc<dyn TernaryOperator>>,
}

impl OperatorRegistry {
    /// Create an empty operator registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in operator, using the definition's tokens
    pub fn standard(definition: &MathDefinition) -> Self {
        let mut registry = Self::new();
        operators::register_builtin_operators(&mut registry, definition);
        registry
    }

    /// Register a binary operator; a later registration replaces an earlier one
    pub fn register_binary<O: BinaryOperator + 'static>(&mut self, operator: O) {
        let operator: Arc<dyn BinaryOperator> = Arc::new(operator);
        let symbol = operator.symbol().to_string();
        if let Some(previous) = self.binary_operators.insert(symbol.clone(), operator.clone()) {
            if let Some(level) = self.binary_levels.get_mut(&previous.precedence()) {
                level.retain(|op| op.symbol() != symbol);
            }
        }
        self.binary_levels
            .entry(operator.precedence())
            .or_default()
            .push(operator);
    }

    /// Register a unary operator
    pub fn register_unary<O: UnaryOperator + 'static>(&mut self, operator: O) {
        self.unary_operators
            .insert(operator.symbol().to_string(), Arc::new(operator));
    }

    /// Register a ternary operator
    pub fn register_ternary<O: TernaryOperator + 'static>(&mut self, operator: O) {
        self.ternary_operators
            .insert(operator.symbol().to_string(), Arc::new(operator));
    }

    /// Get a binary operator by symbol
    pub fn get_binary(&self, symbol: &str) -> Result<Arc<dyn BinaryOperator>, DefinitionError> {
        self.binary_operators
            .get(symbol)
            .cloned()
            .ok_or_else(|| DefinitionError::UnknownOperator {
                kind: "binary".to_string(),
                symbol: symbol.to_string(),
            })
    }

    /// Get a unary operator by symbol
    pub fn get_unary(&self, symbol: &str) -> Result<Arc<dyn UnaryOperator>, DefinitionError> {
        self.unary_operators
            .get(symbol)
            .cloned()
            .ok_or_else(|| DefinitionError::UnknownOperator {
                kind: "unary".to_string(),
                symbol: symbol.to_string(),
            })
    }

    /// Get a ternary operator by its first symbol
    pub fn get_ternary(&self, symbol: &str) -> Result<Arc<dyn TernaryOperator>, DefinitionError> {
        self.ternary_operators
            .get(symbol)
            .cloned()
            .ok_or_else(|| DefinitionError::UnknownOperator {
                kind: "ternary".to_string(),
                symbol: symbol.to_string(),
            })
    }

    /// Binary operators grouped by level, loosest binding first
    pub fn binary_levels(&self) -> impl Iterator<Item = (u8, &[Arc<dyn BinaryOperator>])> {
        self.binary_levels
            .iter()
            .filter(|(_, ops)| !ops.is_empty())
            .map(|(level, ops)| (*level, ops.as_slice()))
    }

    /// Unary operators, longest symbol first
    pub fn unary_operators(&self) -> Vec<Arc<dyn UnaryOperator>> {
        let mut ops: Vec<_> = self.unary_operators.values().cloned().collect();
        ops.sort_by(|a, b| {
            b.symbol()
                .len()
                .cmp(&a.symbol().len())
                .then_with(|| a.symbol().cmp(b.symbol()))
        });
        ops
    }

    /// Ternary operators, longest first symbol first
    pub fn ternary_operators(&self) -> Vec<Arc<dyn TernaryOperator>> {
        let mut ops: Vec<_> = self.ternary_operators.values().cloned().collect();
        ops.sort_by(|a, b| {
            b.symbol()
                .len()
                .cmp(&a.symbol().len())
                .then_with(|| a.symbol().cmp(b.symbol()))
        });
        ops
    }

    /// Every operator token, longest first; used to find operator occurrences
    pub fn all_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .binary_operators
            .keys()
            .chain(self.unary_operators.keys())
            .cloned()
            .chain(
                self.ternary_operators
                    .values()
                    .flat_map(|op| [op.symbol().to_string(), op.second_symbol().to_string()]),
            )
            .collect();
        symbols.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        symbols.dedup();
        symbols
    }

    /// Check if a binary operator exists
    pub fn contains_binary(&self, symbol: &str) -> bool {
        self.binary_operators.contains_key(symbol)
    }

    /// Check if a unary operator exists
    pub fn contains_unary(&self, symbol: &str) -> bool {
        self.unary_operators.contains_key(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_levels_are_ordered_loosest_first() {
        let registry = OperatorRegistry::standard(&MathDefinition::default());
        let levels: Vec<u8> = registry.binary_levels().map(|(level, _)| level).collect();
        let mut sorted = levels.clone();
        sorted.sort();
        assert_eq!(levels, sorted);

        let (_, loosest) = registry.binary_levels().next().unwrap();
        assert!(loosest.iter().any(|op| op.symbol() == "|"));
    }

    #[test]
    fn test_lookup_errors_for_unknown_symbols() {
        let registry = OperatorRegistry::standard(&MathDefinition::default());
        assert!(registry.get_binary("+").is_ok());
        assert!(registry.get_unary("!").is_ok());
        assert!(registry.get_ternary("?").is_ok());
        assert_eq!(
            registry.get_binary("@").err(),
            Some(DefinitionError::UnknownOperator {
                kind: "binary".to_string(),
                symbol: "@".to_string(),
            })
        );
    }

    #[test]
    fn test_symbols_longest_first() {
        let registry = OperatorRegistry::standard(&MathDefinition::default());
        let symbols = registry.all_symbols();
        let shift = symbols.iter().position(|s| s == "<<").unwrap();
        let less = symbols.iter().position(|s| s == "<").unwrap();
        assert!(shift < less);
        assert_eq!(symbols.iter().filter(|s| s.as_str() == "-").count(), 1);
    }
}
