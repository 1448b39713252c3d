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

//! Operator application nodes

use super::compiled::{CompileMode, CompiledCell, CompiledFn, EvaluationScope};
use super::{CloneContext, Node, OperandRules, unify};
use crate::model::{SupportedValueTypes, TypeInfo, ValueType};
use crate::registry::operator::{BinaryOperator, TernaryOperator, UnaryOperator};
use std::fmt;
use std::sync::Arc;

struct UnaryRules<'a>(&'a dyn UnaryOperator);

impl OperandRules for UnaryRules<'_> {
    fn allowed(&self, _position: usize) -> SupportedValueTypes {
        self.0.operand_types()
    }
    fn integer(&self, _position: usize) -> bool {
        self.0.integer_operands()
    }
    fn preferred(&self) -> &[ValueType] {
        self.0.preferred_types()
    }
    fn result_type(&self, operands: &[TypeInfo]) -> Option<TypeInfo> {
        match operands {
            [operand] => self.0.result_type(*operand),
            _ => None,
        }
    }
}

struct BinaryRules<'a>(&'a dyn BinaryOperator);

impl OperandRules for BinaryRules<'_> {
    fn allowed(&self, _position: usize) -> SupportedValueTypes {
        self.0.operand_types()
    }
    fn integer(&self, _position: usize) -> bool {
        self.0.integer_operands()
    }
    fn preferred(&self) -> &[ValueType] {
        self.0.preferred_types()
    }
    fn result_type(&self, operands: &[TypeInfo]) -> Option<TypeInfo> {
        match operands {
            [left, right] => self.0.result_type(*left, *right),
            _ => None,
        }
    }
}

struct TernaryRules<'a>(&'a dyn TernaryOperator);

impl OperandRules for TernaryRules<'_> {
    fn allowed(&self, position: usize) -> SupportedValueTypes {
        self.0.operand_types(position)
    }
    fn integer(&self, _position: usize) -> bool {
        false
    }
    fn preferred(&self) -> &[ValueType] {
        &ValueType::ALL
    }
    fn result_type(&self, operands: &[TypeInfo]) -> Option<TypeInfo> {
        self.0.result_type(operands)
    }
}

/// A prefix operator applied to one operand
pub struct UnaryNode {
    operator: Arc<dyn UnaryOperator>,
    operand: Arc<Node>,
    constructed_type: TypeInfo,
    tolerant: bool,
    compiled: CompiledCell,
}

impl UnaryNode {
    /// Apply an operator, unifying the operand type; `None` if the type is illegal
    pub fn new(operator: Arc<dyn UnaryOperator>, operand: Arc<Node>) -> Option<Self> {
        let constructed_type = unify(
            std::slice::from_ref(&operand),
            &UnaryRules(operator.as_ref()),
        )?;
        Some(Self {
            tolerant: operand.is_tolerant(),
            operator,
            operand,
            constructed_type,
            compiled: CompiledCell::new(),
        })
    }

    /// The operator
    pub fn operator(&self) -> &Arc<dyn UnaryOperator> {
        &self.operator
    }

    /// The operand
    pub fn operand(&self) -> &Arc<Node> {
        &self.operand
    }

    pub(super) fn return_type(&self) -> TypeInfo {
        self.operator
            .result_type(self.operand.return_type())
            .unwrap_or(self.constructed_type)
    }

    pub(super) fn is_tolerant(&self) -> bool {
        self.tolerant
    }

    pub(super) fn compile(&self, mode: CompileMode) -> CompiledFn {
        self.compiled.get_or_init(mode, || {
            let operand = self.operand.compile(mode);
            let operator = Arc::clone(&self.operator);
            Arc::new(move |scope: &EvaluationScope<'_>| {
                let value = operand(scope)?;
                operator.evaluate(&value)
            })
        })
    }

    pub(super) fn deep_clone(&self, context: &mut CloneContext) -> Option<Self> {
        Some(Self {
            operator: Arc::clone(&self.operator),
            operand: self.operand.deep_clone(context)?,
            constructed_type: self.constructed_type,
            tolerant: self.tolerant,
            compiled: CompiledCell::new(),
        })
    }
}

/// An infix operator applied to two operands
pub struct BinaryNode {
    operator: Arc<dyn BinaryOperator>,
    left: Arc<Node>,
    right: Arc<Node>,
    constructed_type: TypeInfo,
    tolerant: bool,
    compiled: CompiledCell,
}

impl BinaryNode {
    /// Apply an operator, unifying the operand types; `None` if the types are illegal
    pub fn new(operator: Arc<dyn BinaryOperator>, left: Arc<Node>, right: Arc<Node>) -> Option<Self> {
        let operands = [left, right];
        let constructed_type = unify(&operands, &BinaryRules(operator.as_ref()))?;
        let [left, right] = operands;
        Some(Self {
            tolerant: operator.is_tolerant() || left.is_tolerant() || right.is_tolerant(),
            operator,
            left,
            right,
            constructed_type,
            compiled: CompiledCell::new(),
        })
    }

    /// The operator
    pub fn operator(&self) -> &Arc<dyn BinaryOperator> {
        &self.operator
    }

    /// Left operand
    pub fn left(&self) -> &Arc<Node> {
        &self.left
    }

    /// Right operand
    pub fn right(&self) -> &Arc<Node> {
        &self.right
    }

    pub(super) fn return_type(&self) -> TypeInfo {
        self.operator
            .result_type(self.left.return_type(), self.right.return_type())
            .unwrap_or(self.constructed_type)
    }

    pub(super) fn is_tolerant(&self) -> bool {
        self.tolerant
    }

    pub(super) fn compile(&self, mode: CompileMode) -> CompiledFn {
        self.compiled.get_or_init(mode, || {
            let left = self.left.compile(mode);
            let right = self.right.compile(mode);
            let operator = Arc::clone(&self.operator);
            let tolerant = mode == CompileMode::Tolerant && operator.is_tolerant();
            Arc::new(move |scope: &EvaluationScope<'_>| {
                let l = left(scope)?;
                let r = right(scope)?;
                let tolerance = if tolerant { scope.tolerance() } else { None };
                operator.evaluate(&l, &r, tolerance)
            })
        })
    }

    pub(super) fn deep_clone(&self, context: &mut CloneContext) -> Option<Self> {
        Some(Self {
            operator: Arc::clone(&self.operator),
            left: self.left.deep_clone(context)?,
            right: self.right.deep_clone(context)?,
            constructed_type: self.constructed_type,
            tolerant: self.tolerant,
            compiled: CompiledCell::new(),
        })
    }
}

/// A mixfix operator applied to three operands
pub struct TernaryNode {
    operator: Arc<dyn TernaryOperator>,
    operands: [Arc<Node>; 3],
    constructed_type: TypeInfo,
    tolerant: bool,
    compiled: CompiledCell,
}

impl TernaryNode {
    /// Apply an operator, unifying the operand types; `None` if the types are illegal
    pub fn new(operator: Arc<dyn TernaryOperator>, operands: [Arc<Node>; 3]) -> Option<Self> {
        let constructed_type = unify(&operands, &TernaryRules(operator.as_ref()))?;
        Some(Self {
            tolerant: operands.iter().any(|operand| operand.is_tolerant()),
            operator,
            operands,
            constructed_type,
            compiled: CompiledCell::new(),
        })
    }

    /// The operator
    pub fn operator(&self) -> &Arc<dyn TernaryOperator> {
        &self.operator
    }

    /// The three operands in order
    pub fn operands(&self) -> &[Arc<Node>; 3] {
        &self.operands
    }

    pub(super) fn return_type(&self) -> TypeInfo {
        let types = self.operands.each_ref().map(|operand| operand.return_type());
        self.operator
            .result_type(&types)
            .unwrap_or(self.constructed_type)
    }

    pub(super) fn is_tolerant(&self) -> bool {
        self.tolerant
    }

    pub(super) fn compile(&self, mode: CompileMode) -> CompiledFn {
        self.compiled.get_or_init(mode, || {
            let [first, second, third] = self.operands.each_ref().map(|operand| operand.compile(mode));
            let operator = Arc::clone(&self.operator);
            Arc::new(move |scope: &EvaluationScope<'_>| {
                operator.evaluate(&|| first(scope), &|| second(scope), &|| third(scope))
            })
        })
    }

    pub(super) fn deep_clone(&self, context: &mut CloneContext) -> Option<Self> {
        let [first, second, third] = &self.operands;
        Some(Self {
            operator: Arc::clone(&self.operator),
            operands: [
                first.deep_clone(context)?,
                second.deep_clone(context)?,
                third.deep_clone(context)?,
            ],
            constructed_type: self.constructed_type,
            tolerant: self.tolerant,
            compiled: CompiledCell::new(),
        })
    }
}

impl fmt::Debug for UnaryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnaryNode")
            .field("operator", &self.operator.symbol())
            .field("operand", &self.operand)
            .finish()
    }
}

impl fmt::Debug for BinaryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryNode")
            .field("operator", &self.operator.symbol())
            .field("left", &self.left)
            .field("right", &self.right)
            .finish()
    }
}

impl fmt::Debug for TernaryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TernaryNode")
            .field("operator", &self.operator.symbol())
            .field("operands", &self.operands)
            .finish()
    }
}
