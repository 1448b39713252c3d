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

//! Function call nodes

use super::compiled::{CompileMode, CompiledCell, CompiledFn, EvaluationScope};
use super::{CloneContext, Node, OperandRules, unify};
use crate::model::{SupportedValueTypes, TypeInfo, Value, ValueType};
use crate::registry::function::{FunctionContext, MathFunction, SpecialObject, SpecialObjectKind};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Arguments of a function call; arity never exceeds three
pub type Arguments = SmallVec<[Arc<Node>; 3]>;

struct FunctionRules<'a>(&'a dyn MathFunction);

impl OperandRules for FunctionRules<'_> {
    fn allowed(&self, position: usize) -> SupportedValueTypes {
        self.0
            .signature()
            .parameters
            .get(position)
            .map(|param| param.types)
            .unwrap_or_else(SupportedValueTypes::empty)
    }
    fn integer(&self, position: usize) -> bool {
        self.0
            .signature()
            .parameters
            .get(position)
            .is_some_and(|param| param.integer)
    }
    fn preferred(&self) -> &[ValueType] {
        &ValueType::ALL
    }
    fn result_type(&self, operands: &[TypeInfo]) -> Option<TypeInfo> {
        self.0.return_type(operands)
    }
}

/// A call of a registered function
pub struct FunctionNode {
    function: Arc<dyn MathFunction>,
    arguments: Arguments,
    special: Option<SpecialObject>,
    constructed_type: TypeInfo,
    tolerant: bool,
    compiled: CompiledCell,
}

impl FunctionNode {
    /// Call `function` with `arguments`
    ///
    /// `special` supplies the shared object the function asks for. Returns
    /// `None` on an arity or type mismatch, or when a required special object
    /// is unavailable.
    pub fn new(
        function: Arc<dyn MathFunction>,
        arguments: Arguments,
        special: &mut dyn FnMut(SpecialObjectKind) -> Option<SpecialObject>,
    ) -> Option<Self> {
        if arguments.len() != function.arity() {
            return None;
        }
        let special = match function.special_object() {
            Some(kind) => Some(special(kind)?),
            None => None,
        };
        let constructed_type = unify(&arguments, &FunctionRules(function.as_ref()))?;
        Some(Self {
            tolerant: arguments.iter().any(|argument| argument.is_tolerant()),
            function,
            arguments,
            special,
            constructed_type,
            compiled: CompiledCell::new(),
        })
    }

    /// The function
    pub fn function(&self) -> &Arc<dyn MathFunction> {
        &self.function
    }

    /// The arguments in order
    pub fn arguments(&self) -> &[Arc<Node>] {
        &self.arguments
    }

    /// Whether constant arguments allow folding this call
    pub(super) fn is_foldable(&self) -> bool {
        self.function.is_pure() && self.arguments.iter().all(|argument| argument.is_constant())
    }

    pub(super) fn return_type(&self) -> TypeInfo {
        let types: SmallVec<[TypeInfo; 3]> =
            self.arguments.iter().map(|argument| argument.return_type()).collect();
        self.function
            .return_type(&types)
            .unwrap_or(self.constructed_type)
    }

    pub(super) fn is_tolerant(&self) -> bool {
        self.tolerant
    }

    pub(super) fn compile(&self, mode: CompileMode) -> CompiledFn {
        self.compiled.get_or_init(mode, || {
            let arguments: SmallVec<[CompiledFn; 3]> = self
                .arguments
                .iter()
                .map(|argument| argument.compile(mode))
                .collect();
            let function = Arc::clone(&self.function);
            let special = self.special.clone();
            Arc::new(move |scope: &EvaluationScope<'_>| {
                let values = arguments
                    .iter()
                    .map(|argument| argument(scope))
                    .collect::<Result<SmallVec<[Value; 3]>, _>>()?;
                function.evaluate(&values, &FunctionContext::new(special.as_ref()))
            })
        })
    }

    pub(super) fn deep_clone(&self, context: &mut CloneContext) -> Option<Self> {
        let arguments = self
            .arguments
            .iter()
            .map(|argument| argument.deep_clone(context))
            .collect::<Option<Arguments>>()?;
        let special = self
            .special
            .as_ref()
            .map(|special| context.special(special.kind()));
        Some(Self {
            function: Arc::clone(&self.function),
            arguments,
            special,
            constructed_type: self.constructed_type,
            tolerant: self.tolerant,
            compiled: CompiledCell::new(),
        })
    }
}

impl fmt::Debug for FunctionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionNode")
            .field("function", &self.function.name())
            .field("arguments", &self.arguments)
            .field("special", &self.special.as_ref().map(SpecialObject::kind))
            .finish()
    }
}
