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

//! Literal constant nodes

use super::compiled::{CompileMode, CompiledCell, CompiledFn, EvaluationScope};
use crate::model::{TypeInfo, Value};
use std::sync::Arc;

/// A literal value
#[derive(Debug)]
pub struct ConstantNode {
    value: Value,
    compiled: CompiledCell,
}

impl ConstantNode {
    /// Wrap a value
    pub fn new(value: Value) -> Self {
        Self {
            value,
            compiled: CompiledCell::new(),
        }
    }

    /// The literal value
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Type of the literal
    pub fn return_type(&self) -> TypeInfo {
        self.value.type_info()
    }

    pub(super) fn compile(&self, mode: CompileMode) -> CompiledFn {
        self.compiled.get_or_init(mode, || {
            let value = self.value.clone();
            Arc::new(move |_scope: &EvaluationScope<'_>| Ok(value.clone()))
        })
    }

    pub(super) fn duplicate(&self) -> Self {
        // Payloads are immutable and shared; only the cache is fresh
        Self::new(self.value.clone())
    }
}
