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

//! Parameter reference nodes

use super::compiled::{CompileMode, CompiledCell, CompiledFn, EvaluationScope};
use crate::error::EvaluationError;
use crate::parameters::{OperandType, ParameterHandle, ParameterRegistry};
use crate::model::TypeInfo;
use std::fmt;
use std::sync::Arc;

/// A reference to a named parameter
///
/// The node only holds a handle; its type lives in the shared registry and
/// may still change until the registry is frozen.
pub struct ParameterNode {
    name: String,
    handle: ParameterHandle,
    registry: Arc<ParameterRegistry>,
    compiled: CompiledCell,
}

impl ParameterNode {
    /// Advertise `name` to the registry and reference it
    ///
    /// Returns `None` when the registry is frozen and does not know the name.
    pub fn new(name: &str, registry: &Arc<ParameterRegistry>) -> Option<Self> {
        let handle = registry.advertise(name)?;
        Some(Self {
            name: name.to_string(),
            handle,
            registry: Arc::clone(registry),
            compiled: CompiledCell::new(),
        })
    }

    /// Parameter name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle into the registry
    pub fn handle(&self) -> ParameterHandle {
        self.handle
    }

    /// The registry this parameter belongs to
    pub fn registry(&self) -> &Arc<ParameterRegistry> {
        &self.registry
    }

    /// Current type knowledge
    pub fn operand_type(&self) -> OperandType {
        self.registry.operand_type(self.handle)
    }

    /// Type the parameter has, or will default to
    pub fn return_type(&self) -> TypeInfo {
        self.operand_type().settle()
    }

    pub(super) fn compile(&self, mode: CompileMode) -> CompiledFn {
        self.compiled.get_or_init(mode, || {
            let name = self.name.clone();
            match self.registry.position(self.handle) {
                Some(position) => Arc::new(move |scope: &EvaluationScope<'_>| {
                    scope
                        .parameter(position)
                        .cloned()
                        .ok_or_else(|| EvaluationError::UnboundParameter { name: name.clone() })
                }),
                None => {
                    log::warn!("Parameter '{name}' compiled before its registry was frozen");
                    Arc::new(move |_scope: &EvaluationScope<'_>| {
                        Err(EvaluationError::UnboundParameter { name: name.clone() })
                    })
                }
            }
        })
    }
}

impl fmt::Debug for ParameterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterNode")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .field("type", &self.operand_type())
            .finish()
    }
}
