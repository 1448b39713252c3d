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

//! Mathematical constants as nonary functions

use crate::error::{DefinitionError, EvaluationResult};
use crate::model::{TypeInfo, Value};
use crate::registry::function::{
    AritySpecificFunction, FunctionContext, FunctionRegistry, FunctionSignature,
};
use std::sync::LazyLock;

/// Register `pi()` and `e()`
pub fn register_constant_functions(registry: &mut FunctionRegistry) -> Result<(), DefinitionError> {
    registry.register_arity::<_, 0>(PiFunction)?;
    registry.register_arity::<_, 0>(EFunction)?;
    Ok(())
}

/// pi() - ratio of a circle's circumference to its diameter
pub struct PiFunction;

impl AritySpecificFunction<0> for PiFunction {
    fn name(&self) -> &str {
        "pi"
    }
    fn human_friendly_name(&self) -> &str {
        "Pi"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("pi", vec![], TypeInfo::FLOAT));
        &SIG
    }
    fn documentation(&self) -> &str {
        "Returns the constant π."
    }
    fn evaluate(&self, _args: [&Value; 0], _context: &FunctionContext<'_>) -> EvaluationResult<Value> {
        Ok(Value::Float(std::f64::consts::PI))
    }
}

/// e() - Euler's number
pub struct EFunction;

impl AritySpecificFunction<0> for EFunction {
    fn name(&self) -> &str {
        "e"
    }
    fn human_friendly_name(&self) -> &str {
        "Euler's Number"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("e", vec![], TypeInfo::FLOAT));
        &SIG
    }
    fn documentation(&self) -> &str {
        "Returns the base of the natural logarithm."
    }
    fn evaluate(&self, _args: [&Value; 0], _context: &FunctionContext<'_>) -> EvaluationResult<Value> {
        Ok(Value::Float(std::f64::consts::E))
    }
}
