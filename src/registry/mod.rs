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

//! Function and operator registries
//!
//! Trait-based registries for the functions and operators an expression may
//! use, allowing the built-in set to be extended before an engine is built.

pub mod function;
pub mod functions;
pub mod operator;
pub mod operators;

pub use function::{
    AritySpecificFunction, ArityWrapper, FunctionContext, FunctionRegistry, FunctionSignature,
    MathFunction, ParameterSpec, RandomSource, SpecialObject, SpecialObjectKind,
};
pub use operator::{
    Associativity, BinaryOperator, OperatorRegistry, TernaryOperator, Thunk, UnaryOperator,
};

use crate::definition::MathDefinition;

/// Create standard registries with all built-in functions and operators
pub fn create_standard_registries(definition: &MathDefinition) -> (FunctionRegistry, OperatorRegistry) {
    (
        FunctionRegistry::standard(),
        OperatorRegistry::standard(definition),
    )
}
