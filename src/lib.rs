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

//! Mathematical expression compiler
//!
//! Compiles textual arithmetic and logical expressions with named parameters,
//! functions, operators and parentheses into typed, directly callable
//! computations.
//!
//! ```
//! use octofhir_mathexpr::{MathEngine, Value};
//!
//! let engine = MathEngine::new();
//! let expression = engine.compile("max(a, 2) * b + 1").unwrap();
//! let result = expression.evaluate(&[Value::from(3), Value::from(4)]).unwrap();
//! assert_eq!(result, Value::from(13));
//! ```

pub mod cache;
pub mod cancellation;
pub mod definition;
pub mod engine;
pub mod error;
pub mod extractors;
pub mod flatten;
pub mod generator;
pub mod model;
pub mod nodes;
pub mod parameters;
pub mod registry;
pub mod tables;
pub mod working_set;

pub use cache::{CacheStats, ExpressionCache, ExpressionCacheConfig};
pub use cancellation::CancellationToken;
pub use definition::MathDefinition;
pub use engine::{CompiledExpression, EngineConfig, MathEngine};
pub use error::{CompilationError, DefinitionError, EvaluationError, EvaluationResult, Result};
pub use model::{NumericKind, SupportedValueTypes, Tolerance, TypeInfo, Value, ValueType};
pub use nodes::Node;
pub use parameters::ParameterInfo;
pub use registry::{FunctionRegistry, OperatorRegistry};
