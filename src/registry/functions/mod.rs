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

//! Built-in function implementations

pub mod constants;
pub mod math;
pub mod random;
pub mod string;

// Re-export all functions for convenience
pub use constants::*;
pub use math::*;
pub use random::*;
pub use string::*;

use crate::error::{EvaluationError, EvaluationResult};
use crate::model::Value;
use crate::registry::function::FunctionRegistry;

/// Register all built-in functions
pub fn register_builtin_functions(registry: &mut FunctionRegistry) {
    let results = [
        constants::register_constant_functions(registry),
        math::register_math_functions(registry),
        string::register_string_functions(registry),
        random::register_random_functions(registry),
    ];
    for error in results.into_iter().filter_map(Result::err) {
        log::warn!("Skipped built-in function: {error}");
    }
}

/// Numeric argument as a float
pub(crate) fn number(function: &str, value: &Value) -> EvaluationResult<f64> {
    value.as_f64().ok_or_else(|| {
        EvaluationError::function(
            function,
            format!("expected a number, got {}", value.type_name()),
        )
    })
}

/// Integer argument
pub(crate) fn integer(function: &str, value: &Value) -> EvaluationResult<i64> {
    value.as_integer().ok_or_else(|| {
        EvaluationError::function(
            function,
            format!("expected an integer, got {}", value.type_name()),
        )
    })
}

/// String argument
pub(crate) fn text<'a>(function: &str, value: &'a Value) -> EvaluationResult<&'a str> {
    value.as_str().ok_or_else(|| {
        EvaluationError::function(
            function,
            format!("expected a string, got {}", value.type_name()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_covers_every_arity() {
        let registry = FunctionRegistry::standard();
        for (name, arity) in [
            ("pi", 0),
            ("rand", 0),
            ("sqrt", 1),
            ("log", 1),
            ("log", 2),
            ("round", 2),
            ("max", 2),
            ("substring", 3),
            ("clamp", 3),
            ("randomint", 2),
        ] {
            assert!(registry.contains(name, arity), "{name}/{arity} missing");
        }
        assert!(!registry.contains("max", 1));
        assert!(!registry.contains("max", 3));
    }
}
