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

//! Error types for expression compilation and evaluation
//!
//! Parsing failures inside the compiler are signalled by absence of a value
//! and only become a [`CompilationError`] at the top-level `compile` call.

use thiserror::Error;

/// Result type alias for compilation
pub type Result<T> = std::result::Result<T, CompilationError>;

/// Result type alias for evaluation
pub type EvaluationResult<T> = std::result::Result<T, EvaluationError>;

/// Errors reported by `MathEngine::compile`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompilationError {
    /// The expression text was empty or whitespace only
    #[error("Expression is empty")]
    EmptyExpression,

    /// Some part of the expression could not be resolved, or compilation was cancelled
    #[error("Expression could not be compiled: {expression}")]
    Unresolvable {
        /// The original expression text
        expression: String,
    },

    /// The expression reduced to a constant while parameters were still registered
    #[error("Expression reduced to a constant but references parameters: {}", parameters.join(", "))]
    UnusedParameters {
        /// Names of the registered parameters
        parameters: Vec<String>,
    },

    /// The engine definition is invalid
    #[error("Invalid definition: {0}")]
    Definition(#[from] DefinitionError),
}

/// Configuration errors in a `MathDefinition` or a registry lookup
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DefinitionError {
    /// A required token is empty
    #[error("Token '{name}' must not be empty")]
    EmptyToken {
        /// Definition field name
        name: String,
    },

    /// Two definition fields use the same token
    #[error("Token '{token}' is used by both '{first}' and '{second}'")]
    DuplicateToken {
        /// The clashing token
        token: String,
        /// First field using it
        first: String,
        /// Second field using it
        second: String,
    },

    /// A token contains whitespace or reserved placeholder characters
    #[error("Token '{token}' for '{name}' contains reserved characters")]
    ReservedCharacters {
        /// Definition field name
        name: String,
        /// The offending token
        token: String,
    },

    /// An operator symbol was not registered
    #[error("Unknown {kind} operator '{symbol}'")]
    UnknownOperator {
        /// Operator family (unary, binary, ternary)
        kind: String,
        /// The requested symbol
        symbol: String,
    },

    /// A function was registered twice under the same name and arity
    #[error("Function '{name}' with arity {arity} is already registered")]
    FunctionExists {
        /// Function name
        name: String,
        /// Function arity
        arity: usize,
    },

    /// A function arity outside the supported range
    #[error("Function '{name}' has unsupported arity {arity} (0 to 3 supported)")]
    UnsupportedArity {
        /// Function name
        name: String,
        /// Requested arity
        arity: usize,
    },

    /// Definition could not be deserialized
    #[error("Could not read definition: {message}")]
    Format {
        /// Deserializer message
        message: String,
    },
}

/// Errors raised while evaluating a compiled expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    /// Wrong number of positional parameter values
    #[error("Expected {expected} parameter values, got {actual}")]
    ParameterCount {
        /// Number of parameters the expression declares
        expected: usize,
        /// Number of values supplied
        actual: usize,
    },

    /// A parameter value does not match the inferred parameter type
    #[error("Parameter '{name}' expects {expected}, got {actual}")]
    ParameterType {
        /// Parameter name
        name: String,
        /// Inferred type
        expected: String,
        /// Supplied value type
        actual: String,
    },

    /// The parameter registry was used before it was frozen
    #[error("Parameter '{name}' has no position; the registry is not frozen")]
    UnboundParameter {
        /// Parameter name
        name: String,
    },

    /// An operator received operands it cannot combine at runtime
    #[error("Operator '{operator}' cannot be applied to {operands}")]
    InvalidOperands {
        /// Operator symbol
        operator: String,
        /// Description of the operand types
        operands: String,
    },

    /// Integer arithmetic overflowed
    #[error("Arithmetic overflow in '{operator}'")]
    Overflow {
        /// Operator or function name
        operator: String,
    },

    /// Division or remainder by integer zero
    #[error("Division by zero in '{operator}'")]
    DivisionByZero {
        /// Operator symbol
        operator: String,
    },

    /// A function rejected its arguments at runtime
    #[error("Function '{name}' evaluation error: {message}")]
    Function {
        /// Function name
        name: String,
        /// Error message
        message: String,
    },
}

impl EvaluationError {
    /// Shorthand for a function evaluation error
    pub fn function(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Function {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Shorthand for an invalid operand combination
    pub fn invalid_operands(operator: impl Into<String>, operands: impl Into<String>) -> Self {
        Self::InvalidOperands {
            operator: operator.into(),
            operands: operands.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CompilationError::UnusedParameters {
            parameters: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Expression reduced to a constant but references parameters: a, b"
        );

        let err = EvaluationError::ParameterCount {
            expected: 2,
            actual: 1,
        };
        assert_eq!(err.to_string(), "Expected 2 parameter values, got 1");
    }

    #[test]
    fn test_definition_error_converts() {
        let err: CompilationError = DefinitionError::EmptyToken {
            name: "add".to_string(),
        }
        .into();
        assert!(matches!(err, CompilationError::Definition(_)));
    }
}
