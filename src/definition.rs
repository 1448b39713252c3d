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

//! Syntax definition for the expression language
//!
//! Every token the compiler recognizes is configurable. The defaults give a
//! C-like syntax: `(a + b) * max(c, 2) >= 10 & !flag`.

use crate::error::DefinitionError;
use crate::tables::{PLACEHOLDER_CLOSE, PLACEHOLDER_OPEN};
use serde::{Deserialize, Serialize};

/// Token configuration consumed by the compiler
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct MathDefinition {
    /// Opening parenthesis
    pub left_parenthesis: String,
    /// Closing parenthesis
    pub right_parenthesis: String,
    /// Opening indicator for escaped parameter names (`[my name]`)
    pub special_symbol_open: String,
    /// Closing indicator for escaped parameter names
    pub special_symbol_close: String,
    /// String literal delimiter; doubling it inside a literal escapes it
    pub string_indicator: String,
    /// Function argument separator
    pub parameter_separator: String,

    /// Addition and concatenation
    pub add: String,
    /// Subtraction and unary negation
    pub subtract: String,
    /// Multiplication
    pub multiply: String,
    /// Division
    pub divide: String,
    /// Remainder
    pub modulo: String,
    /// Exponentiation
    pub power: String,
    /// Left shift
    pub left_shift: String,
    /// Right shift
    pub right_shift: String,
    /// Logical / bitwise and
    pub and: String,
    /// Logical / bitwise or
    pub or: String,
    /// Logical / bitwise exclusive or
    pub xor: String,
    /// Logical / bitwise not
    pub not: String,
    /// Equality
    pub equals: String,
    /// Inequality
    pub not_equals: String,
    /// Greater than
    pub greater_than: String,
    /// Greater than or equal
    pub greater_than_or_equal: String,
    /// Less than
    pub less_than: String,
    /// Less than or equal
    pub less_than_or_equal: String,
    /// Conditional operator, first token (`cond ? a : b`)
    pub conditional: String,
    /// Conditional operator, second token
    pub conditional_else: String,
}

impl Default for MathDefinition {
    fn default() -> Self {
        Self {
            left_parenthesis: "(".to_string(),
            right_parenthesis: ")".to_string(),
            special_symbol_open: "[".to_string(),
            special_symbol_close: "]".to_string(),
            string_indicator: "\"".to_string(),
            parameter_separator: ",".to_string(),
            add: "+".to_string(),
            subtract: "-".to_string(),
            multiply: "*".to_string(),
            divide: "/".to_string(),
            modulo: "%".to_string(),
            power: "^".to_string(),
            left_shift: "<<".to_string(),
            right_shift: ">>".to_string(),
            and: "&".to_string(),
            or: "|".to_string(),
            xor: "#".to_string(),
            not: "!".to_string(),
            equals: "=".to_string(),
            not_equals: "!=".to_string(),
            greater_than: ">".to_string(),
            greater_than_or_equal: ">=".to_string(),
            less_than: "<".to_string(),
            less_than_or_equal: "<=".to_string(),
            conditional: "?".to_string(),
            conditional_else: ":".to_string(),
        }
    }
}

impl MathDefinition {
    /// Load a definition from JSON; missing fields take their default
    pub fn from_json(json: &str) -> Result<Self, DefinitionError> {
        let definition: MathDefinition =
            serde_json::from_str(json).map_err(|e| DefinitionError::Format {
                message: e.to_string(),
            })?;
        definition.validate()?;
        Ok(definition)
    }

    /// Serialize this definition to pretty-printed JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Every token paired with its field name
    pub fn named_tokens(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("left_parenthesis", &self.left_parenthesis),
            ("right_parenthesis", &self.right_parenthesis),
            ("special_symbol_open", &self.special_symbol_open),
            ("special_symbol_close", &self.special_symbol_close),
            ("string_indicator", &self.string_indicator),
            ("parameter_separator", &self.parameter_separator),
            ("add", &self.add),
            ("subtract", &self.subtract),
            ("multiply", &self.multiply),
            ("divide", &self.divide),
            ("modulo", &self.modulo),
            ("power", &self.power),
            ("left_shift", &self.left_shift),
            ("right_shift", &self.right_shift),
            ("and", &self.and),
            ("or", &self.or),
            ("xor", &self.xor),
            ("not", &self.not),
            ("equals", &self.equals),
            ("not_equals", &self.not_equals),
            ("greater_than", &self.greater_than),
            ("greater_than_or_equal", &self.greater_than_or_equal),
            ("less_than", &self.less_than),
            ("less_than_or_equal", &self.less_than_or_equal),
            ("conditional", &self.conditional),
            ("conditional_else", &self.conditional_else),
        ]
    }

    /// Check that every token is usable and no two fields share a token
    pub fn validate(&self) -> Result<(), DefinitionError> {
        let tokens = self.named_tokens();

        for (name, token) in &tokens {
            if token.is_empty() {
                return Err(DefinitionError::EmptyToken {
                    name: name.to_string(),
                });
            }
            if token
                .chars()
                .any(|c| c.is_whitespace() || c == PLACEHOLDER_OPEN || c == PLACEHOLDER_CLOSE)
            {
                return Err(DefinitionError::ReservedCharacters {
                    name: name.to_string(),
                    token: token.to_string(),
                });
            }
        }

        for (i, (first, token)) in tokens.iter().enumerate() {
            if let Some((second, _)) = tokens[i + 1..].iter().find(|(_, other)| other == token) {
                return Err(DefinitionError::DuplicateToken {
                    token: token.to_string(),
                    first: first.to_string(),
                    second: second.to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_definition_is_valid() {
        assert!(MathDefinition::default().validate().is_ok());
    }

    #[test]
    fn test_duplicate_tokens_rejected() {
        let definition = MathDefinition {
            xor: "^".to_string(),
            ..MathDefinition::default()
        };
        assert_eq!(
            definition.validate(),
            Err(DefinitionError::DuplicateToken {
                token: "^".to_string(),
                first: "power".to_string(),
                second: "xor".to_string(),
            })
        );
    }

    #[test]
    fn test_empty_and_whitespace_tokens_rejected() {
        let definition = MathDefinition {
            add: String::new(),
            ..MathDefinition::default()
        };
        assert!(matches!(
            definition.validate(),
            Err(DefinitionError::EmptyToken { .. })
        ));

        let definition = MathDefinition {
            and: "a n d".to_string(),
            ..MathDefinition::default()
        };
        assert!(matches!(
            definition.validate(),
            Err(DefinitionError::ReservedCharacters { .. })
        ));
    }

    #[test]
    fn test_json_round_trip_with_partial_document() {
        let definition = MathDefinition::from_json(r#"{ "power": "**", "xor": "^" }"#).unwrap();
        assert_eq!(definition.power, "**");
        assert_eq!(definition.xor, "^");
        assert_eq!(definition.add, "+");

        assert!(matches!(
            MathDefinition::from_json("not json"),
            Err(DefinitionError::Format { .. })
        ));
    }
}
