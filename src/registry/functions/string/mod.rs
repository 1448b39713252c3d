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

//! String functions
//!
//! Lengths and positions count Unicode scalar values, not bytes.

use super::{integer, text};
use crate::error::{DefinitionError, EvaluationError, EvaluationResult};
use crate::model::{TypeInfo, Value};
use crate::registry::function::{
    AritySpecificFunction, FunctionContext, FunctionRegistry, FunctionSignature, ParameterSpec,
};
use std::sync::LazyLock;

/// Register all string functions
pub fn register_string_functions(registry: &mut FunctionRegistry) -> Result<(), DefinitionError> {
    registry.register_arity::<_, 1>(LengthFunction)?;
    registry.register_arity::<_, 1>(TrimFunction)?;
    registry.register_arity::<_, 1>(UpperFunction)?;
    registry.register_arity::<_, 1>(LowerFunction)?;
    registry.register_arity::<_, 2>(SubstringFunction)?;
    registry.register_arity::<_, 3>(SubstringLengthFunction)?;
    registry.register_arity::<_, 3>(ReplaceFunction)?;
    Ok(())
}

/// Characters of `value` from `start`, at most `length` of them
fn substring(value: &str, start: i64, length: Option<i64>) -> EvaluationResult<Value> {
    let start = usize::try_from(start)
        .map_err(|_| EvaluationError::function("substring", "start must not be negative"))?;
    let length = match length {
        Some(length) => Some(usize::try_from(length).map_err(|_| {
            EvaluationError::function("substring", "length must not be negative")
        })?),
        None => None,
    };
    let chars = value.chars().skip(start);
    let result: String = match length {
        Some(length) => chars.take(length).collect(),
        None => chars.collect(),
    };
    Ok(Value::from(result))
}

/// strlen(text) - number of characters
pub struct LengthFunction;

impl AritySpecificFunction<1> for LengthFunction {
    fn name(&self) -> &str {
        "strlen"
    }
    fn human_friendly_name(&self) -> &str {
        "String Length"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new("strlen", vec![ParameterSpec::string("text")], TypeInfo::INTEGER)
        });
        &SIG
    }
    fn documentation(&self) -> &str {
        "Returns the number of characters in the string."
    }
    fn evaluate(&self, [value]: [&Value; 1], _context: &FunctionContext<'_>) -> EvaluationResult<Value> {
        let count = text("strlen", value)?.chars().count();
        i64::try_from(count)
            .map(Value::Integer)
            .map_err(|_| EvaluationError::function("strlen", "length out of range"))
    }
}

/// trim(text)
pub struct TrimFunction;

impl AritySpecificFunction<1> for TrimFunction {
    fn name(&self) -> &str {
        "trim"
    }
    fn human_friendly_name(&self) -> &str {
        "Trim"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new("trim", vec![ParameterSpec::string("text")], TypeInfo::STRING)
        });
        &SIG
    }
    fn documentation(&self) -> &str {
        "Removes leading and trailing whitespace."
    }
    fn evaluate(&self, [value]: [&Value; 1], _context: &FunctionContext<'_>) -> EvaluationResult<Value> {
        Ok(Value::from(text("trim", value)?.trim()))
    }
}

/// upper(text)
pub struct UpperFunction;

impl AritySpecificFunction<1> for UpperFunction {
    fn name(&self) -> &str {
        "upper"
    }
    fn human_friendly_name(&self) -> &str {
        "Upper Case"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new("upper", vec![ParameterSpec::string("text")], TypeInfo::STRING)
        });
        &SIG
    }
    fn evaluate(&self, [value]: [&Value; 1], _context: &FunctionContext<'_>) -> EvaluationResult<Value> {
        Ok(Value::from(text("upper", value)?.to_uppercase()))
    }
}

/// lower(text)
pub struct LowerFunction;

impl AritySpecificFunction<1> for LowerFunction {
    fn name(&self) -> &str {
        "lower"
    }
    fn human_friendly_name(&self) -> &str {
        "Lower Case"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new("lower", vec![ParameterSpec::string("text")], TypeInfo::STRING)
        });
        &SIG
    }
    fn evaluate(&self, [value]: [&Value; 1], _context: &FunctionContext<'_>) -> EvaluationResult<Value> {
        Ok(Value::from(text("lower", value)?.to_lowercase()))
    }
}

/// substring(text, start)
pub struct SubstringFunction;

impl AritySpecificFunction<2> for SubstringFunction {
    fn name(&self) -> &str {
        "substring"
    }
    fn human_friendly_name(&self) -> &str {
        "Substring"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "substring",
                vec![ParameterSpec::string("text"), ParameterSpec::integer("start")],
                TypeInfo::STRING,
            )
        });
        &SIG
    }
    fn documentation(&self) -> &str {
        "Returns the characters from the zero-based start position to the end. \
         A start past the end yields an empty string."
    }
    fn evaluate(
        &self,
        [value, start]: [&Value; 2],
        _context: &FunctionContext<'_>,
    ) -> EvaluationResult<Value> {
        substring(text("substring", value)?, integer("substring", start)?, None)
    }
}

/// substring(text, start, length)
pub struct SubstringLengthFunction;

impl AritySpecificFunction<3> for SubstringLengthFunction {
    fn name(&self) -> &str {
        "substring"
    }
    fn human_friendly_name(&self) -> &str {
        "Substring"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "substring",
                vec![
                    ParameterSpec::string("text"),
                    ParameterSpec::integer("start"),
                    ParameterSpec::integer("length"),
                ],
                TypeInfo::STRING,
            )
        });
        &SIG
    }
    fn documentation(&self) -> &str {
        "Returns at most `length` characters from the zero-based start position."
    }
    fn evaluate(
        &self,
        [value, start, length]: [&Value; 3],
        _context: &FunctionContext<'_>,
    ) -> EvaluationResult<Value> {
        substring(
            text("substring", value)?,
            integer("substring", start)?,
            Some(integer("substring", length)?),
        )
    }
}

/// replace(text, find, with)
pub struct ReplaceFunction;

impl AritySpecificFunction<3> for ReplaceFunction {
    fn name(&self) -> &str {
        "replace"
    }
    fn human_friendly_name(&self) -> &str {
        "Replace"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "replace",
                vec![
                    ParameterSpec::string("text"),
                    ParameterSpec::string("find"),
                    ParameterSpec::string("with"),
                ],
                TypeInfo::STRING,
            )
        });
        &SIG
    }
    fn documentation(&self) -> &str {
        "Replaces every occurrence of `find`; an empty `find` leaves the text unchanged."
    }
    fn evaluate(
        &self,
        [value, find, with]: [&Value; 3],
        _context: &FunctionContext<'_>,
    ) -> EvaluationResult<Value> {
        let value = text("replace", value)?;
        let find = text("replace", find)?;
        if find.is_empty() {
            return Ok(Value::from(value));
        }
        Ok(Value::from(value.replace(find, text("replace", with)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::function::{ArityWrapper, MathFunction};

    fn call(function: &dyn MathFunction, args: &[Value]) -> EvaluationResult<Value> {
        function.evaluate(args, &FunctionContext::default())
    }

    #[test]
    fn test_length_counts_characters() {
        let strlen = ArityWrapper::new(LengthFunction);
        assert_eq!(call(&strlen, &[Value::from("héllo")]), Ok(Value::from(5)));
        assert_eq!(strlen.return_type(&[TypeInfo::INTEGER]), None);
    }

    #[test]
    fn test_substring() {
        let from = ArityWrapper::new(SubstringFunction);
        let slice = ArityWrapper::new(SubstringLengthFunction);
        assert_eq!(
            call(&from, &[Value::from("expression"), Value::from(2)]),
            Ok(Value::from("pression"))
        );
        assert_eq!(
            call(&slice, &[Value::from("expression"), Value::from(2), Value::from(3)]),
            Ok(Value::from("pre"))
        );
        assert_eq!(
            call(&from, &[Value::from("abc"), Value::from(10)]),
            Ok(Value::from(""))
        );
        assert!(call(&from, &[Value::from("abc"), Value::from(-1)]).is_err());
        assert_eq!(
            from.return_type(&[TypeInfo::STRING, TypeInfo::FLOAT]),
            None
        );
    }

    #[test]
    fn test_case_trim_and_replace() {
        assert_eq!(
            call(&ArityWrapper::new(UpperFunction), &[Value::from("abc")]),
            Ok(Value::from("ABC"))
        );
        assert_eq!(
            call(&ArityWrapper::new(TrimFunction), &[Value::from("  x ")]),
            Ok(Value::from("x"))
        );
        let replace = ArityWrapper::new(ReplaceFunction);
        assert_eq!(
            call(&replace, &[Value::from("a-b-c"), Value::from("-"), Value::from("+")]),
            Ok(Value::from("a+b+c"))
        );
        assert_eq!(
            call(&replace, &[Value::from("abc"), Value::from(""), Value::from("+")]),
            Ok(Value::from("abc"))
        );
    }
}
