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

//! Built-in operators and functions evaluated through the engine

use octofhir_mathexpr::{EvaluationError, MathEngine, Value};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn evaluate(text: &str, values: &[Value]) -> Result<Value, EvaluationError> {
    let engine = MathEngine::new();
    let expression = engine
        .compile(text)
        .unwrap_or_else(|e| panic!("'{text}' failed to compile: {e}"));
    expression.evaluate(values)
}

#[rstest]
#[case("7 - 2 * 3", Value::from(1))]
#[case("10 - 4 - 3", Value::from(3))]
#[case("7 / 2", Value::from(3.5))]
#[case("7 % 3", Value::from(1))]
#[case("2 ^ 10", Value::from(1024.0))]
#[case("2 ^ 3 ^ 2", Value::from(512.0))]
#[case("-2 ^ 2", Value::from(4.0))]
#[case("1.5e3 + 1", Value::from(1501.0))]
#[case("0xFF & 0x0F", Value::from(15))]
#[case("12 & 10", Value::from(8))]
#[case("12 | 3", Value::from(15))]
#[case("12 # 10", Value::from(6))]
#[case("1 << 4", Value::from(16))]
#[case("256 >> 4", Value::from(16))]
#[case("true & !false", Value::from(true))]
#[case("true # true", Value::from(false))]
#[case("1 + 2 = 3", Value::from(true))]
#[case("1 + 2 != 3", Value::from(false))]
#[case("3 >= 4", Value::from(false))]
#[case("3 <= 4 & 2 < 1", Value::from(false))]
#[case("\"abc\" < \"abd\"", Value::from(true))]
#[case("\"a\" + true", Value::from("atrue"))]
#[case("true ? 1 : 2", Value::from(1))]
#[case("false ? 1 : 2 > 1 ? 3 : 4", Value::from(3))]
#[case("0b1010 + 0b0001", Value::from(vec![0x0A_u8, 0x01]))]
#[case("!0b1010", Value::from(vec![0xF5_u8]))]
fn test_operators(#[case] text: &str, #[case] expected: Value) {
    assert_eq!(evaluate(text, &[]), Ok(expected));
}

#[rstest]
#[case("sqrt(16)", Value::from(4.0))]
#[case("abs(-3)", Value::from(3))]
#[case("abs(-2.5)", Value::from(2.5))]
#[case("sign(-2.5)", Value::from(-1.0))]
#[case("floor(2.5)", Value::from(2.0))]
#[case("ceiling(2.5)", Value::from(3.0))]
#[case("round(2.5)", Value::from(3.0))]
#[case("round(1.2345, 2)", Value::from(1.23))]
#[case("trunc(-2.7)", Value::from(-2.0))]
#[case("exp(0)", Value::from(1.0))]
#[case("ln(1)", Value::from(0.0))]
#[case("min(3, 1.5)", Value::from(1.5))]
#[case("max(1, 2)", Value::from(2))]
#[case("MAX(1, 2)", Value::from(2))]
#[case("pow(2, 3)", Value::from(8.0))]
#[case("clamp(15, 0, 10)", Value::from(10))]
#[case("pi()", Value::from(std::f64::consts::PI))]
#[case("e()", Value::from(std::f64::consts::E))]
#[case("strlen(\"hello\")", Value::from(5))]
#[case("upper(\"abc\")", Value::from("ABC"))]
#[case("lower(\"ABC\")", Value::from("abc"))]
#[case("trim(\"  x  \")", Value::from("x"))]
#[case("substring(\"hello\", 1)", Value::from("ello"))]
#[case("substring(\"hello\", 1, 3)", Value::from("ell"))]
#[case("replace(\"a-b-c\", \"-\", \"+\")", Value::from("a+b+c"))]
#[case("max(strlen(\"ab\"), 1) * 2", Value::from(4))]
fn test_functions(#[case] text: &str, #[case] expected: Value) {
    assert_eq!(evaluate(text, &[]), Ok(expected));
}

#[test]
fn test_random_values_stay_in_range() {
    let engine = MathEngine::new();
    let expression = engine.compile("randomint(1, 6)").unwrap();
    assert!(!expression.is_constant());
    for _ in 0..50 {
        let value = expression.evaluate(&[]).unwrap();
        let value = value.as_integer().unwrap();
        assert!((1..6).contains(&value), "{value} out of range");
    }

    let expression = engine.compile("rand()").unwrap();
    for _ in 0..50 {
        let value = expression.evaluate(&[]).unwrap().as_f64().unwrap();
        assert!((0.0..1.0).contains(&value));
    }
}

#[test]
fn test_runtime_errors() {
    assert!(matches!(
        evaluate("a % b", &[Value::from(5), Value::from(0)]),
        Err(EvaluationError::DivisionByZero { .. })
    ));
    assert!(matches!(
        evaluate("a + 1", &[Value::from(i64::MAX)]),
        Err(EvaluationError::Overflow { .. })
    ));
    assert!(matches!(
        evaluate("substring(a, b)", &[Value::from("abc"), Value::from(-1)]),
        Err(EvaluationError::Function { .. })
    ));
}

#[test]
fn test_argument_checks() {
    assert_eq!(
        evaluate("a + b", &[Value::from(1)]),
        Err(EvaluationError::ParameterCount {
            expected: 2,
            actual: 1
        })
    );
    assert!(matches!(
        evaluate("strlen(a)", &[Value::from(1)]),
        Err(EvaluationError::ParameterType { .. })
    ));
}
