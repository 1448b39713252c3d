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

//! Integration tests for expression compilation

use octofhir_mathexpr::nodes::{CompileMode, Node};
use octofhir_mathexpr::registry::{
    AritySpecificFunction, FunctionContext, FunctionSignature, ParameterSpec,
};
use octofhir_mathexpr::*;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

/// `halt(x)` returns `x` and cancels the token as a side effect of being folded
struct HaltFunction {
    token: CancellationToken,
}

impl AritySpecificFunction<1> for HaltFunction {
    fn name(&self) -> &str {
        "halt"
    }
    fn human_friendly_name(&self) -> &str {
        "Halt"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "halt",
                vec![ParameterSpec::numeric("value")],
                TypeInfo::NUMERIC,
            )
        });
        &SIG
    }
    fn evaluate(
        &self,
        [value]: [&Value; 1],
        _context: &FunctionContext<'_>,
    ) -> EvaluationResult<Value> {
        self.token.cancel();
        Ok(value.clone())
    }
}

fn names(expression: &CompiledExpression) -> Vec<&str> {
    expression
        .parameters()
        .iter()
        .map(|parameter| parameter.name.as_str())
        .collect()
}

#[test]
fn test_constant_expression_folds() {
    let engine = MathEngine::new();
    let expression = engine.compile("2 + 3 * 4").unwrap();
    assert!(expression.is_constant());
    assert_eq!(expression.return_type(), TypeInfo::INTEGER);
    assert_eq!(expression.evaluate(&[]), Ok(Value::from(14)));
}

#[test]
fn test_simplification_is_idempotent() {
    let engine = MathEngine::new();
    let expression = engine.compile("(1 + 2) * a").unwrap();
    let root = expression.root();
    let simplified = root.simplify();
    assert!(Arc::ptr_eq(root, &simplified));
    assert!(Arc::ptr_eq(&simplified, &simplified.simplify()));
}

#[rstest]
#[case("b + a", vec!["b", "a"])]
#[case("a + b", vec!["a", "b"])]
#[case("max(z, y) - z * x", vec!["z", "y", "x"])]
#[case("[second item] + first", vec!["second item", "first"])]
fn test_parameter_order_follows_first_appearance(#[case] text: &str, #[case] expected: Vec<&str>) {
    let engine = MathEngine::new();
    let expression = engine.compile(text).unwrap();
    assert_eq!(names(&expression), expected);
}

#[rstest]
#[case("max(1)")]
#[case("max(1, 2, 3)")]
#[case("max(1, ,2)")]
#[case("unknown(1)")]
fn test_function_arity_is_enforced(#[case] text: &str) {
    let engine = MathEngine::new();
    assert!(matches!(
        engine.compile(text),
        Err(CompilationError::Unresolvable { .. })
    ));
}

#[test]
fn test_max_with_two_arguments() {
    let engine = MathEngine::new();
    let expression = engine.compile("max(1, 2)").unwrap();
    assert_eq!(expression.evaluate(&[]), Ok(Value::from(2)));
}

#[test]
fn test_duplicate_sub_expressions_share_a_node() {
    let engine = MathEngine::new();
    let expression = engine.compile("(a+b)*(a+b)").unwrap();
    let Node::Binary(product) = expression.root().as_ref() else {
        panic!("expected a binary root, got {expression}");
    };
    assert!(Arc::ptr_eq(product.left(), product.right()));
    assert_eq!(
        expression.evaluate(&[Value::from(2), Value::from(3)]),
        Ok(Value::from(25))
    );
}

#[test]
fn test_cancellation_before_resolution_fails() {
    let engine = MathEngine::new();
    let token = CancellationToken::new();
    token.cancel();
    assert_eq!(
        engine.compile_with_cancellation("a + b", &token).err(),
        Some(CompilationError::Unresolvable {
            expression: "a + b".to_string()
        })
    );
}

#[test]
fn test_cancellation_during_resolution_fails() {
    let token = CancellationToken::new();
    let mut functions = FunctionRegistry::standard();
    functions
        .register_arity::<_, 1>(HaltFunction {
            token: token.clone(),
        })
        .unwrap();
    let engine = MathEngine::with_registries(
        EngineConfig::default(),
        OperatorRegistry::standard(&MathDefinition::default()),
        functions,
    )
    .unwrap();

    assert_eq!(
        engine.compile_with_cancellation("halt(1) + a * b", &token).err(),
        Some(CompilationError::Unresolvable {
            expression: "halt(1) + a * b".to_string()
        })
    );
    assert!(token.is_cancelled());
    assert_eq!(engine.cache_stats().entries, 0);
}

#[test]
fn test_malformed_chain_fails_quickly() {
    let engine = MathEngine::new();
    let text = format!("{} - 0b1", vec!["a"; 60].join(" - "));
    let started = Instant::now();
    assert!(matches!(
        engine.compile(&text),
        Err(CompilationError::Unresolvable { .. })
    ));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_chain_beyond_depth_limit_fails_quickly() {
    let engine = MathEngine::new();
    let text = vec!["a"; 400].join(" + ");
    let started = Instant::now();
    assert!(matches!(
        engine.compile(&text),
        Err(CompilationError::Unresolvable { .. })
    ));
    assert!(started.elapsed() < Duration::from_secs(10));

    let text = vec!["a"; 100].join(" + ");
    let expression = engine.compile(&text).unwrap();
    assert_eq!(expression.evaluate(&[Value::from(2)]), Ok(Value::from(200)));
}

#[test]
fn test_exact_and_tolerant_are_cached_independently() {
    let engine = MathEngine::new();
    let expression = engine.compile("a = 10").unwrap();
    let tolerance = Tolerance::range(0.1);

    assert_eq!(expression.evaluate(&[Value::from(10.05)]), Ok(Value::from(false)));
    assert_eq!(
        expression.evaluate_with_tolerance(&[Value::from(10.05)], &tolerance),
        Ok(Value::from(true))
    );

    let root = expression.root();
    let exact = root.compile(CompileMode::Exact);
    let tolerant = root.compile(CompileMode::Tolerant);
    assert!(!Arc::ptr_eq(&exact, &tolerant));
    assert!(Arc::ptr_eq(&exact, &root.compile(CompileMode::Exact)));
    assert!(Arc::ptr_eq(&tolerant, &root.compile(CompileMode::Tolerant)));
}

#[rstest]
#[case("\"text\" + 0b1010")]
#[case("true - 1")]
#[case("\"a\" < 1")]
#[case("1 ? 2 : 3")]
#[case("(1 + 2")]
#[case("1 + 2)")]
#[case("a +")]
fn test_invalid_expressions_fail_to_compile(#[case] text: &str) {
    let engine = MathEngine::new();
    assert!(matches!(
        engine.compile(text),
        Err(CompilationError::Unresolvable { .. })
    ));
}

#[test]
fn test_parameter_types_are_inferred() {
    let engine = MathEngine::new();
    let expression = engine.compile("strlen(name) + count << 1 > 3 & flag").unwrap();
    let parameters: Vec<(String, TypeInfo)> = expression
        .parameters()
        .iter()
        .map(|parameter| (parameter.name.clone(), parameter.type_info))
        .collect();
    assert_eq!(
        parameters,
        vec![
            ("name".to_string(), TypeInfo::STRING),
            ("count".to_string(), TypeInfo::NUMERIC),
            ("flag".to_string(), TypeInfo::BOOLEAN),
        ]
    );
    assert_eq!(expression.return_type(), TypeInfo::BOOLEAN);
    assert_eq!(
        expression.evaluate(&[Value::from("abc"), Value::from(1), Value::from(true)]),
        Ok(Value::from(true))
    );
}

#[test]
fn test_unused_parameters_default_to_numeric() {
    let engine = MathEngine::new();
    let expression = engine.compile("a").unwrap();
    assert_eq!(expression.parameters()[0].type_info, TypeInfo::NUMERIC);
    assert_eq!(expression.evaluate(&[Value::from(2.5)]), Ok(Value::from(2.5)));
}

#[test]
fn test_custom_definition() {
    let definition = MathDefinition::from_json(
        r#"{ "and": "and", "or": "or", "not": "not", "power": "**", "xor": "^", "string_indicator": "'" }"#,
    )
    .unwrap();
    let engine = MathEngine::with_config(EngineConfig {
        definition,
        ..EngineConfig::default()
    })
    .unwrap();

    let expression = engine.compile("2 ** 3 > 7 and not band").unwrap();
    assert_eq!(names(&expression), vec!["band"]);
    assert_eq!(expression.evaluate(&[Value::from(false)]), Ok(Value::from(true)));

    let expression = engine.compile("'it''s' + 1").unwrap();
    assert_eq!(expression.evaluate(&[]), Ok(Value::from("it's1")));
}

#[test]
fn test_deep_clone_has_fresh_caches() {
    let engine = MathEngine::new();
    let expression = engine.compile("a * 2 > b").unwrap();
    let values = [Value::from(3), Value::from(5)];
    assert_eq!(expression.evaluate(&values), Ok(Value::from(true)));

    let copy = expression.deep_clone().unwrap();
    assert!(!Arc::ptr_eq(expression.root(), copy.root()));
    assert!(!Arc::ptr_eq(
        &expression.root().compile(CompileMode::Exact),
        &copy.root().compile(CompileMode::Exact)
    ));
    assert_eq!(copy.evaluate(&values), Ok(Value::from(true)));
    assert_eq!(copy.to_string(), expression.to_string());
}
