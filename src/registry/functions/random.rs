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

//! Random number functions
//!
//! These are impure and never folded. They draw from the [`RandomSource`]
//! shared by every node of one compiled expression.

use super::{integer, number};
use crate::error::{DefinitionError, EvaluationError, EvaluationResult};
use crate::model::{TypeInfo, Value};
use crate::registry::function::{
    AritySpecificFunction, FunctionContext, FunctionRegistry, FunctionSignature, ParameterSpec,
    RandomSource, SpecialObjectKind,
};
use std::sync::LazyLock;

/// Register the random number functions
pub fn register_random_functions(registry: &mut FunctionRegistry) -> Result<(), DefinitionError> {
    registry.register_arity::<_, 0>(RandFunction)?;
    registry.register_arity::<_, 1>(RandomFunction)?;
    registry.register_arity::<_, 2>(RandomRangeFunction)?;
    registry.register_arity::<_, 2>(RandomIntFunction)?;
    Ok(())
}

fn source<'a>(function: &str, context: &FunctionContext<'a>) -> EvaluationResult<&'a RandomSource> {
    context
        .random()
        .ok_or_else(|| EvaluationError::function(function, "no random source available"))
}

/// rand() - uniform float in `[0, 1)`
pub struct RandFunction;

impl AritySpecificFunction<0> for RandFunction {
    fn name(&self) -> &str {
        "rand"
    }
    fn human_friendly_name(&self) -> &str {
        "Random"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("rand", vec![], TypeInfo::FLOAT));
        &SIG
    }
    fn is_pure(&self) -> bool {
        false
    }
    fn special_object(&self) -> Option<SpecialObjectKind> {
        Some(SpecialObjectKind::Random)
    }
    fn evaluate(&self, _args: [&Value; 0], context: &FunctionContext<'_>) -> EvaluationResult<Value> {
        Ok(Value::Float(source("rand", context)?.next_f64()))
    }
}

/// random(n) - uniform float in `[0, n)`
pub struct RandomFunction;

impl AritySpecificFunction<1> for RandomFunction {
    fn name(&self) -> &str {
        "random"
    }
    fn human_friendly_name(&self) -> &str {
        "Random"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new("random", vec![ParameterSpec::numeric("upper")], TypeInfo::FLOAT)
        });
        &SIG
    }
    fn is_pure(&self) -> bool {
        false
    }
    fn special_object(&self) -> Option<SpecialObjectKind> {
        Some(SpecialObjectKind::Random)
    }
    fn evaluate(&self, [upper]: [&Value; 1], context: &FunctionContext<'_>) -> EvaluationResult<Value> {
        let upper = number("random", upper)?;
        Ok(Value::Float(source("random", context)?.next_f64() * upper))
    }
}

/// random(a, b) - uniform float in `[a, b)`
pub struct RandomRangeFunction;

impl AritySpecificFunction<2> for RandomRangeFunction {
    fn name(&self) -> &str {
        "random"
    }
    fn human_friendly_name(&self) -> &str {
        "Random"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "random",
                vec![ParameterSpec::numeric("lower"), ParameterSpec::numeric("upper")],
                TypeInfo::FLOAT,
            )
        });
        &SIG
    }
    fn is_pure(&self) -> bool {
        false
    }
    fn special_object(&self) -> Option<SpecialObjectKind> {
        Some(SpecialObjectKind::Random)
    }
    fn evaluate(
        &self,
        [lower, upper]: [&Value; 2],
        context: &FunctionContext<'_>,
    ) -> EvaluationResult<Value> {
        let lower = number("random", lower)?;
        let upper = number("random", upper)?;
        let unit = source("random", context)?.next_f64();
        Ok(Value::Float(lower + unit * (upper - lower)))
    }
}

/// randomint(a, b) - uniform integer in `[a, b)`
pub struct RandomIntFunction;

impl AritySpecificFunction<2> for RandomIntFunction {
    fn name(&self) -> &str {
        "randomint"
    }
    fn human_friendly_name(&self) -> &str {
        "Random Integer"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "randomint",
                vec![ParameterSpec::integer("lower"), ParameterSpec::integer("upper")],
                TypeInfo::INTEGER,
            )
        });
        &SIG
    }
    fn documentation(&self) -> &str {
        "Returns a random integer in [lower, upper); an empty range yields lower."
    }
    fn is_pure(&self) -> bool {
        false
    }
    fn special_object(&self) -> Option<SpecialObjectKind> {
        Some(SpecialObjectKind::Random)
    }
    fn evaluate(
        &self,
        [lower, upper]: [&Value; 2],
        context: &FunctionContext<'_>,
    ) -> EvaluationResult<Value> {
        let lower = integer("randomint", lower)?;
        let upper = integer("randomint", upper)?;
        Ok(Value::Integer(source("randomint", context)?.next_i64(lower, upper)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::function::{ArityWrapper, MathFunction, SpecialObject};

    #[test]
    fn test_random_functions_need_a_source() {
        let rand = ArityWrapper::new(RandFunction);
        assert!(!rand.is_pure());
        assert!(rand.evaluate(&[], &FunctionContext::default()).is_err());

        let special = SpecialObject::Random(RandomSource::with_seed(42));
        let context = FunctionContext::new(Some(&special));
        let value = rand.evaluate(&[], &context).unwrap().as_f64().unwrap();
        assert!((0.0..1.0).contains(&value));
    }

    #[test]
    fn test_random_ranges() {
        let special = SpecialObject::Random(RandomSource::with_seed(1));
        let context = FunctionContext::new(Some(&special));
        let range = ArityWrapper::new(RandomRangeFunction);
        let int = ArityWrapper::new(RandomIntFunction);
        for _ in 0..100 {
            let value = range
                .evaluate(&[Value::from(5), Value::from(6)], &context)
                .unwrap()
                .as_f64()
                .unwrap();
            assert!((5.0..6.0).contains(&value));
            let value = int
                .evaluate(&[Value::from(-2), Value::from(2)], &context)
                .unwrap()
                .as_integer()
                .unwrap();
            assert!((-2..2).contains(&value));
        }
    }
}
