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

//! Mathematical functions

use super::{integer, number};
use crate::error::{DefinitionError, EvaluationError, EvaluationResult};
use crate::model::{TypeInfo, Value};
use crate::registry::function::{
    AritySpecificFunction, FunctionContext, FunctionRegistry, FunctionSignature, ParameterSpec,
    promoted,
};
use crate::registry::operators::NumericPair;
use std::sync::LazyLock;

/// Implement a one-argument function over floats returning a float
macro_rules! float_function {
    ($struct_name:ident, $name:literal, $friendly:literal, $doc:literal, |$x:ident| $body:expr) => {
        #[doc = $doc]
        pub struct $struct_name;

        impl AritySpecificFunction<1> for $struct_name {
            fn name(&self) -> &str {
                $name
            }
            fn human_friendly_name(&self) -> &str {
                $friendly
            }
            fn signature(&self) -> &FunctionSignature {
                static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
                    FunctionSignature::new(
                        $name,
                        vec![ParameterSpec::numeric("value")],
                        TypeInfo::FLOAT,
                    )
                });
                &SIG
            }
            fn documentation(&self) -> &str {
                $doc
            }
            fn evaluate(
                &self,
                [value]: [&Value; 1],
                _context: &FunctionContext<'_>,
            ) -> EvaluationResult<Value> {
                let $x = number($name, value)?;
                Ok(Value::Float($body))
            }
        }
    };
}

/// Implement a one-argument function that keeps integers integral
macro_rules! integral_function {
    (
        $struct_name:ident, $name:literal, $friendly:literal, $doc:literal,
        int |$i:ident| $int_body:expr,
        float |$f:ident| $float_body:expr
    ) => {
        #[doc = $doc]
        pub struct $struct_name;

        impl AritySpecificFunction<1> for $struct_name {
            fn name(&self) -> &str {
                $name
            }
            fn human_friendly_name(&self) -> &str {
                $friendly
            }
            fn signature(&self) -> &FunctionSignature {
                static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
                    FunctionSignature::new(
                        $name,
                        vec![ParameterSpec::numeric("value")],
                        TypeInfo::NUMERIC,
                    )
                });
                &SIG
            }
            fn return_type(&self, [value]: &[TypeInfo; 1]) -> Option<TypeInfo> {
                value.is_numeric().then_some(*value)
            }
            fn documentation(&self) -> &str {
                $doc
            }
            fn evaluate(
                &self,
                [value]: [&Value; 1],
                _context: &FunctionContext<'_>,
            ) -> EvaluationResult<Value> {
                match value {
                    Value::Integer($i) => {
                        let $i = *$i;
                        $int_body
                    }
                    Value::Float($f) => {
                        let $f = *$f;
                        Ok(Value::Float($float_body))
                    }
                    other => Err(EvaluationError::function(
                        $name,
                        format!("expected a number, got {}", other.type_name()),
                    )),
                }
            }
        }
    };
}

float_function!(SqrtFunction, "sqrt", "Square Root", "Returns the square root of the value.", |x| x.sqrt());
float_function!(CbrtFunction, "cbrt", "Cube Root", "Returns the cube root of the value.", |x| x.cbrt());
float_function!(SinFunction, "sin", "Sine", "Returns the sine of an angle in radians.", |x| x.sin());
float_function!(CosFunction, "cos", "Cosine", "Returns the cosine of an angle in radians.", |x| x.cos());
float_function!(TanFunction, "tan", "Tangent", "Returns the tangent of an angle in radians.", |x| x.tan());
float_function!(AsinFunction, "asin", "Arcsine", "Returns the arcsine in radians.", |x| x.asin());
float_function!(AcosFunction, "acos", "Arccosine", "Returns the arccosine in radians.", |x| x.acos());
float_function!(AtanFunction, "atan", "Arctangent", "Returns the arctangent in radians.", |x| x.atan());
float_function!(SinhFunction, "sinh", "Hyperbolic Sine", "Returns the hyperbolic sine.", |x| x.sinh());
float_function!(CoshFunction, "cosh", "Hyperbolic Cosine", "Returns the hyperbolic cosine.", |x| x.cosh());
float_function!(TanhFunction, "tanh", "Hyperbolic Tangent", "Returns the hyperbolic tangent.", |x| x.tanh());
float_function!(ExpFunction, "exp", "Exponential", "Returns e raised to the value.", |x| x.exp());
float_function!(LnFunction, "ln", "Natural Logarithm", "Returns the natural logarithm of the value.", |x| x.ln());
float_function!(LogFunction, "log", "Logarithm", "Returns the natural logarithm of the value.", |x| x.ln());
float_function!(Log10Function, "log10", "Base-10 Logarithm", "Returns the base-10 logarithm of the value.", |x| x.log10());

integral_function!(
    AbsFunction, "abs", "Absolute Value", "Returns the absolute value of the input.",
    int |i| i.checked_abs().map(Value::Integer).ok_or_else(|| EvaluationError::function("abs", "integer overflow")),
    float |f| f.abs()
);
integral_function!(
    SignFunction, "sign", "Sign", "Returns -1, 0 or 1 according to the sign of the input.",
    int |i| Ok(Value::Integer(i.signum())),
    float |f| if f > 0.0 { 1.0 } else if f < 0.0 { -1.0 } else { f }
);
integral_function!(
    FloorFunction, "floor", "Floor", "Returns the largest integral value not above the input.",
    int |i| Ok(Value::Integer(i)),
    float |f| f.floor()
);
integral_function!(
    CeilingFunction, "ceiling", "Ceiling", "Returns the smallest integral value not below the input.",
    int |i| Ok(Value::Integer(i)),
    float |f| f.ceil()
);
integral_function!(
    RoundFunction, "round", "Round", "Rounds to the nearest integral value, halves away from zero.",
    int |i| Ok(Value::Integer(i)),
    float |f| f.round()
);
integral_function!(
    TruncateFunction, "trunc", "Truncate", "Drops the fractional part of the input.",
    int |i| Ok(Value::Integer(i)),
    float |f| f.trunc()
);

/// Register all math functions
pub fn register_math_functions(registry: &mut FunctionRegistry) -> Result<(), DefinitionError> {
    registry.register_arity::<_, 1>(SqrtFunction)?;
    registry.register_arity::<_, 1>(CbrtFunction)?;
    registry.register_arity::<_, 1>(SinFunction)?;
    registry.register_arity::<_, 1>(CosFunction)?;
    registry.register_arity::<_, 1>(TanFunction)?;
    registry.register_arity::<_, 1>(AsinFunction)?;
    registry.register_arity::<_, 1>(AcosFunction)?;
    registry.register_arity::<_, 1>(AtanFunction)?;
    registry.register_arity::<_, 1>(SinhFunction)?;
    registry.register_arity::<_, 1>(CoshFunction)?;
    registry.register_arity::<_, 1>(TanhFunction)?;
    registry.register_arity::<_, 1>(ExpFunction)?;
    registry.register_arity::<_, 1>(LnFunction)?;
    registry.register_arity::<_, 1>(LogFunction)?;
    registry.register_arity::<_, 1>(Log10Function)?;
    registry.register_arity::<_, 1>(AbsFunction)?;
    registry.register_arity::<_, 1>(SignFunction)?;
    registry.register_arity::<_, 1>(FloorFunction)?;
    registry.register_arity::<_, 1>(CeilingFunction)?;
    registry.register_arity::<_, 1>(RoundFunction)?;
    registry.register_arity::<_, 1>(TruncateFunction)?;
    registry.register_arity::<_, 2>(ExtremumFunction::min())?;
    registry.register_arity::<_, 2>(ExtremumFunction::max())?;
    registry.register_arity::<_, 2>(PowerFunction)?;
    registry.register_arity::<_, 2>(LogBaseFunction)?;
    registry.register_arity::<_, 2>(RoundDigitsFunction)?;
    registry.register_arity::<_, 3>(ClampFunction)?;
    Ok(())
}

/// Which extreme [`ExtremumFunction`] selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extremum {
    Min,
    Max,
}

/// min(a, b) and max(a, b)
pub struct ExtremumFunction {
    extremum: Extremum,
    signature: FunctionSignature,
}

impl ExtremumFunction {
    /// The `min` function
    pub fn min() -> Self {
        Self::with(Extremum::Min)
    }

    /// The `max` function
    pub fn max() -> Self {
        Self::with(Extremum::Max)
    }

    fn with(extremum: Extremum) -> Self {
        let name = match extremum {
            Extremum::Min => "min",
            Extremum::Max => "max",
        };
        Self {
            extremum,
            signature: FunctionSignature::new(
                name,
                vec![ParameterSpec::numeric("left"), ParameterSpec::numeric("right")],
                TypeInfo::NUMERIC,
            ),
        }
    }
}

impl AritySpecificFunction<2> for ExtremumFunction {
    fn name(&self) -> &str {
        &self.signature.name
    }
    fn human_friendly_name(&self) -> &str {
        match self.extremum {
            Extremum::Min => "Minimum",
            Extremum::Max => "Maximum",
        }
    }
    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }
    fn return_type(&self, arguments: &[TypeInfo; 2]) -> Option<TypeInfo> {
        self.signature.accepts(arguments).then(|| promoted(arguments))
    }
    fn documentation(&self) -> &str {
        match self.extremum {
            Extremum::Min => "Returns the smaller of two numbers.",
            Extremum::Max => "Returns the larger of two numbers.",
        }
    }
    fn evaluate(
        &self,
        [left, right]: [&Value; 2],
        _context: &FunctionContext<'_>,
    ) -> EvaluationResult<Value> {
        let pick_left = |ordering: Option<std::cmp::Ordering>| match (self.extremum, ordering) {
            (Extremum::Min, Some(std::cmp::Ordering::Greater)) => false,
            (Extremum::Max, Some(std::cmp::Ordering::Less)) => false,
            _ => true,
        };
        match NumericPair::of(self.name(), left, right)? {
            NumericPair::Integers(l, r) => Ok(Value::Integer(if pick_left(Some(l.cmp(&r))) {
                l
            } else {
                r
            })),
            NumericPair::Floats(l, r) => Ok(Value::Float(if pick_left(l.partial_cmp(&r)) {
                l
            } else {
                r
            })),
        }
    }
}

/// pow(base, exponent)
pub struct PowerFunction;

impl AritySpecificFunction<2> for PowerFunction {
    fn name(&self) -> &str {
        "pow"
    }
    fn human_friendly_name(&self) -> &str {
        "Power"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "pow",
                vec![ParameterSpec::numeric("base"), ParameterSpec::numeric("exponent")],
                TypeInfo::FLOAT,
            )
        });
        &SIG
    }
    fn documentation(&self) -> &str {
        "Raises the base to the exponent."
    }
    fn evaluate(
        &self,
        [base, exponent]: [&Value; 2],
        _context: &FunctionContext<'_>,
    ) -> EvaluationResult<Value> {
        Ok(Value::Float(
            number("pow", base)?.powf(number("pow", exponent)?),
        ))
    }
}

/// log(value, base)
pub struct LogBaseFunction;

impl AritySpecificFunction<2> for LogBaseFunction {
    fn name(&self) -> &str {
        "log"
    }
    fn human_friendly_name(&self) -> &str {
        "Logarithm"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "log",
                vec![ParameterSpec::numeric("value"), ParameterSpec::numeric("base")],
                TypeInfo::FLOAT,
            )
        });
        &SIG
    }
    fn documentation(&self) -> &str {
        "Returns the logarithm of the value in the given base."
    }
    fn evaluate(
        &self,
        [value, base]: [&Value; 2],
        _context: &FunctionContext<'_>,
    ) -> EvaluationResult<Value> {
        Ok(Value::Float(number("log", value)?.log(number("log", base)?)))
    }
}

/// round(value, digits)
pub struct RoundDigitsFunction;

impl AritySpecificFunction<2> for RoundDigitsFunction {
    fn name(&self) -> &str {
        "round"
    }
    fn human_friendly_name(&self) -> &str {
        "Round"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "round",
                vec![ParameterSpec::numeric("value"), ParameterSpec::integer("digits")],
                TypeInfo::FLOAT,
            )
        });
        &SIG
    }
    fn documentation(&self) -> &str {
        "Rounds the value to the given number of decimal digits."
    }
    fn evaluate(
        &self,
        [value, digits]: [&Value; 2],
        _context: &FunctionContext<'_>,
    ) -> EvaluationResult<Value> {
        let value = number("round", value)?;
        let digits = integer("round", digits)?;
        let digits = i32::try_from(digits)
            .map_err(|_| EvaluationError::function("round", "digit count out of range"))?;
        let scale = 10f64.powi(digits);
        Ok(Value::Float((value * scale).round() / scale))
    }
}

/// clamp(value, min, max)
pub struct ClampFunction;

impl AritySpecificFunction<3> for ClampFunction {
    fn name(&self) -> &str {
        "clamp"
    }
    fn human_friendly_name(&self) -> &str {
        "Clamp"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "clamp",
                vec![
                    ParameterSpec::numeric("value"),
                    ParameterSpec::numeric("min"),
                    ParameterSpec::numeric("max"),
                ],
                TypeInfo::NUMERIC,
            )
        });
        &SIG
    }
    fn return_type(&self, arguments: &[TypeInfo; 3]) -> Option<TypeInfo> {
        self.signature().accepts(arguments).then(|| promoted(arguments))
    }
    fn documentation(&self) -> &str {
        "Restricts the value to the range [min, max]."
    }
    fn evaluate(
        &self,
        [value, min, max]: [&Value; 3],
        _context: &FunctionContext<'_>,
    ) -> EvaluationResult<Value> {
        match (value, min, max) {
            (Value::Integer(v), Value::Integer(lo), Value::Integer(hi)) => {
                if lo > hi {
                    return Err(EvaluationError::function("clamp", "min is greater than max"));
                }
                Ok(Value::Integer((*v).clamp(*lo, *hi)))
            }
            _ => {
                let (v, lo, hi) = (
                    number("clamp", value)?,
                    number("clamp", min)?,
                    number("clamp", max)?,
                );
                if lo > hi || lo.is_nan() || hi.is_nan() {
                    return Err(EvaluationError::function("clamp", "invalid range"));
                }
                Ok(Value::Float(v.clamp(lo, hi)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::function::MathFunction;

    fn call(function: &dyn MathFunction, args: &[Value]) -> EvaluationResult<Value> {
        function.evaluate(args, &FunctionContext::default())
    }

    #[test]
    fn test_float_functions() {
        let registry = {
            let mut registry = FunctionRegistry::new();
            register_math_functions(&mut registry).unwrap();
            registry
        };
        let sqrt = registry.get("sqrt", 1).unwrap();
        assert_eq!(call(sqrt.as_ref(), &[Value::from(9)]), Ok(Value::from(3.0)));
        assert_eq!(sqrt.return_type(&[TypeInfo::INTEGER]), Some(TypeInfo::FLOAT));

        let log = registry.get("log", 2).unwrap();
        assert_eq!(
            call(log.as_ref(), &[Value::from(8), Value::from(2)]),
            Ok(Value::from(3.0))
        );
    }

    #[test]
    fn test_integral_functions_keep_integers() {
        let abs = crate::registry::function::ArityWrapper::new(AbsFunction);
        assert_eq!(call(&abs, &[Value::from(-3)]), Ok(Value::from(3)));
        assert_eq!(call(&abs, &[Value::from(-2.5)]), Ok(Value::from(2.5)));
        assert_eq!(abs.return_type(&[TypeInfo::INTEGER]), Some(TypeInfo::INTEGER));
        assert!(call(&abs, &[Value::from(i64::MIN)]).is_err());

        let round = crate::registry::function::ArityWrapper::new(RoundFunction);
        assert_eq!(call(&round, &[Value::from(2.5)]), Ok(Value::from(3.0)));

        let sign = crate::registry::function::ArityWrapper::new(SignFunction);
        assert_eq!(call(&sign, &[Value::from(-0.5)]), Ok(Value::from(-1.0)));
    }

    #[test]
    fn test_min_max_and_clamp() {
        let max = crate::registry::function::ArityWrapper::new(ExtremumFunction::max());
        assert_eq!(call(&max, &[Value::from(1), Value::from(2)]), Ok(Value::from(2)));
        assert_eq!(
            max.return_type(&[TypeInfo::INTEGER, TypeInfo::FLOAT]),
            Some(TypeInfo::FLOAT)
        );
        let min = crate::registry::function::ArityWrapper::new(ExtremumFunction::min());
        assert_eq!(
            call(&min, &[Value::from(1), Value::from(0.5)]),
            Ok(Value::from(0.5))
        );

        let clamp = crate::registry::function::ArityWrapper::new(ClampFunction);
        assert_eq!(
            call(&clamp, &[Value::from(12), Value::from(0), Value::from(10)]),
            Ok(Value::from(10))
        );
        assert!(call(&clamp, &[Value::from(1), Value::from(5), Value::from(0)]).is_err());
    }

    #[test]
    fn test_round_to_digits() {
        let round = crate::registry::function::ArityWrapper::new(RoundDigitsFunction);
        assert_eq!(
            call(&round, &[Value::from(3.14159), Value::from(2)]),
            Ok(Value::from(3.14))
        );
        assert_eq!(round.return_type(&[TypeInfo::FLOAT, TypeInfo::FLOAT]), None);
    }
}
