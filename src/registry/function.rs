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

//! Function registry and function traits
//!
//! Functions are looked up by `(name, arity)`; the same name may be
//! registered once per arity. Names match case-insensitively.

use crate::error::{DefinitionError, EvaluationError, EvaluationResult};
use crate::model::{NumericKind, SupportedValueTypes, TypeInfo, Value};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Largest number of arguments a function may take
pub const MAX_ARITY: usize = 3;

/// One declared function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    /// Parameter name, for documentation
    pub name: String,
    /// Types the argument may take
    pub types: SupportedValueTypes,
    /// Whether a numeric argument must be an integer
    pub integer: bool,
}

impl ParameterSpec {
    /// A numeric parameter
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: SupportedValueTypes::NUMERIC,
            integer: false,
        }
    }

    /// An integer parameter
    pub fn integer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: SupportedValueTypes::NUMERIC,
            integer: true,
        }
    }

    /// A string parameter
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: SupportedValueTypes::STRING,
            integer: false,
        }
    }

    /// Whether an argument of the given type fits this parameter
    pub fn accepts(&self, type_info: TypeInfo) -> bool {
        self.types.supports(type_info.value_type)
            && !(self.integer && type_info.numeric == NumericKind::Float)
    }
}

/// Declared shape of a function
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    /// Function name
    pub name: String,
    /// Parameters in order
    pub parameters: Vec<ParameterSpec>,
    /// Return type when it does not depend on the argument types
    pub return_type: TypeInfo,
}

impl FunctionSignature {
    /// Create a new signature
    pub fn new(
        name: impl Into<String>,
        parameters: Vec<ParameterSpec>,
        return_type: TypeInfo,
    ) -> Self {
        Self {
            name: name.into(),
            parameters,
            return_type,
        }
    }

    /// Number of parameters
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Whether the argument types fit the declared parameters
    pub fn accepts(&self, arguments: &[TypeInfo]) -> bool {
        arguments.len() == self.parameters.len()
            && self
                .parameters
                .iter()
                .zip(arguments)
                .all(|(param, arg)| param.accepts(*arg))
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| {
                let ty = if p.integer {
                    "Integer".to_string()
                } else {
                    p.types
                        .preferred()
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "Any".to_string())
                };
                format!("{}: {ty}", p.name)
            })
            .collect();
        write!(
            f,
            "{}({}) -> {}",
            self.name,
            params.join(", "),
            self.return_type
        )
    }
}

/// Shared pseudo-random generator handed to impure functions
#[derive(Clone)]
pub struct RandomSource {
    rng: Arc<Mutex<fastrand::Rng>>,
}

impl RandomSource {
    /// Generator seeded from the environment
    pub fn new() -> Self {
        Self {
            rng: Arc::new(Mutex::new(fastrand::Rng::new())),
        }
    }

    /// Deterministic generator
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(fastrand::Rng::with_seed(seed))),
        }
    }

    /// Uniform float in `[0, 1)`
    pub fn next_f64(&self) -> f64 {
        self.rng.lock().f64()
    }

    /// Uniform integer in `[low, high)`; `low` when the range is empty
    pub fn next_i64(&self, low: i64, high: i64) -> i64 {
        if high <= low {
            return low;
        }
        self.rng.lock().i64(low..high)
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RandomSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomSource").finish_non_exhaustive()
    }
}

/// Kind of shared object a function needs at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialObjectKind {
    /// A [`RandomSource`]
    Random,
}

/// A shared object supplied to function nodes by the compilation
#[derive(Debug, Clone)]
pub enum SpecialObject {
    /// Random number generator
    Random(RandomSource),
}

impl SpecialObject {
    /// Kind of this object
    pub fn kind(&self) -> SpecialObjectKind {
        match self {
            SpecialObject::Random(_) => SpecialObjectKind::Random,
        }
    }
}

/// Context available to a function during evaluation
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionContext<'a> {
    special: Option<&'a SpecialObject>,
}

impl<'a> FunctionContext<'a> {
    /// Context carrying the node's special object, if any
    pub fn new(special: Option<&'a SpecialObject>) -> Self {
        Self { special }
    }

    /// The random source, if one was supplied
    pub fn random(&self) -> Option<&'a RandomSource> {
        match self.special {
            Some(SpecialObject::Random(random)) => Some(random),
            None => None,
        }
    }
}

/// Trait for implementing functions callable from expressions
pub trait MathFunction: Send + Sync {
    /// Get the function name
    fn name(&self) -> &str;

    /// Get the human-friendly name for the function
    fn human_friendly_name(&self) -> &str;

    /// Get the function signature
    fn signature(&self) -> &FunctionSignature;

    /// Number of arguments
    fn arity(&self) -> usize {
        self.signature().arity()
    }

    /// Return type for the given argument types; `None` rejects them
    fn return_type(&self, arguments: &[TypeInfo]) -> Option<TypeInfo> {
        self.signature()
            .accepts(arguments)
            .then_some(self.signature().return_type)
    }

    /// Evaluate the function with given arguments
    fn evaluate(&self, args: &[Value], context: &FunctionContext<'_>) -> EvaluationResult<Value>;

    /// Get function documentation
    fn documentation(&self) -> &str {
        ""
    }

    /// Check if this function is pure (deterministic with no side effects)
    /// Only pure functions are folded when their arguments are constant
    fn is_pure(&self) -> bool {
        false
    }

    /// Shared object this function needs, if any
    fn special_object(&self) -> Option<SpecialObjectKind> {
        None
    }
}

/// Const generic trait for functions of a fixed argument count
pub trait AritySpecificFunction<const ARITY: usize>: Send + Sync {
    /// Get the function name
    fn name(&self) -> &str;

    /// Get the human-friendly name for the function
    fn human_friendly_name(&self) -> &str;

    /// Get the function signature
    fn signature(&self) -> &FunctionSignature;

    /// Return type for the given argument types; `None` rejects them
    fn return_type(&self, arguments: &[TypeInfo; ARITY]) -> Option<TypeInfo> {
        self.signature()
            .accepts(arguments)
            .then_some(self.signature().return_type)
    }

    /// Evaluate the function with exactly ARITY arguments
    fn evaluate(
        &self,
        args: [&Value; ARITY],
        context: &FunctionContext<'_>,
    ) -> EvaluationResult<Value>;

    /// Get function documentation
    fn documentation(&self) -> &str {
        ""
    }

    /// Check if this function is pure (deterministic with no side effects)
    fn is_pure(&self) -> bool {
        true
    }

    /// Shared object this function needs, if any
    fn special_object(&self) -> Option<SpecialObjectKind> {
        None
    }
}

/// Wrapper that converts arity-specific functions to the general MathFunction trait
pub struct ArityWrapper<T, const ARITY: usize> {
    inner: T,
}

impl<T: AritySpecificFunction<ARITY>, const ARITY: usize> ArityWrapper<T, ARITY> {
    /// Create a new arity wrapper
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

impl<T: AritySpecificFunction<ARITY>, const ARITY: usize> MathFunction for ArityWrapper<T, ARITY> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn human_friendly_name(&self) -> &str {
        self.inner.human_friendly_name()
    }

    fn signature(&self) -> &FunctionSignature {
        self.inner.signature()
    }

    fn arity(&self) -> usize {
        ARITY
    }

    fn return_type(&self, arguments: &[TypeInfo]) -> Option<TypeInfo> {
        let arguments: &[TypeInfo; ARITY] = arguments.try_into().ok()?;
        self.inner.return_type(arguments)
    }

    fn evaluate(&self, args: &[Value], context: &FunctionContext<'_>) -> EvaluationResult<Value> {
        if args.len() != ARITY {
            return Err(EvaluationError::function(
                self.name(),
                format!("expected {ARITY} arguments, got {}", args.len()),
            ));
        }
        let args: [&Value; ARITY] = std::array::from_fn(|i| &args[i]);
        self.inner.evaluate(args, context)
    }

    fn documentation(&self) -> &str {
        self.inner.documentation()
    }

    fn is_pure(&self) -> bool {
        self.inner.is_pure()
    }

    fn special_object(&self) -> Option<SpecialObjectKind> {
        self.inner.special_object()
    }
}

/// Registry for functions, keyed by lower-cased name and arity
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: FxHashMap<(String, usize), Arc<dyn MathFunction>>,
}

impl FunctionRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in function
    pub fn standard() -> Self {
        let mut registry = Self::new();
        super::functions::register_builtin_functions(&mut registry);
        registry
    }

    /// Register a function
    pub fn register<F: MathFunction + 'static>(&mut self, function: F) -> Result<(), DefinitionError> {
        self.register_arc(Arc::new(function))
    }

    /// Register a fixed-arity function
    pub fn register_arity<T, const ARITY: usize>(&mut self, function: T) -> Result<(), DefinitionError>
    where
        T: AritySpecificFunction<ARITY> + 'static,
    {
        self.register(ArityWrapper::new(function))
    }

    /// Register a shared function instance
    pub fn register_arc(&mut self, function: Arc<dyn MathFunction>) -> Result<(), DefinitionError> {
        let name = function.name().to_lowercase();
        let arity = function.arity();
        if arity > MAX_ARITY || arity != function.signature().arity() {
            return Err(DefinitionError::UnsupportedArity { name, arity });
        }
        let key = (name, arity);
        if self.functions.contains_key(&key) {
            let (name, arity) = key;
            return Err(DefinitionError::FunctionExists { name, arity });
        }
        self.functions.insert(key, function);
        Ok(())
    }

    /// Get a function by name and arity
    pub fn get(&self, name: &str, arity: usize) -> Option<Arc<dyn MathFunction>> {
        self.functions.get(&(name.to_lowercase(), arity)).cloned()
    }

    /// Check if a function exists at the given arity
    pub fn contains(&self, name: &str, arity: usize) -> bool {
        self.functions.contains_key(&(name.to_lowercase(), arity))
    }

    /// Arities registered for a name, ascending
    pub fn arities(&self, name: &str) -> Vec<usize> {
        let name = name.to_lowercase();
        let mut arities: Vec<usize> = self
            .functions
            .keys()
            .filter(|(n, _)| *n == name)
            .map(|(_, arity)| *arity)
            .collect();
        arities.sort_unstable();
        arities
    }

    /// Registered signatures, sorted by name then arity
    pub fn signatures(&self) -> Vec<&FunctionSignature> {
        let mut keys: Vec<_> = self.functions.keys().collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|key| self.functions.get(key).map(|f| f.signature()))
            .collect()
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Numeric result type over the arguments' refinements
pub(crate) fn promoted(arguments: &[TypeInfo]) -> TypeInfo {
    let kind = arguments
        .iter()
        .map(|a| a.numeric)
        .reduce(|a, b| a.promote(b))
        .unwrap_or_default();
    TypeInfo::numeric(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Double {
        signature: FunctionSignature,
    }

    impl Double {
        fn new() -> Self {
            Self {
                signature: FunctionSignature::new(
                    "double",
                    vec![ParameterSpec::numeric("value")],
                    TypeInfo::FLOAT,
                ),
            }
        }
    }

    impl AritySpecificFunction<1> for Double {
        fn name(&self) -> &str {
            "double"
        }
        fn human_friendly_name(&self) -> &str {
            "Double"
        }
        fn signature(&self) -> &FunctionSignature {
            &self.signature
        }
        fn evaluate(
            &self,
            [value]: [&Value; 1],
            _context: &FunctionContext<'_>,
        ) -> EvaluationResult<Value> {
            Ok(Value::Float(value.as_f64().unwrap_or_default() * 2.0))
        }
    }

    #[test]
    fn test_register_and_lookup_by_arity() {
        let mut registry = FunctionRegistry::new();
        registry.register_arity::<_, 1>(Double::new()).unwrap();
        assert!(registry.get("double", 1).is_some());
        assert!(registry.get("DOUBLE", 1).is_some());
        assert!(registry.get("double", 2).is_none());
        assert_eq!(
            registry.register_arity::<_, 1>(Double::new()),
            Err(DefinitionError::FunctionExists {
                name: "double".to_string(),
                arity: 1,
            })
        );
    }

    #[test]
    fn test_wrapper_evaluates_and_types() {
        let function = ArityWrapper::new(Double::new());
        let context = FunctionContext::default();
        assert_eq!(
            function.evaluate(&[Value::from(2)], &context),
            Ok(Value::from(4.0))
        );
        assert!(function.evaluate(&[], &context).is_err());
        assert_eq!(function.return_type(&[TypeInfo::INTEGER]), Some(TypeInfo::FLOAT));
        assert_eq!(function.return_type(&[TypeInfo::STRING]), None);
        assert!(function.is_pure());
    }

    #[test]
    fn test_seeded_random_source_is_deterministic() {
        let a = RandomSource::with_seed(7);
        let b = RandomSource::with_seed(7);
        assert_eq!(a.next_f64(), b.next_f64());
        let value = a.next_i64(3, 5);
        assert!((3..5).contains(&value));
        assert_eq!(a.next_i64(5, 5), 5);
    }

    #[test]
    fn test_signature_display() {
        assert_eq!(Double::new().signature.to_string(), "double(value: Numeric) -> Numeric(Float)");
    }
}
