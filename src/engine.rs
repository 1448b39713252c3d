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

//! Math engine - the main entry point for compiling expressions

use crate::cache::{CacheStats, ExpressionCache, ExpressionCacheConfig};
use crate::cancellation::CancellationToken;
use crate::definition::MathDefinition;
use crate::error::{CompilationError, EvaluationError, EvaluationResult, Result};
use crate::extractors::ExtractorSet;
use crate::flatten::flatten;
use crate::generator::{DEFAULT_MAX_DEPTH, ExpressionGenerator};
use crate::model::{Tolerance, TypeInfo, Value};
use crate::nodes::{CloneContext, CompileMode, EvaluationScope, Node};
use crate::parameters::{ParameterInfo, ParameterRegistry};
use crate::registry::{FunctionRegistry, OperatorRegistry, create_standard_registries};
use crate::tables::contains_reserved;
use crate::working_set::WorkingSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Token configuration
    pub definition: MathDefinition,
    /// Compiled expression cache settings
    pub cache: ExpressionCacheConfig,
    /// Maximum nesting of resolution steps
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            definition: MathDefinition::default(),
            cache: ExpressionCacheConfig::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Compiles expression text into [`CompiledExpression`]s
///
/// The engine is immutable after construction and can be shared between
/// threads; independent compilations may run concurrently.
pub struct MathEngine {
    config: EngineConfig,
    operators: OperatorRegistry,
    functions: FunctionRegistry,
    extractors: ExtractorSet,
    cache: ExpressionCache,
}

impl Default for MathEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MathEngine {
    /// Engine with the default syntax and the standard operators and functions
    pub fn new() -> Self {
        let config = EngineConfig::default();
        let (functions, operators) = create_standard_registries(&config.definition);
        Self::assemble(config, operators, functions)
    }

    /// Engine with a custom configuration
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.definition.validate()?;
        let (functions, operators) = create_standard_registries(&config.definition);
        Ok(Self::assemble(config, operators, functions))
    }

    /// Engine with caller-supplied registries
    pub fn with_registries(
        config: EngineConfig,
        operators: OperatorRegistry,
        functions: FunctionRegistry,
    ) -> Result<Self> {
        config.definition.validate()?;
        Ok(Self::assemble(config, operators, functions))
    }

    fn assemble(config: EngineConfig, operators: OperatorRegistry, functions: FunctionRegistry) -> Self {
        Self {
            extractors: ExtractorSet::standard(&config.definition),
            cache: ExpressionCache::new(config.cache.clone()),
            config,
            operators,
            functions,
        }
    }

    /// The configuration in use
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The syntax definition in use
    pub fn definition(&self) -> &MathDefinition {
        &self.config.definition
    }

    /// Operator registry
    pub fn operators(&self) -> &OperatorRegistry {
        &self.operators
    }

    /// Function registry
    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Expression cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached expression
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Compile expression text
    pub fn compile(&self, text: &str) -> Result<CompiledExpression> {
        self.compile_with_cancellation(text, &CancellationToken::new())
    }

    /// Compile expression text, giving up when `cancellation` is triggered
    pub fn compile_with_cancellation(
        &self,
        text: &str,
        cancellation: &CancellationToken,
    ) -> Result<CompiledExpression> {
        if text.trim().is_empty() {
            return Err(CompilationError::EmptyExpression);
        }
        let unresolvable = || CompilationError::Unresolvable {
            expression: text.to_string(),
        };
        if cancellation.is_cancelled() {
            log::debug!("Compilation of '{text}' cancelled before it started");
            return Err(unresolvable());
        }
        if let Some(expression) = self.cache.get(text) {
            return Ok(expression);
        }
        if contains_reserved(text) {
            log::debug!("'{text}' contains reserved placeholder characters");
            return Err(unresolvable());
        }

        let mut working = WorkingSet::new(cancellation.clone());
        let root = self.generate(text, &mut working).ok_or_else(unresolvable)?;

        let order = working.appearance_order(text, &self.config.definition);
        let parameters = working.into_parameters();
        if root.is_constant() && !parameters.is_empty() {
            return Err(CompilationError::UnusedParameters {
                parameters: parameters.names(),
            });
        }
        parameters.freeze(&order);

        let expression = CompiledExpression {
            text: Arc::from(text),
            root,
            parameters,
        };
        log::debug!(
            "Compiled '{text}' to {} with parameters [{}]",
            expression.return_type(),
            expression
                .parameters()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.cache.insert(text, expression.clone());
        Ok(expression)
    }

    fn generate(&self, text: &str, working: &mut WorkingSet) -> Option<Arc<Node>> {
        let extracted = self.extractors.apply(text, working)?;
        let flattened = flatten(&extracted, &self.config.definition, working)?;
        ExpressionGenerator::new(
            &self.config.definition,
            &self.operators,
            &self.functions,
            working,
            self.config.max_depth,
        )
        .resolve(&flattened)
    }
}

/// A compiled, typed expression ready for evaluation
///
/// Cloning is cheap and shares the node tree, including its compiled
/// computations. Use [`CompiledExpression::deep_clone`] for an independent
/// copy.
#[derive(Clone)]
pub struct CompiledExpression {
    text: Arc<str>,
    root: Arc<Node>,
    parameters: Arc<ParameterRegistry>,
}

impl CompiledExpression {
    /// Source text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Root node of the tree
    pub fn root(&self) -> &Arc<Node> {
        &self.root
    }

    /// Parameters in positional order
    pub fn parameters(&self) -> &[ParameterInfo] {
        self.parameters.parameters()
    }

    /// Whether the expression folded to a constant
    pub fn is_constant(&self) -> bool {
        self.root.is_constant()
    }

    /// Type of the result
    pub fn return_type(&self) -> TypeInfo {
        self.root.return_type()
    }

    /// Evaluate with positional parameter values; comparisons are exact
    pub fn evaluate(&self, values: &[Value]) -> EvaluationResult<Value> {
        self.check_arguments(values)?;
        let computation = self.root.compile(CompileMode::Exact);
        computation(&EvaluationScope::new(values))
    }

    /// Evaluate with numeric comparisons relaxed by `tolerance`
    pub fn evaluate_with_tolerance(&self, values: &[Value], tolerance: &Tolerance) -> EvaluationResult<Value> {
        self.check_arguments(values)?;
        let computation = self.root.compile(CompileMode::Tolerant);
        computation(&EvaluationScope::new(values).with_tolerance(tolerance))
    }

    fn check_arguments(&self, values: &[Value]) -> EvaluationResult<()> {
        let parameters = self.parameters();
        if values.len() != parameters.len() {
            return Err(EvaluationError::ParameterCount {
                expected: parameters.len(),
                actual: values.len(),
            });
        }
        for (parameter, value) in parameters.iter().zip(values) {
            if !value.conforms_to(&parameter.type_info) {
                return Err(EvaluationError::ParameterType {
                    name: parameter.name.clone(),
                    expected: parameter.type_info.to_string(),
                    actual: value.type_name().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Fully independent copy with its own parameter registry and caches
    pub fn deep_clone(&self) -> Result<Self> {
        let registry = Arc::new(ParameterRegistry::new());
        let mut order = Vec::with_capacity(self.parameters().len());
        for info in self.parameters() {
            let source = self
                .parameters
                .handle(&info.name)
                .and_then(|handle| self.parameters.entry(handle));
            let handle = registry.advertise(&info.name);
            if let (Some(source), Some(handle)) = (source, handle) {
                registry.adopt(handle, &source);
                order.push(handle);
            }
        }

        let mut context = CloneContext::new(Arc::clone(&registry));
        let root = self
            .root
            .deep_clone(&mut context)
            .ok_or_else(|| CompilationError::Unresolvable {
                expression: self.text.to_string(),
            })?;
        registry.freeze(&order);

        Ok(Self {
            text: Arc::clone(&self.text),
            root,
            parameters: registry,
        })
    }
}

impl fmt::Debug for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpression")
            .field("text", &self.text)
            .field("root", &self.root.to_string())
            .field("parameters", &self.parameters())
            .field("return_type", &self.return_type())
            .finish()
    }
}

impl fmt::Display for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}
