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

//! Compiled node computations and their per-node cache

use crate::error::EvaluationResult;
use crate::model::{Tolerance, Value};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

/// Values visible to a compiled computation
#[derive(Debug, Clone, Copy)]
pub struct EvaluationScope<'a> {
    parameters: &'a [Value],
    tolerance: Option<&'a Tolerance>,
}

impl<'a> EvaluationScope<'a> {
    /// Scope with positional parameter values and no tolerance
    pub fn new(parameters: &'a [Value]) -> Self {
        Self {
            parameters,
            tolerance: None,
        }
    }

    /// Scope with no parameters, used for constant folding
    pub fn empty() -> EvaluationScope<'static> {
        EvaluationScope {
            parameters: &[],
            tolerance: None,
        }
    }

    /// Attach a tolerance
    pub fn with_tolerance(mut self, tolerance: &'a Tolerance) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    /// Value at a parameter position
    pub fn parameter(&self, position: usize) -> Option<&'a Value> {
        self.parameters.get(position)
    }

    /// The tolerance, if evaluating tolerantly
    pub fn tolerance(&self) -> Option<&'a Tolerance> {
        self.tolerance
    }
}

/// A directly callable computation built from a node
pub type CompiledFn = Arc<dyn Fn(&EvaluationScope<'_>) -> EvaluationResult<Value> + Send + Sync>;

/// Which variant of a node's computation to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileMode {
    /// Exact comparisons; any tolerance in the scope is ignored
    Exact,
    /// Tolerant operators read the tolerance from the scope
    Tolerant,
}

/// Compute-once cache of a node's computations
///
/// Each mode is built at most once per node; concurrent first requests race
/// inside the cell and every caller observes the single stored artifact.
#[derive(Default)]
pub struct CompiledCell {
    exact: OnceCell<CompiledFn>,
    tolerant: OnceCell<CompiledFn>,
}

impl CompiledCell {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached computation for `mode`, building it with `build` on first use
    pub fn get_or_init(&self, mode: CompileMode, build: impl FnOnce() -> CompiledFn) -> CompiledFn {
        let cell = match mode {
            CompileMode::Exact => &self.exact,
            CompileMode::Tolerant => &self.tolerant,
        };
        Arc::clone(cell.get_or_init(build))
    }

    /// Whether the computation for `mode` was already built
    pub fn is_compiled(&self, mode: CompileMode) -> bool {
        match mode {
            CompileMode::Exact => self.exact.get().is_some(),
            CompileMode::Tolerant => self.tolerant.get().is_some(),
        }
    }
}

impl fmt::Debug for CompiledCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledCell")
            .field("exact", &self.is_compiled(CompileMode::Exact))
            .field("tolerant", &self.is_compiled(CompileMode::Tolerant))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_cell_builds_once_per_mode() {
        let cell = CompiledCell::new();
        let builds = AtomicUsize::new(0);
        let build = || -> CompiledFn {
            builds.fetch_add(1, Ordering::SeqCst);
            Arc::new(|_scope: &EvaluationScope<'_>| Ok(Value::from(1)))
        };

        let first = cell.get_or_init(CompileMode::Exact, build);
        let second = cell.get_or_init(CompileMode::Exact, build);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(!cell.is_compiled(CompileMode::Tolerant));

        let tolerant = cell.get_or_init(CompileMode::Tolerant, build);
        assert!(!Arc::ptr_eq(&first, &tolerant));
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_scope_accessors() {
        let values = [Value::from(1), Value::from("x")];
        let tolerance = Tolerance::range(0.1);
        let scope = EvaluationScope::new(&values).with_tolerance(&tolerance);
        assert_eq!(scope.parameter(1), Some(&Value::from("x")));
        assert_eq!(scope.parameter(2), None);
        assert_eq!(scope.tolerance(), Some(&tolerance));
        assert!(EvaluationScope::empty().tolerance().is_none());
    }
}
