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

//! Per-compilation state
//!
//! A [`WorkingSet`] lives for exactly one compilation. It owns the symbol and
//! constant tables, the parameter registry being inferred, the cache of
//! already resolved symbols, the texts known not to resolve and the special
//! objects handed to function nodes.
//! Only the parameter registry outlives it, frozen inside the compiled
//! expression.

use crate::cancellation::CancellationToken;
use crate::definition::MathDefinition;
use crate::nodes::Node;
use crate::parameters::{ParameterCheckpoint, ParameterHandle, ParameterRegistry};
use crate::registry::function::{RandomSource, SpecialObject, SpecialObjectKind};
use crate::tables::{ConstantsTable, SymbolTable};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use unicode_xid::UnicodeXID;

/// Tables and registries shared by every stage of one compilation
#[derive(Debug)]
pub struct WorkingSet {
    pub(crate) constants: ConstantsTable,
    pub(crate) symbols: SymbolTable,
    parameters: Arc<ParameterRegistry>,
    resolved: IndexMap<String, Arc<Node>>,
    failures: FxHashSet<(String, u64)>,
    specials: FxHashMap<SpecialObjectKind, SpecialObject>,
    cancellation: CancellationToken,
}

/// Restore point taken before a speculative resolution branch
#[derive(Debug)]
pub struct WorkingCheckpoint {
    parameters: ParameterCheckpoint,
    resolved: usize,
}

impl WorkingSet {
    /// Fresh state observing the given cancellation signal
    pub fn new(cancellation: CancellationToken) -> Self {
        Self {
            constants: ConstantsTable::new(),
            symbols: SymbolTable::new(),
            parameters: Arc::new(ParameterRegistry::new()),
            resolved: IndexMap::new(),
            failures: FxHashSet::default(),
            specials: FxHashMap::default(),
            cancellation,
        }
    }

    /// Whether the compilation was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// The registry parameter nodes advertise themselves to
    pub fn parameters(&self) -> &Arc<ParameterRegistry> {
        &self.parameters
    }

    /// Constant table
    pub fn constants(&self) -> &ConstantsTable {
        &self.constants
    }

    /// Symbol table
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Node already built for a symbol key
    pub fn resolved(&self, key: &str) -> Option<Arc<Node>> {
        self.resolved.get(key).cloned()
    }

    /// Remember the node built for a symbol key
    pub fn remember(&mut self, key: &str, node: Arc<Node>) {
        self.resolved.insert(key.to_string(), node);
    }

    /// Fingerprint of the parameter registry, used to key failed resolutions
    pub fn fingerprint(&self) -> u64 {
        self.parameters.fingerprint()
    }

    /// Whether `text` already failed to resolve against a registry with this fingerprint
    pub fn has_failed(&self, text: &str, fingerprint: u64) -> bool {
        self.failures.contains(&(text.to_string(), fingerprint))
    }

    /// Remember that `text` does not resolve against a registry with this fingerprint
    ///
    /// Failures are keyed by registry state and survive rollbacks.
    pub fn record_failure(&mut self, text: &str, fingerprint: u64) {
        self.failures.insert((text.to_string(), fingerprint));
    }

    /// The shared special object of a kind, created on first request
    pub fn special(&mut self, kind: SpecialObjectKind) -> SpecialObject {
        self.specials
            .entry(kind)
            .or_insert_with(|| match kind {
                SpecialObjectKind::Random => SpecialObject::Random(RandomSource::new()),
            })
            .clone()
    }

    /// Snapshot the parameter registry and resolved-symbol cache
    pub fn checkpoint(&self) -> WorkingCheckpoint {
        WorkingCheckpoint {
            parameters: self.parameters.checkpoint(),
            resolved: self.resolved.len(),
        }
    }

    /// Undo everything done since `checkpoint`
    pub fn rollback(&mut self, checkpoint: WorkingCheckpoint) {
        self.parameters.rollback(checkpoint.parameters);
        self.resolved.truncate(checkpoint.resolved);
    }

    /// Handles of registered parameters in order of first textual appearance
    ///
    /// The original text is split into identifier runs, skipping string
    /// literals; names between special-symbol indicators count as one token.
    pub fn appearance_order(&self, text: &str, definition: &MathDefinition) -> Vec<ParameterHandle> {
        let mut order = Vec::new();
        let mut push = |name: &str| {
            if let Some(handle) = self.parameters.handle(name) {
                if !order.contains(&handle) {
                    order.push(handle);
                }
            }
        };

        let quote = definition.string_indicator.as_str();
        let open = definition.special_symbol_open.as_str();
        let close = definition.special_symbol_close.as_str();

        let mut rest = text;
        while let Some(c) = rest.chars().next() {
            if rest.starts_with(quote) {
                rest = skip_string(&rest[quote.len()..], quote);
            } else if rest.starts_with(open) {
                let inner = &rest[open.len()..];
                match inner.find(close) {
                    Some(end) => {
                        push(&inner[..end]);
                        rest = &inner[end + close.len()..];
                    }
                    None => rest = inner,
                }
            } else if c.is_xid_continue() {
                let end = rest
                    .char_indices()
                    .find(|(_, ch)| !ch.is_xid_continue())
                    .map_or(rest.len(), |(index, _)| index);
                if c.is_xid_start() || c == '_' {
                    push(&rest[..end]);
                }
                rest = &rest[end..];
            } else {
                rest = &rest[c.len_utf8()..];
            }
        }
        order
    }

    /// Give up the working set, keeping the parameter registry
    pub fn into_parameters(self) -> Arc<ParameterRegistry> {
        self.parameters
    }
}

/// Remainder after a string literal body, honouring doubled indicators
fn skip_string<'a>(mut body: &'a str, quote: &str) -> &'a str {
    while let Some(end) = body.find(quote) {
        let after = &body[end + quote.len()..];
        if after.starts_with(quote) {
            body = &after[quote.len()..];
        } else {
            return after;
        }
    }
    ""
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ValueType;

    #[test]
    fn test_rollback_discards_resolved_symbols() {
        let mut working = WorkingSet::new(CancellationToken::new());
        working.remember("s0", Arc::new(Node::constant(1.into())));
        let checkpoint = working.checkpoint();

        working.remember("s1", Arc::new(Node::constant(2.into())));
        let a = working.parameters().advertise("a").unwrap();
        working.parameters().determine(a, ValueType::String);
        working.rollback(checkpoint);

        assert!(working.resolved("s0").is_some());
        assert!(working.resolved("s1").is_none());
        assert!(working.parameters().is_empty());
    }

    #[test]
    fn test_failures_are_keyed_by_registry_state() {
        let mut working = WorkingSet::new(CancellationToken::new());
        let before = working.fingerprint();
        let checkpoint = working.checkpoint();
        working.record_failure("a -", before);

        let a = working.parameters().advertise("a").unwrap();
        working.parameters().determine(a, ValueType::Boolean);
        assert!(!working.has_failed("a -", working.fingerprint()));

        working.rollback(checkpoint);
        assert!(working.has_failed("a -", working.fingerprint()));
        assert!(!working.has_failed("a +", working.fingerprint()));
    }

    #[test]
    fn test_special_objects_are_shared() {
        let mut working = WorkingSet::new(CancellationToken::new());
        let SpecialObject::Random(first) = working.special(SpecialObjectKind::Random);
        let SpecialObject::Random(second) = working.special(SpecialObjectKind::Random);
        let _ = first.next_f64();
        let _ = second.next_f64();
        assert_eq!(working.specials.len(), 1);
    }

    #[test]
    fn test_appearance_order_skips_literals() {
        let working = WorkingSet::new(CancellationToken::new());
        let registry = working.parameters();
        let a = registry.advertise("a").unwrap();
        let b = registry.advertise("b").unwrap();
        let spaced = registry.advertise("my value").unwrap();

        let definition = MathDefinition::default();
        let order = working.appearance_order(r#""a" + b * [my value] + a + 0x1a"#, &definition);
        assert_eq!(order, vec![b, spaced, a]);
    }

    #[test]
    fn test_cancellation_is_observed() {
        let token = CancellationToken::new();
        let working = WorkingSet::new(token.clone());
        assert!(!working.is_cancelled());
        token.cancel();
        assert!(working.is_cancelled());
    }
}
