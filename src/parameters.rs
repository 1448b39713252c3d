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

//! Parameter registry shared by the parameter nodes of one expression
//!
//! The registry is an arena: parameter nodes hold a [`ParameterHandle`]
//! (an index) and query the registry for their current type. Types are
//! narrowed while the expression is generated; once the registry is frozen
//! every parameter has a fixed type and a positional slot.

use crate::model::{NumericKind, SupportedValueTypes, TypeInfo, ValueType};
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use rustc_hash::FxHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Index of a parameter inside its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParameterHandle(usize);

impl ParameterHandle {
    /// Raw index
    pub fn index(self) -> usize {
        self.0
    }
}

/// Current knowledge about a parameter's type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// The type is fixed
    Known(TypeInfo),
    /// The type is still one of the given set
    Undetermined(SupportedValueTypes),
}

impl OperandType {
    /// The type this operand has, or will default to
    pub fn settle(self) -> TypeInfo {
        match self {
            OperandType::Known(info) => info,
            OperandType::Undetermined(set) => {
                TypeInfo::of(set.preferred().unwrap_or(ValueType::Numeric))
            }
        }
    }

    /// Whether this operand could take the given value type
    pub fn admits(self, value_type: ValueType) -> bool {
        match self {
            OperandType::Known(info) => info.value_type == value_type,
            OperandType::Undetermined(set) => set.supports(value_type),
        }
    }
}

/// A parameter referenced by the expression
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterEntry {
    /// Unique parameter name
    pub name: String,
    /// Determined value type, if any
    pub value_type: Option<ValueType>,
    /// Types still possible while undetermined
    pub supported: SupportedValueTypes,
    /// Numeric refinement
    pub numeric: NumericKind,
}

impl ParameterEntry {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value_type: None,
            supported: SupportedValueTypes::all(),
            numeric: NumericKind::Unknown,
        }
    }

    fn operand_type(&self) -> OperandType {
        match self.value_type {
            Some(ValueType::Numeric) => OperandType::Known(TypeInfo::numeric(self.numeric)),
            Some(value_type) => OperandType::Known(TypeInfo::of(value_type)),
            None => OperandType::Undetermined(self.supported),
        }
    }
}

/// Public description of a frozen parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    /// Parameter name
    pub name: String,
    /// Final type
    pub type_info: TypeInfo,
}

impl fmt::Display for ParameterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.type_info)
    }
}

#[derive(Debug)]
struct FrozenParameters {
    /// Parameters in positional order
    ordered: Vec<ParameterInfo>,
    /// Position of each parameter, indexed by handle
    positions: Vec<usize>,
}

/// Snapshot used to undo the effects of an abandoned resolution branch
#[derive(Debug, Clone)]
pub struct ParameterCheckpoint {
    entries: IndexMap<String, ParameterEntry>,
}

/// Registry of the parameters referenced by one expression
#[derive(Debug, Default)]
pub struct ParameterRegistry {
    entries: RwLock<IndexMap<String, ParameterEntry>>,
    frozen: OnceCell<FrozenParameters>,
}

impl ParameterRegistry {
    /// Create an empty, mutable registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a name, or return the existing handle for it
    ///
    /// After freezing only already registered names resolve.
    pub fn advertise(&self, name: &str) -> Option<ParameterHandle> {
        if self.is_frozen() {
            let handle = self.handle(name);
            if handle.is_none() {
                log::warn!("Parameter '{name}' advertised after the registry was frozen");
            }
            return handle;
        }

        let mut entries = self.entries.write();
        if let Some(index) = entries.get_index_of(name) {
            return Some(ParameterHandle(index));
        }
        let (index, _) = entries.insert_full(name.to_string(), ParameterEntry::new(name));
        log::trace!("Registered parameter '{name}' as #{index}");
        Some(ParameterHandle(index))
    }

    /// Handle of an already registered name
    pub fn handle(&self, name: &str) -> Option<ParameterHandle> {
        self.entries.read().get_index_of(name).map(ParameterHandle)
    }

    /// Name of a parameter
    pub fn name(&self, handle: ParameterHandle) -> Option<String> {
        self.entries
            .read()
            .get_index(handle.0)
            .map(|(name, _)| name.clone())
    }

    /// Snapshot of an entry
    pub fn entry(&self, handle: ParameterHandle) -> Option<ParameterEntry> {
        self.entries
            .read()
            .get_index(handle.0)
            .map(|(_, entry)| entry.clone())
    }

    /// Current type knowledge for a parameter
    pub fn operand_type(&self, handle: ParameterHandle) -> OperandType {
        if let Some(frozen) = self.frozen.get() {
            if let Some(position) = frozen.positions.get(handle.0) {
                return OperandType::Known(frozen.ordered[*position].type_info);
            }
        }
        self.entries
            .read()
            .get_index(handle.0)
            .map(|(_, entry)| entry.operand_type())
            .unwrap_or(OperandType::Undetermined(SupportedValueTypes::all()))
    }

    /// Restrict the types a parameter may take
    ///
    /// Returns `false` when the restriction would leave no possible type, when
    /// the parameter is already fixed to a type outside the set, or when the
    /// registry is frozen.
    pub fn narrow(&self, handle: ParameterHandle, allowed: SupportedValueTypes) -> bool {
        if self.reject_if_frozen(handle) {
            return false;
        }

        let mut entries = self.entries.write();
        let Some((_, entry)) = entries.get_index_mut(handle.0) else {
            return false;
        };

        if let Some(value_type) = entry.value_type {
            return allowed.supports(value_type);
        }

        let narrowed = entry.supported & allowed;
        if narrowed.is_empty() {
            return false;
        }
        entry.supported = narrowed;
        if let Some(single) = narrowed.single() {
            entry.value_type = Some(single);
        }
        true
    }

    /// Fix a parameter to a value type
    pub fn determine(&self, handle: ParameterHandle, value_type: ValueType) -> bool {
        if self.reject_if_frozen(handle) {
            return false;
        }

        let mut entries = self.entries.write();
        let Some((name, entry)) = entries.get_index_mut(handle.0) else {
            return false;
        };

        match entry.value_type {
            Some(existing) => existing == value_type,
            None if entry.supported.supports(value_type) => {
                log::trace!("Parameter '{name}' determined as {value_type}");
                entry.value_type = Some(value_type);
                entry.supported = SupportedValueTypes::from(value_type);
                true
            }
            None => false,
        }
    }

    /// Require a numeric parameter to hold integers
    pub fn require_integer(&self, handle: ParameterHandle) -> bool {
        if !self.determine(handle, ValueType::Numeric) {
            return false;
        }

        let mut entries = self.entries.write();
        let Some((_, entry)) = entries.get_index_mut(handle.0) else {
            return false;
        };
        match entry.numeric {
            NumericKind::Float => false,
            _ => {
                entry.numeric = NumericKind::Integer;
                true
            }
        }
    }

    /// Copy the type knowledge of an entry onto a parameter of this registry
    pub fn adopt(&self, handle: ParameterHandle, source: &ParameterEntry) -> bool {
        if let Some(value_type) = source.value_type {
            if !self.determine(handle, value_type) {
                return false;
            }
        } else if !self.narrow(handle, source.supported) {
            return false;
        }
        if source.numeric == NumericKind::Integer {
            return self.require_integer(handle);
        }
        true
    }

    /// Hash of every registered name and what is known about its type
    ///
    /// Text resolved against two registry states with equal fingerprints
    /// succeeds or fails alike.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        for (name, entry) in self.entries.read().iter() {
            name.hash(&mut hasher);
            entry.value_type.hash(&mut hasher);
            entry.supported.hash(&mut hasher);
            entry.numeric.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Snapshot the registry for a later rollback
    pub fn checkpoint(&self) -> ParameterCheckpoint {
        ParameterCheckpoint {
            entries: self.entries.read().clone(),
        }
    }

    /// Restore a snapshot; parameters registered since are forgotten
    pub fn rollback(&self, checkpoint: ParameterCheckpoint) {
        if self.is_frozen() {
            log::warn!("Ignoring rollback of a frozen parameter registry");
            return;
        }
        *self.entries.write() = checkpoint.entries;
    }

    /// Fix every type and assign positions
    ///
    /// `order` lists handles by first appearance; registered parameters missing
    /// from it are appended in registration order. Undetermined parameters
    /// take their preferred type.
    pub fn freeze(&self, order: &[ParameterHandle]) {
        let entries = self.entries.read();

        let mut sequence: Vec<usize> = Vec::with_capacity(entries.len());
        for handle in order {
            if handle.0 < entries.len() && !sequence.contains(&handle.0) {
                sequence.push(handle.0);
            }
        }
        for index in 0..entries.len() {
            if !sequence.contains(&index) {
                sequence.push(index);
            }
        }

        let mut positions = vec![0; entries.len()];
        let ordered = sequence
            .iter()
            .enumerate()
            .filter_map(|(position, index)| {
                let (name, entry) = entries.get_index(*index)?;
                positions[*index] = position;
                Some(ParameterInfo {
                    name: name.clone(),
                    type_info: entry.operand_type().settle(),
                })
            })
            .collect();

        if self.frozen.set(FrozenParameters { ordered, positions }).is_err() {
            log::warn!("Parameter registry frozen twice; keeping the first order");
        }
    }

    /// Whether the registry is frozen
    pub fn is_frozen(&self) -> bool {
        self.frozen.get().is_some()
    }

    /// Positional slot of a parameter; only available once frozen
    pub fn position(&self, handle: ParameterHandle) -> Option<usize> {
        self.frozen
            .get()
            .and_then(|frozen| frozen.positions.get(handle.0).copied())
    }

    /// Frozen parameters in positional order; empty before freezing
    pub fn parameters(&self) -> &[ParameterInfo] {
        self.frozen
            .get()
            .map(|frozen| frozen.ordered.as_slice())
            .unwrap_or(&[])
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Number of registered parameters
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no parameter is registered
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn reject_if_frozen(&self, handle: ParameterHandle) -> bool {
        if self.is_frozen() {
            log::warn!(
                "Type narrowing of parameter #{} rejected: registry is frozen",
                handle.0
            );
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_follows_type_knowledge() {
        let registry = ParameterRegistry::new();
        let empty = registry.fingerprint();
        let a = registry.advertise("a").unwrap();
        let registered = registry.fingerprint();
        assert_ne!(empty, registered);

        let checkpoint = registry.checkpoint();
        registry.determine(a, ValueType::Numeric);
        assert_ne!(registry.fingerprint(), registered);
        registry.rollback(checkpoint);
        assert_eq!(registry.fingerprint(), registered);
    }

    #[test]
    fn test_advertise_returns_same_handle() {
        let registry = ParameterRegistry::new();
        let a = registry.advertise("a").unwrap();
        let b = registry.advertise("b").unwrap();
        assert_eq!(registry.advertise("a"), Some(a));
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.name(b).as_deref(), Some("b"));
    }

    #[test]
    fn test_narrowing_to_single_type_determines() {
        let registry = ParameterRegistry::new();
        let a = registry.advertise("a").unwrap();
        assert!(registry.narrow(a, SupportedValueTypes::STRING | SupportedValueTypes::NUMERIC));
        assert!(matches!(
            registry.operand_type(a),
            OperandType::Undetermined(_)
        ));
        assert!(registry.narrow(a, SupportedValueTypes::STRING));
        assert_eq!(registry.operand_type(a), OperandType::Known(TypeInfo::STRING));
        assert!(!registry.narrow(a, SupportedValueTypes::NUMERIC));
        assert!(!registry.determine(a, ValueType::Boolean));
    }

    #[test]
    fn test_integer_requirement() {
        let registry = ParameterRegistry::new();
        let a = registry.advertise("a").unwrap();
        assert!(registry.require_integer(a));
        assert_eq!(registry.operand_type(a), OperandType::Known(TypeInfo::INTEGER));

        let s = registry.advertise("s").unwrap();
        assert!(registry.determine(s, ValueType::String));
        assert!(!registry.require_integer(s));
    }

    #[test]
    fn test_rollback_forgets_new_parameters() {
        let registry = ParameterRegistry::new();
        let a = registry.advertise("a").unwrap();
        let checkpoint = registry.checkpoint();
        registry.advertise("b").unwrap();
        registry.determine(a, ValueType::String);
        registry.rollback(checkpoint);
        assert_eq!(registry.names(), vec!["a".to_string()]);
        assert!(matches!(
            registry.operand_type(a),
            OperandType::Undetermined(_)
        ));
    }

    #[test]
    fn test_freeze_orders_and_defaults() {
        let registry = ParameterRegistry::new();
        let a = registry.advertise("a").unwrap();
        let b = registry.advertise("b").unwrap();
        registry.determine(a, ValueType::String);
        registry.freeze(&[b, a]);

        assert!(registry.is_frozen());
        assert_eq!(registry.position(b), Some(0));
        assert_eq!(registry.position(a), Some(1));
        assert_eq!(
            registry.parameters(),
            &[
                ParameterInfo {
                    name: "b".to_string(),
                    type_info: TypeInfo::NUMERIC,
                },
                ParameterInfo {
                    name: "a".to_string(),
                    type_info: TypeInfo::STRING,
                },
            ]
        );

        assert!(!registry.determine(b, ValueType::Boolean));
        assert_eq!(registry.advertise("c"), None);
        assert_eq!(registry.advertise("a"), Some(a));
    }
}
