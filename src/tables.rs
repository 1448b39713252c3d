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

//! Symbol and constant tables used while flattening an expression
//!
//! Literals and sub-expressions are replaced in the working text by
//! placeholder tokens. A placeholder is delimited by two private-use
//! characters that user text may not contain, so placeholders can never be
//! confused with parameter names or operator tokens.

use crate::model::Value;
use crate::nodes::Node;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::ops::Range;
use std::sync::Arc;

/// Opening delimiter of a placeholder token
pub const PLACEHOLDER_OPEN: char = '\u{E000}';
/// Closing delimiter of a placeholder token
pub const PLACEHOLDER_CLOSE: char = '\u{E001}';

const CONSTANT_PREFIX: char = 'c';
const SYMBOL_PREFIX: char = 's';

fn placeholder(prefix: char, index: usize) -> String {
    format!("{PLACEHOLDER_OPEN}{prefix}{index}{PLACEHOLDER_CLOSE}")
}

/// Whether the text contains placeholder delimiters
pub fn contains_reserved(text: &str) -> bool {
    text.contains([PLACEHOLDER_OPEN, PLACEHOLDER_CLOSE])
}

/// Whether the whole text is exactly one placeholder token
pub fn is_placeholder(text: &str) -> bool {
    text.starts_with(PLACEHOLDER_OPEN)
        && text.ends_with(PLACEHOLDER_CLOSE)
        && text.matches(PLACEHOLDER_OPEN).count() == 1
}

/// Byte ranges of every placeholder in the text, in order
pub fn placeholder_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut offset = 0;
    while let Some(start) = text[offset..].find(PLACEHOLDER_OPEN) {
        let start = offset + start;
        match text[start..].find(PLACEHOLDER_CLOSE) {
            Some(end) => {
                let end = start + end + PLACEHOLDER_CLOSE.len_utf8();
                spans.push(start..end);
                offset = end;
            }
            None => break,
        }
    }
    spans
}

/// Collapse whitespace runs so equivalent sub-expressions share a key
fn canonical(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Literal constants extracted from the expression text
#[derive(Debug, Default)]
pub struct ConstantsTable {
    constants: FxHashMap<String, Arc<Node>>,
    reverse: FxHashMap<String, String>,
}

impl ConstantsTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a literal and return its placeholder; repeated literals share one token
    pub fn insert_literal(&mut self, literal: &str, value: Value) -> String {
        if let Some(token) = self.token_for_literal(literal) {
            return token.to_string();
        }

        let token = placeholder(CONSTANT_PREFIX, self.constants.len());
        self.constants
            .insert(token.clone(), Arc::new(Node::constant(value)));
        self.reverse.insert(literal.to_string(), token.clone());
        token
    }

    /// Constant node for a placeholder token
    pub fn get(&self, token: &str) -> Option<&Arc<Node>> {
        self.constants.get(token)
    }

    /// Placeholder token previously assigned to a literal's source text
    pub fn token_for_literal(&self, literal: &str) -> Option<&str> {
        self.reverse.get(literal).map(String::as_str)
    }

    /// Number of distinct constants
    pub fn len(&self) -> usize {
        self.constants.len()
    }

    /// Whether no constant was extracted
    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }
}

/// What a symbol placeholder stands for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymbolEntry {
    /// Sub-expression text awaiting decomposition
    Unresolved(String),
    /// Full function call text, `name(args)`, parsed by the generator
    FunctionCall(String),
    /// A parameter name written between special-symbol indicators
    EscapedName(String),
}

impl SymbolEntry {
    /// The stored text
    pub fn text(&self) -> &str {
        match self {
            SymbolEntry::Unresolved(text)
            | SymbolEntry::FunctionCall(text)
            | SymbolEntry::EscapedName(text) => text,
        }
    }

    /// Same entry with whitespace runs collapsed; escaped names are kept verbatim
    fn canonical(&self) -> SymbolEntry {
        match self {
            SymbolEntry::Unresolved(text) => SymbolEntry::Unresolved(canonical(text)),
            SymbolEntry::FunctionCall(text) => SymbolEntry::FunctionCall(canonical(text)),
            SymbolEntry::EscapedName(name) => SymbolEntry::EscapedName(name.clone()),
        }
    }
}

/// Named sub-expressions produced while flattening
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: IndexMap<String, SymbolEntry>,
    reverse: FxHashMap<SymbolEntry, String>,
}

impl SymbolTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry and return its placeholder; identical entries share one key
    pub fn insert(&mut self, entry: SymbolEntry) -> String {
        let entry = entry.canonical();
        if let Some(key) = self.key_for(&entry) {
            return key.to_string();
        }

        let key = placeholder(SYMBOL_PREFIX, self.symbols.len());
        self.symbols.insert(key.clone(), entry.clone());
        self.reverse.insert(entry, key.clone());
        key
    }

    /// Entry for a placeholder key
    pub fn get(&self, key: &str) -> Option<&SymbolEntry> {
        self.symbols.get(key)
    }

    /// Key already assigned to an equivalent entry, if any
    pub fn key_for(&self, entry: &SymbolEntry) -> Option<&str> {
        self.reverse.get(&entry.canonical()).map(String::as_str)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SymbolEntry)> {
        self.symbols.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of symbols
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_deduplication() {
        let mut table = ConstantsTable::new();
        let a = table.insert_literal("2", Value::from(2));
        let b = table.insert_literal("3", Value::from(3));
        let c = table.insert_literal("2", Value::from(2));
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
        assert!(is_placeholder(&a));
        assert_eq!(table.token_for_literal("3"), Some(b.as_str()));
        assert!(table.get(&a).unwrap().is_constant());
    }

    #[test]
    fn test_symbol_deduplication_ignores_whitespace_runs() {
        let mut table = SymbolTable::new();
        let a = table.insert(SymbolEntry::Unresolved("a +  b".to_string()));
        let b = table.insert(SymbolEntry::Unresolved(" a + b ".to_string()));
        let call = table.insert(SymbolEntry::FunctionCall("a + b".to_string()));
        assert_eq!(a, b);
        assert_ne!(a, call);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.key_for(&SymbolEntry::Unresolved("a  + b".to_string())),
            Some(a.as_str())
        );
        assert_eq!(
            table.key_for(&SymbolEntry::FunctionCall("a +   b".to_string())),
            Some(call.as_str())
        );
        assert_eq!(table.key_for(&SymbolEntry::EscapedName("a + b".to_string())), None);
    }

    #[test]
    fn test_placeholder_spans() {
        let mut table = SymbolTable::new();
        let key = table.insert(SymbolEntry::Unresolved("x".to_string()));
        let text = format!("1+{key}*{key}");
        let spans = placeholder_spans(&text);
        assert_eq!(spans.len(), 2);
        assert_eq!(&text[spans[0].clone()], key);
        assert!(contains_reserved(&text));
        assert!(!is_placeholder(&text));
    }
}
