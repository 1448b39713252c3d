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

//! Recursive resolution of flattened expression text into a node tree
//!
//! The input has already been through the extractors and the flattener: all
//! literals are constant placeholders and every parenthesized group is a
//! symbol placeholder. What remains is a flat sequence of operands and
//! operators, which is split at the loosest binding operator first.
//!
//! Resolution is speculative. An operator occurrence may turn out not to be a
//! valid split point (its operands fail to resolve or have types the
//! operator rejects), in which case the next candidate is tried. Every
//! attempt runs between a checkpoint and a rollback of the working set, so an
//! abandoned attempt leaves no parameter registration or type narrowing
//! behind. Texts that failed are remembered per registry state so a later
//! candidate never re-resolves them.
//!
//! Reaching the depth limit aborts the whole compilation, like cancellation.

use crate::definition::MathDefinition;
use crate::flatten::split_call;
use crate::nodes::{Arguments, BinaryNode, FunctionNode, Node, ParameterNode, TernaryNode, UnaryNode};
use crate::registry::function::MAX_ARITY;
use crate::registry::operator::{Associativity, BinaryOperator};
use crate::registry::{FunctionRegistry, OperatorRegistry};
use crate::tables::{SymbolEntry, is_placeholder, placeholder_spans};
use crate::working_set::WorkingSet;
use std::ops::Range;
use std::sync::Arc;
use unicode_xid::UnicodeXID;

/// Default limit on nested resolution steps
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Whether `text` is a plain parameter name
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_xid_start() || first == '_' => chars.all(|c| c.is_xid_continue()),
        _ => false,
    }
}

/// Builds the node tree of one compilation
pub struct ExpressionGenerator<'a> {
    definition: &'a MathDefinition,
    operators: &'a OperatorRegistry,
    functions: &'a FunctionRegistry,
    working: &'a mut WorkingSet,
    symbols: Vec<String>,
    max_depth: usize,
    depth: usize,
    aborted: bool,
}

impl<'a> ExpressionGenerator<'a> {
    /// Generator over the given registries and working set
    pub fn new(
        definition: &'a MathDefinition,
        operators: &'a OperatorRegistry,
        functions: &'a FunctionRegistry,
        working: &'a mut WorkingSet,
        max_depth: usize,
    ) -> Self {
        Self {
            definition,
            operators,
            functions,
            working,
            symbols: operators.all_symbols(),
            max_depth,
            depth: 0,
            aborted: false,
        }
    }

    /// Resolve flattened text into a node; `None` when it cannot be resolved
    pub fn resolve(&mut self, text: &str) -> Option<Arc<Node>> {
        if self.should_stop() {
            return None;
        }
        if self.depth >= self.max_depth {
            log::debug!("Resolution depth limit {} reached, giving up", self.max_depth);
            self.aborted = true;
            return None;
        }

        let text = text.trim();
        let fingerprint = self.working.fingerprint();
        if self.working.has_failed(text, fingerprint) {
            return None;
        }

        self.depth += 1;
        let node = self.resolve_text(text);
        self.depth -= 1;

        if node.is_none() && !self.should_stop() {
            self.working.record_failure(text, fingerprint);
        }
        node
    }

    /// Whether resolution was cancelled or hit the depth limit
    fn should_stop(&mut self) -> bool {
        if !self.aborted && self.working.is_cancelled() {
            log::debug!("Resolution cancelled");
            self.aborted = true;
        }
        self.aborted
    }

    fn resolve_text(&mut self, text: &str) -> Option<Arc<Node>> {
        if text.is_empty() {
            return None;
        }
        if let Some(constant) = self.working.constants().get(text) {
            return Some(Arc::clone(constant));
        }
        if is_identifier(text) {
            return self.resolve_parameter(text);
        }
        if is_placeholder(text) {
            return self.resolve_symbol(text);
        }

        let occurrences = self.scan(text);
        if let Some(node) = self.resolve_ternary(text, &occurrences) {
            return node;
        }
        if let Some(node) = self.resolve_binary(text, &occurrences) {
            return node;
        }
        let node = self.resolve_unary(text);
        if node.is_none() {
            log::trace!("Could not resolve '{text}'");
        }
        node
    }

    fn resolve_parameter(&mut self, name: &str) -> Option<Arc<Node>> {
        if let Some(node) = self.working.resolved(name) {
            return Some(node);
        }
        let node = Arc::new(Node::Parameter(ParameterNode::new(
            name,
            self.working.parameters(),
        )?));
        self.working.remember(name, Arc::clone(&node));
        Some(node)
    }

    fn resolve_symbol(&mut self, key: &str) -> Option<Arc<Node>> {
        if let Some(node) = self.working.resolved(key) {
            return Some(node);
        }

        let entry = self.working.symbols().get(key)?.clone();
        let node = match entry {
            SymbolEntry::Unresolved(text) => self.resolve(&text),
            SymbolEntry::FunctionCall(text) => self.resolve_function(&text),
            SymbolEntry::EscapedName(name) => self.resolve_parameter(&name),
        }?;

        self.working.remember(key, Arc::clone(&node));
        Some(node)
    }

    fn resolve_function(&mut self, text: &str) -> Option<Arc<Node>> {
        let (name, texts) = split_call(text, self.definition)?;
        if texts.len() > MAX_ARITY {
            log::debug!("'{name}' called with {} arguments", texts.len());
            return None;
        }
        let Some(function) = self.functions.get(name, texts.len()) else {
            log::debug!("No function '{name}' with arity {}", texts.len());
            return None;
        };

        let mut arguments = Arguments::new();
        for argument in texts {
            arguments.push(self.resolve(argument)?);
        }

        let working = &mut *self.working;
        let node = FunctionNode::new(function, arguments, &mut |kind| Some(working.special(kind)));
        match node {
            Some(node) => Some(Arc::new(Node::Function(node)).simplify()),
            None => {
                log::debug!("Arguments of '{text}' rejected by '{name}'");
                None
            }
        }
    }

    /// `Some(result)` when a ternary operator splits the text, `None` otherwise
    fn resolve_ternary(&mut self, text: &str, occurrences: &[Range<usize>]) -> Option<Option<Arc<Node>>> {
        for operator in self.operators.ternary_operators() {
            if self.should_stop() {
                return Some(None);
            }
            let Some((first, second)) =
                ternary_split(text, occurrences, operator.symbol(), operator.second_symbol())
            else {
                continue;
            };

            let checkpoint = self.working.checkpoint();
            let node = (|| {
                let operands = [
                    self.resolve(&text[..first.start])?,
                    self.resolve(&text[first.end..second.start])?,
                    self.resolve(&text[second.end..])?,
                ];
                TernaryNode::new(Arc::clone(&operator), operands)
            })();

            return Some(match node {
                Some(node) => Some(Arc::new(Node::Ternary(node)).simplify()),
                None => {
                    self.working.rollback(checkpoint);
                    None
                }
            });
        }
        None
    }

    /// `Some(result)` when some binary level has a candidate split, `None` otherwise
    fn resolve_binary(&mut self, text: &str, occurrences: &[Range<usize>]) -> Option<Option<Arc<Node>>> {
        let infix: Vec<&Range<usize>> = occurrences
            .iter()
            .enumerate()
            .filter(|(index, occurrence)| !is_prefix_position(text, occurrences, *index, occurrence))
            .map(|(_, occurrence)| occurrence)
            .collect();

        let registry = self.operators;
        for (level, operators) in registry.binary_levels() {
            let mut candidates: Vec<(Range<usize>, Arc<dyn BinaryOperator>)> = infix
                .iter()
                .filter_map(|occurrence| {
                    let symbol = &text[(*occurrence).clone()];
                    operators
                        .iter()
                        .find(|operator| operator.symbol() == symbol)
                        .map(|operator| ((*occurrence).clone(), Arc::clone(operator)))
                })
                .collect();
            if candidates.is_empty() {
                continue;
            }

            // Left associative levels split at the rightmost occurrence first
            if operators[0].associativity() == Associativity::Left {
                candidates.reverse();
            }

            for (occurrence, operator) in candidates {
                if self.should_stop() {
                    return Some(None);
                }
                let checkpoint = self.working.checkpoint();
                let node = self.resolve(&text[..occurrence.start]).and_then(|left| {
                    let right = self.resolve(&text[occurrence.end..])?;
                    BinaryNode::new(operator, left, right)
                });
                match node {
                    Some(node) => return Some(Some(Arc::new(Node::Binary(node)).simplify())),
                    None => self.working.rollback(checkpoint),
                }
            }

            log::trace!("No split of level {level} resolves '{text}'");
            return Some(None);
        }
        None
    }

    fn resolve_unary(&mut self, text: &str) -> Option<Arc<Node>> {
        for operator in self.operators.unary_operators() {
            if self.should_stop() {
                return None;
            }
            let Some(rest) = text.strip_prefix(operator.symbol()) else {
                continue;
            };
            if ends_in_word(operator.symbol()) && rest.chars().next().is_some_and(|c| c.is_xid_continue()) {
                continue;
            }

            let checkpoint = self.working.checkpoint();
            let node = self
                .resolve(rest)
                .and_then(|operand| UnaryNode::new(Arc::clone(&operator), operand));
            match node {
                Some(node) => return Some(Arc::new(Node::Unary(node)).simplify()),
                None => self.working.rollback(checkpoint),
            }
        }
        None
    }

    /// Non-overlapping operator occurrences, longest token first, outside placeholders
    fn scan(&self, text: &str) -> Vec<Range<usize>> {
        let skip = placeholder_spans(text);
        let mut found = Vec::new();
        let mut index = 0;

        while index < text.len() {
            if let Some(span) = skip.iter().find(|span| span.start == index) {
                index = span.end;
                continue;
            }
            let matched = self.symbols.iter().find(|symbol| {
                text[index..].starts_with(symbol.as_str())
                    && word_bounded(text, index..index + symbol.len())
            });
            match matched {
                Some(symbol) => {
                    found.push(index..index + symbol.len());
                    index += symbol.len();
                }
                None => {
                    index += text[index..].chars().next().map_or(1, char::len_utf8);
                }
            }
        }
        found
    }
}

fn ends_in_word(symbol: &str) -> bool {
    symbol.chars().last().is_some_and(|c| c.is_xid_continue())
}

/// Word-like tokens (`and`, `mod`) must not be part of a longer identifier
fn word_bounded(text: &str, range: Range<usize>) -> bool {
    let symbol = &text[range.clone()];
    let starts_word = symbol.chars().next().is_some_and(|c| c.is_xid_continue());
    if starts_word && text[..range.start].chars().last().is_some_and(|c| c.is_xid_continue()) {
        return false;
    }
    if ends_in_word(symbol) && text[range.end..].chars().next().is_some_and(|c| c.is_xid_continue()) {
        return false;
    }
    true
}

/// An occurrence at the start of the text or right after another operator is a prefix
fn is_prefix_position(text: &str, occurrences: &[Range<usize>], index: usize, occurrence: &Range<usize>) -> bool {
    let preceding_end = match index {
        0 => 0,
        _ => occurrences[index - 1].end,
    };
    text[preceding_end..occurrence.start].trim().is_empty()
}

/// First `symbol` occurrence and the `second` occurrence that closes it
fn ternary_split(
    text: &str,
    occurrences: &[Range<usize>],
    symbol: &str,
    second: &str,
) -> Option<(Range<usize>, Range<usize>)> {
    let start = occurrences
        .iter()
        .position(|occurrence| &text[occurrence.clone()] == symbol)?;
    let mut depth = 0usize;
    for occurrence in &occurrences[start + 1..] {
        let token = &text[occurrence.clone()];
        if token == symbol {
            depth += 1;
        } else if token == second {
            if depth == 0 {
                return Some((occurrences[start].clone(), occurrence.clone()));
            }
            depth -= 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::extractors::ExtractorSet;
    use crate::flatten::flatten;
    use crate::model::{TypeInfo, Value};
    use crate::nodes::{CompileMode, EvaluationScope};
    use crate::parameters::OperandType;

    fn generate(text: &str) -> (Option<Arc<Node>>, WorkingSet) {
        let definition = MathDefinition::default();
        let operators = OperatorRegistry::standard(&definition);
        let functions = FunctionRegistry::standard();
        let mut working = WorkingSet::new(CancellationToken::new());

        let extracted = ExtractorSet::standard(&definition)
            .apply(text, &mut working)
            .unwrap();
        let flattened = flatten(&extracted, &definition, &mut working);
        let node = flattened.and_then(|flat| {
            ExpressionGenerator::new(&definition, &operators, &functions, &mut working, DEFAULT_MAX_DEPTH)
                .resolve(&flat)
        });
        (node, working)
    }

    fn fold(text: &str) -> Value {
        let (node, _) = generate(text);
        let node = node.unwrap();
        assert!(node.is_constant(), "'{text}' did not fold: {node}");
        node.compile(CompileMode::Exact)(&EvaluationScope::empty()).unwrap()
    }

    #[test]
    fn test_precedence_and_associativity() {
        assert_eq!(fold("2 + 3 * 4"), Value::from(14));
        assert_eq!(fold("10 - 4 - 3"), Value::from(3));
        assert_eq!(fold("2 ^ 3 ^ 2"), Value::from(512.0));
        assert_eq!(fold("(2 + 3) * 4"), Value::from(20));
        assert_eq!(fold("1 + 2 = 3 & 4 > 3"), Value::from(true));
    }

    #[test]
    fn test_unary_operators() {
        assert_eq!(fold("-5 + 2"), Value::from(-3));
        assert_eq!(fold("3 * -2"), Value::from(-6));
        assert_eq!(fold("!true | false"), Value::from(false));
        assert_eq!(fold("- -4"), Value::from(4));
    }

    #[test]
    fn test_ternary_nests_to_the_right() {
        assert_eq!(fold("1 > 2 ? 10 : 2 > 1 ? 20 : 30"), Value::from(20));
        assert_eq!(fold("true ? false ? 1 : 2 : 3"), Value::from(2));
    }

    #[test]
    fn test_function_calls() {
        assert_eq!(fold("max(1, 2)"), Value::from(2));
        assert_eq!(fold("MAX(1, 2) + min(4, 3)"), Value::from(5));
        assert!(generate("max(1)").0.is_none());
        assert!(generate("max(1, 2, 3)").0.is_none());
        assert!(generate("max(1, , 2)").0.is_none());
        assert!(generate("nosuch(1)").0.is_none());
    }

    #[test]
    fn test_impure_functions_are_not_folded() {
        let (node, _) = generate("rand()");
        let node = node.unwrap();
        assert!(!node.is_constant());
        assert_eq!(node.return_type(), TypeInfo::FLOAT);
    }

    #[test]
    fn test_duplicate_groups_share_nodes() {
        let (node, _) = generate("(a+b)*(a+b)");
        let node = node.unwrap();
        let Node::Binary(product) = node.as_ref() else {
            panic!("expected a binary node, got {node}");
        };
        assert!(Arc::ptr_eq(product.left(), product.right()));
    }

    #[test]
    fn test_failed_branch_leaves_no_parameters() {
        let (node, working) = generate("\"x\" + 0b1 + a");
        assert!(node.is_none());
        assert!(working.parameters().is_empty());
    }

    #[test]
    fn test_parameter_types_follow_usage() {
        let (node, working) = generate("[unit price] << 2 + a");
        assert_eq!(node.unwrap().return_type(), TypeInfo::INTEGER);
        let registry = working.parameters();
        assert_eq!(
            registry.operand_type(registry.handle("unit price").unwrap()),
            OperandType::Known(TypeInfo::INTEGER)
        );
        assert_eq!(
            registry.operand_type(registry.handle("a").unwrap()),
            OperandType::Known(TypeInfo::NUMERIC)
        );
    }

    #[test]
    fn test_cancellation_fails_softly() {
        let definition = MathDefinition::default();
        let operators = OperatorRegistry::standard(&definition);
        let functions = FunctionRegistry::standard();
        let token = CancellationToken::new();
        let mut working = WorkingSet::new(token.clone());
        token.cancel();
        let mut generator =
            ExpressionGenerator::new(&definition, &operators, &functions, &mut working, DEFAULT_MAX_DEPTH);
        assert!(generator.resolve("a + b").is_none());
    }

    #[test]
    fn test_depth_limit() {
        let definition = MathDefinition::default();
        let operators = OperatorRegistry::standard(&definition);
        let functions = FunctionRegistry::standard();
        let mut working = WorkingSet::new(CancellationToken::new());
        let mut generator = ExpressionGenerator::new(&definition, &operators, &functions, &mut working, 2);
        assert!(generator.resolve("a + b + c").is_none());
        // the limit aborts the compilation, later requests fail too
        assert!(generator.resolve("a").is_none());
    }

    #[test]
    fn test_failures_are_remembered() {
        let definition = MathDefinition::default();
        let operators = OperatorRegistry::standard(&definition);
        let functions = FunctionRegistry::standard();
        let mut working = WorkingSet::new(CancellationToken::new());
        let mut generator =
            ExpressionGenerator::new(&definition, &operators, &functions, &mut working, DEFAULT_MAX_DEPTH);
        assert!(generator.resolve(" a - ").is_none());
        assert!(working.parameters().is_empty());
        assert!(working.has_failed("a -", working.fingerprint()));
    }

    #[test]
    fn test_failed_chain_resolves_in_polynomial_time() {
        let chain = format!("{} - 0b1", vec!["a"; 40].join(" - "));
        let (node, working) = generate(&chain);
        assert!(node.is_none());
        assert!(working.parameters().is_empty());
    }

    #[test]
    fn test_long_valid_chain_resolves() {
        let chain = vec!["a"; 100].join(" + ");
        let (node, working) = generate(&chain);
        assert!(node.is_some());
        assert_eq!(working.parameters().len(), 1);
    }

    #[test]
    fn test_identifiers() {
        assert!(is_identifier("rate_2"));
        assert!(is_identifier("_x"));
        assert!(!is_identifier("2x"));
        assert!(!is_identifier("a b"));
        assert!(!is_identifier(""));
    }
}
