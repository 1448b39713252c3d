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

//! Function call and parentheses flattening
//!
//! Groups are collapsed innermost first. A group directly preceded by an
//! identifier is a function call and is stored whole (`max(a, b)`); any other
//! group stores only its inner text. Either way the group is replaced by a
//! symbol placeholder, so after flattening the text contains no parentheses
//! and every operator left in it is at the top level.

use crate::definition::MathDefinition;
use crate::tables::SymbolEntry;
use crate::working_set::WorkingSet;
use unicode_xid::UnicodeXID;

/// Collapse every group of `text` into symbols
///
/// Returns `None` on unbalanced parentheses or cancellation.
pub fn flatten(text: &str, definition: &MathDefinition, working: &mut WorkingSet) -> Option<String> {
    let open = definition.left_parenthesis.as_str();
    let close = definition.right_parenthesis.as_str();
    let mut current = text.to_string();

    loop {
        if working.is_cancelled() {
            log::debug!("Flattening cancelled");
            return None;
        }

        let Some(close_at) = current.find(close) else {
            if current.contains(open) {
                log::debug!("Unbalanced '{open}' in '{text}'");
                return None;
            }
            return Some(current);
        };
        let Some(open_at) = current[..close_at].rfind(open) else {
            log::debug!("Unbalanced '{close}' in '{text}'");
            return None;
        };

        let end = close_at + close.len();
        let (start, entry) = match identifier_before(&current[..open_at]) {
            Some(start) => (
                start,
                SymbolEntry::FunctionCall(current[start..end].to_string()),
            ),
            None => (
                open_at,
                SymbolEntry::Unresolved(current[open_at + open.len()..close_at].to_string()),
            ),
        };

        let key = working.symbols.insert(entry);
        log::trace!("Collapsed '{}'", &current[start..end]);
        current = format!("{}{}{}", &current[..start], key, &current[end..]);
    }
}

/// Start of the identifier ending exactly at the end of `text`
fn identifier_before(text: &str) -> Option<usize> {
    let start = text
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_xid_continue())
        .last()
        .map(|(index, _)| index)?;
    let first = text[start..].chars().next()?;
    (first.is_xid_start() || first == '_').then_some(start)
}

/// Split the argument list of a flattened function call
///
/// Returns the function name and its trimmed arguments. An empty or
/// whitespace-only list has no arguments; an empty segment between
/// separators makes the call invalid.
pub fn split_call<'t>(text: &'t str, definition: &MathDefinition) -> Option<(&'t str, Vec<&'t str>)> {
    let open = definition.left_parenthesis.as_str();
    let close = definition.right_parenthesis.as_str();

    let open_at = text.find(open)?;
    let inner = text
        .strip_suffix(close)
        .and_then(|body| body.get(open_at + open.len()..))?;
    let name = text[..open_at].trim();
    if name.is_empty() {
        return None;
    }

    if inner.trim().is_empty() {
        return Some((name, Vec::new()));
    }

    let arguments: Vec<&str> = inner
        .split(definition.parameter_separator.as_str())
        .map(str::trim)
        .collect();
    if arguments.iter().any(|argument| argument.is_empty()) {
        log::debug!("Empty argument in call of '{name}'");
        return None;
    }
    Some((name, arguments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::tables::{is_placeholder, placeholder_spans};

    fn run(text: &str) -> (Option<String>, WorkingSet) {
        let mut working = WorkingSet::new(CancellationToken::new());
        let output = flatten(text, &MathDefinition::default(), &mut working);
        (output, working)
    }

    #[test]
    fn test_nested_groups_collapse_innermost_first() {
        let (output, working) = run("(a + (b * c)) - d");
        let output = output.unwrap();
        assert_eq!(placeholder_spans(&output).len(), 1);
        assert!(output.ends_with(" - d"));

        let entries: Vec<&SymbolEntry> = working.symbols().iter().map(|(_, e)| e).collect();
        assert_eq!(entries[0], &SymbolEntry::Unresolved("b * c".to_string()));
        assert!(matches!(entries[1], SymbolEntry::Unresolved(text) if text.starts_with("a + ")));
    }

    #[test]
    fn test_function_calls_keep_their_name() {
        let (output, working) = run("max(a, min(b, c))");
        let output = output.unwrap();
        assert!(is_placeholder(&output));
        match working.symbols().get(&output) {
            Some(SymbolEntry::FunctionCall(text)) => assert!(text.starts_with("max(a, ")),
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    fn test_identical_groups_share_one_symbol() {
        let (output, working) = run("(a+b)*(a+b)");
        let output = output.unwrap();
        let spans = placeholder_spans(&output);
        assert_eq!(&output[spans[0].clone()], &output[spans[1].clone()]);
        assert_eq!(working.symbols().len(), 1);
    }

    #[test]
    fn test_unbalanced_groups_fail() {
        assert!(run("(a + b").0.is_none());
        assert!(run("a + b)").0.is_none());
        assert!(run(")a(").0.is_none());
    }

    #[test]
    fn test_split_call() {
        let definition = MathDefinition::default();
        assert_eq!(split_call("pi()", &definition), Some(("pi", vec![])));
        assert_eq!(split_call("rand( )", &definition), Some(("rand", vec![])));
        assert_eq!(
            split_call("max(a , b)", &definition),
            Some(("max", vec!["a", "b"]))
        );
        assert_eq!(split_call("max(a, ,b)", &definition), None);
        assert_eq!(split_call("max(a,)", &definition), None);
    }
}
