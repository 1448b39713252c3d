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

//! Literal extraction passes
//!
//! Each extractor recognizes one literal category in the raw expression text,
//! stores the literal in the working set and replaces it with a placeholder
//! token. Later stages only ever see placeholders where literals used to be,
//! so the operator scan cannot be confused by a `-` inside a string or the
//! digits of `1e-5`.
//!
//! Extractors run in ascending [`Extractor::level`] order.

pub mod boolean;
pub mod escaped;
pub mod numeric;
pub mod string;

pub use boolean::BooleanExtractor;
pub use escaped::EscapedNameExtractor;
pub use numeric::{BinaryExtractor, DecimalExtractor, HexadecimalExtractor, ScientificExtractor};
pub use string::StringExtractor;

use crate::definition::MathDefinition;
use crate::model::Value;
use crate::working_set::WorkingSet;
use regex::Regex;

/// A literal extraction pass
pub trait Extractor: Send + Sync {
    /// Name used in log output
    fn name(&self) -> &'static str;

    /// Position in the pass order; lower levels run first
    fn level(&self) -> u16;

    /// Replace every literal this extractor recognizes with a placeholder
    fn extract(&self, text: &str, working: &mut WorkingSet) -> String;
}

/// The ordered set of extraction passes used by an engine
pub struct ExtractorSet {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorSet {
    /// Every built-in extractor, configured from the definition
    pub fn standard(definition: &MathDefinition) -> Self {
        let mut set = Self {
            extractors: Vec::new(),
        };
        set.add(StringExtractor::new(&definition.string_indicator));
        set.add(EscapedNameExtractor::new(
            &definition.special_symbol_open,
            &definition.special_symbol_close,
        ));
        set.add(HexadecimalExtractor);
        set.add(BinaryExtractor);
        set.add(ScientificExtractor);
        set.add(DecimalExtractor);
        set.add(BooleanExtractor);
        set
    }

    /// Insert an extractor, keeping level order
    pub fn add<E: Extractor + 'static>(&mut self, extractor: E) {
        let position = self
            .extractors
            .partition_point(|existing| existing.level() <= extractor.level());
        self.extractors.insert(position, Box::new(extractor));
    }

    /// Run every pass; `None` when the compilation is cancelled
    pub fn apply(&self, text: &str, working: &mut WorkingSet) -> Option<String> {
        let mut current = text.to_string();
        for extractor in &self.extractors {
            if working.is_cancelled() {
                log::debug!("Extraction cancelled before '{}'", extractor.name());
                return None;
            }
            current = extractor.extract(&current, working);
        }
        Some(current)
    }

    /// Extractor names in pass order
    pub fn names(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }
}

/// Replace every match of `pattern` whose text `convert` accepts
///
/// Rejected matches stay in the text untouched.
pub(crate) fn replace_literals(
    name: &str,
    pattern: &Regex,
    text: &str,
    working: &mut WorkingSet,
    convert: impl Fn(&str) -> Option<Value>,
) -> String {
    let mut output = String::with_capacity(text.len());
    let mut last = 0;
    for found in pattern.find_iter(text) {
        let literal = found.as_str();
        let Some(value) = convert(literal) else {
            log::debug!("{name} extractor left malformed literal '{literal}' in place");
            continue;
        };
        output.push_str(&text[last..found.start()]);
        output.push_str(&working.constants.insert_literal(literal, value));
        log::trace!("{name} extractor: '{literal}'");
        last = found.end();
    }
    output.push_str(&text[last..]);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::tables::placeholder_spans;

    fn extract(text: &str) -> (String, WorkingSet) {
        let mut working = WorkingSet::new(CancellationToken::new());
        let set = ExtractorSet::standard(&MathDefinition::default());
        let output = set.apply(text, &mut working).unwrap();
        (output, working)
    }

    #[test]
    fn test_passes_run_in_level_order() {
        let set = ExtractorSet::standard(&MathDefinition::default());
        assert_eq!(
            set.names(),
            vec![
                "string",
                "escaped name",
                "hexadecimal",
                "binary",
                "scientific",
                "decimal",
                "boolean"
            ]
        );
    }

    #[test]
    fn test_mixed_literals() {
        let (output, working) = extract(r#"x1 + 2.5e3 - "a-b" * 0xFF & true"#);
        assert!(output.starts_with("x1 + "));
        assert_eq!(placeholder_spans(&output).len(), 4);
        assert_eq!(working.constants().len(), 4);
        assert_eq!(output.matches('-').count(), 1);
    }

    #[test]
    fn test_cancelled_extraction_fails() {
        let token = CancellationToken::new();
        token.cancel();
        let mut working = WorkingSet::new(token);
        let set = ExtractorSet::standard(&MathDefinition::default());
        assert!(set.apply("1 + 2", &mut working).is_none());
    }
}
