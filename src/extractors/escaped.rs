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

//! Escaped parameter names such as `[unit price]`

use super::Extractor;
use crate::tables::SymbolEntry;
use crate::working_set::WorkingSet;

/// Turns text between special-symbol indicators into a parameter symbol
///
/// The name is taken verbatim, so it may contain spaces or operator tokens.
pub struct EscapedNameExtractor {
    open: String,
    close: String,
}

impl EscapedNameExtractor {
    /// Extractor for the given indicator pair
    pub fn new(open: &str, close: &str) -> Self {
        Self {
            open: open.to_string(),
            close: close.to_string(),
        }
    }
}

impl Extractor for EscapedNameExtractor {
    fn name(&self) -> &'static str {
        "escaped name"
    }

    fn level(&self) -> u16 {
        200
    }

    fn extract(&self, text: &str, working: &mut WorkingSet) -> String {
        let mut output = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find(self.open.as_str()) {
            let inner = &rest[start + self.open.len()..];
            let Some(end) = inner.find(self.close.as_str()) else {
                log::debug!("Unterminated escaped name left in place");
                break;
            };
            let name = &inner[..end];
            output.push_str(&rest[..start]);
            if name.trim().is_empty() {
                // Kept verbatim; an empty name never resolves
                output.push_str(&rest[start..start + self.open.len() + end + self.close.len()]);
            } else {
                let key = working
                    .symbols
                    .insert(SymbolEntry::EscapedName(name.to_string()));
                log::trace!("Escaped name '{name}' stored as symbol");
                output.push_str(&key);
            }
            rest = &inner[end + self.close.len()..];
        }

        output.push_str(rest);
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;

    #[test]
    fn test_names_become_symbols() {
        let mut working = WorkingSet::new(CancellationToken::new());
        let extractor = EscapedNameExtractor::new("[", "]");
        let output = extractor.extract("[unit price] * [qty] + [unit price]", &mut working);

        let keys: Vec<&str> = output.split(|c| c == '*' || c == '+').map(str::trim).collect();
        assert_eq!(keys.len(), 3);
        assert_eq!(keys[0], keys[2]);
        assert_eq!(
            working.symbols().get(keys[0]),
            Some(&SymbolEntry::EscapedName("unit price".to_string()))
        );
        assert_eq!(working.symbols().len(), 2);
    }

    #[test]
    fn test_empty_and_unterminated_names_are_left() {
        let mut working = WorkingSet::new(CancellationToken::new());
        let extractor = EscapedNameExtractor::new("[", "]");
        assert_eq!(extractor.extract("[] + [open", &mut working), "[] + [open");
        assert!(working.symbols().is_empty());
    }
}
