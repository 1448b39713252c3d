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

//! String literal extraction

use super::Extractor;
use crate::model::Value;
use crate::working_set::WorkingSet;

/// Extracts text between string indicators; a doubled indicator is a literal one
pub struct StringExtractor {
    indicator: String,
}

impl StringExtractor {
    /// Extractor for the given indicator token
    pub fn new(indicator: &str) -> Self {
        Self {
            indicator: indicator.to_string(),
        }
    }

    /// Body of the literal starting right after an opening indicator
    ///
    /// Returns the unescaped content and the byte length consumed, including
    /// the closing indicator.
    fn literal_body(&self, after_open: &str) -> Option<(String, usize)> {
        let quote = self.indicator.as_str();
        let mut content = String::new();
        let mut cursor = 0;
        while let Some(offset) = after_open[cursor..].find(quote) {
            let found = cursor + offset;
            content.push_str(&after_open[cursor..found]);
            let next = found + quote.len();
            if after_open[next..].starts_with(quote) {
                content.push_str(quote);
                cursor = next + quote.len();
            } else {
                return Some((content, next));
            }
        }
        None
    }
}

impl Extractor for StringExtractor {
    fn name(&self) -> &'static str {
        "string"
    }

    fn level(&self) -> u16 {
        100
    }

    fn extract(&self, text: &str, working: &mut WorkingSet) -> String {
        let quote = self.indicator.as_str();
        let mut output = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find(quote) {
            let after_open = &rest[start + quote.len()..];
            let Some((content, consumed)) = self.literal_body(after_open) else {
                log::debug!("Unterminated string literal left in place");
                break;
            };
            let source = &rest[start..start + quote.len() + consumed];
            output.push_str(&rest[..start]);
            output.push_str(&working.constants.insert_literal(source, Value::from(content)));
            rest = &after_open[consumed..];
        }

        output.push_str(rest);
        output
    }
}
