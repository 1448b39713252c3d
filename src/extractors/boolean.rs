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

//! Boolean literal extraction

use super::{Extractor, replace_literals};
use crate::model::Value;
use crate::working_set::WorkingSet;
use once_cell::sync::Lazy;
use regex::Regex;

static BOOLEAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:true|false)\b").expect("valid boolean pattern"));

/// `true` / `false` as whole words
pub struct BooleanExtractor;

impl Extractor for BooleanExtractor {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn level(&self) -> u16 {
        600
    }

    fn extract(&self, text: &str, working: &mut WorkingSet) -> String {
        replace_literals(self.name(), &BOOLEAN, text, working, |literal| {
            Some(Value::Boolean(literal == "true"))
        })
    }
}
