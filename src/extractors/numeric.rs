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

//! Numeric and bit-string literal extraction
//!
//! All patterns are anchored on word boundaries, so digits that continue an
//! identifier (`x1`, `rate2b`) are left alone.

use super::{Extractor, replace_literals};
use crate::model::Value;
use crate::working_set::WorkingSet;
use once_cell::sync::Lazy;
use regex::Regex;

static HEXADECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b0[xX][0-9a-fA-F]+\b").expect("valid hexadecimal pattern"));
static BINARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b0[bB][01]+\b").expect("valid binary pattern"));
static SCIENTIFIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d+(?:\.\d+)?[eE][+-]?\d+\b").expect("valid scientific pattern")
});
static DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d+(?:\.\d+)?\b").expect("valid decimal pattern"));

/// `0x1F` → Integer; values above `i64::MAX` keep their two's complement bits
pub struct HexadecimalExtractor;

impl HexadecimalExtractor {
    fn convert(literal: &str) -> Option<Value> {
        u64::from_str_radix(&literal[2..], 16)
            .ok()
            .map(|bits| Value::Integer(bits as i64))
    }
}

impl Extractor for HexadecimalExtractor {
    fn name(&self) -> &'static str {
        "hexadecimal"
    }

    fn level(&self) -> u16 {
        300
    }

    fn extract(&self, text: &str, working: &mut WorkingSet) -> String {
        replace_literals(self.name(), &HEXADECIMAL, text, working, Self::convert)
    }
}

/// `0b101` → ByteArray, most significant bit first, left padded to whole bytes
pub struct BinaryExtractor;

impl BinaryExtractor {
    fn convert(literal: &str) -> Option<Value> {
        let digits = &literal[2..];
        let padding = (8 - digits.len() % 8) % 8;
        let padded: String = "0".repeat(padding) + digits;
        let bytes = padded
            .as_bytes()
            .chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .fold(0u8, |byte, bit| (byte << 1) | u8::from(*bit == b'1'))
            })
            .collect::<Vec<u8>>();
        Some(Value::from(bytes))
    }
}

impl Extractor for BinaryExtractor {
    fn name(&self) -> &'static str {
        "binary"
    }

    fn level(&self) -> u16 {
        310
    }

    fn extract(&self, text: &str, working: &mut WorkingSet) -> String {
        replace_literals(self.name(), &BINARY, text, working, Self::convert)
    }
}

/// `1.5e-3` → Float
pub struct ScientificExtractor;

impl ScientificExtractor {
    fn convert(literal: &str) -> Option<Value> {
        literal
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(Value::Float)
    }
}

impl Extractor for ScientificExtractor {
    fn name(&self) -> &'static str {
        "scientific"
    }

    fn level(&self) -> u16 {
        400
    }

    fn extract(&self, text: &str, working: &mut WorkingSet) -> String {
        replace_literals(self.name(), &SCIENTIFIC, text, working, Self::convert)
    }
}

/// `12` → Integer, `12.5` → Float
pub struct DecimalExtractor;

impl DecimalExtractor {
    fn convert(literal: &str) -> Option<Value> {
        if literal.contains('.') {
            literal.parse::<f64>().ok().map(Value::Float)
        } else {
            literal.parse::<i64>().ok().map(Value::Integer)
        }
    }
}

impl Extractor for DecimalExtractor {
    fn name(&self) -> &'static str {
        "decimal"
    }

    fn level(&self) -> u16 {
        500
    }

    fn extract(&self, text: &str, working: &mut WorkingSet) -> String {
        replace_literals(self.name(), &DECIMAL, text, working, Self::convert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::tables::is_placeholder;
    use rstest::rstest;

    fn single(extractor: &dyn Extractor, text: &str) -> Option<Value> {
        let mut working = WorkingSet::new(CancellationToken::new());
        let output = extractor.extract(text, &mut working);
        if !is_placeholder(&output) {
            return None;
        }
        working
            .constants()
            .get(&output)
            .and_then(|node| node.constant_value().cloned())
    }

    #[rstest]
    #[case("0xFF", Some(Value::Integer(255)))]
    #[case("0x0", Some(Value::Integer(0)))]
    #[case("0xFFFFFFFFFFFFFFFF", Some(Value::Integer(-1)))]
    #[case("0x1FFFFFFFFFFFFFFFF", None)]
    fn test_hexadecimal(#[case] text: &str, #[case] expected: Option<Value>) {
        assert_eq!(single(&HexadecimalExtractor, text), expected);
    }

    #[rstest]
    #[case("0b1", vec![0x01])]
    #[case("0b10000000", vec![0x80])]
    #[case("0b110000000", vec![0x01, 0x80])]
    fn test_binary(#[case] text: &str, #[case] expected: Vec<u8>) {
        assert_eq!(single(&BinaryExtractor, text), Some(Value::from(expected)));
    }

    #[rstest]
    #[case("1e3", Some(Value::Float(1000.0)))]
    #[case("2.5E-1", Some(Value::Float(0.25)))]
    #[case("1e999", None)]
    fn test_scientific(#[case] text: &str, #[case] expected: Option<Value>) {
        assert_eq!(single(&ScientificExtractor, text), expected);
    }

    #[rstest]
    #[case("42", Some(Value::Integer(42)))]
    #[case("4.25", Some(Value::Float(4.25)))]
    #[case("99999999999999999999", None)]
    fn test_decimal(#[case] text: &str, #[case] expected: Option<Value>) {
        assert_eq!(single(&DecimalExtractor, text), expected);
    }

    #[test]
    fn test_identifier_digits_are_not_literals() {
        let mut working = WorkingSet::new(CancellationToken::new());
        let output = DecimalExtractor.extract("x1 + y22 * 3", &mut working);
        assert!(output.starts_with("x1 + y22 * "));
        assert_eq!(working.constants().len(), 1);
    }
}
