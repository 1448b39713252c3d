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

//! Numeric comparison tolerance

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Slack applied to numeric comparisons when evaluating with tolerance
///
/// A left value `l` is considered equal to a right value `r` when any
/// configured criterion accepts it:
/// - range: `r - lower <= l <= r + upper`
/// - proportional: `r / p <= l <= r * p` (for positive `r`, mirrored otherwise)
/// - percentage: `|l - r| <= |r| * pct`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Tolerance {
    /// Accepted distance below the right operand
    pub lower: Option<f64>,
    /// Accepted distance above the right operand
    pub upper: Option<f64>,
    /// Proportional factor (must be at least 1)
    pub proportional: Option<f64>,
    /// Relative distance as a fraction of the right operand
    pub percentage: Option<f64>,
}

impl Tolerance {
    /// Symmetric absolute range
    pub fn range(delta: f64) -> Self {
        Self {
            lower: Some(delta.abs()),
            upper: Some(delta.abs()),
            ..Self::default()
        }
    }

    /// Asymmetric absolute range
    pub fn bounds(lower: f64, upper: f64) -> Self {
        Self {
            lower: Some(lower.abs()),
            upper: Some(upper.abs()),
            ..Self::default()
        }
    }

    /// Proportional tolerance
    pub fn proportional(factor: f64) -> Self {
        Self {
            proportional: Some(factor.abs().max(1.0)),
            ..Self::default()
        }
    }

    /// Percentage tolerance, given as a fraction (0.05 for 5%)
    pub fn percentage(fraction: f64) -> Self {
        Self {
            percentage: Some(fraction.abs()),
            ..Self::default()
        }
    }

    /// Whether `left` is tolerably equal to `right`
    pub fn accepts(&self, left: f64, right: f64) -> bool {
        if left == right {
            return true;
        }

        if self.lower.is_some() || self.upper.is_some() {
            let lower = self.lower.unwrap_or(0.0);
            let upper = self.upper.unwrap_or(0.0);
            if left >= right - lower && left <= right + upper {
                return true;
            }
        }

        if let Some(factor) = self.proportional {
            let (a, b) = (right / factor, right * factor);
            let (min, max) = if a <= b { (a, b) } else { (b, a) };
            if left >= min && left <= max {
                return true;
            }
        }

        if let Some(fraction) = self.percentage {
            if (left - right).abs() <= right.abs() * fraction {
                return true;
            }
        }

        false
    }

    /// Ordering of `left` relative to `right` where tolerated values compare equal
    pub fn compare(&self, left: f64, right: f64) -> Option<Ordering> {
        if self.accepts(left, right) {
            Some(Ordering::Equal)
        } else {
            left.partial_cmp(&right)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_tolerance() {
        let tolerance = Tolerance::range(0.5);
        assert!(tolerance.accepts(10.4, 10.0));
        assert!(tolerance.accepts(9.5, 10.0));
        assert!(!tolerance.accepts(10.6, 10.0));
        assert_eq!(tolerance.compare(10.2, 10.0), Some(Ordering::Equal));
        assert_eq!(tolerance.compare(11.0, 10.0), Some(Ordering::Greater));
    }

    #[test]
    fn test_proportional_tolerance() {
        let tolerance = Tolerance::proportional(2.0);
        assert!(tolerance.accepts(19.0, 10.0));
        assert!(tolerance.accepts(5.0, 10.0));
        assert!(!tolerance.accepts(4.0, 10.0));
        assert!(tolerance.accepts(-15.0, -10.0));
    }

    #[test]
    fn test_percentage_tolerance() {
        let tolerance = Tolerance::percentage(0.1);
        assert!(tolerance.accepts(109.0, 100.0));
        assert!(!tolerance.accepts(111.0, 100.0));
    }
}
