//! Rate validation.

use serde::{Deserialize, Serialize};

use crate::error::RuleError;
use crate::models::{Rate, RateType};

/// Non-fatal findings about a rate that should be reviewed by whoever
/// authored the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RateCaution {
    /// A percentage rate above 100% is accepted but unusual.
    PercentageAbove100,
}

impl std::fmt::Display for RateCaution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateCaution::PercentageAbove100 => {
                f.write_str("percentage rate exceeds 100% and should be reviewed")
            }
        }
    }
}

impl Rate {
    /// Checks that the rate is a finite, non-negative number.
    ///
    /// Percentages above 100 pass validation but come back with a
    /// [`RateCaution`] so the caller can ask for a review.
    pub fn validate(&self) -> Result<Option<RateCaution>, RuleError> {
        if !self.rate.is_finite() || self.rate < 0.0 {
            return Err(RuleError::InvalidRate(self.rate));
        }
        if self.rate_type == RateType::Percentage && self.rate > 100.0 {
            return Ok(Some(RateCaution::PercentageAbove100));
        }
        Ok(None)
    }
}
