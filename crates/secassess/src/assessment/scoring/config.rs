use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default tolerance when cross-checking the two `overall_score` formulas.
pub const DEFAULT_CONSISTENCY_EPSILON: f64 = 1e-9;

/// How submeasures with missing answers feed measure-level verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompletePolicy {
    /// Submeasures with nothing answered are pending and do not affect their
    /// measure; partially answered submeasures are judged on what is answered.
    #[default]
    Vacuous,
    /// Any unanswered mandatory relationship fails its submeasure, and pending
    /// submeasures with mandatory relationships count against their measure.
    FailMandatoryIncomplete,
}

impl IncompletePolicy {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Vacuous => "vacuous",
            Self::FailMandatoryIncomplete => "fail_mandatory_incomplete",
        }
    }
}

impl fmt::Display for IncompletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for IncompletePolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "vacuous" => Ok(Self::Vacuous),
            "fail_mandatory_incomplete" | "strict" => Ok(Self::FailMandatoryIncomplete),
            other => Err(format!(
                "unknown incomplete policy '{other}' (expected vacuous or fail_mandatory_incomplete)"
            )),
        }
    }
}

/// Tunable behavior of the scoring engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub incomplete_policy: IncompletePolicy,
    pub consistency_epsilon: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            incomplete_policy: IncompletePolicy::default(),
            consistency_epsilon: DEFAULT_CONSISTENCY_EPSILON,
        }
    }
}

impl ScoringConfig {
    pub fn with_policy(incomplete_policy: IncompletePolicy) -> Self {
        Self {
            incomplete_policy,
            ..Self::default()
        }
    }
}
