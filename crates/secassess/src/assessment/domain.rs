use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of an atomic control in the regulatory catalog.
    ControlId
);
string_id!(
    /// Identifier of a submeasure grouping.
    SubmeasureId
);
string_id!(
    /// Identifier of a top-level measure.
    MeasureId
);
string_id!(
    /// Identifier wrapper for assessments.
    AssessmentId
);
string_id!(
    /// Opaque organization identifier supplied by the identity layer.
    OrganizationId
);
string_id!(
    /// Version label of a catalog snapshot an assessment is pinned to.
    CatalogVersion
);

/// Key of a control-submeasure relationship, and of the answer recorded for it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationshipKey {
    pub control_id: ControlId,
    pub submeasure_id: SubmeasureId,
}

impl RelationshipKey {
    pub fn new(control_id: impl Into<String>, submeasure_id: impl Into<String>) -> Self {
        Self {
            control_id: ControlId(control_id.into()),
            submeasure_id: SubmeasureId(submeasure_id.into()),
        }
    }
}

impl fmt::Display for RelationshipKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.control_id, self.submeasure_id)
    }
}

/// Raised when a raw score falls outside the 1..=5 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("score {value} is outside the permitted range 1..=5")]
pub struct ScoreRangeError {
    pub value: i64,
}

/// Maturity score on the 1..=5 scale used for documentation and implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> Result<Self, ScoreRangeError> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ScoreRangeError { value })
        }
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0)
    }
}

impl TryFrom<i64> for Score {
    type Error = ScoreRangeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Security level chosen when an assessment is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    Basic,
    Medium,
    Advanced,
}

impl SecurityLevel {
    pub const fn ordered() -> [Self; 3] {
        [Self::Basic, Self::Medium, Self::Advanced]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Medium => "medium",
            Self::Advanced => "advanced",
        }
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SecurityLevel {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "medium" => Ok(Self::Medium),
            "advanced" => Ok(Self::Advanced),
            other => Err(format!(
                "unknown security level '{other}' (expected basic, medium, or advanced)"
            )),
        }
    }
}

/// Lifecycle state of an assessment. Transitions are driven outside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    Draft,
    InProgress,
    Review,
    Completed,
    Archived,
}

impl AssessmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InProgress => "in_progress",
            Self::Review => "review",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }

    pub const fn accepts_answers(self) -> bool {
        !matches!(self, Self::Archived)
    }
}

/// Assessment owned by an organization and pinned to one catalog version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: AssessmentId,
    pub organization_id: OrganizationId,
    pub security_level: SecurityLevel,
    pub status: AssessmentStatus,
    pub catalog_version: CatalogVersion,
    pub created_at: DateTime<Utc>,
}

/// Request payload for creating an assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAssessment {
    pub organization_id: OrganizationId,
    pub security_level: SecurityLevel,
    #[serde(default)]
    pub catalog_version: Option<CatalogVersion>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_rejects_values_outside_scale() {
        assert_eq!(Score::new(0), Err(ScoreRangeError { value: 0 }));
        assert_eq!(Score::new(6), Err(ScoreRangeError { value: 6 }));
        assert_eq!(Score::new(-3), Err(ScoreRangeError { value: -3 }));
        assert_eq!(Score::new(5).map(Score::value), Ok(5));
    }

    #[test]
    fn score_deserialization_validates_range() {
        let ok: Score = serde_json::from_str("3").expect("valid score");
        assert_eq!(ok.value(), 3);
        assert!(serde_json::from_str::<Score>("9").is_err());
        assert_eq!(serde_json::to_string(&ok).expect("serializes"), "3");
    }

    #[test]
    fn security_level_parses_case_insensitively() {
        assert_eq!("Medium".parse::<SecurityLevel>(), Ok(SecurityLevel::Medium));
        assert_eq!(" ADVANCED ".parse::<SecurityLevel>(), Ok(SecurityLevel::Advanced));
        assert!("expert".parse::<SecurityLevel>().is_err());
    }
}
