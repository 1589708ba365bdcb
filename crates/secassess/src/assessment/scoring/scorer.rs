use serde::{Deserialize, Serialize};

use super::super::answers::Answer;
use super::super::catalog::RelationshipPolicy;

/// Relationship-level outcome fed into every aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RelationshipScore {
    /// Not applicable at the assessment's level; excluded everywhere.
    Inapplicable,
    /// Applicable but missing at least one score.
    Unanswered,
    Scored {
        relationship_score: f64,
        individual_pass: bool,
    },
}

impl RelationshipScore {
    pub fn is_applicable(&self) -> bool {
        !matches!(self, RelationshipScore::Inapplicable)
    }

    pub fn is_answered(&self) -> bool {
        matches!(self, RelationshipScore::Scored { .. })
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            RelationshipScore::Scored {
                relationship_score, ..
            } => Some(*relationship_score),
            _ => None,
        }
    }
}

/// Score one relationship against its answer, if any.
pub fn score_relationship(
    policy: &RelationshipPolicy,
    answer: Option<&Answer>,
) -> RelationshipScore {
    let Some(minimum) = policy.minimum_score else {
        return RelationshipScore::Inapplicable;
    };

    match answer.and_then(Answer::scores) {
        None => RelationshipScore::Unanswered,
        Some((documentation, implementation)) => RelationshipScore::Scored {
            relationship_score: (documentation.as_f64() + implementation.as_f64()) / 2.0,
            individual_pass: documentation.min(implementation) >= minimum,
        },
    }
}
