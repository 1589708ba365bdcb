use serde::{Deserialize, Serialize};

use super::super::answers::AnswerSet;
use super::super::catalog::Catalog;
use super::super::domain::SecurityLevel;

/// Completion counters over applicable relationships only.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total_controls: usize,
    pub answered_controls: usize,
    pub mandatory_controls: usize,
    pub mandatory_answered: usize,
    pub completion_percentage: f64,
    pub mandatory_completion_percentage: f64,
}

impl ProgressSnapshot {
    pub fn from_counts(
        total_controls: usize,
        answered_controls: usize,
        mandatory_controls: usize,
        mandatory_answered: usize,
    ) -> Self {
        Self {
            total_controls,
            answered_controls,
            mandatory_controls,
            mandatory_answered,
            completion_percentage: percentage(answered_controls, total_controls),
            mandatory_completion_percentage: percentage(mandatory_answered, mandatory_controls),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.answered_controls == self.total_controls
    }
}

pub(crate) fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Count applicable and answered relationships straight from the catalog.
///
/// Independent of the aggregator so it stays cheap enough for polling, but it
/// applies the same applicability rule and therefore yields the same counters.
pub fn compute_progress(
    level: SecurityLevel,
    catalog: &Catalog,
    answers: &AnswerSet,
) -> ProgressSnapshot {
    let mut total = 0;
    let mut answered = 0;
    let mut mandatory = 0;
    let mut mandatory_answered = 0;

    for relationship in catalog.relationships() {
        let requirement = relationship.requirement(level);
        if requirement.minimum_score.is_none() {
            continue;
        }

        let complete = answers
            .get(&relationship.key())
            .map(|answer| answer.is_complete())
            .unwrap_or(false);

        total += 1;
        if complete {
            answered += 1;
        }
        if requirement.is_mandatory {
            mandatory += 1;
            if complete {
                mandatory_answered += 1;
            }
        }
    }

    ProgressSnapshot::from_counts(total, answered, mandatory, mandatory_answered)
}
