use serde::{Deserialize, Serialize};
use tracing::warn;

use super::super::answers::{Answer, AnswerSet};
use super::super::catalog::{Catalog, Measure, Submeasure};
use super::super::domain::{
    CatalogVersion, ControlId, MeasureId, Score, SecurityLevel, SubmeasureId,
};
use super::super::thresholds::Threshold;
use super::config::{IncompletePolicy, ScoringConfig};
use super::progress::{percentage, ProgressSnapshot};
use super::scorer::{score_relationship, RelationshipScore};
use super::ScoringError;

/// Where a submeasure stands with respect to compliance evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmeasureStatus {
    /// No applicable relationships at this level; vacuously compliant.
    NotApplicable,
    /// Applicable relationships exist but none is fully answered. Passes
    /// vacuously unless the incomplete policy fails it.
    Pending,
    Evaluated,
}

/// Per-relationship line inside a submeasure result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipOutcome {
    pub control_id: ControlId,
    pub control_code: String,
    pub is_mandatory: bool,
    pub minimum_score: Option<Score>,
    pub documentation_score: Option<Score>,
    pub implementation_score: Option<Score>,
    pub score: RelationshipScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmeasureResult {
    pub submeasure_id: SubmeasureId,
    pub code: String,
    pub measure_id: MeasureId,
    pub status: SubmeasureStatus,
    pub documentation_avg: Option<f64>,
    pub implementation_avg: Option<f64>,
    pub overall_score: Option<f64>,
    pub failed_controls: Vec<String>,
    pub unanswered_mandatory: Vec<String>,
    pub passes_individual_threshold: bool,
    pub passes_average_threshold: bool,
    pub passes_overall: bool,
    pub total_controls: usize,
    pub answered_controls: usize,
    pub mandatory_controls: usize,
    pub mandatory_answered: usize,
    pub relationships: Vec<RelationshipOutcome>,
}

impl SubmeasureResult {
    /// Whether this submeasure is counted by `compliance_percentage`.
    ///
    /// Pending submeasures that pass vacuously stay out of the percentage.
    fn counts_toward_compliance(&self, policy: IncompletePolicy) -> bool {
        match self.status {
            SubmeasureStatus::NotApplicable => false,
            SubmeasureStatus::Evaluated => true,
            SubmeasureStatus::Pending => {
                policy == IncompletePolicy::FailMandatoryIncomplete && self.mandatory_controls > 0
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureResult {
    pub measure_id: MeasureId,
    pub code: String,
    pub passes_compliance: bool,
    pub critical_failures: Vec<String>,
    pub average_score: Option<f64>,
    pub total_controls: usize,
    pub answered_controls: usize,
    pub mandatory_controls: usize,
    pub mandatory_answered: usize,
}

/// Full compliance picture of one assessment snapshot.
///
/// `compliance_percentage` is the binary figure (share of judged submeasures
/// passing, where vacuously passing pending submeasures are not judged);
/// `average_score` is the continuous figure (mean of the non-null submeasure
/// overall scores on the 1–5 scale).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub security_level: SecurityLevel,
    pub catalog_version: CatalogVersion,
    pub thresholds_version: String,
    pub threshold: Threshold,
    pub measure_results: Vec<MeasureResult>,
    pub submeasure_results: Vec<SubmeasureResult>,
    pub compliance_percentage: f64,
    pub average_score: Option<f64>,
    pub passing_submeasures: usize,
    pub applicable_submeasures: usize,
    pub passing_measures: usize,
    pub progress: ProgressSnapshot,
}

#[derive(Default)]
struct Tally {
    documentation_sum: f64,
    implementation_sum: f64,
    relationship_sum: f64,
    total: usize,
    answered: usize,
    mandatory: usize,
    mandatory_answered: usize,
    failed: Vec<String>,
    unanswered_mandatory: Vec<String>,
}

impl Tally {
    fn record(&mut self, outcome: &RelationshipOutcome, answer: Option<&Answer>) {
        self.total += 1;
        if outcome.is_mandatory {
            self.mandatory += 1;
        }

        match (outcome.score, answer.and_then(Answer::scores)) {
            (
                RelationshipScore::Scored {
                    relationship_score,
                    individual_pass,
                },
                Some((documentation, implementation)),
            ) => {
                self.answered += 1;
                if outcome.is_mandatory {
                    self.mandatory_answered += 1;
                }
                self.documentation_sum += documentation.as_f64();
                self.implementation_sum += implementation.as_f64();
                self.relationship_sum += relationship_score;
                if !individual_pass {
                    self.failed.push(outcome.control_code.clone());
                }
            }
            _ => {
                if outcome.is_mandatory {
                    self.unanswered_mandatory.push(outcome.control_code.clone());
                }
            }
        }
    }

    fn mean(&self, sum: f64) -> Option<f64> {
        if self.answered == 0 {
            None
        } else {
            Some(sum / self.answered as f64)
        }
    }
}

pub(crate) fn aggregate_submeasure(
    level: SecurityLevel,
    catalog: &Catalog,
    submeasure: &Submeasure,
    answers: &AnswerSet,
    threshold: Threshold,
    config: &ScoringConfig,
) -> Result<SubmeasureResult, ScoringError> {
    let mut tally = Tally::default();
    let mut relationships = Vec::new();

    for relationship in catalog.relationships_of(submeasure) {
        let policy = catalog.resolve(relationship, level);
        if !policy.is_applicable() {
            continue;
        }

        let answer = answers.get(&policy.key);
        let outcome = RelationshipOutcome {
            control_id: policy.key.control_id.clone(),
            control_code: policy.control_code.clone(),
            is_mandatory: policy.is_mandatory,
            minimum_score: policy.minimum_score,
            documentation_score: answer.and_then(|answer| answer.documentation_score),
            implementation_score: answer.and_then(|answer| answer.implementation_score),
            score: score_relationship(&policy, answer),
        };
        tally.record(&outcome, answer);
        relationships.push(outcome);
    }

    let documentation_avg = tally.mean(tally.documentation_sum);
    let implementation_avg = tally.mean(tally.implementation_sum);
    let overall_score = tally.mean(tally.relationship_sum);

    if let (Some(overall), Some(documentation), Some(implementation)) =
        (overall_score, documentation_avg, implementation_avg)
    {
        let by_averages = (documentation + implementation) / 2.0;
        if (overall - by_averages).abs() > config.consistency_epsilon {
            return Err(ScoringError::InconsistentAggregate {
                submeasure: submeasure.code.clone(),
                by_relationship: overall,
                by_averages,
            });
        }
    }

    let status = if tally.total == 0 {
        SubmeasureStatus::NotApplicable
    } else if tally.answered == 0 {
        SubmeasureStatus::Pending
    } else {
        SubmeasureStatus::Evaluated
    };

    let (passes_individual_threshold, passes_average_threshold, passes_overall) = match status {
        SubmeasureStatus::NotApplicable => (true, true, true),
        SubmeasureStatus::Pending => {
            let passes = match config.incomplete_policy {
                IncompletePolicy::Vacuous => true,
                IncompletePolicy::FailMandatoryIncomplete => tally.mandatory == 0,
            };
            (false, false, passes)
        }
        SubmeasureStatus::Evaluated => {
            let individual = tally.failed.is_empty() && tally.answered > 0;
            let average = overall_score
                .map(|score| score >= threshold.average_minimum)
                .unwrap_or(false);
            let mandatory_gap = config.incomplete_policy
                == IncompletePolicy::FailMandatoryIncomplete
                && tally.mandatory_answered < tally.mandatory;
            (individual, average, individual && average && !mandatory_gap)
        }
    };

    Ok(SubmeasureResult {
        submeasure_id: submeasure.id.clone(),
        code: submeasure.code.clone(),
        measure_id: submeasure.measure_id.clone(),
        status,
        documentation_avg,
        implementation_avg,
        overall_score,
        failed_controls: tally.failed,
        unanswered_mandatory: tally.unanswered_mandatory,
        passes_individual_threshold,
        passes_average_threshold,
        passes_overall,
        total_controls: tally.total,
        answered_controls: tally.answered,
        mandatory_controls: tally.mandatory,
        mandatory_answered: tally.mandatory_answered,
        relationships,
    })
}

/// Roll child submeasure results up into a measure verdict.
///
/// A measure passes when every child passes. Counters are sums of the
/// children; each relationship belongs to exactly one submeasure so nothing
/// is counted twice.
pub(crate) fn aggregate_measure(measure: &Measure, children: &[SubmeasureResult]) -> MeasureResult {
    let critical_failures: Vec<String> = children
        .iter()
        .filter(|child| !child.passes_overall)
        .map(|child| child.code.clone())
        .collect();

    let scores: Vec<f64> = children
        .iter()
        .filter_map(|child| child.overall_score)
        .collect();

    MeasureResult {
        measure_id: measure.id.clone(),
        code: measure.code.clone(),
        passes_compliance: critical_failures.is_empty(),
        critical_failures,
        average_score: mean(&scores),
        total_controls: children.iter().map(|child| child.total_controls).sum(),
        answered_controls: children.iter().map(|child| child.answered_controls).sum(),
        mandatory_controls: children.iter().map(|child| child.mandatory_controls).sum(),
        mandatory_answered: children.iter().map(|child| child.mandatory_answered).sum(),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Walk the catalog bottom-up and produce the assessment result.
pub(crate) fn aggregate(
    level: SecurityLevel,
    catalog: &Catalog,
    answers: &AnswerSet,
    thresholds_version: &str,
    threshold: Threshold,
    config: &ScoringConfig,
) -> Result<AssessmentResult, ScoringError> {
    for key in answers.keys() {
        match catalog.policy(key, level) {
            None => {
                return Err(ScoringError::UnknownRelationship {
                    key: key.clone(),
                    catalog_version: catalog.version().clone(),
                })
            }
            Some(policy) if !policy.is_applicable() => {
                warn!(
                    relationship = %key,
                    %level,
                    "ignoring answer for inapplicable relationship"
                );
            }
            Some(_) => {}
        }
    }

    let mut measure_results = Vec::with_capacity(catalog.measures().len());
    let mut submeasure_results = Vec::new();

    for measure in catalog.measures() {
        let children = catalog
            .submeasures_of(measure)
            .map(|submeasure| {
                aggregate_submeasure(level, catalog, submeasure, answers, threshold, config)
            })
            .collect::<Result<Vec<_>, _>>()?;

        measure_results.push(aggregate_measure(measure, &children));
        submeasure_results.extend(children);
    }

    let counted: Vec<&SubmeasureResult> = submeasure_results
        .iter()
        .filter(|result| result.counts_toward_compliance(config.incomplete_policy))
        .collect();
    let applicable_submeasures = counted.len();
    let passing_submeasures = counted
        .iter()
        .filter(|result| result.passes_overall)
        .count();
    let scores: Vec<f64> = submeasure_results
        .iter()
        .filter_map(|result| result.overall_score)
        .collect();
    let passing_measures = measure_results
        .iter()
        .filter(|result| result.passes_compliance)
        .count();

    let progress = ProgressSnapshot::from_counts(
        measure_results.iter().map(|result| result.total_controls).sum(),
        measure_results.iter().map(|result| result.answered_controls).sum(),
        measure_results.iter().map(|result| result.mandatory_controls).sum(),
        measure_results.iter().map(|result| result.mandatory_answered).sum(),
    );

    Ok(AssessmentResult {
        security_level: level,
        catalog_version: catalog.version().clone(),
        thresholds_version: thresholds_version.to_string(),
        threshold,
        measure_results,
        submeasure_results,
        compliance_percentage: percentage(passing_submeasures, applicable_submeasures),
        average_score: mean(&scores),
        passing_submeasures,
        applicable_submeasures,
        passing_measures,
        progress,
    })
}
