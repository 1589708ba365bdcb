mod aggregate;
mod config;
mod progress;
mod scorer;

pub use aggregate::{
    AssessmentResult, MeasureResult, RelationshipOutcome, SubmeasureResult, SubmeasureStatus,
};
pub use config::{IncompletePolicy, ScoringConfig, DEFAULT_CONSISTENCY_EPSILON};
pub use progress::{compute_progress, ProgressSnapshot};
pub use scorer::{score_relationship, RelationshipScore};

use tracing::debug;

use super::answers::{Answer, AnswerSet};
use super::catalog::{Catalog, ControlRelationship};
use super::domain::{CatalogVersion, RelationshipKey, SecurityLevel};
use super::thresholds::Thresholds;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("answer references relationship {key} absent from catalog {catalog_version}")]
    UnknownRelationship {
        key: RelationshipKey,
        catalog_version: CatalogVersion,
    },
    #[error(
        "inconsistent aggregate for submeasure {submeasure}: mean of relationship scores \
         {by_relationship} differs from mean of averages {by_averages}"
    )]
    InconsistentAggregate {
        submeasure: String,
        by_relationship: f64,
        by_averages: f64,
    },
}

/// Compute the full compliance result with the default scoring policy.
pub fn compute_results(
    level: SecurityLevel,
    catalog: &Catalog,
    answers: &AnswerSet,
    thresholds: &Thresholds,
) -> Result<AssessmentResult, ScoringError> {
    ScoringEngine::new(thresholds.clone()).compute_results(level, catalog, answers)
}

/// Stateless engine carrying the injected threshold table and scoring policy.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    thresholds: Thresholds,
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(thresholds: Thresholds) -> Self {
        Self::with_config(thresholds, ScoringConfig::default())
    }

    pub fn with_config(thresholds: Thresholds, config: ScoringConfig) -> Self {
        Self { thresholds, config }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn compute_results(
        &self,
        level: SecurityLevel,
        catalog: &Catalog,
        answers: &AnswerSet,
    ) -> Result<AssessmentResult, ScoringError> {
        debug!(
            %level,
            catalog = %catalog.version(),
            answers = answers.len(),
            policy = %self.config.incomplete_policy,
            "computing assessment results"
        );
        aggregate::aggregate(
            level,
            catalog,
            answers,
            &self.thresholds.version,
            self.thresholds.for_level(level),
            &self.config,
        )
    }

    pub fn compute_progress(
        &self,
        level: SecurityLevel,
        catalog: &Catalog,
        answers: &AnswerSet,
    ) -> ProgressSnapshot {
        compute_progress(level, catalog, answers)
    }

    /// Immediate per-control feedback without a full recompute.
    pub fn score_relationship(
        &self,
        level: SecurityLevel,
        catalog: &Catalog,
        relationship: &ControlRelationship,
        answer: Option<&Answer>,
    ) -> RelationshipScore {
        score_relationship(&catalog.resolve(relationship, level), answer)
    }
}
