//! Compliance scoring and progress for cybersecurity self-assessments.
//!
//! The catalog and threshold table are static reference data; answers are the
//! only mutable state. Results and progress are pure projections of
//! `{catalog, thresholds, answers, security level}` recomputed on every read.

pub mod answers;
pub mod catalog;
pub mod domain;
pub mod guard;
pub mod import;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod store;
pub mod thresholds;

#[cfg(test)]
mod tests;

pub use answers::{Answer, AnswerPatch, AnswerSet, AnswerSubmission, FieldUpdate};
pub use catalog::{
    Catalog, CatalogDocument, CatalogError, CatalogRegistry, Control, ControlRelationship,
    LevelRequirement, Measure, RelationshipPolicy, Submeasure,
};
pub use domain::{
    Assessment, AssessmentId, AssessmentStatus, CatalogVersion, ControlId, MeasureId,
    NewAssessment, OrganizationId, RelationshipKey, Score, ScoreRangeError, SecurityLevel,
    SubmeasureId,
};
pub use guard::{AnswerGuard, GuardError};
pub use import::{AnswerCsvImporter, AnswerImportError};
pub use repository::{AssessmentRepository, AssessmentView, RepositoryError};
pub use router::assessment_router;
pub use scoring::{
    compute_progress, compute_results, score_relationship, AssessmentResult, IncompletePolicy,
    MeasureResult, ProgressSnapshot, RelationshipOutcome, RelationshipScore, ScoringConfig,
    ScoringEngine, ScoringError, SubmeasureResult, SubmeasureStatus,
};
pub use service::{AssessmentService, AssessmentServiceError};
pub use store::{AnswerStore, InMemoryAnswerStore, StoreError};
pub use thresholds::{Threshold, ThresholdError, Thresholds};
