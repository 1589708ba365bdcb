use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::answers::{Answer, AnswerSubmission};
use super::catalog::{Catalog, CatalogRegistry};
use super::domain::{
    Assessment, AssessmentId, AssessmentStatus, CatalogVersion, NewAssessment, RelationshipKey,
};
use super::guard::{AnswerGuard, GuardError};
use super::repository::{AssessmentRepository, RepositoryError};
use super::scoring::{
    AssessmentResult, ProgressSnapshot, RelationshipScore, ScoringEngine, ScoringError,
};
use super::store::{AnswerStore, StoreError};

/// Service composing the assessment repository, answer store, guard, and scoring engine.
pub struct AssessmentService<R, S> {
    repository: Arc<R>,
    store: Arc<S>,
    catalogs: Arc<CatalogRegistry>,
    engine: Arc<ScoringEngine>,
}

static ASSESSMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_assessment_id() -> AssessmentId {
    let id = ASSESSMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AssessmentId(format!("asmt-{id:06}"))
}

impl<R, S> AssessmentService<R, S>
where
    R: AssessmentRepository + 'static,
    S: AnswerStore + 'static,
{
    pub fn new(
        repository: Arc<R>,
        store: Arc<S>,
        catalogs: CatalogRegistry,
        engine: ScoringEngine,
    ) -> Self {
        Self {
            repository,
            store,
            catalogs: Arc::new(catalogs),
            engine: Arc::new(engine),
        }
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn catalogs(&self) -> &CatalogRegistry {
        &self.catalogs
    }

    /// Create a draft assessment pinned to the requested (or current) catalog.
    pub fn create(&self, request: NewAssessment) -> Result<Assessment, AssessmentServiceError> {
        let catalog_version = match request.catalog_version {
            Some(version) if self.catalogs.get(&version).is_none() => {
                return Err(AssessmentServiceError::UnknownCatalogVersion(version));
            }
            Some(version) => version,
            None => self.catalogs.current_version().clone(),
        };

        let assessment = Assessment {
            id: next_assessment_id(),
            organization_id: request.organization_id,
            security_level: request.security_level,
            status: AssessmentStatus::Draft,
            catalog_version,
            created_at: Utc::now(),
        };

        let stored = self.repository.insert(assessment)?;
        info!(
            assessment = %stored.id,
            organization = %stored.organization_id,
            level = %stored.security_level,
            catalog = %stored.catalog_version,
            "assessment created"
        );
        Ok(stored)
    }

    pub fn get(&self, id: &AssessmentId) -> Result<Assessment, AssessmentServiceError> {
        let assessment = self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(assessment)
    }

    pub fn update_status(
        &self,
        id: &AssessmentId,
        status: AssessmentStatus,
    ) -> Result<Assessment, AssessmentServiceError> {
        let mut assessment = self.get(id)?;
        let previous = assessment.status;
        assessment.status = status;
        self.repository.update(assessment.clone())?;
        info!(
            assessment = %id,
            from = previous.label(),
            to = status.label(),
            "assessment status changed"
        );
        Ok(assessment)
    }

    /// Delete an assessment together with every answer recorded for it.
    /// Remove the assessment, then its answers.
    ///
    /// Writers that validated against the assessment before removal are
    /// refused by the store instead of recreating its answers.
    pub fn delete(&self, id: &AssessmentId) -> Result<(), AssessmentServiceError> {
        self.repository.remove(id)?;
        self.store.remove_assessment(id)?;
        info!(assessment = %id, "assessment deleted");
        Ok(())
    }

    pub fn submit_answer(
        &self,
        id: &AssessmentId,
        submission: AnswerSubmission,
    ) -> Result<Answer, AssessmentServiceError> {
        let (assessment, catalog) = self.writable_context(id)?;
        let guard = AnswerGuard::new(&catalog, assessment.security_level);
        let (key, patch) = guard.validate(submission)?;

        debug!(assessment = %id, relationship = %key, "recording answer");
        let answer = self.store.upsert_answer(id, key, patch)?;
        Ok(answer)
    }

    /// Validate every submission, then apply them as one atomic batch.
    pub fn submit_batch(
        &self,
        id: &AssessmentId,
        submissions: Vec<AnswerSubmission>,
    ) -> Result<Vec<Answer>, AssessmentServiceError> {
        let (assessment, catalog) = self.writable_context(id)?;
        let guard = AnswerGuard::new(&catalog, assessment.security_level);
        let writes = guard.validate_all(submissions)?;

        debug!(assessment = %id, writes = writes.len(), "recording answer batch");
        let answers = self.store.batch_upsert(id, writes)?;
        Ok(answers)
    }

    pub fn answer(
        &self,
        id: &AssessmentId,
        key: &RelationshipKey,
    ) -> Result<Option<Answer>, AssessmentServiceError> {
        self.get(id)?;
        Ok(self.store.get_answer(id, key)?)
    }

    pub fn progress(&self, id: &AssessmentId) -> Result<ProgressSnapshot, AssessmentServiceError> {
        let (assessment, catalog) = self.context(id)?;
        let answers = self.store.snapshot(id)?;
        Ok(self
            .engine
            .compute_progress(assessment.security_level, &catalog, &answers))
    }

    pub fn results(&self, id: &AssessmentId) -> Result<AssessmentResult, AssessmentServiceError> {
        let (assessment, catalog) = self.context(id)?;
        let answers = self.store.snapshot(id)?;
        let result = self
            .engine
            .compute_results(assessment.security_level, &catalog, &answers)?;
        Ok(result)
    }

    pub fn relationship_score(
        &self,
        id: &AssessmentId,
        key: &RelationshipKey,
    ) -> Result<RelationshipScore, AssessmentServiceError> {
        let (assessment, catalog) = self.context(id)?;
        let relationship = catalog
            .relationship(key)
            .ok_or_else(|| AssessmentServiceError::UnknownRelationship {
                key: key.clone(),
                catalog_version: catalog.version().clone(),
            })?;
        let answer = self.store.get_answer(id, key)?;
        Ok(self.engine.score_relationship(
            assessment.security_level,
            &catalog,
            relationship,
            answer.as_ref(),
        ))
    }

    fn context(
        &self,
        id: &AssessmentId,
    ) -> Result<(Assessment, Arc<Catalog>), AssessmentServiceError> {
        let assessment = self.get(id)?;
        let catalog = self
            .catalogs
            .get(&assessment.catalog_version)
            .ok_or_else(|| {
                AssessmentServiceError::PinnedCatalogMissing {
                    assessment: assessment.id.clone(),
                    catalog_version: assessment.catalog_version.clone(),
                }
            })?;
        Ok((assessment, catalog))
    }

    fn writable_context(
        &self,
        id: &AssessmentId,
    ) -> Result<(Assessment, Arc<Catalog>), AssessmentServiceError> {
        let (assessment, catalog) = self.context(id)?;
        if !assessment.status.accepts_answers() {
            return Err(AssessmentServiceError::AssessmentArchived(assessment.id));
        }
        Ok((assessment, catalog))
    }
}

/// Error raised by the assessment service.
#[derive(Debug, thiserror::Error)]
pub enum AssessmentServiceError {
    #[error(transparent)]
    Guard(#[from] GuardError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error("catalog version {0} is not registered")]
    UnknownCatalogVersion(CatalogVersion),
    #[error("assessment {assessment} is pinned to unregistered catalog {catalog_version}")]
    PinnedCatalogMissing {
        assessment: AssessmentId,
        catalog_version: CatalogVersion,
    },
    #[error("relationship {key} is not part of catalog {catalog_version}")]
    UnknownRelationship {
        key: RelationshipKey,
        catalog_version: CatalogVersion,
    },
    #[error("assessment {0} is archived and no longer accepts answers")]
    AssessmentArchived(AssessmentId),
}
