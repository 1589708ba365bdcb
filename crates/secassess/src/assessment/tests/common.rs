use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::assessment::answers::{Answer, AnswerSet};
use crate::assessment::catalog::{Catalog, CatalogRegistry};
use crate::assessment::domain::{
    Assessment, AssessmentId, NewAssessment, OrganizationId, RelationshipKey, Score,
    SecurityLevel,
};
use crate::assessment::repository::{AssessmentRepository, RepositoryError};
use crate::assessment::scoring::{IncompletePolicy, ScoringConfig, ScoringEngine};
use crate::assessment::store::InMemoryAnswerStore;
use crate::assessment::thresholds::Thresholds;
use crate::assessment::{assessment_router, AssessmentService};

pub(super) const FIXTURE_CATALOG: &str = include_str!("../../../tests/fixtures/catalog.json");

pub(super) fn catalog() -> Catalog {
    Catalog::from_json_str(FIXTURE_CATALOG).expect("fixture catalog is valid")
}

pub(super) fn thresholds() -> Thresholds {
    Thresholds::default()
}

pub(super) fn engine() -> ScoringEngine {
    ScoringEngine::new(thresholds())
}

pub(super) fn strict_engine() -> ScoringEngine {
    ScoringEngine::with_config(
        thresholds(),
        ScoringConfig::with_policy(IncompletePolicy::FailMandatoryIncomplete),
    )
}

pub(super) fn score(value: i64) -> Score {
    Score::new(value).expect("valid score")
}

pub(super) fn key(control: &str, submeasure: &str) -> RelationshipKey {
    RelationshipKey::new(control, submeasure)
}

pub(super) fn scored(documentation: i64, implementation: i64) -> Answer {
    Answer::scored(score(documentation), score(implementation))
}

/// Build an answer set from `(control, submeasure, documentation, implementation)` rows.
pub(super) fn answers(rows: &[(&str, &str, i64, i64)]) -> AnswerSet {
    rows.iter()
        .map(|(control, submeasure, documentation, implementation)| {
            (
                key(control, submeasure),
                scored(*documentation, *implementation),
            )
        })
        .collect()
}

pub(super) fn new_assessment(level: SecurityLevel) -> NewAssessment {
    NewAssessment {
        organization_id: OrganizationId::new("org-zagreb-01"),
        security_level: level,
        catalog_version: None,
    }
}

pub(super) type TestService = AssessmentService<MemoryRepository, InMemoryAnswerStore>;

pub(super) fn build_service() -> (TestService, Arc<MemoryRepository>, Arc<InMemoryAnswerStore>) {
    build_service_with(engine())
}

pub(super) fn build_service_with(
    engine: ScoringEngine,
) -> (TestService, Arc<MemoryRepository>, Arc<InMemoryAnswerStore>) {
    let repository = Arc::new(MemoryRepository::default());
    let store = Arc::new(InMemoryAnswerStore::new());
    let service = AssessmentService::new(
        repository.clone(),
        store.clone(),
        CatalogRegistry::new(catalog()),
        engine,
    );
    (service, repository, store)
}

/// Service whose registry no longer holds the catalog the returned assessment is pinned to.
pub(super) fn service_missing_pinned_catalog() -> (TestService, AssessmentId) {
    let (original, repository, store) = build_service();
    let assessment = original
        .create(new_assessment(SecurityLevel::Basic))
        .expect("assessment created");

    let mut replacement: Value = serde_json::from_str(FIXTURE_CATALOG).expect("fixture parses");
    replacement["version"] = serde_json::json!("fixture-2030.1");
    let replacement: Catalog = serde_json::from_value(replacement).expect("catalog is valid");
    let service = AssessmentService::new(
        repository,
        store,
        CatalogRegistry::new(replacement),
        engine(),
    );
    (service, assessment.id)
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<HashMap<AssessmentId, Assessment>>>,
}

impl AssessmentRepository for MemoryRepository {
    fn insert(&self, assessment: Assessment) -> Result<Assessment, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&assessment.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(assessment.id.clone(), assessment.clone());
        Ok(assessment)
    }

    fn update(&self, assessment: Assessment) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.insert(assessment.id.clone(), assessment);
        Ok(())
    }

    fn fetch(&self, id: &AssessmentId) -> Result<Option<Assessment>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn remove(&self, id: &AssessmentId) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.remove(id).map(|_| ()).ok_or(RepositoryError::NotFound)
    }
}

pub(super) struct ConflictRepository;

impl AssessmentRepository for ConflictRepository {
    fn insert(&self, _assessment: Assessment) -> Result<Assessment, RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn update(&self, _assessment: Assessment) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }

    fn fetch(&self, _id: &AssessmentId) -> Result<Option<Assessment>, RepositoryError> {
        Ok(None)
    }

    fn remove(&self, _id: &AssessmentId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }
}

pub(super) struct UnavailableRepository;

impl AssessmentRepository for UnavailableRepository {
    fn insert(&self, _assessment: Assessment) -> Result<Assessment, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _assessment: Assessment) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &AssessmentId) -> Result<Option<Assessment>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn remove(&self, _id: &AssessmentId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn service_over<R: AssessmentRepository + 'static>(
    repository: R,
) -> Arc<AssessmentService<R, InMemoryAnswerStore>> {
    Arc::new(AssessmentService::new(
        Arc::new(repository),
        Arc::new(InMemoryAnswerStore::new()),
        CatalogRegistry::new(catalog()),
        engine(),
    ))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 64)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    assessment_router(Arc::new(service))
}
