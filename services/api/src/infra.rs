use metrics_exporter_prometheus::PrometheusHandle;
use secassess::assessment::{
    AnswerGuard, AnswerSet, AnswerSubmission, Assessment, AssessmentId, AssessmentRepository,
    AssessmentResult, AssessmentServiceError, Catalog, CatalogRegistry, IncompletePolicy,
    RepositoryError, ScoringConfig, ScoringEngine, SecurityLevel, Thresholds,
};
use secassess::config::ScoringSettings;
use secassess::error::AppError;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

pub(crate) const BASELINE_CATALOG: &str = include_str!("../data/baseline_catalog.json");

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) engine: Arc<ScoringEngine>,
}

type Records = HashMap<AssessmentId, Assessment>;

#[derive(Default, Clone)]
pub(crate) struct InMemoryAssessmentRepository {
    records: Arc<Mutex<Records>>,
}

impl InMemoryAssessmentRepository {
    fn records(&self) -> Result<MutexGuard<'_, Records>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }
}

impl AssessmentRepository for InMemoryAssessmentRepository {
    fn insert(&self, assessment: Assessment) -> Result<Assessment, RepositoryError> {
        let mut guard = self.records()?;
        if guard.contains_key(&assessment.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(assessment.id.clone(), assessment.clone());
        Ok(assessment)
    }

    fn update(&self, assessment: Assessment) -> Result<(), RepositoryError> {
        let mut guard = self.records()?;
        if guard.contains_key(&assessment.id) {
            guard.insert(assessment.id.clone(), assessment);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &AssessmentId) -> Result<Option<Assessment>, RepositoryError> {
        let guard = self.records()?;
        Ok(guard.get(id).cloned())
    }

    fn remove(&self, id: &AssessmentId) -> Result<(), RepositoryError> {
        let mut guard = self.records()?;
        guard.remove(id).map(|_| ()).ok_or(RepositoryError::NotFound)
    }
}

/// Load the catalog from `path`, falling back to the bundled baseline.
pub(crate) fn load_catalog(path: Option<&Path>) -> Result<Catalog, AppError> {
    let catalog = match path {
        Some(path) => Catalog::from_path(path)?,
        None => Catalog::from_json_str(BASELINE_CATALOG)?,
    };
    info!(
        version = %catalog.version(),
        measures = catalog.measures().len(),
        source = path.map(|p| p.display().to_string()).unwrap_or_else(|| "bundled".to_string()),
        "catalog loaded"
    );
    Ok(catalog)
}

pub(crate) fn load_thresholds(path: Option<&Path>) -> Result<Thresholds, AppError> {
    match path {
        Some(path) => Ok(Thresholds::from_path(path)?),
        None => Ok(Thresholds::default()),
    }
}

pub(crate) fn build_registry(settings: &ScoringSettings) -> Result<CatalogRegistry, AppError> {
    Ok(CatalogRegistry::new(load_catalog(
        settings.catalog_path.as_deref(),
    )?))
}

pub(crate) fn build_engine(settings: &ScoringSettings) -> Result<ScoringEngine, AppError> {
    let thresholds = load_thresholds(settings.thresholds_path.as_deref())?;
    Ok(ScoringEngine::with_config(
        thresholds,
        ScoringConfig::with_policy(settings.incomplete_policy),
    ))
}

/// Score a one-off set of submissions without persisting an assessment.
///
/// Submissions are validated exactly as they would be on write.
pub(crate) fn score_submissions(
    catalog: &Catalog,
    engine: &ScoringEngine,
    level: SecurityLevel,
    submissions: Vec<AnswerSubmission>,
) -> Result<AssessmentResult, AppError> {
    let guard = AnswerGuard::new(catalog, level);
    let patches = guard
        .validate_all(submissions)
        .map_err(AssessmentServiceError::from)?;

    let mut answers = AnswerSet::new();
    for (key, patch) in patches {
        answers.merge(key, &patch);
    }

    let result = engine
        .compute_results(level, catalog, &answers)
        .map_err(AssessmentServiceError::from)?;
    Ok(result)
}

pub(crate) fn parse_level(raw: &str) -> Result<SecurityLevel, String> {
    raw.parse::<SecurityLevel>()
}

pub(crate) fn parse_policy(raw: &str) -> Result<IncompletePolicy, String> {
    raw.parse::<IncompletePolicy>()
}
