use serde::Serialize;

use super::domain::{Assessment, AssessmentId, SecurityLevel};

/// Storage abstraction for assessment headers so the service can be exercised in isolation.
pub trait AssessmentRepository: Send + Sync {
    fn insert(&self, assessment: Assessment) -> Result<Assessment, RepositoryError>;
    fn update(&self, assessment: Assessment) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &AssessmentId) -> Result<Option<Assessment>, RepositoryError>;
    fn remove(&self, id: &AssessmentId) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("assessment already exists")]
    Conflict,
    #[error("assessment not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Sanitized representation of an assessment exposed over the API.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentView {
    pub id: AssessmentId,
    pub organization_id: String,
    pub security_level: SecurityLevel,
    pub status: &'static str,
    pub catalog_version: String,
    pub created_at: String,
}

impl From<&Assessment> for AssessmentView {
    fn from(assessment: &Assessment) -> Self {
        Self {
            id: assessment.id.clone(),
            organization_id: assessment.organization_id.to_string(),
            security_level: assessment.security_level,
            status: assessment.status.label(),
            catalog_version: assessment.catalog_version.to_string(),
            created_at: assessment.created_at.to_rfc3339(),
        }
    }
}
