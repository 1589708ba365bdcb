use super::answers::{AnswerPatch, AnswerSubmission, FieldUpdate};
use super::catalog::Catalog;
use super::domain::{RelationshipKey, Score, ScoreRangeError, SecurityLevel};

/// Validation errors raised before a write reaches the answer store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GuardError {
    #[error("{field} for {key} is invalid: {source}")]
    InvalidScoreRange {
        key: RelationshipKey,
        field: &'static str,
        #[source]
        source: ScoreRangeError,
    },
    #[error("relationship {key} does not exist in catalog {catalog_version}")]
    UnknownRelationship {
        key: RelationshipKey,
        catalog_version: String,
    },
    #[error("relationship {key} is not applicable at the {level} security level")]
    InapplicableRelationship {
        key: RelationshipKey,
        level: SecurityLevel,
    },
}

/// Converts raw submissions into validated patches for one assessment context.
#[derive(Debug, Clone, Copy)]
pub struct AnswerGuard<'a> {
    catalog: &'a Catalog,
    level: SecurityLevel,
}

impl<'a> AnswerGuard<'a> {
    pub fn new(catalog: &'a Catalog, level: SecurityLevel) -> Self {
        Self { catalog, level }
    }

    pub fn level(&self) -> SecurityLevel {
        self.level
    }

    pub fn validate(
        &self,
        submission: AnswerSubmission,
    ) -> Result<(RelationshipKey, AnswerPatch), GuardError> {
        let key = submission.key();
        self.check_applicable(&key)?;

        let documentation_score =
            score_update(&key, "documentation_score", submission.documentation_score)?;
        let implementation_score =
            score_update(&key, "implementation_score", submission.implementation_score)?;

        let comments = match submission.comments {
            None => FieldUpdate::Keep,
            Some(None) => FieldUpdate::Clear,
            Some(Some(text)) if text.trim().is_empty() => FieldUpdate::Clear,
            Some(Some(text)) => FieldUpdate::Set(text.trim().to_string()),
        };

        let evidence = match submission.evidence {
            None => FieldUpdate::Keep,
            Some(entries) => {
                let cleaned: Vec<String> = entries
                    .into_iter()
                    .map(|entry| entry.trim().to_string())
                    .filter(|entry| !entry.is_empty())
                    .collect();
                if cleaned.is_empty() {
                    FieldUpdate::Clear
                } else {
                    FieldUpdate::Set(cleaned)
                }
            }
        };

        Ok((
            key,
            AnswerPatch {
                documentation_score,
                implementation_score,
                comments,
                evidence,
            },
        ))
    }

    /// Validate every submission, failing on the first violation.
    pub fn validate_all(
        &self,
        submissions: Vec<AnswerSubmission>,
    ) -> Result<Vec<(RelationshipKey, AnswerPatch)>, GuardError> {
        submissions
            .into_iter()
            .map(|submission| self.validate(submission))
            .collect()
    }

    pub fn check_applicable(&self, key: &RelationshipKey) -> Result<(), GuardError> {
        let policy = self
            .catalog
            .policy(key, self.level)
            .ok_or_else(|| GuardError::UnknownRelationship {
                key: key.clone(),
                catalog_version: self.catalog.version().to_string(),
            })?;

        if !policy.is_applicable() {
            return Err(GuardError::InapplicableRelationship {
                key: key.clone(),
                level: self.level,
            });
        }
        Ok(())
    }
}

fn score_update(
    key: &RelationshipKey,
    field: &'static str,
    raw: Option<Option<i64>>,
) -> Result<FieldUpdate<Score>, GuardError> {
    match raw {
        None => Ok(FieldUpdate::Keep),
        Some(None) => Ok(FieldUpdate::Clear),
        Some(Some(value)) => Score::new(value)
            .map(FieldUpdate::Set)
            .map_err(|source| GuardError::InvalidScoreRange {
                key: key.clone(),
                field,
                source,
            }),
    }
}
