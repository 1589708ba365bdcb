use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::Utc;

use super::answers::{Answer, AnswerPatch, AnswerSet};
use super::domain::{AssessmentId, RelationshipKey};

/// Per-assessment answer persistence consumed by the scoring engine.
///
/// Writes are field-level merges. A batch is applied atomically: readers
/// observe either the pre-batch or the post-batch state.
pub trait AnswerStore: Send + Sync {
    fn get_answer(
        &self,
        assessment: &AssessmentId,
        key: &RelationshipKey,
    ) -> Result<Option<Answer>, StoreError>;

    fn upsert_answer(
        &self,
        assessment: &AssessmentId,
        key: RelationshipKey,
        patch: AnswerPatch,
    ) -> Result<Answer, StoreError>;

    fn batch_upsert(
        &self,
        assessment: &AssessmentId,
        writes: Vec<(RelationshipKey, AnswerPatch)>,
    ) -> Result<Vec<Answer>, StoreError>;

    fn snapshot(&self, assessment: &AssessmentId) -> Result<AnswerSet, StoreError>;

    fn remove_assessment(&self, assessment: &AssessmentId) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("answer store unavailable: {0}")]
    Unavailable(String),
    #[error("assessment {0} has been removed")]
    Removed(AssessmentId),
}

type SharedAnswers = Arc<RwLock<AnswerSet>>;

#[derive(Debug, Default)]
struct Assessments {
    live: HashMap<AssessmentId, SharedAnswers>,
    // Removed ids never get a fresh answer set, even from writers that raced the removal.
    removed: HashSet<AssessmentId>,
}

/// Answer store backed by process memory, one lock per assessment.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAnswerStore {
    assessments: Arc<RwLock<Assessments>>,
}

impl InMemoryAnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn existing(&self, assessment: &AssessmentId) -> Result<Option<SharedAnswers>, StoreError> {
        let guard = self.assessments.read().map_err(poisoned)?;
        Ok(guard.live.get(assessment).cloned())
    }

    fn entry(&self, assessment: &AssessmentId) -> Result<SharedAnswers, StoreError> {
        if let Some(answers) = self.existing(assessment)? {
            return Ok(answers);
        }
        let mut guard = self.assessments.write().map_err(poisoned)?;
        if guard.removed.contains(assessment) {
            return Err(StoreError::Removed(assessment.clone()));
        }
        Ok(guard.live.entry(assessment.clone()).or_default().clone())
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("answer lock poisoned".to_string())
}

fn merge_stamped(answers: &mut AnswerSet, key: RelationshipKey, patch: &AnswerPatch) -> Answer {
    let now = Utc::now();
    let merged = answers.merge(key.clone(), patch).clone();
    if patch.is_empty() {
        return merged;
    }
    let stamped = Answer {
        updated_at: Some(now),
        ..merged
    };
    answers.insert(key, stamped.clone());
    stamped
}

impl AnswerStore for InMemoryAnswerStore {
    fn get_answer(
        &self,
        assessment: &AssessmentId,
        key: &RelationshipKey,
    ) -> Result<Option<Answer>, StoreError> {
        let Some(answers) = self.existing(assessment)? else {
            return Ok(None);
        };
        let guard = answers.read().map_err(poisoned)?;
        Ok(guard.get(key).cloned())
    }

    fn upsert_answer(
        &self,
        assessment: &AssessmentId,
        key: RelationshipKey,
        patch: AnswerPatch,
    ) -> Result<Answer, StoreError> {
        let answers = self.entry(assessment)?;
        let mut guard = answers.write().map_err(poisoned)?;
        Ok(merge_stamped(&mut guard, key, &patch))
    }

    fn batch_upsert(
        &self,
        assessment: &AssessmentId,
        writes: Vec<(RelationshipKey, AnswerPatch)>,
    ) -> Result<Vec<Answer>, StoreError> {
        let answers = self.entry(assessment)?;
        let mut guard = answers.write().map_err(poisoned)?;
        Ok(writes
            .into_iter()
            .map(|(key, patch)| merge_stamped(&mut guard, key, &patch))
            .collect())
    }

    fn snapshot(&self, assessment: &AssessmentId) -> Result<AnswerSet, StoreError> {
        let Some(answers) = self.existing(assessment)? else {
            return Ok(AnswerSet::new());
        };
        let guard = answers.read().map_err(poisoned)?;
        Ok(guard.clone())
    }

    fn remove_assessment(&self, assessment: &AssessmentId) -> Result<(), StoreError> {
        let mut guard = self.assessments.write().map_err(poisoned)?;
        guard.live.remove(assessment);
        guard.removed.insert(assessment.clone());
        Ok(())
    }
}
