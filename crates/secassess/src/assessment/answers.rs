use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::domain::{ControlId, RelationshipKey, Score, SubmeasureId};

/// Documentation and implementation scores recorded for one relationship.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Answer {
    pub documentation_score: Option<Score>,
    pub implementation_score: Option<Score>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Answer {
    pub fn scored(documentation: Score, implementation: Score) -> Self {
        Self {
            documentation_score: Some(documentation),
            implementation_score: Some(implementation),
            ..Self::default()
        }
    }

    /// Both scores present.
    pub fn is_complete(&self) -> bool {
        self.documentation_score.is_some() && self.implementation_score.is_some()
    }

    pub fn scores(&self) -> Option<(Score, Score)> {
        self.documentation_score.zip(self.implementation_score)
    }

    /// Merge a patch field by field; unspecified fields are left untouched.
    pub fn apply(&mut self, patch: &AnswerPatch) {
        patch
            .documentation_score
            .apply_to(&mut self.documentation_score);
        patch
            .implementation_score
            .apply_to(&mut self.implementation_score);
        patch.comments.apply_to(&mut self.comments);
        match &patch.evidence {
            FieldUpdate::Keep => {}
            FieldUpdate::Clear => self.evidence.clear(),
            FieldUpdate::Set(evidence) => self.evidence = evidence.clone(),
        }
    }
}

/// Per-field intent of a partial write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    Keep,
    Clear,
    Set(T),
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        FieldUpdate::Keep
    }
}

impl<T: Clone> FieldUpdate<T> {
    fn apply_to(&self, slot: &mut Option<T>) {
        match self {
            FieldUpdate::Keep => {}
            FieldUpdate::Clear => *slot = None,
            FieldUpdate::Set(value) => *slot = Some(value.clone()),
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, FieldUpdate::Keep)
    }
}

impl<T> From<Option<Option<T>>> for FieldUpdate<T> {
    fn from(value: Option<Option<T>>) -> Self {
        match value {
            None => FieldUpdate::Keep,
            Some(None) => FieldUpdate::Clear,
            Some(Some(value)) => FieldUpdate::Set(value),
        }
    }
}

/// Validated partial write for one relationship.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnswerPatch {
    pub documentation_score: FieldUpdate<Score>,
    pub implementation_score: FieldUpdate<Score>,
    pub comments: FieldUpdate<String>,
    pub evidence: FieldUpdate<Vec<String>>,
}

impl AnswerPatch {
    pub fn scores(documentation: Score, implementation: Score) -> Self {
        Self {
            documentation_score: FieldUpdate::Set(documentation),
            implementation_score: FieldUpdate::Set(implementation),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.documentation_score.is_keep()
            && self.implementation_score.is_keep()
            && self.comments.is_keep()
            && self.evidence.is_keep()
    }
}

/// Raw inbound answer write as received from the API or an import.
///
/// Omitted fields are left untouched; an explicit `null` clears the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub control_id: ControlId,
    pub submeasure_id: SubmeasureId,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub documentation_score: Option<Option<i64>>,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub implementation_score: Option<Option<i64>>,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub comments: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Vec<String>>,
}

impl AnswerSubmission {
    pub fn new(control_id: impl Into<String>, submeasure_id: impl Into<String>) -> Self {
        Self {
            control_id: ControlId(control_id.into()),
            submeasure_id: SubmeasureId(submeasure_id.into()),
            documentation_score: None,
            implementation_score: None,
            comments: None,
            evidence: None,
        }
    }

    pub fn with_scores(mut self, documentation: i64, implementation: i64) -> Self {
        self.documentation_score = Some(Some(documentation));
        self.implementation_score = Some(Some(implementation));
        self
    }

    pub fn key(&self) -> RelationshipKey {
        RelationshipKey {
            control_id: self.control_id.clone(),
            submeasure_id: self.submeasure_id.clone(),
        }
    }
}

fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Snapshot of every answer recorded for one assessment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnswerSet {
    answers: BTreeMap<RelationshipKey, Answer>,
}

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &RelationshipKey) -> Option<&Answer> {
        self.answers.get(key)
    }

    pub fn insert(&mut self, key: RelationshipKey, answer: Answer) -> Option<Answer> {
        self.answers.insert(key, answer)
    }

    /// Merge `patch` into the answer for `key`, creating it on first write.
    pub fn merge(&mut self, key: RelationshipKey, patch: &AnswerPatch) -> &Answer {
        let answer = self.answers.entry(key).or_default();
        answer.apply(patch);
        answer
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RelationshipKey, &Answer)> {
        self.answers.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &RelationshipKey> {
        self.answers.keys()
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

impl FromIterator<(RelationshipKey, Answer)> for AnswerSet {
    fn from_iter<I: IntoIterator<Item = (RelationshipKey, Answer)>>(iter: I) -> Self {
        Self {
            answers: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(value: i64) -> Score {
        Score::new(value).expect("valid score")
    }

    #[test]
    fn partial_patch_never_clobbers_unspecified_fields() {
        let mut answer = Answer::scored(score(3), score(4));
        answer.comments = Some("reviewed by CISO".to_string());

        answer.apply(&AnswerPatch {
            implementation_score: FieldUpdate::Set(score(5)),
            ..AnswerPatch::default()
        });

        assert_eq!(answer.documentation_score, Some(score(3)));
        assert_eq!(answer.implementation_score, Some(score(5)));
        assert_eq!(answer.comments.as_deref(), Some("reviewed by CISO"));
    }

    #[test]
    fn clear_resets_field_and_marks_incomplete() {
        let mut answer = Answer::scored(score(2), score(2));
        answer.apply(&AnswerPatch {
            documentation_score: FieldUpdate::Clear,
            ..AnswerPatch::default()
        });
        assert!(!answer.is_complete());
        assert_eq!(answer.scores(), None);
    }

    #[test]
    fn submission_distinguishes_absent_and_null_fields() {
        let raw = r#"{
            "control_id": "c1",
            "submeasure_id": "s1",
            "documentation_score": null,
            "implementation_score": 4
        }"#;
        let submission: AnswerSubmission = serde_json::from_str(raw).expect("deserializes");

        assert_eq!(submission.documentation_score, Some(None));
        assert_eq!(submission.implementation_score, Some(Some(4)));
        assert_eq!(submission.comments, None);
        assert_eq!(submission.evidence, None);
    }

    #[test]
    fn merge_creates_answer_on_first_partial_write() {
        let mut set = AnswerSet::new();
        let key = RelationshipKey::new("c1", "s1");
        let merged = set.merge(
            key.clone(),
            &AnswerPatch {
                documentation_score: FieldUpdate::Set(score(3)),
                ..AnswerPatch::default()
            },
        );
        assert_eq!(merged.documentation_score, Some(score(3)));
        assert!(!merged.is_complete());
        assert_eq!(set.len(), 1);
        assert!(set.get(&RelationshipKey::new("c1", "s2")).is_none());
        assert!(set.get(&key).is_some());
    }
}
