use super::common::*;
use crate::assessment::answers::{Answer, AnswerSet};
use crate::assessment::domain::SecurityLevel;
use crate::assessment::scoring::{compute_progress, compute_results, ProgressSnapshot};

#[test]
fn empty_assessment_has_zero_completion() {
    let progress = compute_progress(SecurityLevel::Basic, &catalog(), &AnswerSet::new());
    assert_eq!(
        progress,
        ProgressSnapshot {
            total_controls: 4,
            answered_controls: 0,
            mandatory_controls: 3,
            mandatory_answered: 0,
            completion_percentage: 0.0,
            mandatory_completion_percentage: 0.0,
        }
    );
    assert!(!progress.is_complete());
}

#[test]
fn counts_only_applicable_complete_answers() {
    let mut answers = answers(&[
        ("c-pol-1", "s-gov-1", 4, 4),
        ("c-log-1", "s-gov-2", 5, 5),
        ("c-log-1", "s-gov-3", 3, 2),
    ]);
    answers.insert(
        key("c-pol-2", "s-gov-1"),
        Answer {
            documentation_score: Some(score(3)),
            ..Answer::default()
        },
    );

    let progress = compute_progress(SecurityLevel::Basic, &catalog(), &answers);
    assert_eq!(progress.total_controls, 4);
    assert_eq!(progress.answered_controls, 2);
    assert_eq!(progress.mandatory_answered, 2);
    assert_eq!(progress.completion_percentage, 50.0);
}

#[test]
fn zero_applicable_relationships_never_divides_by_zero() {
    let progress = ProgressSnapshot::from_counts(0, 0, 0, 0);
    assert_eq!(progress.completion_percentage, 0.0);
    assert_eq!(progress.mandatory_completion_percentage, 0.0);
    assert!(progress.is_complete());
}

#[test]
fn tracker_agrees_with_aggregator_for_every_level() {
    let answers = answers(&[
        ("c-pol-1", "s-gov-1", 4, 4),
        ("c-pol-1", "s-gov-2", 2, 3),
        ("c-acc-1", "s-ops-1", 5, 4),
        ("c-bak-1", "s-ops-1", 1, 1),
    ]);
    let catalog = catalog();

    for level in SecurityLevel::ordered() {
        let progress = compute_progress(level, &catalog, &answers);
        let result = compute_results(level, &catalog, &answers, &thresholds())
            .expect("results compute");
        let submeasure_total: usize = result
            .submeasure_results
            .iter()
            .map(|entry| entry.total_controls)
            .sum();

        assert_eq!(progress, result.progress, "level {level}");
        assert_eq!(progress.total_controls, submeasure_total, "level {level}");
    }
}

#[test]
fn medium_level_counts_shared_control_once_per_submeasure() {
    let answers = answers(&[("c-pol-1", "s-gov-1", 4, 4), ("c-pol-1", "s-gov-2", 4, 4)]);
    let progress = compute_progress(SecurityLevel::Medium, &catalog(), &answers);

    assert_eq!(progress.total_controls, 6);
    assert_eq!(progress.answered_controls, 2);
    assert_eq!(progress.mandatory_controls, 4);
    assert_eq!(progress.mandatory_answered, 1);
    assert_eq!(progress.mandatory_completion_percentage, 25.0);
}
