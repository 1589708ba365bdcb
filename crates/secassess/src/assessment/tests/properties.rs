use proptest::prelude::*;

use super::common::*;
use crate::assessment::answers::AnswerSet;
use crate::assessment::domain::{RelationshipKey, SecurityLevel};
use crate::assessment::scoring::{
    compute_progress, score_relationship, AssessmentResult, SubmeasureStatus,
};

const RELATIONSHIPS: [(&str, &str); 7] = [
    ("c-pol-1", "s-gov-1"),
    ("c-pol-2", "s-gov-1"),
    ("c-pol-1", "s-gov-2"),
    ("c-log-1", "s-gov-2"),
    ("c-log-1", "s-gov-3"),
    ("c-acc-1", "s-ops-1"),
    ("c-bak-1", "s-ops-1"),
];

fn level() -> impl Strategy<Value = SecurityLevel> {
    prop_oneof![
        Just(SecurityLevel::Basic),
        Just(SecurityLevel::Medium),
        Just(SecurityLevel::Advanced),
    ]
}

fn answer_grid() -> impl Strategy<Value = Vec<Option<(i64, i64)>>> {
    prop::collection::vec(prop::option::of((1i64..=5, 1i64..=5)), RELATIONSHIPS.len())
}

fn answer_set(grid: &[Option<(i64, i64)>]) -> AnswerSet {
    RELATIONSHIPS
        .iter()
        .zip(grid)
        .filter_map(|((control, submeasure), cell)| {
            cell.map(|(documentation, implementation)| {
                (
                    key(control, submeasure),
                    scored(documentation, implementation),
                )
            })
        })
        .collect()
}

fn applicable(level: SecurityLevel, relationship: &RelationshipKey) -> bool {
    catalog()
        .policy(relationship, level)
        .map(|policy| policy.is_applicable())
        .unwrap_or(false)
}

proptest! {
    #[test]
    fn results_are_idempotent(level in level(), grid in answer_grid()) {
        let answers = answer_set(&grid);
        let catalog = catalog();
        let engine = engine();
        let first = engine.compute_results(level, &catalog, &answers).expect("results compute");
        let second = engine.compute_results(level, &catalog, &answers).expect("results compute");

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(
            serde_json::to_string(&first).expect("serializes"),
            serde_json::to_string(&second).expect("serializes")
        );
    }

    #[test]
    fn progress_matches_aggregator_counters(level in level(), grid in answer_grid()) {
        let answers = answer_set(&grid);
        let catalog = catalog();
        let progress = compute_progress(level, &catalog, &answers);
        let result = engine().compute_results(level, &catalog, &answers).expect("results compute");
        let summed: usize = result.submeasure_results.iter().map(|entry| entry.total_controls).sum();
        let answered: usize = result
            .submeasure_results
            .iter()
            .map(|entry| entry.answered_controls)
            .sum();

        prop_assert_eq!(progress, result.progress);
        prop_assert_eq!(progress.total_controls, summed);
        prop_assert_eq!(progress.answered_controls, answered);
    }

    #[test]
    fn inapplicable_answers_never_change_results(level in level(), grid in answer_grid()) {
        let all = answer_set(&grid);
        let applicable_only: AnswerSet = all
            .iter()
            .filter(|(relationship, _)| applicable(level, relationship))
            .map(|(relationship, answer)| (relationship.clone(), answer.clone()))
            .collect();
        let catalog = catalog();
        let engine = engine();

        let with_all = engine.compute_results(level, &catalog, &all).expect("results compute");
        let filtered = engine
            .compute_results(level, &catalog, &applicable_only)
            .expect("results compute");
        let expected_total = RELATIONSHIPS
            .iter()
            .filter(|(control, submeasure)| applicable(level, &key(control, submeasure)))
            .count();

        prop_assert_eq!(&with_all, &filtered);
        prop_assert_eq!(with_all.progress.total_controls, expected_total);
    }

    #[test]
    fn unanswered_submeasures_have_no_score(level in level(), grid in answer_grid()) {
        let answers = answer_set(&grid);
        let result = engine()
            .compute_results(level, &catalog(), &answers)
            .expect("results compute");

        for entry in &result.submeasure_results {
            if entry.answered_controls == 0 {
                prop_assert_eq!(entry.overall_score, None);
                prop_assert_eq!(entry.documentation_avg, None);
                if entry.status == SubmeasureStatus::Pending {
                    prop_assert!(!entry.passes_average_threshold);
                }
            }
            if entry.status == SubmeasureStatus::NotApplicable {
                prop_assert!(entry.passes_overall);
            }
            if let Some(score) = entry.overall_score {
                prop_assert!((1.0..=5.0).contains(&score));
            }
        }
    }

    #[test]
    fn measures_pass_exactly_when_every_child_passes(
        level in level(),
        grid in answer_grid(),
        strict in any::<bool>(),
    ) {
        let engine = if strict { strict_engine() } else { engine() };
        let result = engine
            .compute_results(level, &catalog(), &answer_set(&grid))
            .expect("results compute");

        for entry in &result.measure_results {
            let failing: Vec<String> = result
                .submeasure_results
                .iter()
                .filter(|child| child.measure_id == entry.measure_id && !child.passes_overall)
                .map(|child| child.code.clone())
                .collect();
            prop_assert_eq!(entry.passes_compliance, failing.is_empty());
            prop_assert_eq!(&entry.critical_failures, &failing);
        }
    }

    #[test]
    fn raising_a_score_never_lowers_scores(
        level in level(),
        grid in answer_grid(),
        index in 0..RELATIONSHIPS.len(),
        raise_documentation in any::<bool>(),
    ) {
        let (control, submeasure) = RELATIONSHIPS[index];
        let relationship = key(control, submeasure);
        let Some((documentation, implementation)) = grid[index] else {
            return Ok(());
        };
        let raised = if raise_documentation {
            ((documentation + 1).min(5), implementation)
        } else {
            (documentation, (implementation + 1).min(5))
        };

        let mut improved_grid = grid.clone();
        improved_grid[index] = Some(raised);

        let catalog = catalog();
        let engine = engine();
        let before = engine
            .compute_results(level, &catalog, &answer_set(&grid))
            .expect("results compute");
        let after = engine
            .compute_results(level, &catalog, &answer_set(&improved_grid))
            .expect("results compute");

        if let Some(policy) = catalog.policy(&relationship, level) {
            let old = score_relationship(
                &policy,
                Some(&scored(documentation, implementation)),
            );
            let new = score_relationship(
                &policy,
                Some(&scored(raised.0, raised.1)),
            );
            prop_assert!(new.value() >= old.value());
        }

        let owner = |result: &AssessmentResult| {
            result
                .submeasure_results
                .iter()
                .find(|entry| entry.submeasure_id.as_str() == submeasure)
                .and_then(|entry| entry.overall_score)
        };
        prop_assert!(owner(&after) >= owner(&before));
    }
}
