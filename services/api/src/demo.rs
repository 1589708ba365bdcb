use crate::infra::{
    build_engine, build_registry, parse_level, parse_policy, score_submissions,
    InMemoryAssessmentRepository,
};
use clap::Args;
use secassess::assessment::{
    AnswerCsvImporter, AnswerStore, AnswerSubmission, AssessmentId, AssessmentRepository,
    AssessmentResult, AssessmentService, AssessmentServiceError, InMemoryAnswerStore,
    IncompletePolicy, NewAssessment, OrganizationId, ProgressSnapshot, SecurityLevel,
    SubmeasureStatus,
};
use secassess::config::{AppConfig, ScoringSettings};
use secassess::error::AppError;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Questionnaire CSV export (control_code,submeasure_code,documentation_score,implementation_score,comments)
    #[arg(long)]
    pub(crate) answers: PathBuf,
    /// Security level to evaluate against (basic, medium, advanced)
    #[arg(long, value_parser = parse_level)]
    pub(crate) level: SecurityLevel,
    /// Catalog JSON to score against (defaults to ASSESS_CATALOG_PATH or the bundled baseline)
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
    /// Threshold table JSON (defaults to ASSESS_THRESHOLDS_PATH or the built-in table)
    #[arg(long)]
    pub(crate) thresholds: Option<PathBuf>,
    /// How unanswered mandatory controls affect verdicts (vacuous, fail_mandatory_incomplete)
    #[arg(long, value_parser = parse_policy)]
    pub(crate) policy: Option<IncompletePolicy>,
    /// Print the full result as JSON instead of the text summary
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Security level for the scripted assessment
    #[arg(long, value_parser = parse_level, default_value = "medium")]
    pub(crate) level: SecurityLevel,
    /// How unanswered mandatory controls affect verdicts (vacuous, fail_mandatory_incomplete)
    #[arg(long, value_parser = parse_policy)]
    pub(crate) policy: Option<IncompletePolicy>,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let ScoreArgs {
        answers,
        level,
        catalog,
        thresholds,
        policy,
        json,
    } = args;

    let mut settings = AppConfig::load()?.scoring;
    if let Some(path) = catalog {
        settings.catalog_path = Some(path);
    }
    if let Some(path) = thresholds {
        settings.thresholds_path = Some(path);
    }
    if let Some(policy) = policy {
        settings.incomplete_policy = policy;
    }

    let registry = build_registry(&settings)?;
    let engine = build_engine(&settings)?;
    let catalog = registry.current();
    let submissions = AnswerCsvImporter::from_path(&answers, &catalog)?;
    let result = score_submissions(&catalog, &engine, level, submissions)?;

    if json {
        let rendered = serde_json::to_string_pretty(&result).map_err(std::io::Error::from)?;
        println!("{rendered}");
    } else {
        println!("Compliance report for {}", answers.display());
        render_results(&result);
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { level, policy } = args;
    let settings = ScoringSettings {
        incomplete_policy: policy.unwrap_or_default(),
        ..ScoringSettings::default()
    };

    let service = AssessmentService::new(
        Arc::new(InMemoryAssessmentRepository::default()),
        Arc::new(InMemoryAnswerStore::new()),
        build_registry(&settings)?,
        build_engine(&settings)?,
    );

    let assessment = service.create(NewAssessment {
        organization_id: OrganizationId::new("org-demo-harbour-logistics"),
        security_level: level,
        catalog_version: None,
    })?;

    println!("Security self-assessment demo");
    println!(
        "- assessment {} | level {} | catalog {} | policy {}",
        assessment.id, level, assessment.catalog_version, settings.incomplete_policy
    );

    let first_pass = written_answers(&service, &assessment.id, governance_answers())?;
    println!("\nAfter governance interview ({first_pass} answers recorded)");
    render_progress(&service.progress(&assessment.id)?);

    let second_pass = written_answers(&service, &assessment.id, operations_answers())?;
    println!("\nAfter operations walkthrough ({second_pass} answers recorded)");
    render_progress(&service.progress(&assessment.id)?);

    println!();
    render_results(&service.results(&assessment.id)?);
    Ok(())
}

/// Submit only the answers that apply at the assessment's level.
fn written_answers<R, S>(
    service: &AssessmentService<R, S>,
    id: &AssessmentId,
    script: Vec<AnswerSubmission>,
) -> Result<usize, AssessmentServiceError>
where
    R: AssessmentRepository + 'static,
    S: AnswerStore + 'static,
{
    let assessment = service.get(id)?;
    let Some(catalog) = service.catalogs().get(&assessment.catalog_version) else {
        return Err(AssessmentServiceError::PinnedCatalogMissing {
            assessment: assessment.id,
            catalog_version: assessment.catalog_version,
        });
    };
    let applicable: Vec<_> = script
        .into_iter()
        .filter(|submission| {
            catalog
                .policy(&submission.key(), assessment.security_level)
                .map(|policy| policy.is_applicable())
                .unwrap_or(false)
        })
        .collect();
    Ok(service.submit_batch(id, applicable)?.len())
}

fn answer(control: &str, submeasure: &str, scores: (i64, i64), note: &str) -> AnswerSubmission {
    AnswerSubmission {
        comments: Some(Some(note.to_string())),
        ..AnswerSubmission::new(control, submeasure).with_scores(scores.0, scores.1)
    }
}

fn governance_answers() -> Vec<AnswerSubmission> {
    vec![
        answer("ctl-pol-01", "s-gov-1", (4, 4), "policy signed off by the board in March"),
        answer("ctl-pol-02", "s-gov-1", (3, 3), "annual review scheduled, last one overdue"),
        answer("ctl-rsk-01", "s-gov-2", (3, 2), "methodology drafted, not yet applied to OT"),
        answer("ctl-rsk-02", "s-gov-2", (3, 3), "treatment plan kept in the risk register"),
        answer("ctl-ast-01", "s-gov-2", (3, 3), "asset register feeds the risk assessment"),
        answer("ctl-ast-01", "s-ast-1", (4, 3), "CMDB covers servers, laptops partially"),
        answer("ctl-ast-02", "s-ast-1", (3, 3), "owners named for critical systems"),
    ]
}

fn operations_answers() -> Vec<AnswerSubmission> {
    vec![
        answer("ctl-iam-01", "s-acc-1", (5, 4), "SSO with named accounts only"),
        answer("ctl-iam-02", "s-acc-1", (4, 4), "MFA enforced on VPN and webmail"),
        answer("ctl-iam-02", "s-acc-2", (4, 3), "MFA on admin consoles, one legacy exception"),
        answer("ctl-iam-03", "s-acc-2", (2, 2), "no formal privileged access review yet"),
        answer("ctl-log-01", "s-ops-1", (4, 4), "audit logging on domain controllers"),
        answer("ctl-log-02", "s-ops-1", (3, 2), "SIEM pilot limited to the data centre"),
        answer("ctl-bak-01", "s-ops-2", (4, 5), "nightly backups with offsite copy"),
        answer("ctl-inc-01", "s-inc-1", (3, 3), "incident playbook approved"),
    ]
}

fn render_progress(progress: &ProgressSnapshot) {
    println!(
        "- {}/{} applicable controls answered ({:.0}%)",
        progress.answered_controls, progress.total_controls, progress.completion_percentage
    );
    println!(
        "- {}/{} mandatory controls answered ({:.0}%)",
        progress.mandatory_answered,
        progress.mandatory_controls,
        progress.mandatory_completion_percentage
    );
}

fn render_results(result: &AssessmentResult) {
    println!(
        "Level {} | catalog {} | thresholds {} (individual {:.1}, average {:.1})",
        result.security_level,
        result.catalog_version,
        result.thresholds_version,
        result.threshold.individual_minimum,
        result.threshold.average_minimum
    );
    println!(
        "Compliance {:.0}% ({}/{} submeasures) | average score {}",
        result.compliance_percentage,
        result.passing_submeasures,
        result.applicable_submeasures,
        format_score(result.average_score)
    );
    render_progress(&result.progress);

    println!("Measures:");
    for measure in &result.measure_results {
        let verdict = if measure.passes_compliance {
            "pass"
        } else {
            "FAIL"
        };
        println!(
            "  - {}: {} | average {} | {}/{} controls answered",
            measure.code,
            verdict,
            format_score(measure.average_score),
            measure.answered_controls,
            measure.total_controls
        );
        if !measure.critical_failures.is_empty() {
            println!("    critical: {}", measure.critical_failures.join(", "));
        }
    }

    println!("Submeasures:");
    for submeasure in &result.submeasure_results {
        let verdict = match submeasure.status {
            SubmeasureStatus::NotApplicable => "n/a",
            SubmeasureStatus::Pending => "pending",
            SubmeasureStatus::Evaluated if submeasure.passes_overall => "pass",
            SubmeasureStatus::Evaluated => "FAIL",
        };
        println!(
            "  - {}: {} | score {} | {}/{} answered",
            submeasure.code,
            verdict,
            format_score(submeasure.overall_score),
            submeasure.answered_controls,
            submeasure.total_controls
        );
        if !submeasure.failed_controls.is_empty() {
            println!("    below minimum: {}", submeasure.failed_controls.join(", "));
        }
        if !submeasure.unanswered_mandatory.is_empty() {
            println!(
                "    unanswered mandatory: {}",
                submeasure.unanswered_mandatory.join(", ")
            );
        }
    }
}

fn format_score(score: Option<f64>) -> String {
    score
        .map(|value| format!("{value:.2}"))
        .unwrap_or_else(|| "-".to_string())
}
