use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::answers::AnswerSubmission;
use super::domain::{AssessmentId, AssessmentStatus, NewAssessment, RelationshipKey};
use super::repository::{AssessmentRepository, AssessmentView, RepositoryError};
use super::service::{AssessmentService, AssessmentServiceError};
use super::store::{AnswerStore, StoreError};

type SharedService<R, S> = Arc<AssessmentService<R, S>>;

/// Router builder exposing assessment, answer, progress, and results endpoints.
pub fn assessment_router<R, S>(service: SharedService<R, S>) -> Router
where
    R: AssessmentRepository + 'static,
    S: AnswerStore + 'static,
{
    Router::new()
        .route("/api/v1/assessments", post(create_handler::<R, S>))
        .route(
            "/api/v1/assessments/:assessment_id",
            get(fetch_handler::<R, S>).delete(delete_handler::<R, S>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/status",
            put(status_handler::<R, S>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/answers",
            put(answer_handler::<R, S>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/answers/batch",
            post(batch_handler::<R, S>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/answers/:control_id/:submeasure_id/score",
            get(relationship_score_handler::<R, S>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/progress",
            get(progress_handler::<R, S>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/results",
            get(results_handler::<R, S>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusUpdate {
    pub(crate) status: AssessmentStatus,
}

pub(crate) fn error_response(error: AssessmentServiceError) -> Response {
    let status = match &error {
        AssessmentServiceError::Guard(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AssessmentServiceError::Repository(RepositoryError::NotFound)
        | AssessmentServiceError::Store(StoreError::Removed(_))
        | AssessmentServiceError::UnknownRelationship { .. } => StatusCode::NOT_FOUND,
        AssessmentServiceError::Repository(RepositoryError::Conflict)
        | AssessmentServiceError::AssessmentArchived(_) => StatusCode::CONFLICT,
        AssessmentServiceError::UnknownCatalogVersion(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AssessmentServiceError::Repository(RepositoryError::Unavailable(_))
        | AssessmentServiceError::PinnedCatalogMissing { .. }
        | AssessmentServiceError::Store(StoreError::Unavailable(_))
        | AssessmentServiceError::Scoring(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

pub(crate) async fn create_handler<R, S>(
    State(service): State<SharedService<R, S>>,
    axum::Json(request): axum::Json<NewAssessment>,
) -> Response
where
    R: AssessmentRepository + 'static,
    S: AnswerStore + 'static,
{
    match service.create(request) {
        Ok(assessment) => (
            StatusCode::CREATED,
            axum::Json(AssessmentView::from(&assessment)),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn fetch_handler<R, S>(
    State(service): State<SharedService<R, S>>,
    Path(assessment_id): Path<String>,
) -> Response
where
    R: AssessmentRepository + 'static,
    S: AnswerStore + 'static,
{
    match service.get(&AssessmentId(assessment_id)) {
        Ok(assessment) => {
            (StatusCode::OK, axum::Json(AssessmentView::from(&assessment))).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn delete_handler<R, S>(
    State(service): State<SharedService<R, S>>,
    Path(assessment_id): Path<String>,
) -> Response
where
    R: AssessmentRepository + 'static,
    S: AnswerStore + 'static,
{
    match service.delete(&AssessmentId(assessment_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn status_handler<R, S>(
    State(service): State<SharedService<R, S>>,
    Path(assessment_id): Path<String>,
    axum::Json(update): axum::Json<StatusUpdate>,
) -> Response
where
    R: AssessmentRepository + 'static,
    S: AnswerStore + 'static,
{
    match service.update_status(&AssessmentId(assessment_id), update.status) {
        Ok(assessment) => {
            (StatusCode::OK, axum::Json(AssessmentView::from(&assessment))).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn answer_handler<R, S>(
    State(service): State<SharedService<R, S>>,
    Path(assessment_id): Path<String>,
    axum::Json(submission): axum::Json<AnswerSubmission>,
) -> Response
where
    R: AssessmentRepository + 'static,
    S: AnswerStore + 'static,
{
    match service.submit_answer(&AssessmentId(assessment_id), submission) {
        Ok(answer) => (StatusCode::OK, axum::Json(answer)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn batch_handler<R, S>(
    State(service): State<SharedService<R, S>>,
    Path(assessment_id): Path<String>,
    axum::Json(submissions): axum::Json<Vec<AnswerSubmission>>,
) -> Response
where
    R: AssessmentRepository + 'static,
    S: AnswerStore + 'static,
{
    match service.submit_batch(&AssessmentId(assessment_id), submissions) {
        Ok(answers) => (StatusCode::OK, axum::Json(answers)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn relationship_score_handler<R, S>(
    State(service): State<SharedService<R, S>>,
    Path((assessment_id, control_id, submeasure_id)): Path<(String, String, String)>,
) -> Response
where
    R: AssessmentRepository + 'static,
    S: AnswerStore + 'static,
{
    let key = RelationshipKey::new(control_id, submeasure_id);
    match service.relationship_score(&AssessmentId(assessment_id), &key) {
        Ok(score) => (StatusCode::OK, axum::Json(score)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn progress_handler<R, S>(
    State(service): State<SharedService<R, S>>,
    Path(assessment_id): Path<String>,
) -> Response
where
    R: AssessmentRepository + 'static,
    S: AnswerStore + 'static,
{
    match service.progress(&AssessmentId(assessment_id)) {
        Ok(progress) => (StatusCode::OK, axum::Json(progress)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn results_handler<R, S>(
    State(service): State<SharedService<R, S>>,
    Path(assessment_id): Path<String>,
) -> Response
where
    R: AssessmentRepository + 'static,
    S: AnswerStore + 'static,
{
    match service.results(&AssessmentId(assessment_id)) {
        Ok(results) => (StatusCode::OK, axum::Json(results)).into_response(),
        Err(error) => error_response(error),
    }
}
