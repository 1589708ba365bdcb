use crate::infra::{score_submissions, AppState};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use secassess::assessment::{
    assessment_router, AnswerCsvImporter, AnswerStore, AssessmentRepository, AssessmentResult,
    AssessmentService, SecurityLevel,
};
use secassess::error::AppError;
use serde::Deserialize;
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct ScoreRequest {
    pub(crate) security_level: SecurityLevel,
    pub(crate) answers_csv: String,
}

pub(crate) fn with_assessment_routes<R, S>(service: Arc<AssessmentService<R, S>>) -> axum::Router
where
    R: AssessmentRepository + 'static,
    S: AnswerStore + 'static,
{
    assessment_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/catalog", axum::routing::get(catalog_endpoint))
        .route("/api/v1/score", axum::routing::post(score_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Version and shape of the catalog new assessments are pinned to.
pub(crate) async fn catalog_endpoint(
    Extension(state): Extension<AppState>,
) -> Json<serde_json::Value> {
    let catalog = &state.catalog;
    let measures: Vec<_> = catalog
        .measures()
        .iter()
        .map(|measure| {
            json!({
                "id": measure.id,
                "code": measure.code,
                "name": measure.name,
                "submeasures": measure.submeasures.len(),
            })
        })
        .collect();

    Json(json!({
        "version": catalog.version(),
        "relationships": catalog.relationships().count(),
        "measures": measures,
    }))
}

/// Score a questionnaire export without creating an assessment.
pub(crate) async fn score_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<ScoreRequest>,
) -> Result<Json<AssessmentResult>, AppError> {
    let ScoreRequest {
        security_level,
        answers_csv,
    } = payload;

    let reader = Cursor::new(answers_csv.into_bytes());
    let submissions = AnswerCsvImporter::from_reader(reader, &state.catalog)?;
    let result = score_submissions(&state.catalog, &state.engine, security_level, submissions)?;
    Ok(Json(result))
}
