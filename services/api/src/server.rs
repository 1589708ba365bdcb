use crate::cli::ServeArgs;
use crate::infra::{build_engine, build_registry, AppState, InMemoryAssessmentRepository};
use crate::routes::with_assessment_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use secassess::assessment::{AssessmentService, InMemoryAnswerStore};
use secassess::config::AppConfig;
use secassess::error::AppError;
use secassess::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let catalogs = build_registry(&config.scoring)?;
    let engine = build_engine(&config.scoring)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        catalog: catalogs.current(),
        engine: Arc::new(engine.clone()),
    };

    let repository = Arc::new(InMemoryAssessmentRepository::default());
    let store = Arc::new(InMemoryAnswerStore::new());
    let assessment_service = Arc::new(AssessmentService::new(repository, store, catalogs, engine));

    let app = with_assessment_routes(assessment_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        policy = %config.scoring.incomplete_policy,
        "assessment scoring service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
