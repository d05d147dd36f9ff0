use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use mentor_match::config::AppConfig;
use mentor_match::error::AppError;
use mentor_match::mentorship::{AdminOverride, MatchingService, MemoryRequestStore};
use mentor_match::telemetry;
use tracing::info;

use crate::cli::ServeArgs;
use crate::infra::{load_directory, AppState, MatchingApi, TracingAuditLog, TracingNotifier};
use crate::routes::with_mentorship_routes;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(directory) = args.directory.take() {
        config.matching.directory_csv = Some(directory);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let directory = Arc::new(load_directory(config.matching.directory_csv.as_deref())?);
    let service = Arc::new(MatchingService::with_retry(
        Arc::new(MemoryRequestStore::new()),
        directory,
        Arc::new(TracingNotifier),
        config.matching.retry_policy(),
    ));
    let api: Arc<MatchingApi> = Arc::new(AdminOverride::new(service, Arc::new(TracingAuditLog)));

    let app = with_mentorship_routes(api)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "mentorship matching service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
