use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json};
use mentor_match::mentorship::{
    mentorship_router, AdminOverride, AuditLog, Notifier, RequestStore, UserDirectory,
};
use serde_json::json;

use crate::infra::AppState;

pub(crate) fn with_mentorship_routes<S, D, N, L>(
    api: Arc<AdminOverride<S, D, N, L>>,
) -> axum::Router
where
    S: RequestStore + 'static,
    D: UserDirectory + 'static,
    N: Notifier + 'static,
    L: AuditLog + 'static,
{
    mentorship_router(api)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    if state.readiness.load(Ordering::Relaxed) {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "initializing" })),
        )
    }
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
