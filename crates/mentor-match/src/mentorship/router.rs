use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::admin::AdminOverride;
use super::directory::UserDirectory;
use super::discovery::DiscoveryFilters;
use super::domain::{Decision, MentorshipArea, Participation, RequestId, UserId};
use super::gateway::{AuditLog, Notifier};
use super::invariants::Violation;
use super::repository::RequestStore;
use super::service::{MatchingError, NewRequest, Terminator};

type Api<S, D, N, L> = Arc<AdminOverride<S, D, N, L>>;

/// Router builder exposing the mentorship lifecycle over HTTP.
pub fn mentorship_router<S, D, N, L>(api: Api<S, D, N, L>) -> Router
where
    S: RequestStore + 'static,
    D: UserDirectory + 'static,
    N: Notifier + 'static,
    L: AuditLog + 'static,
{
    Router::new()
        .route(
            "/api/v1/mentorship/requests",
            post(create_handler::<S, D, N, L>).get(list_handler::<S, D, N, L>),
        )
        .route(
            "/api/v1/mentorship/requests/:request_id",
            get(get_handler::<S, D, N, L>),
        )
        .route(
            "/api/v1/mentorship/respond",
            post(respond_handler::<S, D, N, L>),
        )
        .route(
            "/api/v1/mentorship/terminate",
            post(terminate_handler::<S, D, N, L>),
        )
        .route(
            "/api/v1/mentorship/admin/reject",
            post(admin_reject_handler::<S, D, N, L>),
        )
        .route(
            "/api/v1/mentorship/discovery",
            get(discovery_handler::<S, D, N, L>),
        )
        .route(
            "/api/v1/mentorship/mentors/:mentor_id/capacity",
            get(capacity_handler::<S, D, N, L>),
        )
        .with_state(api)
}

impl IntoResponse for MatchingError {
    fn into_response(self) -> Response {
        let status = match &self {
            MatchingError::Rejected(Violation::Unauthorized { .. }) => StatusCode::FORBIDDEN,
            MatchingError::Rejected(_) => StatusCode::CONFLICT,
            MatchingError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            MatchingError::RequestNotFound(_) | MatchingError::UserNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            MatchingError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
        }));
        (status, body).into_response()
    }
}

fn malformed(status: StatusCode, detail: String, code: &'static str) -> Response {
    (status, Json(json!({ "error": detail, "code": code }))).into_response()
}

/// JSON body that reports decode failures in the same `{error, code}` shape as domain errors.
pub(crate) struct ApiJson<T>(pub(crate) T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| Self(value))
            .map_err(|rejection| malformed(rejection.status(), rejection.body_text(), "invalid_body"))
    }
}

pub(crate) struct ApiQuery<T>(pub(crate) T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Self(value))
            .map_err(|rejection| {
                malformed(rejection.status(), rejection.body_text(), "invalid_query")
            })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RespondBody {
    pub(crate) request_id: RequestId,
    pub(crate) acting_mentor_id: UserId,
    pub(crate) decision: Decision,
    #[serde(default)]
    pub(crate) response_message: Option<String>,
}

/// Actors allowed to address the terminate endpoint. Students are not representable.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "role", content = "user_id", rename_all = "snake_case")]
pub(crate) enum TerminatingActor {
    Mentor(UserId),
    Admin(UserId),
    System,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TerminateBody {
    pub(crate) request_id: RequestId,
    pub(crate) actor: TerminatingActor,
    pub(crate) reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AdminRejectBody {
    pub(crate) request_id: RequestId,
    pub(crate) admin_id: UserId,
    pub(crate) reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    pub(crate) user_id: UserId,
    #[serde(default)]
    pub(crate) role: Participation,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DiscoveryQuery {
    pub(crate) student_id: UserId,
    #[serde(default)]
    pub(crate) area: Option<String>,
    #[serde(default)]
    pub(crate) resume_review: Option<bool>,
    #[serde(default)]
    pub(crate) limit: Option<usize>,
}

pub(crate) async fn create_handler<S, D, N, L>(
    State(api): State<Api<S, D, N, L>>,
    ApiJson(request): ApiJson<NewRequest>,
) -> Response
where
    S: RequestStore + 'static,
    D: UserDirectory + 'static,
    N: Notifier + 'static,
    L: AuditLog + 'static,
{
    match api.service().create_request(request).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn respond_handler<S, D, N, L>(
    State(api): State<Api<S, D, N, L>>,
    ApiJson(body): ApiJson<RespondBody>,
) -> Response
where
    S: RequestStore + 'static,
    D: UserDirectory + 'static,
    N: Notifier + 'static,
    L: AuditLog + 'static,
{
    let RespondBody {
        request_id,
        acting_mentor_id,
        decision,
        response_message,
    } = body;

    match api
        .service()
        .respond(&request_id, acting_mentor_id, decision, response_message)
        .await
    {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn terminate_handler<S, D, N, L>(
    State(api): State<Api<S, D, N, L>>,
    ApiJson(body): ApiJson<TerminateBody>,
) -> Response
where
    S: RequestStore + 'static,
    D: UserDirectory + 'static,
    N: Notifier + 'static,
    L: AuditLog + 'static,
{
    let TerminateBody {
        request_id,
        actor,
        reason,
    } = body;

    let result = match actor {
        TerminatingActor::Admin(admin_id) => {
            api.remove_accepted(&admin_id, &request_id, &reason).await
        }
        TerminatingActor::Mentor(mentor_id) => {
            api.service()
                .terminate(&request_id, Terminator::Mentor(mentor_id), &reason)
                .await
        }
        TerminatingActor::System => {
            api.service()
                .terminate(&request_id, Terminator::System, &reason)
                .await
        }
    };

    match result {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn admin_reject_handler<S, D, N, L>(
    State(api): State<Api<S, D, N, L>>,
    ApiJson(body): ApiJson<AdminRejectBody>,
) -> Response
where
    S: RequestStore + 'static,
    D: UserDirectory + 'static,
    N: Notifier + 'static,
    L: AuditLog + 'static,
{
    match api
        .reject_pending(&body.admin_id, &body.request_id, &body.reason)
        .await
    {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn list_handler<S, D, N, L>(
    State(api): State<Api<S, D, N, L>>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Response
where
    S: RequestStore + 'static,
    D: UserDirectory + 'static,
    N: Notifier + 'static,
    L: AuditLog + 'static,
{
    match api.service().list_requests(&query.user_id, query.role).await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn get_handler<S, D, N, L>(
    State(api): State<Api<S, D, N, L>>,
    Path(request_id): Path<String>,
) -> Response
where
    S: RequestStore + 'static,
    D: UserDirectory + 'static,
    N: Notifier + 'static,
    L: AuditLog + 'static,
{
    match api.service().get(&RequestId(request_id)).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn discovery_handler<S, D, N, L>(
    State(api): State<Api<S, D, N, L>>,
    ApiQuery(query): ApiQuery<DiscoveryQuery>,
) -> Response
where
    S: RequestStore + 'static,
    D: UserDirectory + 'static,
    N: Notifier + 'static,
    L: AuditLog + 'static,
{
    let filters = DiscoveryFilters {
        area: query
            .area
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(MentorshipArea::parse),
        resume_review: query.resume_review,
        limit: query.limit,
    };

    match api
        .service()
        .discovery()
        .find_available_mentors(&query.student_id, &filters)
        .await
    {
        Ok(mentors) => (StatusCode::OK, Json(mentors)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn capacity_handler<S, D, N, L>(
    State(api): State<Api<S, D, N, L>>,
    Path(mentor_id): Path<String>,
) -> Response
where
    S: RequestStore + 'static,
    D: UserDirectory + 'static,
    N: Notifier + 'static,
    L: AuditLog + 'static,
{
    match api.service().capacity_profile(&UserId(mentor_id)).await {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(err) => err.into_response(),
    }
}
