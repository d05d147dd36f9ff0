use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::directory::{DirectoryError, UserDirectory, UserRole};
use super::discovery::MentorDiscovery;
use super::domain::{
    Actor, Decision, MentorCapacityProfile, MentorshipArea, MentorshipRequest, Participation,
    RequestId, RequestStatus, TerminatedBy, Termination, Transition, UserId,
};
use super::gateway::{Notification, NotificationKind, Notifier};
use super::invariants::{check_create, check_update, PairingSnapshot, Violation};
use super::repository::{RequestStore, StoreError, UpdateGuard, WriteGuard};
use super::retry::RetryPolicy;

/// Payload a student submits to open a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRequest {
    pub student_id: UserId,
    pub mentor_id: UserId,
    pub topic: MentorshipArea,
    pub message: String,
}

/// Who may end a relationship through the regular path. Admins use `AdminOverride`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    Mentor(UserId),
    System,
}

impl From<Terminator> for Actor {
    fn from(value: Terminator) -> Self {
        match value {
            Terminator::Mentor(id) => Actor::Mentor(id),
            Terminator::System => Actor::System,
        }
    }
}

/// Input rejected before any store access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("message must not be empty")]
    EmptyMessage,
    #[error("topic must not be empty")]
    EmptyTopic,
    #[error("reason must not be empty")]
    EmptyReason,
    #[error("a student cannot request mentorship from themself")]
    SelfRequest,
    #[error("user {0} is not a student")]
    NotAStudent(UserId),
    #[error("mentor {0} is not accepting mentees")]
    MentorNotAccepting(UserId),
}

/// Error raised by the matching service.
#[derive(Debug, thiserror::Error)]
pub enum MatchingError {
    #[error(transparent)]
    Rejected(#[from] Violation),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("request {0} not found")]
    RequestNotFound(RequestId),
    #[error("user {0} not found")]
    UserNotFound(UserId),
    #[error("service temporarily unavailable: {0}")]
    Unavailable(String),
}

impl MatchingError {
    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            MatchingError::Rejected(violation) => violation.code(),
            MatchingError::Validation(_) => "validation_error",
            MatchingError::RequestNotFound(_) | MatchingError::UserNotFound(_) => "not_found",
            MatchingError::Unavailable(_) => "unavailable",
        }
    }

    /// Client integrity problems rather than ordinary business rejections.
    pub fn is_integrity_problem(&self) -> bool {
        matches!(
            self,
            MatchingError::Rejected(Violation::Unauthorized { .. })
                | MatchingError::RequestNotFound(_)
                | MatchingError::UserNotFound(_)
        )
    }
}

impl From<DirectoryError> for MatchingError {
    fn from(value: DirectoryError) -> Self {
        MatchingError::Unavailable(value.to_string())
    }
}

static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> RequestId {
    let id = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RequestId(format!("mr-{id:06}"))
}

/// The only write path into the request store.
pub struct MatchingService<S, D, N> {
    store: Arc<S>,
    directory: Arc<D>,
    notifier: Arc<N>,
    retry: RetryPolicy,
}

impl<S, D, N> MatchingService<S, D, N>
where
    S: RequestStore + 'static,
    D: UserDirectory + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, directory: Arc<D>, notifier: Arc<N>) -> Self {
        Self::with_retry(store, directory, notifier, RetryPolicy::default())
    }

    pub fn with_retry(
        store: Arc<S>,
        directory: Arc<D>,
        notifier: Arc<N>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            directory,
            notifier,
            retry,
        }
    }

    pub fn discovery(&self) -> MentorDiscovery<S, D> {
        MentorDiscovery::new(self.store.clone(), self.directory.clone())
    }

    pub(crate) fn directory(&self) -> &D {
        &self.directory
    }

    /// Open a `Pending` request from a student to a willing mentor.
    pub async fn create_request(
        &self,
        request: NewRequest,
    ) -> Result<MentorshipRequest, MatchingError> {
        let result = self.create_request_inner(request).await;
        if let Err(err) = &result {
            log_rejection("create_request", err);
        }
        result
    }

    async fn create_request_inner(
        &self,
        request: NewRequest,
    ) -> Result<MentorshipRequest, MatchingError> {
        let NewRequest {
            student_id,
            mentor_id,
            topic,
            message,
        } = request;

        let message = message.trim().to_string();
        if message.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        if topic.is_blank() {
            return Err(ValidationError::EmptyTopic.into());
        }
        if student_id == mentor_id {
            return Err(ValidationError::SelfRequest.into());
        }

        let student = self
            .directory
            .lookup(&student_id)
            .await?
            .ok_or_else(|| MatchingError::UserNotFound(student_id.clone()))?;
        if student.role != UserRole::Student {
            return Err(ValidationError::NotAStudent(student_id).into());
        }

        let mentor = self
            .directory
            .lookup(&mentor_id)
            .await?
            .ok_or_else(|| MatchingError::UserNotFound(mentor_id.clone()))?;
        if !mentor.accepts_mentees() {
            return Err(ValidationError::MentorNotAccepting(mentor_id).into());
        }

        let record = MentorshipRequest::pending(
            next_request_id(),
            student_id.clone(),
            mentor_id.clone(),
            topic,
            message,
            Utc::now(),
        );

        let check =
            |snapshot: &PairingSnapshot| check_create(&student_id, &mentor_id, snapshot);
        let guard: WriteGuard<'_> = &check;
        let store = &self.store;
        let stored = self
            .retry
            .run("create_request", move || {
                store.insert_guarded(record.clone(), guard)
            })
            .await
            .map_err(|err| store_failure(err, RequestStatus::Pending))?;

        info!(
            request_id = %stored.id,
            student_id = %stored.student_id,
            mentor_id = %stored.mentor_id,
            topic = stored.topic.label(),
            "mentorship request created"
        );

        let mut details = BTreeMap::new();
        details.insert("student_id".to_string(), stored.student_id.to_string());
        details.insert("topic".to_string(), stored.topic.label().to_string());
        self.emit(Notification {
            recipient: stored.mentor_id.clone(),
            kind: NotificationKind::RequestCreated,
            request_id: stored.id.clone(),
            details,
        })
        .await;

        Ok(stored)
    }

    /// Mentor accepts or rejects a pending request addressed to them.
    pub async fn respond(
        &self,
        request_id: &RequestId,
        acting_mentor_id: UserId,
        decision: Decision,
        response_message: Option<String>,
    ) -> Result<MentorshipRequest, MatchingError> {
        self.respond_as(
            Actor::Mentor(acting_mentor_id),
            request_id,
            decision,
            response_message,
        )
        .await
    }

    pub(crate) async fn respond_as(
        &self,
        actor: Actor,
        request_id: &RequestId,
        decision: Decision,
        response_message: Option<String>,
    ) -> Result<MentorshipRequest, MatchingError> {
        let result = self
            .respond_inner(&actor, request_id, decision, response_message)
            .await;
        if let Err(err) = &result {
            log_rejection("respond", err);
        }
        result
    }

    async fn respond_inner(
        &self,
        actor: &Actor,
        request_id: &RequestId,
        decision: Decision,
        response_message: Option<String>,
    ) -> Result<MentorshipRequest, MatchingError> {
        // Mentor ids never change, so this read only tells us whose capacity to look up.
        let existing = self
            .store
            .fetch(request_id)
            .await
            .map_err(|err| store_failure(err, decision.target()))?
            .ok_or_else(|| MatchingError::RequestNotFound(request_id.clone()))?;

        // Only the addressed mentor's accept needs a limit; anyone else is refused by the guard.
        let addressed = matches!(actor, Actor::Mentor(id) if id == &existing.mentor_id);
        let capacity_limit = match decision {
            Decision::Accept if addressed => self
                .directory
                .lookup(&existing.mentor_id)
                .await?
                .ok_or_else(|| MatchingError::UserNotFound(existing.mentor_id.clone()))?
                .capacity_limit(),
            Decision::Accept | Decision::Reject => 0,
        };

        let transition = Transition::Decide {
            decision,
            response_message: non_empty(response_message),
            at: Utc::now(),
        };

        let guard_transition = transition.clone();
        let check = move |current: &MentorshipRequest, snapshot: &PairingSnapshot| {
            check_update(current, &guard_transition, actor, capacity_limit, snapshot)
        };
        let guard: UpdateGuard<'_> = &check;
        let store = &self.store;
        let updated = self
            .retry
            .run("respond", move || {
                store.update_guarded(request_id, transition.clone(), guard)
            })
            .await
            .map_err(|err| store_failure(err, decision.target()))?;

        info!(
            request_id = %updated.id,
            actor = %actor,
            status = updated.status.label(),
            "mentorship request decided"
        );

        let kind = match decision {
            Decision::Accept => NotificationKind::RequestAccepted,
            Decision::Reject => NotificationKind::RequestRejected,
        };
        let mut details = BTreeMap::new();
        details.insert("mentor_id".to_string(), updated.mentor_id.to_string());
        if let Some(message) = &updated.response_message {
            details.insert("response_message".to_string(), message.clone());
        }
        self.emit(Notification {
            recipient: updated.student_id.clone(),
            kind,
            request_id: updated.id.clone(),
            details,
        })
        .await;

        Ok(updated)
    }

    /// End an accepted relationship. `reason` is mandatory.
    pub async fn terminate(
        &self,
        request_id: &RequestId,
        terminator: Terminator,
        reason: &str,
    ) -> Result<MentorshipRequest, MatchingError> {
        self.end_as(terminator.into(), request_id, reason).await
    }

    pub(crate) async fn end_as(
        &self,
        actor: Actor,
        request_id: &RequestId,
        reason: &str,
    ) -> Result<MentorshipRequest, MatchingError> {
        let result = self.end_inner(&actor, request_id, reason).await;
        if let Err(err) = &result {
            log_rejection("terminate", err);
        }
        result
    }

    async fn end_inner(
        &self,
        actor: &Actor,
        request_id: &RequestId,
        reason: &str,
    ) -> Result<MentorshipRequest, MatchingError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ValidationError::EmptyReason.into());
        }

        let (ended_by, ended_by_user) = match actor {
            Actor::Mentor(id) => (TerminatedBy::Mentor, Some(id.clone())),
            Actor::Admin(id) => (TerminatedBy::Admin, Some(id.clone())),
            Actor::System => (TerminatedBy::System, None),
            Actor::Student(_) => {
                return Err(Violation::Unauthorized {
                    actor: actor.to_string(),
                    request: request_id.clone(),
                    to: RequestStatus::Removed,
                }
                .into())
            }
        };

        let transition = Transition::End {
            termination: Termination {
                reason: reason.to_string(),
                ended_by,
                ended_by_user,
            },
            at: Utc::now(),
        };

        let guard_transition = transition.clone();
        let check = move |current: &MentorshipRequest, snapshot: &PairingSnapshot| {
            check_update(current, &guard_transition, actor, 0, snapshot)
        };
        let guard: UpdateGuard<'_> = &check;
        let store = &self.store;
        let ended = self
            .retry
            .run("terminate", move || {
                store.update_guarded(request_id, transition.clone(), guard)
            })
            .await
            .map_err(|err| store_failure(err, RequestStatus::Removed))?;

        info!(
            request_id = %ended.id,
            actor = %actor,
            student_id = %ended.student_id,
            mentor_id = %ended.mentor_id,
            "mentorship relationship ended"
        );

        for recipient in [ended.student_id.clone(), ended.mentor_id.clone()] {
            let mut details = BTreeMap::new();
            details.insert("reason".to_string(), reason.to_string());
            details.insert("ended_by".to_string(), actor.role_label().to_string());
            self.emit(Notification {
                recipient,
                kind: NotificationKind::RelationshipEnded,
                request_id: ended.id.clone(),
                details,
            })
            .await;
        }

        Ok(ended)
    }

    /// System cleanup: end every accepted relationship `user` takes part in.
    pub async fn end_relationships_for(
        &self,
        user: &UserId,
        reason: &str,
    ) -> Result<Vec<MentorshipRequest>, MatchingError> {
        if reason.trim().is_empty() {
            return Err(ValidationError::EmptyReason.into());
        }

        let active: Vec<MentorshipRequest> = self
            .list_requests(user, Participation::Any)
            .await?
            .into_iter()
            .filter(|request| request.status == RequestStatus::Accepted)
            .collect();

        let mut ended = Vec::with_capacity(active.len());
        for request in active {
            match self.end_as(Actor::System, &request.id, reason).await {
                Ok(record) => ended.push(record),
                // Ended concurrently by someone else.
                Err(MatchingError::Rejected(Violation::InvalidStateTransition { .. })) => {
                    debug!(request_id = %request.id, "relationship already ended");
                }
                Err(other) => return Err(other),
            }
        }

        Ok(ended)
    }

    /// Requests the user takes part in, most recent first.
    pub async fn list_requests(
        &self,
        user: &UserId,
        participation: Participation,
    ) -> Result<Vec<MentorshipRequest>, MatchingError> {
        self.store
            .list_for_user(user, participation)
            .await
            .map_err(|err| store_failure(err, RequestStatus::Pending))
    }

    pub async fn get(&self, request_id: &RequestId) -> Result<MentorshipRequest, MatchingError> {
        let result = self
            .store
            .fetch(request_id)
            .await
            .map_err(|err| store_failure(err, RequestStatus::Pending))
            .and_then(|record| {
                record.ok_or_else(|| MatchingError::RequestNotFound(request_id.clone()))
            });
        if let Err(err) = &result {
            log_rejection("get", err);
        }
        result
    }

    /// Current load against the mentor's configured limit, read fresh from the store.
    pub async fn capacity_profile(
        &self,
        mentor_id: &UserId,
    ) -> Result<MentorCapacityProfile, MatchingError> {
        let mentor = self
            .directory
            .lookup(mentor_id)
            .await?
            .ok_or_else(|| MatchingError::UserNotFound(mentor_id.clone()))?;
        let active = self
            .store
            .active_count(mentor_id)
            .await
            .map_err(|err| store_failure(err, RequestStatus::Accepted))?;
        Ok(MentorCapacityProfile::new(
            mentor_id.clone(),
            active,
            mentor.capacity_limit(),
        ))
    }

    async fn emit(&self, notification: Notification) {
        let recipient = notification.recipient.clone();
        let kind = notification.kind;
        if let Err(err) = self.notifier.notify(notification).await {
            warn!(
                recipient = %recipient,
                kind = kind.label(),
                error = %err,
                "notification dispatch failed"
            );
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Maps a store error onto the service taxonomy. `target` is the status the caller wanted.
fn store_failure(err: StoreError, target: RequestStatus) -> MatchingError {
    match err {
        StoreError::Rejected(violation) => MatchingError::Rejected(violation),
        StoreError::StatusMismatch { id, found, .. } => {
            MatchingError::Rejected(Violation::InvalidStateTransition {
                request: id,
                from: found,
                to: target,
            })
        }
        StoreError::NotFound(id) => MatchingError::RequestNotFound(id),
        other @ (StoreError::DuplicateId(_) | StoreError::Conflict | StoreError::Unavailable(_)) => {
            MatchingError::Unavailable(other.to_string())
        }
    }
}

pub(crate) fn log_rejection(operation: &str, err: &MatchingError) {
    if err.is_integrity_problem() {
        warn!(operation, code = err.code(), error = %err, "request refused");
    } else if !matches!(err, MatchingError::Unavailable(_)) {
        info!(operation, code = err.code(), error = %err, "request refused");
    }
}
