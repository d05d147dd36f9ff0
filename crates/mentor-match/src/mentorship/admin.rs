use std::sync::Arc;

use tracing::{info, warn};

use super::directory::{UserDirectory, UserRole};
use super::domain::{Actor, Decision, MentorshipRequest, RequestId, RequestStatus, UserId};
use super::gateway::{AuditEntry, AuditLog, Notifier};
use super::invariants::Violation;
use super::repository::RequestStore;
use super::service::{log_rejection, MatchingError, MatchingService, ValidationError};

/// Privileged entry point for forcing a request out of the normal mentor/student flow.
///
/// Admins may reject a pending request or remove an accepted one. They cannot force an accept,
/// and every call needs a reason that is mirrored to the audit log once the change commits.
pub struct AdminOverride<S, D, N, L> {
    service: Arc<MatchingService<S, D, N>>,
    audit: Arc<L>,
}

impl<S, D, N, L> AdminOverride<S, D, N, L>
where
    S: RequestStore + 'static,
    D: UserDirectory + 'static,
    N: Notifier + 'static,
    L: AuditLog + 'static,
{
    pub fn new(service: Arc<MatchingService<S, D, N>>, audit: Arc<L>) -> Self {
        Self { service, audit }
    }

    pub fn service(&self) -> &Arc<MatchingService<S, D, N>> {
        &self.service
    }

    pub async fn reject_pending(
        &self,
        admin_id: &UserId,
        request_id: &RequestId,
        reason: &str,
    ) -> Result<MentorshipRequest, MatchingError> {
        let reason = self
            .authorize(admin_id, request_id, reason, RequestStatus::Rejected)
            .await?;
        let record = self
            .service
            .respond_as(
                Actor::Admin(admin_id.clone()),
                request_id,
                Decision::Reject,
                Some(reason.clone()),
            )
            .await?;
        self.audit(admin_id, "reject_pending", request_id, reason)
            .await;
        Ok(record)
    }

    pub async fn remove_accepted(
        &self,
        admin_id: &UserId,
        request_id: &RequestId,
        reason: &str,
    ) -> Result<MentorshipRequest, MatchingError> {
        let reason = self
            .authorize(admin_id, request_id, reason, RequestStatus::Removed)
            .await?;
        let record = self
            .service
            .end_as(Actor::Admin(admin_id.clone()), request_id, &reason)
            .await?;
        self.audit(admin_id, "remove_accepted", request_id, reason)
            .await;
        Ok(record)
    }

    async fn authorize(
        &self,
        admin_id: &UserId,
        request_id: &RequestId,
        reason: &str,
        target: RequestStatus,
    ) -> Result<String, MatchingError> {
        let reason = reason.trim();
        if reason.is_empty() {
            let err = MatchingError::from(ValidationError::EmptyReason);
            log_rejection("admin_override", &err);
            return Err(err);
        }

        let is_admin = self
            .service
            .directory()
            .lookup(admin_id)
            .await?
            .is_some_and(|profile| profile.role == UserRole::Admin);
        if !is_admin {
            let err = MatchingError::from(Violation::Unauthorized {
                actor: Actor::Admin(admin_id.clone()).to_string(),
                request: request_id.clone(),
                to: target,
            });
            log_rejection("admin_override", &err);
            return Err(err);
        }

        Ok(reason.to_string())
    }

    async fn audit(&self, admin_id: &UserId, action: &str, request_id: &RequestId, reason: String) {
        info!(admin_id = %admin_id, action, request_id = %request_id, "admin override applied");
        let entry = AuditEntry {
            actor_id: admin_id.clone(),
            action: action.to_string(),
            target_id: request_id.clone(),
            reason,
        };
        if let Err(err) = self.audit.record(entry).await {
            warn!(admin_id = %admin_id, action, request_id = %request_id, error = %err, "audit log write failed");
        }
    }
}
