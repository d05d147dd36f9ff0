use std::sync::Arc;

use super::common::*;
use crate::mentorship::domain::{RequestStatus, TerminatedBy};
use crate::mentorship::invariants::Violation;
use crate::mentorship::service::{MatchingError, ValidationError};
use crate::mentorship::AdminOverride;

#[tokio::test]
async fn admin_rejects_pending_request_and_audits_it() {
    let h = harness();
    let pending = h.pending(ADA, GRACE).await;

    let rejected = h
        .admin
        .reject_pending(&user(ROOT), &pending.id, "  spam report confirmed ")
        .await
        .expect("admin rejected");

    assert_eq!(rejected.status, RequestStatus::Rejected);
    assert_eq!(
        rejected.response_message.as_deref(),
        Some("spam report confirmed")
    );

    let entries = h.audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].actor_id, user(ROOT));
    assert_eq!(entries[0].action, "reject_pending");
    assert_eq!(entries[0].target_id, pending.id);
    assert_eq!(entries[0].reason, "spam report confirmed");
}

#[tokio::test]
async fn admin_removes_accepted_relationship_and_frees_capacity() {
    let h = harness();
    let accepted = h.accepted(ADA, LINUS).await;
    assert_eq!(h.active_count(LINUS).await, 1);

    let removed = h
        .admin
        .remove_accepted(&user(ROOT), &accepted.id, "code of conduct violation")
        .await
        .expect("admin removed");

    let termination = removed.termination.expect("termination recorded");
    assert_eq!(termination.ended_by, TerminatedBy::Admin);
    assert_eq!(termination.ended_by_user, Some(user(ROOT)));
    assert_eq!(h.active_count(LINUS).await, 0);
    assert_eq!(h.audit.entries()[0].action, "remove_accepted");

    // Capacity is available again.
    h.accepted(BEN, LINUS).await;
}

#[tokio::test]
async fn non_admin_is_refused_without_touching_the_record() {
    let h = harness();
    let pending = h.pending(ADA, GRACE).await;

    for impostor in [GRACE, ADA, "a-ghost"] {
        let err = h
            .admin
            .reject_pending(&user(impostor), &pending.id, "because")
            .await
            .expect_err("not an admin");
        assert!(matches!(
            err,
            MatchingError::Rejected(Violation::Unauthorized { .. })
        ));
    }

    let stored = h.service.get(&pending.id).await.expect("fetched");
    assert_eq!(stored.status, RequestStatus::Pending);
    assert!(h.audit.entries().is_empty());
}

#[tokio::test]
async fn admin_override_requires_a_reason() {
    let h = harness();
    let accepted = h.accepted(ADA, GRACE).await;

    let err = h
        .admin
        .remove_accepted(&user(ROOT), &accepted.id, "   ")
        .await
        .expect_err("reason is mandatory");
    assert!(matches!(
        err,
        MatchingError::Validation(ValidationError::EmptyReason)
    ));
    assert_eq!(h.active_count(GRACE).await, 1);
}

#[tokio::test]
async fn admin_cannot_skip_the_state_machine() {
    let h = harness();
    let pending = h.pending(ADA, GRACE).await;

    let err = h
        .admin
        .remove_accepted(&user(ROOT), &pending.id, "too early")
        .await
        .expect_err("pending cannot be removed");
    assert_eq!(err.code(), "invalid_state_transition");

    let accepted = h.accepted(BEN, GRACE).await;
    let err = h
        .admin
        .reject_pending(&user(ROOT), &accepted.id, "too late")
        .await
        .expect_err("accepted cannot be rejected");
    assert_eq!(err.code(), "invalid_state_transition");
    assert!(h.audit.entries().is_empty());
}

#[tokio::test]
async fn audit_outage_does_not_undo_the_override() {
    let h = harness();
    let admin = AdminOverride::new(h.service.clone(), Arc::new(FailingAudit));
    let pending = h.pending(ADA, GRACE).await;

    let rejected = admin
        .reject_pending(&user(ROOT), &pending.id, "duplicate account")
        .await
        .expect("override committed");
    assert_eq!(rejected.status, RequestStatus::Rejected);

    let stored = h.service.get(&pending.id).await.expect("fetched");
    assert_eq!(stored.status, RequestStatus::Rejected);
}
