//! Pure checks deciding whether a proposed write is legal.
//!
//! Nothing here touches storage. The store hands in a [`PairingSnapshot`] read inside the
//! same critical section as the write, so a check and its write never straddle a transaction
//! boundary.

use serde::Serialize;

use super::domain::{
    Actor, MentorshipRequest, RequestId, RequestStatus, Transition, UserId,
};

/// Reason a transition was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("student {student} already has an active mentor")]
    DuplicateActiveMentor { student: UserId },
    #[error("mentor {mentor} is at capacity ({active}/{limit})")]
    CapacityExceeded {
        mentor: UserId,
        active: u32,
        limit: u32,
    },
    #[error("student {student} already has an open request with mentor {mentor}")]
    DuplicatePendingRequest { student: UserId, mentor: UserId },
    #[error("request {request} cannot move from {from} to {to}")]
    InvalidStateTransition {
        request: RequestId,
        from: RequestStatus,
        to: RequestStatus,
    },
    #[error("{actor} may not move request {request} to {to}")]
    Unauthorized {
        actor: String,
        request: RequestId,
        to: RequestStatus,
    },
}

impl Violation {
    pub const fn code(&self) -> &'static str {
        match self {
            Violation::DuplicateActiveMentor { .. } => "duplicate_active_mentor",
            Violation::CapacityExceeded { .. } => "capacity_exceeded",
            Violation::DuplicatePendingRequest { .. } => "duplicate_pending_request",
            Violation::InvalidStateTransition { .. } => "invalid_state_transition",
            Violation::Unauthorized { .. } => "unauthorized",
        }
    }
}

/// State relevant to one write, read under the store's lock or transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PairingSnapshot {
    /// The student's `Pending`/`Accepted` requests across all mentors.
    pub student_open: Vec<MentorshipRequest>,
    /// Count of `Accepted` requests addressed to the mentor.
    pub mentor_active: u32,
}

impl PairingSnapshot {
    pub fn student_has_active_mentor(&self, excluding: Option<&RequestId>) -> bool {
        self.student_open.iter().any(|request| {
            request.status == RequestStatus::Accepted && Some(&request.id) != excluding
        })
    }

    pub fn student_has_open_request_with(&self, mentor: &UserId) -> bool {
        self.student_open
            .iter()
            .any(|request| &request.mentor_id == mentor && request.status.is_open())
    }
}

/// Guard run by the store right before inserting a new `Pending` request.
pub fn check_create(
    student: &UserId,
    mentor: &UserId,
    snapshot: &PairingSnapshot,
) -> Result<(), Violation> {
    if snapshot.student_has_active_mentor(None) {
        return Err(Violation::DuplicateActiveMentor {
            student: student.clone(),
        });
    }

    if snapshot.student_has_open_request_with(mentor) {
        return Err(Violation::DuplicatePendingRequest {
            student: student.clone(),
            mentor: mentor.clone(),
        });
    }

    Ok(())
}

/// Capacity gate for a transition into `Accepted`. Lowered limits grandfather existing load,
/// so `active > limit` is possible and simply blocks further accepts.
pub fn check_capacity(mentor: &UserId, active: u32, limit: u32) -> Result<(), Violation> {
    if active >= limit {
        return Err(Violation::CapacityExceeded {
            mentor: mentor.clone(),
            active,
            limit,
        });
    }
    Ok(())
}

/// State machine and actor rules for a transition on an existing record.
pub fn check_transition(
    record: &MentorshipRequest,
    transition: &Transition,
    actor: &Actor,
) -> Result<(), Violation> {
    let to = transition.target();

    // The addressed mentor never changes, so strangers are refused before the status is read.
    let permitted = match (transition, actor) {
        (_, Actor::Student(_)) => false,
        (Transition::Decide { .. }, Actor::Mentor(id)) => id == &record.mentor_id,
        (Transition::Decide { .. }, Actor::Admin(_)) => to == RequestStatus::Rejected,
        (Transition::Decide { .. }, Actor::System) => false,
        (Transition::End { .. }, Actor::Mentor(id)) => id == &record.mentor_id,
        (Transition::End { .. }, Actor::Admin(_) | Actor::System) => true,
    };

    if !permitted {
        return Err(Violation::Unauthorized {
            actor: actor.to_string(),
            request: record.id.clone(),
            to,
        });
    }

    if record.status != transition.expected() {
        return Err(Violation::InvalidStateTransition {
            request: record.id.clone(),
            from: record.status,
            to,
        });
    }

    Ok(())
}

/// Full guard for a transition: state machine, actor, and, for accepts, capacity and the
/// one-active-mentor rule.
pub fn check_update(
    record: &MentorshipRequest,
    transition: &Transition,
    actor: &Actor,
    capacity_limit: u32,
    snapshot: &PairingSnapshot,
) -> Result<(), Violation> {
    check_transition(record, transition, actor)?;

    if transition.target() == RequestStatus::Accepted {
        if snapshot.student_has_active_mentor(Some(&record.id)) {
            return Err(Violation::DuplicateActiveMentor {
                student: record.student_id.clone(),
            });
        }
        check_capacity(&record.mentor_id, snapshot.mentor_active, capacity_limit)?;
    }

    Ok(())
}
