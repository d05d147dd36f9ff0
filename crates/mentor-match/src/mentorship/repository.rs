use async_trait::async_trait;

use super::domain::{MentorshipRequest, Participation, RequestId, RequestStatus, Transition, UserId};
use super::invariants::{PairingSnapshot, Violation};

/// Check evaluated by the store inside the write's critical section.
pub type WriteGuard<'a> = &'a (dyn Fn(&PairingSnapshot) -> Result<(), Violation> + Send + Sync);

/// Update guard; also sees the record as it stands at write time.
pub type UpdateGuard<'a> =
    &'a (dyn Fn(&MentorshipRequest, &PairingSnapshot) -> Result<(), Violation> + Send + Sync);

/// Durable home of every mentorship request.
///
/// Implementations must evaluate the supplied guard against state read atomically with the
/// write: a row lock or serializable transaction for SQL backends, a single mutex for the
/// in-memory store. Records are never deleted.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Inserts a new `Pending` record if `guard` accepts the student's current state.
    async fn insert_guarded(
        &self,
        record: MentorshipRequest,
        guard: WriteGuard<'_>,
    ) -> Result<MentorshipRequest, StoreError>;

    /// Applies `transition` only while `guard` accepts and the record still holds
    /// `transition.expected()`. The guard sees the record first, so actor refusals win over
    /// a stale status. Acts as a compare-and-swap on the status column.
    async fn update_guarded(
        &self,
        id: &RequestId,
        transition: Transition,
        guard: UpdateGuard<'_>,
    ) -> Result<MentorshipRequest, StoreError>;

    async fn fetch(&self, id: &RequestId) -> Result<Option<MentorshipRequest>, StoreError>;

    /// All requests touching `user` on the given side, most recent first.
    async fn list_for_user(
        &self,
        user: &UserId,
        participation: Participation,
    ) -> Result<Vec<MentorshipRequest>, StoreError>;

    /// Number of `Accepted` requests addressed to `mentor`.
    async fn active_count(&self, mentor: &UserId) -> Result<u32, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("request {0} not found")]
    NotFound(RequestId),
    #[error("request {id} is {found}, expected {expected}")]
    StatusMismatch {
        id: RequestId,
        found: RequestStatus,
        expected: RequestStatus,
    },
    #[error(transparent)]
    Rejected(#[from] Violation),
    #[error("request id {0} already exists")]
    DuplicateId(RequestId),
    #[error("transaction conflict")]
    Conflict,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Transient failures may be retried; everything else is a definitive answer.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Conflict | StoreError::Unavailable(_))
    }
}
