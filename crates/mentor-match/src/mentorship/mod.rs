//! Mentorship request intake, mentor decisions, capacity accounting, and termination.
//!
//! [`MatchingService`] is the only writer of the [`RequestStore`]; every write runs the pure
//! checks in [`invariants`] inside the store's critical section. [`AdminOverride`] and
//! [`MentorDiscovery`] sit on top of it.

pub mod admin;
pub mod directory;
pub mod discovery;
pub mod domain;
pub mod gateway;
pub mod import;
pub mod invariants;
pub mod memory;
pub mod repository;
pub mod retry;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use admin::AdminOverride;
pub use directory::{
    DirectoryError, InMemoryDirectory, MentorSettings, UserDirectory, UserProfile, UserRole,
};
pub use discovery::{DiscoveryFilters, MentorAvailability, MentorDiscovery};
pub use domain::{
    Actor, Decision, MentorCapacityProfile, MentorshipArea, MentorshipRequest, Participation,
    RequestId, RequestStatus, TerminatedBy, Termination, UserId,
};
pub use gateway::{
    AuditEntry, AuditError, AuditLog, Notification, NotificationKind, Notifier, NotifyError,
};
pub use import::{DirectoryImportError, DirectoryImporter};
pub use invariants::Violation;
pub use memory::MemoryRequestStore;
pub use repository::{RequestStore, StoreError};
pub use retry::RetryPolicy;
pub use router::mentorship_router;
pub use service::{MatchingError, MatchingService, NewRequest, Terminator, ValidationError};
