use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::mentorship::directory::{InMemoryDirectory, MentorSettings, UserProfile, UserRole};
use crate::mentorship::domain::{
    Decision, MentorshipArea, MentorshipRequest, Participation, RequestId, Transition, UserId,
};
use crate::mentorship::gateway::{
    AuditEntry, AuditError, AuditLog, Notification, NotificationKind, Notifier, NotifyError,
};
use crate::mentorship::memory::MemoryRequestStore;
use crate::mentorship::repository::{RequestStore, StoreError, UpdateGuard, WriteGuard};
use crate::mentorship::retry::RetryPolicy;
use crate::mentorship::{mentorship_router, AdminOverride, MatchingService, NewRequest};

pub(super) const ADA: &str = "s-ada";
pub(super) const BEN: &str = "s-ben";
pub(super) const CY: &str = "s-cy";
pub(super) const GRACE: &str = "m-grace";
pub(super) const LINUS: &str = "m-linus";
pub(super) const OFFLINE: &str = "m-offline";
pub(super) const ROOT: &str = "a-root";

pub(super) type TestService = MatchingService<MemoryRequestStore, InMemoryDirectory, MemoryNotifier>;
pub(super) type TestAdmin =
    AdminOverride<MemoryRequestStore, InMemoryDirectory, MemoryNotifier, MemoryAudit>;

pub(super) fn user(id: &str) -> UserId {
    UserId::new(id)
}

pub(super) fn mentor_settings(capacity_limit: u32, areas: Vec<MentorshipArea>) -> MentorSettings {
    MentorSettings {
        accepting_mentees: true,
        capacity_limit,
        mentorship_areas: areas,
        resume_review: false,
    }
}

/// Three students, three alumni (capacity 3, 1, and one not accepting), and one admin.
pub(super) fn directory() -> InMemoryDirectory {
    let mut grace = mentor_settings(
        3,
        vec![MentorshipArea::CareerGuidance, MentorshipArea::ResumeReview],
    );
    grace.resume_review = true;
    let mut offline = mentor_settings(2, vec![MentorshipArea::Networking]);
    offline.accepting_mentees = false;

    InMemoryDirectory::with_users([
        UserProfile::student(ADA, "Ada"),
        UserProfile::student(BEN, "Ben"),
        UserProfile::student(CY, "Cy"),
        UserProfile::mentor(GRACE, "Grace", grace),
        UserProfile::mentor(
            LINUS,
            "Linus",
            mentor_settings(1, vec![MentorshipArea::TechnicalSkills]),
        ),
        UserProfile::mentor(OFFLINE, "Off", offline),
        UserProfile {
            id: user(ROOT),
            display_name: "Root".to_string(),
            role: UserRole::Admin,
            mentor_settings: None,
        },
    ])
}

pub(super) fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1))
}

pub(super) struct Harness {
    pub(super) service: Arc<TestService>,
    pub(super) admin: Arc<TestAdmin>,
    pub(super) store: Arc<MemoryRequestStore>,
    pub(super) directory: Arc<InMemoryDirectory>,
    pub(super) notifier: Arc<MemoryNotifier>,
    pub(super) audit: Arc<MemoryAudit>,
}

pub(super) fn harness() -> Harness {
    let store = Arc::new(MemoryRequestStore::new());
    let directory = Arc::new(directory());
    let notifier = Arc::new(MemoryNotifier::default());
    let audit = Arc::new(MemoryAudit::default());
    let service = Arc::new(MatchingService::with_retry(
        store.clone(),
        directory.clone(),
        notifier.clone(),
        fast_retry(),
    ));
    let admin = Arc::new(AdminOverride::new(service.clone(), audit.clone()));
    Harness {
        service,
        admin,
        store,
        directory,
        notifier,
        audit,
    }
}

pub(super) fn new_request(student: &str, mentor: &str) -> NewRequest {
    NewRequest {
        student_id: user(student),
        mentor_id: user(mentor),
        topic: MentorshipArea::CareerGuidance,
        message: "Could you help me plan my first job search?".to_string(),
    }
}

impl Harness {
    pub(super) async fn pending(&self, student: &str, mentor: &str) -> MentorshipRequest {
        self.service
            .create_request(new_request(student, mentor))
            .await
            .expect("request created")
    }

    pub(super) async fn accepted(&self, student: &str, mentor: &str) -> MentorshipRequest {
        let pending = self.pending(student, mentor).await;
        self.service
            .respond(&pending.id, user(mentor), Decision::Accept, None)
            .await
            .expect("request accepted")
    }

    pub(super) async fn active_count(&self, mentor: &str) -> u32 {
        self.store
            .active_count(&user(mentor))
            .await
            .expect("count available")
    }

    pub(super) fn router(&self) -> axum::Router {
        mentorship_router(self.admin.clone())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifier {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryNotifier {
    pub(super) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }

    pub(super) fn kinds_for(&self, recipient: &str) -> Vec<NotificationKind> {
        self.events()
            .into_iter()
            .filter(|event| event.recipient.as_str() == recipient)
            .map(|event| event.kind)
            .collect()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _notification: Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp relay offline".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryAudit {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAudit {
    pub(super) fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

#[async_trait]
impl AuditLog for MemoryAudit {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries.lock().expect("audit mutex poisoned").push(entry);
        Ok(())
    }
}

pub(super) struct FailingAudit;

#[async_trait]
impl AuditLog for FailingAudit {
    async fn record(&self, _entry: AuditEntry) -> Result<(), AuditError> {
        Err(AuditError::Unavailable("audit sink offline".to_string()))
    }
}

/// Fails the first `failures` guarded writes with a transient error, then delegates.
pub(super) struct FlakyStore {
    inner: MemoryRequestStore,
    remaining_failures: AtomicU32,
    pub(super) write_attempts: AtomicU32,
}

impl FlakyStore {
    pub(super) fn new(failures: u32) -> Self {
        Self {
            inner: MemoryRequestStore::new(),
            remaining_failures: AtomicU32::new(failures),
            write_attempts: AtomicU32::new(0),
        }
    }

    fn trip(&self) -> Result<(), StoreError> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        let tripped = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok();
        if tripped {
            Err(StoreError::Unavailable("connection reset".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RequestStore for FlakyStore {
    async fn insert_guarded(
        &self,
        record: MentorshipRequest,
        guard: WriteGuard<'_>,
    ) -> Result<MentorshipRequest, StoreError> {
        self.trip()?;
        self.inner.insert_guarded(record, guard).await
    }

    async fn update_guarded(
        &self,
        id: &RequestId,
        transition: Transition,
        guard: UpdateGuard<'_>,
    ) -> Result<MentorshipRequest, StoreError> {
        self.trip()?;
        self.inner.update_guarded(id, transition, guard).await
    }

    async fn fetch(&self, id: &RequestId) -> Result<Option<MentorshipRequest>, StoreError> {
        self.inner.fetch(id).await
    }

    async fn list_for_user(
        &self,
        user: &UserId,
        participation: Participation,
    ) -> Result<Vec<MentorshipRequest>, StoreError> {
        self.inner.list_for_user(user, participation).await
    }

    async fn active_count(&self, mentor: &UserId) -> Result<u32, StoreError> {
        self.inner.active_count(mentor).await
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
