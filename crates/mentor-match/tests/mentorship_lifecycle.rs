use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mentor_match::mentorship::{
    AdminOverride, AuditEntry, AuditError, AuditLog, Decision, InMemoryDirectory,
    MatchingError, MatchingService, MemoryRequestStore, MentorSettings, MentorshipArea,
    Notification, Notifier, NotifyError, RequestStatus, RetryPolicy, UserId, UserProfile,
    UserRole, Violation,
};
use mentor_match::mentorship::service::{NewRequest, Terminator};

#[derive(Default)]
struct Inbox(Mutex<Vec<Notification>>);

#[async_trait]
impl Notifier for Inbox {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.0.lock().unwrap().push(notification);
        Ok(())
    }
}

#[derive(Default)]
struct AuditTrail(Mutex<Vec<AuditEntry>>);

#[async_trait]
impl AuditLog for AuditTrail {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.0.lock().unwrap().push(entry);
        Ok(())
    }
}

type Service = MatchingService<MemoryRequestStore, InMemoryDirectory, Inbox>;
type Admin = AdminOverride<MemoryRequestStore, InMemoryDirectory, Inbox, AuditTrail>;

fn id(raw: &str) -> UserId {
    UserId::new(raw)
}

fn mentor(raw: &str, capacity_limit: u32) -> UserProfile {
    UserProfile::mentor(
        raw,
        raw.to_uppercase(),
        MentorSettings {
            accepting_mentees: true,
            capacity_limit,
            mentorship_areas: vec![MentorshipArea::CareerGuidance],
            resume_review: false,
        },
    )
}

fn setup() -> (Arc<Service>, Arc<Admin>, Arc<InMemoryDirectory>, Arc<AuditTrail>) {
    let directory = Arc::new(InMemoryDirectory::with_users([
        UserProfile::student("student-s", "S"),
        UserProfile::student("student-t", "T"),
        mentor("mentor-m", 3),
        mentor("mentor-m2", 1),
        UserProfile {
            id: id("admin-a"),
            display_name: "A".to_string(),
            role: UserRole::Admin,
            mentor_settings: None,
        },
    ]));
    let audit = Arc::new(AuditTrail::default());
    let service = Arc::new(MatchingService::with_retry(
        Arc::new(MemoryRequestStore::new()),
        directory.clone(),
        Arc::new(Inbox::default()),
        RetryPolicy::new(2, Duration::from_millis(1)),
    ));
    let admin = Arc::new(AdminOverride::new(service.clone(), audit.clone()));
    (service, admin, directory, audit)
}

fn ask(student: &str, mentor: &str) -> NewRequest {
    NewRequest {
        student_id: id(student),
        mentor_id: id(mentor),
        topic: MentorshipArea::CareerGuidance,
        message: "Would you mentor me this semester?".to_string(),
    }
}

async fn active(service: &Service, mentor: &str) -> u32 {
    service
        .capacity_profile(&id(mentor))
        .await
        .expect("capacity profile")
        .active_count
}

#[tokio::test]
async fn request_accept_block_remove_and_rematch() {
    let (service, admin, _directory, audit) = setup();

    // Request to a mentor with free capacity.
    let request = service
        .create_request(ask("student-s", "mentor-m"))
        .await
        .expect("request created");
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(active(&service, "mentor-m").await, 0);

    // Mentor accepts.
    let accepted = service
        .respond(&request.id, id("mentor-m"), Decision::Accept, None)
        .await
        .expect("accepted");
    assert_eq!(accepted.status, RequestStatus::Accepted);
    assert_eq!(active(&service, "mentor-m").await, 1);

    // A matched student cannot ask anyone else.
    let err = service
        .create_request(ask("student-s", "mentor-m2"))
        .await
        .expect_err("already matched");
    assert!(matches!(
        err,
        MatchingError::Rejected(Violation::DuplicateActiveMentor { .. })
    ));

    // Admin removes the relationship.
    let removed = admin
        .remove_accepted(&id("admin-a"), &request.id, "policy violation")
        .await
        .expect("removed");
    assert_eq!(removed.status, RequestStatus::Removed);
    assert_eq!(active(&service, "mentor-m").await, 0);
    assert_eq!(audit.0.lock().unwrap().len(), 1);

    // And the student is free again.
    service
        .create_request(ask("student-s", "mentor-m2"))
        .await
        .expect("student may request a new mentor");
}

#[tokio::test]
async fn full_mentor_refuses_accept_and_request_stays_pending() {
    let (service, _admin, _directory, _audit) = setup();

    let first = service
        .create_request(ask("student-s", "mentor-m2"))
        .await
        .expect("created");
    service
        .respond(&first.id, id("mentor-m2"), Decision::Accept, None)
        .await
        .expect("accepted");

    let second = service
        .create_request(ask("student-t", "mentor-m2"))
        .await
        .expect("pending requests are not capacity checked");
    let err = service
        .respond(&second.id, id("mentor-m2"), Decision::Accept, None)
        .await
        .expect_err("mentor is full");
    assert_eq!(err.code(), "capacity_exceeded");

    let unchanged = service.get(&second.id).await.expect("fetched");
    assert_eq!(unchanged.status, RequestStatus::Pending);
    assert_eq!(active(&service, "mentor-m2").await, 1);
}

#[tokio::test]
async fn lowered_capacity_grandfathers_existing_load() {
    let (service, _admin, directory, _audit) = setup();

    let mut accepted = Vec::new();
    for student in ["student-s", "student-t"] {
        let request = service
            .create_request(ask(student, "mentor-m"))
            .await
            .expect("created");
        accepted.push(
            service
                .respond(&request.id, id("mentor-m"), Decision::Accept, None)
                .await
                .expect("accepted"),
        );
    }
    assert!(directory.set_capacity(&id("mentor-m"), 1).expect("directory writable"));

    let profile = service
        .capacity_profile(&id("mentor-m"))
        .await
        .expect("profile");
    assert_eq!(profile.active_count, 2);
    assert_eq!(profile.capacity_limit, 1);
    assert_eq!(profile.remaining, 0);

    // Existing relationships survive; one ending still leaves the mentor at the limit.
    service
        .terminate(&accepted[0].id, Terminator::Mentor(id("mentor-m")), "finished")
        .await
        .expect("ended");
    let next = service
        .create_request(ask("student-s", "mentor-m"))
        .await
        .expect("created");
    let err = service
        .respond(&next.id, id("mentor-m"), Decision::Accept, None)
        .await
        .expect_err("still at the lowered limit");
    assert_eq!(err.code(), "capacity_exceeded");

    service
        .terminate(&accepted[1].id, Terminator::System, "account closed")
        .await
        .expect("ended");
    service
        .respond(&next.id, id("mentor-m"), Decision::Accept, None)
        .await
        .expect("room again below the new limit");
}

#[tokio::test]
async fn terminal_records_fail_cleanly_on_retry() {
    let (service, _admin, _directory, _audit) = setup();

    let request = service
        .create_request(ask("student-s", "mentor-m"))
        .await
        .expect("created");
    service
        .respond(&request.id, id("mentor-m"), Decision::Reject, None)
        .await
        .expect("rejected");

    for decision in [Decision::Accept, Decision::Reject] {
        let err = service
            .respond(&request.id, id("mentor-m"), decision, None)
            .await
            .expect_err("rejected is terminal");
        assert!(matches!(
            err,
            MatchingError::Rejected(Violation::InvalidStateTransition {
                from: RequestStatus::Rejected,
                ..
            })
        ));
    }
}
