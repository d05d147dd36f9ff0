use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use mentor_match::error::AppError;
use mentor_match::mentorship::{
    AdminOverride, AuditEntry, AuditError, AuditLog, DirectoryImporter, InMemoryDirectory,
    MatchingService, MemoryRequestStore, MentorSettings, MentorshipArea, Notification, Notifier, NotifyError,
    UserProfile, UserRole,
};
use tracing::info;

pub(crate) type MatchingEngine =
    MatchingService<MemoryRequestStore, InMemoryDirectory, TracingNotifier>;
pub(crate) type MatchingApi =
    AdminOverride<MemoryRequestStore, InMemoryDirectory, TracingNotifier, TracingAuditLog>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Delivers notifications to the service log until a real gateway is wired in.
#[derive(Debug, Default, Clone)]
pub(crate) struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(
            target: "mentor_match::notify",
            recipient = %notification.recipient,
            kind = notification.kind.label(),
            request_id = %notification.request_id,
            details = ?notification.details,
            "notification dispatched"
        );
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct TracingAuditLog;

#[async_trait]
impl AuditLog for TracingAuditLog {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        info!(
            target: "mentor_match::audit",
            actor_id = %entry.actor_id,
            action = %entry.action,
            target_id = %entry.target_id,
            reason = %entry.reason,
            "audit entry recorded"
        );
        Ok(())
    }
}

/// Seeds the directory from a CSV export, or starts empty.
pub(crate) fn load_directory(path: Option<&Path>) -> Result<InMemoryDirectory, AppError> {
    match path {
        Some(path) => {
            let directory = DirectoryImporter::from_path(path)?;
            info!(path = %path.display(), users = directory.len(), "user directory imported");
            Ok(directory)
        }
        None => Ok(InMemoryDirectory::new()),
    }
}

fn alumni(id: &str, name: &str, capacity_limit: u32, areas: Vec<MentorshipArea>) -> UserProfile {
    let resume_review = areas.contains(&MentorshipArea::ResumeReview);
    UserProfile::mentor(
        id,
        name,
        MentorSettings {
            accepting_mentees: true,
            capacity_limit,
            mentorship_areas: areas,
            resume_review,
        },
    )
}

/// Small built-in directory for the CLI demo.
pub(crate) fn demo_directory() -> InMemoryDirectory {
    InMemoryDirectory::with_users([
        UserProfile::student("stu-priya", "Priya Raman"),
        UserProfile::student("stu-tomas", "Tomas Lind"),
        alumni(
            "alum-maya",
            "Maya Chen",
            3,
            vec![MentorshipArea::CareerGuidance, MentorshipArea::ResumeReview],
        ),
        alumni(
            "alum-omar",
            "Omar Haddad",
            1,
            vec![
                MentorshipArea::TechnicalSkills,
                MentorshipArea::InterviewPreparation,
            ],
        ),
        UserProfile {
            id: mentor_match::mentorship::UserId::new("admin-ops"),
            display_name: "Alumni Office".to_string(),
            role: UserRole::Admin,
            mentor_settings: None,
        },
    ])
}
