use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque reference to a user owned by the external user directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for mentorship requests.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Focus areas a student can ask an alumnus for help with.
///
/// Travels as a plain string: known labels map to their variant, anything else is kept as
/// `Other` so free-form topics survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MentorshipArea {
    CareerGuidance,
    ResumeReview,
    InterviewPreparation,
    TechnicalSkills,
    HigherEducation,
    Entrepreneurship,
    Networking,
    Other(String),
}

impl MentorshipArea {
    pub fn label(&self) -> &str {
        match self {
            MentorshipArea::CareerGuidance => "career_guidance",
            MentorshipArea::ResumeReview => "resume_review",
            MentorshipArea::InterviewPreparation => "interview_preparation",
            MentorshipArea::TechnicalSkills => "technical_skills",
            MentorshipArea::HigherEducation => "higher_education",
            MentorshipArea::Entrepreneurship => "entrepreneurship",
            MentorshipArea::Networking => "networking",
            MentorshipArea::Other(label) => label.as_str(),
        }
    }

    /// Parses a label, falling back to `Other` for unrecognised free-form topics.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "career_guidance" => MentorshipArea::CareerGuidance,
            "resume_review" => MentorshipArea::ResumeReview,
            "interview_preparation" => MentorshipArea::InterviewPreparation,
            "technical_skills" => MentorshipArea::TechnicalSkills,
            "higher_education" => MentorshipArea::HigherEducation,
            "entrepreneurship" => MentorshipArea::Entrepreneurship,
            "networking" => MentorshipArea::Networking,
            _ => MentorshipArea::Other(raw.trim().to_string()),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, MentorshipArea::Other(label) if label.trim().is_empty())
    }
}

impl From<String> for MentorshipArea {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<MentorshipArea> for String {
    fn from(area: MentorshipArea) -> Self {
        area.label().to_string()
    }
}

/// Lifecycle status of a mentorship request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Removed,
}

impl RequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Removed => "removed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Rejected | RequestStatus::Removed)
    }

    /// Pending and accepted requests both block a new request to the same mentor.
    pub const fn is_open(self) -> bool {
        matches!(self, RequestStatus::Pending | RequestStatus::Accepted)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Mentor decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    pub const fn target(self) -> RequestStatus {
        match self {
            Decision::Accept => RequestStatus::Accepted,
            Decision::Reject => RequestStatus::Rejected,
        }
    }
}

/// Identity acting on the engine; always passed explicitly by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "user_id", rename_all = "snake_case")]
pub enum Actor {
    Student(UserId),
    Mentor(UserId),
    Admin(UserId),
    System,
}

impl Actor {
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Actor::Student(id) | Actor::Mentor(id) | Actor::Admin(id) => Some(id),
            Actor::System => None,
        }
    }

    pub const fn role_label(&self) -> &'static str {
        match self {
            Actor::Student(_) => "student",
            Actor::Mentor(_) => "mentor",
            Actor::Admin(_) => "admin",
            Actor::System => "system",
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.user_id() {
            Some(id) => write!(f, "{}:{}", self.role_label(), id),
            None => f.write_str(self.role_label()),
        }
    }
}

/// Who ended an accepted relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminatedBy {
    Mentor,
    Admin,
    System,
}

/// Termination details recorded on `Accepted -> Removed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Termination {
    pub reason: String,
    pub ended_by: TerminatedBy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_by_user: Option<UserId>,
}

/// The core record: one student asking one mentor for help.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentorshipRequest {
    pub id: RequestId,
    pub student_id: UserId,
    pub mentor_id: UserId,
    pub topic: MentorshipArea,
    pub message: String,
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination: Option<Termination>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl MentorshipRequest {
    pub fn pending(
        id: RequestId,
        student_id: UserId,
        mentor_id: UserId,
        topic: MentorshipArea,
        message: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            student_id,
            mentor_id,
            topic,
            message,
            status: RequestStatus::Pending,
            response_message: None,
            termination: None,
            created_at,
            decided_at: None,
            ended_at: None,
        }
    }

    pub fn involves(&self, user: &UserId) -> bool {
        &self.student_id == user || &self.mentor_id == user
    }

    /// Applies an already-validated transition. Timestamps are only ever set, never rewritten.
    pub fn apply(&mut self, transition: &Transition) {
        match transition {
            Transition::Decide {
                decision,
                response_message,
                at,
            } => {
                self.status = decision.target();
                self.response_message = response_message.clone();
                self.decided_at = Some(*at);
            }
            Transition::End { termination, at } => {
                self.status = RequestStatus::Removed;
                self.termination = Some(termination.clone());
                self.ended_at = Some(*at);
            }
        }
    }
}

/// A state change requested against a single record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Decide {
        decision: Decision,
        response_message: Option<String>,
        at: DateTime<Utc>,
    },
    End {
        termination: Termination,
        at: DateTime<Utc>,
    },
}

impl Transition {
    /// Status the record must currently hold for the transition to apply.
    pub const fn expected(&self) -> RequestStatus {
        match self {
            Transition::Decide { .. } => RequestStatus::Pending,
            Transition::End { .. } => RequestStatus::Accepted,
        }
    }

    pub const fn target(&self) -> RequestStatus {
        match self {
            Transition::Decide { decision, .. } => decision.target(),
            Transition::End { .. } => RequestStatus::Removed,
        }
    }
}

/// Which side of a request a listing is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Participation {
    Student,
    Mentor,
    #[default]
    Any,
}

impl Participation {
    pub fn matches(self, request: &MentorshipRequest, user: &UserId) -> bool {
        match self {
            Participation::Student => &request.student_id == user,
            Participation::Mentor => &request.mentor_id == user,
            Participation::Any => request.involves(user),
        }
    }
}

/// Load derived from the store for one mentor. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentorCapacityProfile {
    pub mentor_id: UserId,
    pub active_count: u32,
    pub capacity_limit: u32,
    pub remaining: u32,
}

impl MentorCapacityProfile {
    pub fn new(mentor_id: UserId, active_count: u32, capacity_limit: u32) -> Self {
        Self {
            mentor_id,
            active_count,
            capacity_limit,
            remaining: capacity_limit.saturating_sub(active_count),
        }
    }

    pub fn has_headroom(&self) -> bool {
        self.remaining > 0
    }
}
