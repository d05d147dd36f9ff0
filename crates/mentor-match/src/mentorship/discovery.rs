use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::directory::UserDirectory;
use super::domain::{MentorshipArea, MentorshipRequest, Participation, UserId};
use super::invariants::{check_capacity, check_create, PairingSnapshot};
use super::repository::RequestStore;
use super::service::MatchingError;

/// Optional narrowing of the mentor list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryFilters {
    #[serde(default)]
    pub area: Option<MentorshipArea>,
    #[serde(default)]
    pub resume_review: Option<bool>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// One mentor the student could request right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentorAvailability {
    pub mentor_id: UserId,
    pub display_name: String,
    pub remaining_capacity: u32,
    pub mentorship_areas: Vec<MentorshipArea>,
    pub resume_review: bool,
}

/// Read-only projection of which alumni a student can request.
///
/// Computed fresh on every call. It is a convenience filter only; `create_request` remains
/// the authority on whether a request may be opened.
pub struct MentorDiscovery<S, D> {
    store: Arc<S>,
    directory: Arc<D>,
}

impl<S, D> MentorDiscovery<S, D>
where
    S: RequestStore + 'static,
    D: UserDirectory + 'static,
{
    pub fn new(store: Arc<S>, directory: Arc<D>) -> Self {
        Self { store, directory }
    }

    pub async fn find_available_mentors(
        &self,
        student_id: &UserId,
        filters: &DiscoveryFilters,
    ) -> Result<Vec<MentorAvailability>, MatchingError> {
        let student_open: Vec<MentorshipRequest> = self
            .store
            .list_for_user(student_id, Participation::Student)
            .await
            .map_err(|err| MatchingError::Unavailable(err.to_string()))?
            .into_iter()
            .filter(|request| request.status.is_open())
            .collect();

        let mut available = Vec::new();
        for mentor in self.directory.mentors().await? {
            if &mentor.id == student_id || !mentor.accepts_mentees() {
                continue;
            }
            let Some(settings) = mentor.mentor_settings.as_ref() else {
                continue;
            };
            if let Some(area) = &filters.area {
                if !settings.mentorship_areas.contains(area) {
                    continue;
                }
            }
            if let Some(resume_review) = filters.resume_review {
                if settings.resume_review != resume_review {
                    continue;
                }
            }

            let mentor_active = self
                .store
                .active_count(&mentor.id)
                .await
                .map_err(|err| MatchingError::Unavailable(err.to_string()))?;
            let snapshot = PairingSnapshot {
                student_open: student_open.clone(),
                mentor_active,
            };

            if let Err(violation) = check_create(student_id, &mentor.id, &snapshot)
                .and_then(|()| check_capacity(&mentor.id, mentor_active, settings.capacity_limit))
            {
                debug!(mentor_id = %mentor.id, reason = violation.code(), "mentor excluded from discovery");
                continue;
            }

            available.push(MentorAvailability {
                mentor_id: mentor.id.clone(),
                display_name: mentor.display_name.clone(),
                remaining_capacity: settings.capacity_limit.saturating_sub(mentor_active),
                mentorship_areas: settings.mentorship_areas.clone(),
                resume_review: settings.resume_review,
            });
        }

        available.sort_by(|a, b| {
            b.remaining_capacity
                .cmp(&a.remaining_capacity)
                .then_with(|| a.mentor_id.cmp(&b.mentor_id))
        });
        if let Some(limit) = filters.limit {
            available.truncate(limit);
        }

        Ok(available)
    }
}
