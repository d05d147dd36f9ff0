use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{MentorshipArea, UserId};

/// Role recorded for a user by the identity subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Student,
    Alumni,
    Admin,
}

impl UserRole {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Self::Student),
            "alumni" | "alumnus" | "mentor" => Some(Self::Alumni),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Mentoring preferences owned by the user's profile; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentorSettings {
    pub accepting_mentees: bool,
    pub capacity_limit: u32,
    #[serde(default)]
    pub mentorship_areas: Vec<MentorshipArea>,
    #[serde(default)]
    pub resume_review: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: String,
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentor_settings: Option<MentorSettings>,
}

impl UserProfile {
    pub fn student(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(id),
            display_name: display_name.into(),
            role: UserRole::Student,
            mentor_settings: None,
        }
    }

    pub fn mentor(
        id: impl Into<String>,
        display_name: impl Into<String>,
        settings: MentorSettings,
    ) -> Self {
        Self {
            id: UserId::new(id),
            display_name: display_name.into(),
            role: UserRole::Alumni,
            mentor_settings: Some(settings),
        }
    }

    /// Alumni with mentoring switched on.
    pub fn accepts_mentees(&self) -> bool {
        self.role == UserRole::Alumni
            && self
                .mentor_settings
                .as_ref()
                .is_some_and(|settings| settings.accepting_mentees)
    }

    /// Zero when the user has no mentor settings at all.
    pub fn capacity_limit(&self) -> u32 {
        self.mentor_settings
            .as_ref()
            .map(|settings| settings.capacity_limit)
            .unwrap_or(0)
    }
}

/// Read access to the external user directory.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn lookup(&self, id: &UserId) -> Result<Option<UserProfile>, DirectoryError>;

    /// Every alumnus that has mentor settings, willing or not.
    async fn mentors(&self) -> Result<Vec<UserProfile>, DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("user directory unavailable: {0}")]
    Unavailable(String),
}

/// Directory held in process memory; seeded from code or a CSV export.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDirectory {
    users: Arc<RwLock<BTreeMap<UserId, UserProfile>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = UserProfile>) -> Self {
        let users = users
            .into_iter()
            .map(|profile| (profile.id.clone(), profile))
            .collect();
        Self {
            users: Arc::new(RwLock::new(users)),
        }
    }

    fn write(
        &self,
    ) -> Result<RwLockWriteGuard<'_, BTreeMap<UserId, UserProfile>>, DirectoryError> {
        self.users.write().map_err(|_| {
            warn!("user directory lock poisoned; refusing profile write");
            DirectoryError::Unavailable("directory lock poisoned".to_string())
        })
    }

    pub fn upsert(&self, profile: UserProfile) -> Result<(), DirectoryError> {
        self.write()?.insert(profile.id.clone(), profile);
        Ok(())
    }

    /// Changes a mentor's limit in place, as a profile edit would. Returns `false` when the
    /// user is unknown or has no mentor settings.
    pub fn set_capacity(&self, id: &UserId, capacity_limit: u32) -> Result<bool, DirectoryError> {
        let mut users = self.write()?;
        match users
            .get_mut(id)
            .and_then(|profile| profile.mentor_settings.as_mut())
        {
            Some(settings) => {
                settings.capacity_limit = capacity_limit;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn len(&self) -> usize {
        self.users.read().map(|users| users.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn lookup(&self, id: &UserId) -> Result<Option<UserProfile>, DirectoryError> {
        let users = self
            .users
            .read()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_string()))?;
        Ok(users.get(id).cloned())
    }

    async fn mentors(&self) -> Result<Vec<UserProfile>, DirectoryError> {
        let users = self
            .users
            .read()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_string()))?;
        Ok(users
            .values()
            .filter(|profile| {
                profile.role == UserRole::Alumni && profile.mentor_settings.is_some()
            })
            .cloned()
            .collect())
    }
}
