use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use super::directory::{DirectoryError, InMemoryDirectory, MentorSettings, UserProfile, UserRole};
use super::domain::{MentorshipArea, UserId};

#[derive(Debug)]
pub enum DirectoryImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: u64, detail: String },
    Directory(DirectoryError),
}

impl std::fmt::Display for DirectoryImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectoryImportError::Io(err) => write!(f, "failed to read directory export: {}", err),
            DirectoryImportError::Csv(err) => write!(f, "invalid directory CSV data: {}", err),
            DirectoryImportError::InvalidRow { line, detail } => {
                write!(f, "directory row {} rejected: {}", line, detail)
            }
            DirectoryImportError::Directory(err) => write!(f, "directory import aborted: {}", err),
        }
    }
}

impl std::error::Error for DirectoryImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DirectoryImportError::Io(err) => Some(err),
            DirectoryImportError::Csv(err) => Some(err),
            DirectoryImportError::Directory(err) => Some(err),
            DirectoryImportError::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for DirectoryImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<DirectoryError> for DirectoryImportError {
    fn from(err: DirectoryError) -> Self {
        Self::Directory(err)
    }
}

impl From<csv::Error> for DirectoryImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Loads a user-directory export into an [`InMemoryDirectory`].
///
/// Expected header:
/// `user_id,display_name,role,accepting_mentees,capacity_limit,mentorship_areas,resume_review`.
/// Mentor columns may be blank for students and admins; areas are `;`-separated.
pub struct DirectoryImporter;

impl DirectoryImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<InMemoryDirectory, DirectoryImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<InMemoryDirectory, DirectoryImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let directory = InMemoryDirectory::new();

        for (index, record) in csv_reader.deserialize::<DirectoryRow>().enumerate() {
            let row = record?;
            // header is line 1
            let line = index as u64 + 2;
            directory.upsert(row.into_profile(line)?)?;
        }

        Ok(directory)
    }
}

#[derive(Debug, Deserialize)]
struct DirectoryRow {
    user_id: String,
    #[serde(default)]
    display_name: String,
    role: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    accepting_mentees: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    capacity_limit: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    mentorship_areas: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    resume_review: Option<String>,
}

impl DirectoryRow {
    fn into_profile(self, line: u64) -> Result<UserProfile, DirectoryImportError> {
        let invalid = |detail: String| DirectoryImportError::InvalidRow { line, detail };

        if self.user_id.is_empty() {
            return Err(invalid("user_id is empty".to_string()));
        }
        let role = UserRole::parse(&self.role)
            .ok_or_else(|| invalid(format!("unknown role '{}'", self.role)))?;

        let mentor_settings = if role == UserRole::Alumni {
            let capacity_limit = match self.capacity_limit.as_deref() {
                Some(raw) => raw
                    .parse::<u32>()
                    .map_err(|_| invalid(format!("capacity_limit '{raw}' is not a number")))?,
                None => 0,
            };
            let accepting_mentees = parse_flag(self.accepting_mentees.as_deref())
                .map_err(|raw| invalid(format!("accepting_mentees '{raw}' is not a flag")))?;
            let resume_review = parse_flag(self.resume_review.as_deref())
                .map_err(|raw| invalid(format!("resume_review '{raw}' is not a flag")))?;
            let mentorship_areas = self
                .mentorship_areas
                .as_deref()
                .map(parse_areas)
                .unwrap_or_default();

            Some(MentorSettings {
                accepting_mentees,
                capacity_limit,
                mentorship_areas,
                resume_review,
            })
        } else {
            None
        };

        let display_name = if self.display_name.is_empty() {
            self.user_id.clone()
        } else {
            self.display_name
        };

        Ok(UserProfile {
            id: UserId(self.user_id),
            display_name,
            role,
            mentor_settings,
        })
    }
}

fn parse_flag(raw: Option<&str>) -> Result<bool, String> {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        None | Some("false") | Some("no") | Some("0") => Ok(false),
        Some("true") | Some("yes") | Some("1") => Ok(true),
        Some(other) => Err(other.to_string()),
    }
}

fn parse_areas(raw: &str) -> Vec<MentorshipArea> {
    raw.split(';')
        .map(str::trim)
        .filter(|area| !area.is_empty())
        .map(MentorshipArea::parse)
        .collect()
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
