use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::domain::{
    MentorshipRequest, Participation, RequestId, RequestStatus, Transition, UserId,
};
use super::invariants::PairingSnapshot;
use super::repository::{RequestStore, StoreError, UpdateGuard, WriteGuard};

#[derive(Debug, Clone)]
struct StoredRequest {
    sequence: u64,
    request: MentorshipRequest,
}

#[derive(Debug, Default)]
struct Ledger {
    next_sequence: u64,
    records: HashMap<RequestId, StoredRequest>,
    by_student: HashMap<UserId, Vec<RequestId>>,
    by_mentor: HashMap<UserId, Vec<RequestId>>,
}

impl Ledger {
    fn snapshot(&self, student: &UserId, mentor: &UserId) -> PairingSnapshot {
        let student_open = self
            .by_student
            .get(student)
            .into_iter()
            .flatten()
            .filter_map(|id| self.records.get(id))
            .filter(|stored| stored.request.status.is_open())
            .map(|stored| stored.request.clone())
            .collect();

        PairingSnapshot {
            student_open,
            mentor_active: self.active_count(mentor),
        }
    }

    fn active_count(&self, mentor: &UserId) -> u32 {
        let count = self
            .by_mentor
            .get(mentor)
            .into_iter()
            .flatten()
            .filter_map(|id| self.records.get(id))
            .filter(|stored| stored.request.status == RequestStatus::Accepted)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

/// Process-local store backed by a single mutex.
///
/// Every guarded write reads its snapshot and commits under the same lock, which gives the
/// per-record linearizability the matching service relies on.
#[derive(Debug, Default, Clone)]
pub struct MemoryRequestStore {
    ledger: Arc<Mutex<Ledger>>,
}

impl MemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Ledger>, StoreError> {
        self.ledger
            .lock()
            .map_err(|_| StoreError::Unavailable("request ledger mutex poisoned".to_string()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|ledger| ledger.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RequestStore for MemoryRequestStore {
    async fn insert_guarded(
        &self,
        record: MentorshipRequest,
        guard: WriteGuard<'_>,
    ) -> Result<MentorshipRequest, StoreError> {
        let mut ledger = self.lock()?;
        if ledger.records.contains_key(&record.id) {
            return Err(StoreError::DuplicateId(record.id));
        }

        let snapshot = ledger.snapshot(&record.student_id, &record.mentor_id);
        guard(&snapshot)?;

        let sequence = ledger.next_sequence;
        ledger.next_sequence += 1;
        ledger
            .by_student
            .entry(record.student_id.clone())
            .or_default()
            .push(record.id.clone());
        ledger
            .by_mentor
            .entry(record.mentor_id.clone())
            .or_default()
            .push(record.id.clone());
        ledger.records.insert(
            record.id.clone(),
            StoredRequest {
                sequence,
                request: record.clone(),
            },
        );
        Ok(record)
    }

    async fn update_guarded(
        &self,
        id: &RequestId,
        transition: Transition,
        guard: UpdateGuard<'_>,
    ) -> Result<MentorshipRequest, StoreError> {
        let mut ledger = self.lock()?;
        let current = ledger
            .records
            .get(id)
            .map(|stored| stored.request.clone())
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        let snapshot = ledger.snapshot(&current.student_id, &current.mentor_id);
        guard(&current, &snapshot)?;

        let expected = transition.expected();
        if current.status != expected {
            return Err(StoreError::StatusMismatch {
                id: id.clone(),
                found: current.status,
                expected,
            });
        }

        let stored = ledger
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        stored.request.apply(&transition);
        Ok(stored.request.clone())
    }

    async fn fetch(&self, id: &RequestId) -> Result<Option<MentorshipRequest>, StoreError> {
        let ledger = self.lock()?;
        Ok(ledger.records.get(id).map(|stored| stored.request.clone()))
    }

    async fn list_for_user(
        &self,
        user: &UserId,
        participation: Participation,
    ) -> Result<Vec<MentorshipRequest>, StoreError> {
        let ledger = self.lock()?;
        let mut ids: Vec<&RequestId> = Vec::new();
        if matches!(participation, Participation::Student | Participation::Any) {
            ids.extend(ledger.by_student.get(user).into_iter().flatten());
        }
        if matches!(participation, Participation::Mentor | Participation::Any) {
            ids.extend(ledger.by_mentor.get(user).into_iter().flatten());
        }

        let mut matches: Vec<&StoredRequest> = ids
            .into_iter()
            .filter_map(|id| ledger.records.get(id))
            .collect();
        matches.sort_by(|a, b| {
            b.request
                .created_at
                .cmp(&a.request.created_at)
                .then(b.sequence.cmp(&a.sequence))
        });
        matches.dedup_by_key(|stored| stored.sequence);

        Ok(matches
            .into_iter()
            .map(|stored| stored.request.clone())
            .collect())
    }

    async fn active_count(&self, mentor: &UserId) -> Result<u32, StoreError> {
        let ledger = self.lock()?;
        Ok(ledger.active_count(mentor))
    }
}
