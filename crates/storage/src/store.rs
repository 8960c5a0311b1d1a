//! Statistics store implementations

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info};

use crate::records::{DateRange, SessionRecord, SessionSummary, UserStats};
use crate::StorageError;

/// Persistence for recorded sessions
pub trait StatisticsStore: Send + Sync {
    /// Store a finished session and return its id
    fn save_session(&self, record: SessionRecord) -> Result<u64, StorageError>;

    /// Sessions of `user_id` within `range`, newest first
    fn list_sessions(
        &self,
        user_id: &str,
        range: &DateRange,
    ) -> Result<Vec<SessionSummary>, StorageError>;

    /// Aggregated statistics of `user_id` within `range`
    fn user_stats(&self, user_id: &str, range: &DateRange) -> Result<UserStats, StorageError>;
}

struct StoredSession {
    id: u64,
    record: SessionRecord,
}

struct Inner {
    sessions: VecDeque<StoredSession>,
    next_id: u64,
}

/// In-memory store with a retention limit (oldest sessions evicted first)
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    max_sessions: usize,
}

impl InMemoryStore {
    pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_MAX_SESSIONS)
    }

    pub fn with_capacity(max_sessions: usize) -> Self {
        info!("Creating in-memory statistics store (max {} sessions)", max_sessions);
        Self {
            inner: Mutex::new(Inner {
                sessions: VecDeque::new(),
                next_id: 1,
            }),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Number of stored sessions
    pub fn session_count(&self) -> usize {
        self.inner.lock().map(|i| i.sessions.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StorageError> {
        self.inner
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }

    fn matching<'a>(
        inner: &'a Inner,
        user_id: &'a str,
        range: &'a DateRange,
    ) -> impl Iterator<Item = &'a StoredSession> + 'a {
        inner
            .sessions
            .iter()
            .filter(move |s| s.record.user_id == user_id && range.contains(s.record.date()))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticsStore for InMemoryStore {
    fn save_session(&self, record: SessionRecord) -> Result<u64, StorageError> {
        if record.user_id.is_empty() {
            return Err(StorageError::InvalidRecord("empty user id".into()));
        }
        if !record.duration_secs.is_finite() || record.duration_secs < 0.0 {
            return Err(StorageError::InvalidRecord(format!(
                "duration {} is not a valid length",
                record.duration_secs
            )));
        }

        let mut inner = self.lock()?;

        while inner.sessions.len() >= self.max_sessions {
            inner.sessions.pop_front();
        }

        let id = inner.next_id;
        inner.next_id += 1;

        debug!(
            "Saved session {} ({}, {:.1}s, {} incidents)",
            id, record.video_id, record.duration_secs, record.bad_posture_count
        );
        inner.sessions.push_back(StoredSession { id, record });
        Ok(id)
    }

    fn list_sessions(
        &self,
        user_id: &str,
        range: &DateRange,
    ) -> Result<Vec<SessionSummary>, StorageError> {
        let inner = self.lock()?;

        let mut sessions: Vec<_> = Self::matching(&inner, user_id, range)
            .map(|s| SessionSummary {
                id: s.id,
                video_id: s.record.video_id.clone(),
                recorded_at: s.record.recorded_at,
                date: s.record.date(),
                duration_secs: s.record.duration_secs,
                bad_posture_count: s.record.bad_posture_count,
            })
            .collect();

        sessions.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at).then(b.id.cmp(&a.id)));
        Ok(sessions)
    }

    fn user_stats(&self, user_id: &str, range: &DateRange) -> Result<UserStats, StorageError> {
        let inner = self.lock()?;
        Ok(UserStats::aggregate(
            Self::matching(&inner, user_id, range).map(|s| &s.record),
        ))
    }
}
