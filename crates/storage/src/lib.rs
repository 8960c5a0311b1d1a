//! Storage Layer
//!
//! Persists recorded-session summaries and aggregates them into per-user
//! study statistics. The in-memory store keeps a bounded history.

mod records;
mod store;

pub use records::{DailyStats, DateRange, PostureRecord, SessionRecord, SessionSummary, UserStats};
pub use store::{InMemoryStore, StatisticsStore};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Store lock poisoned: {0}")]
    Lock(String),

    #[error("Invalid session record: {0}")]
    InvalidRecord(String),
}
