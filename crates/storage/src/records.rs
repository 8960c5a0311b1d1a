//! Session and statistics records

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One posture sample taken while recording
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostureRecord {
    /// Milliseconds since the recording started
    pub elapsed_ms: u64,
    pub neck_angle: f32,
    pub face_distance: f32,
    pub is_bad: bool,
}

/// A finished recording as persisted by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: String,
    /// Local wall-clock start of the recording
    pub recorded_at: NaiveDateTime,
    /// Output file name
    pub video_id: String,
    pub duration_secs: f64,
    pub posture_records: Vec<PostureRecord>,
    /// Incidents counted while the recording was active
    pub bad_posture_count: u32,
}

impl SessionRecord {
    /// Calendar day the session is attributed to
    pub fn date(&self) -> NaiveDate {
        self.recorded_at.date()
    }
}

/// Listing entry for a stored session (no per-frame records)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: u64,
    pub video_id: String,
    pub recorded_at: NaiveDateTime,
    pub date: NaiveDate,
    pub duration_secs: f64,
    pub bad_posture_count: u32,
}

/// Inclusive date filter; an open bound matches everything on that side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// Unbounded range
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Per-day totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    /// Seconds recorded that day
    pub study_time: f64,
    pub bad_posture_count: u32,
}

/// Aggregated statistics for one user over a date range
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    /// Seconds across all matching sessions
    pub total_study_time: f64,
    /// `total_study_time` divided by the number of days with sessions
    pub avg_daily_time: f64,
    pub bad_posture_total: u32,
    pub daily_stats: BTreeMap<NaiveDate, DailyStats>,
}

impl UserStats {
    /// Fold sessions into totals
    pub fn aggregate<'a>(sessions: impl IntoIterator<Item = &'a SessionRecord>) -> Self {
        let mut stats = UserStats::default();

        for session in sessions {
            let day = stats.daily_stats.entry(session.date()).or_default();
            day.study_time += session.duration_secs;
            day.bad_posture_count += session.bad_posture_count;

            stats.total_study_time += session.duration_secs;
            stats.bad_posture_total += session.bad_posture_count;
        }

        if !stats.daily_stats.is_empty() {
            stats.avg_daily_time = stats.total_study_time / stats.daily_stats.len() as f64;
        }
        stats
    }
}
