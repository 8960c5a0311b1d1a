//! Posture state tracking (debounced incidents)

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Debounced posture state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostureState {
    /// Consecutive frames classified bad
    pub bad_streak_length: u32,

    /// Lifetime count of sustained bad-posture incidents
    pub bad_posture_count: u32,

    /// Whether the current streak has outlasted the debounce threshold
    pub is_currently_bad: bool,
}

impl PostureState {
    /// Fold one instantaneous classification into the state.
    ///
    /// A streak is counted once, on the first frame it exceeds
    /// `debounce_frames`. A single good frame ends the streak.
    pub fn next(self, is_bad_instant: bool, debounce_frames: u32) -> PostureState {
        if !is_bad_instant {
            return PostureState {
                bad_streak_length: 0,
                is_currently_bad: false,
                ..self
            };
        }

        let bad_streak_length = self.bad_streak_length.saturating_add(1);
        let crossed = bad_streak_length > debounce_frames && !self.is_currently_bad;

        PostureState {
            bad_streak_length,
            bad_posture_count: if crossed {
                self.bad_posture_count.saturating_add(1)
            } else {
                self.bad_posture_count
            },
            is_currently_bad: self.is_currently_bad || crossed,
        }
    }
}

/// Posture tracker owning the state for one monitoring session
#[derive(Debug, Clone)]
pub struct PostureTracker {
    state: PostureState,
    debounce_frames: u32,
}

impl PostureTracker {
    pub fn new(debounce_frames: u32) -> Self {
        Self {
            state: PostureState::default(),
            debounce_frames,
        }
    }

    /// Update with this frame's classification and return the new state
    pub fn update(&mut self, is_bad_instant: bool) -> PostureState {
        let previous = self.state;
        self.state = previous.next(is_bad_instant, self.debounce_frames);

        if self.state.bad_posture_count > previous.bad_posture_count {
            info!(
                "Bad posture sustained for {} frames (incident #{})",
                self.state.bad_streak_length, self.state.bad_posture_count
            );
        } else if previous.is_currently_bad && !self.state.is_currently_bad {
            debug!("Posture recovered after {} frames", previous.bad_streak_length);
        }

        self.state
    }

    /// Current state snapshot
    pub fn state(&self) -> PostureState {
        self.state
    }

    /// Reset state (new session)
    pub fn reset(&mut self) {
        self.state = PostureState::default();
    }
}

impl Default for PostureTracker {
    fn default() -> Self {
        Self::new(30)
    }
}
