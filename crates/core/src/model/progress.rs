use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, CourseProgressId, UserId, VideoId, VideoProgressId};

/// Percentage at or above which a video counts as watched.
pub const WATCHED_THRESHOLD: f64 = 90.0;

/// Upper bound of the progress scale.
pub const FULL_PROGRESS: f64 = 100.0;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ProgressValidationError {
    #[error("progress must be between 0 and 100, got {0}")]
    ProgressOutOfRange(f64),

    #[error("last position must be a non-negative number of seconds, got {0}")]
    InvalidPosition(f64),
}

//
// ─── PLAYBACK SAMPLE ───────────────────────────────────────────────────────────
//

/// A validated playback report for one video.
///
/// Out-of-range values are rejected, never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaybackSample {
    progress: f64,
    last_position: f64,
}

impl PlaybackSample {
    /// # Errors
    ///
    /// Returns `ProgressValidationError` if `progress` is not a finite value in
    /// `[0, 100]` or `last_position` is negative or not finite.
    pub fn new(progress: f64, last_position: f64) -> Result<Self, ProgressValidationError> {
        if !progress.is_finite() || !(0.0..=FULL_PROGRESS).contains(&progress) {
            return Err(ProgressValidationError::ProgressOutOfRange(progress));
        }
        if !last_position.is_finite() || last_position < 0.0 {
            return Err(ProgressValidationError::InvalidPosition(last_position));
        }
        Ok(Self {
            progress,
            last_position,
        })
    }

    #[must_use]
    pub fn progress(&self) -> f64 {
        self.progress
    }

    #[must_use]
    pub fn last_position(&self) -> f64 {
        self.last_position
    }

    #[must_use]
    pub fn watched(&self) -> bool {
        is_watched(self.progress)
    }
}

/// `true` when `progress` reaches [`WATCHED_THRESHOLD`].
#[must_use]
pub fn is_watched(progress: f64) -> bool {
    progress >= WATCHED_THRESHOLD
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// One user's progress through one video. Unique per `(user_id, video_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoProgress {
    pub id: VideoProgressId,
    pub user_id: UserId,
    pub video_id: VideoId,
    pub course_id: CourseId,
    pub course_progress_id: CourseProgressId,
    pub progress: f64,
    pub last_position: f64,
    pub watched: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted roll-up of a user's progress through a course.
///
/// Unique per `(user_id, course_id)`. `progress` and `completed` are always
/// derived from the user's `VideoProgress` records and never edited directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseProgress {
    pub id: CourseProgressId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub progress: f64,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watched_flips_at_threshold() {
        assert!(PlaybackSample::new(90.0, 10.0).unwrap().watched());
        assert!(!PlaybackSample::new(89.0, 10.0).unwrap().watched());
        assert!(!PlaybackSample::new(89.999, 10.0).unwrap().watched());
        assert!(PlaybackSample::new(100.0, 10.0).unwrap().watched());
    }

    #[test]
    fn rejects_progress_above_full() {
        assert_eq!(
            PlaybackSample::new(150.0, 0.0),
            Err(ProgressValidationError::ProgressOutOfRange(150.0))
        );
    }

    #[test]
    fn rejects_negative_progress_and_nan() {
        assert!(PlaybackSample::new(-1.0, 0.0).is_err());
        assert!(PlaybackSample::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn rejects_negative_position() {
        assert_eq!(
            PlaybackSample::new(10.0, -3.0),
            Err(ProgressValidationError::InvalidPosition(-3.0))
        );
        assert!(PlaybackSample::new(10.0, f64::INFINITY).is_err());
    }

    #[test]
    fn accepts_bounds() {
        assert!(PlaybackSample::new(0.0, 0.0).is_ok());
        assert!(PlaybackSample::new(100.0, 3600.5).is_ok());
    }
}
