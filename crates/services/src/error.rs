//! Shared error types for the services crate.

use thiserror::Error;

use learn_core::model::{CourseId, ProgressValidationError, UserId, VideoId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `EnrollmentService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnrollmentError {
    #[error("course {0} not found")]
    CourseNotFound(CourseId),
    #[error("user {user_id} has no active enrollment in course {course_id}")]
    NotEnrolled { user_id: UserId, course_id: CourseId },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("course {0} not found")]
    CourseNotFound(CourseId),
    #[error("video {video_id} is not part of course {course_id}")]
    VideoNotInCourse { video_id: VideoId, course_id: CourseId },
    #[error("user {user_id} has no progress in course {course_id}")]
    NoProgress { user_id: UserId, course_id: CourseId },
    #[error(transparent)]
    Validation(#[from] ProgressValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CourseViewService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CourseViewError {
    #[error("course {0} not found")]
    CourseNotFound(CourseId),
    #[error("user {user_id} has no active enrollment in course {course_id}")]
    NotEnrolled { user_id: UserId, course_id: CourseId },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl EnrollmentError {
    /// `true` for the "does not exist" family, as opposed to validation or
    /// persistence failures.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CourseNotFound(_) | Self::NotEnrolled { .. } | Self::Storage(StorageError::NotFound)
        )
    }
}

impl ProgressError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CourseNotFound(_)
                | Self::VideoNotInCourse { .. }
                | Self::NoProgress { .. }
                | Self::Storage(StorageError::NotFound)
        )
    }
}

impl CourseViewError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CourseNotFound(_) | Self::NotEnrolled { .. } | Self::Storage(StorageError::NotFound)
        )
    }
}
