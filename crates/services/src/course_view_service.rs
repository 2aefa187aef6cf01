use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use learn_core::aggregator::{CourseProgressReport, compute_course_progress};
use learn_core::model::{Course, CourseId, Enrollment, EnrollmentId, EnrollmentStatus, UserId, VideoId};
use storage::repository::{
    CourseProgressRepository, CourseRepository, EnrollmentRepository, StorageError,
    VideoProgressRepository,
};

use crate::error::CourseViewError;

/// Enrollment metadata attached to a learner's course view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentSummary {
    pub id: EnrollmentId,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
}

impl From<&Enrollment> for EnrollmentSummary {
    fn from(enrollment: &Enrollment) -> Self {
        Self {
            id: enrollment.id,
            status: enrollment.status,
            enrolled_at: enrollment.enrolled_at,
        }
    }
}

/// A course joined with the learner's enrollment and progress.
///
/// `progress` is recomputed from the video records on every read, so it also
/// covers sections and videos the stored `CourseProgress` does not break
/// down. Its `overall` and `completed` equal the stored aggregate once the
/// last write for the pair has finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrolledCourse {
    pub course_id: CourseId,
    pub title: String,
    pub enrollment: EnrollmentSummary,
    pub progress: CourseProgressReport,
    /// When the stored aggregate last changed; `None` if it was never created.
    pub progress_updated_at: Option<DateTime<Utc>>,
}

/// Read side for "my courses", course detail and player bootstrap.
///
/// Takes no locks; a view may trail a progress write that is still in flight.
#[derive(Clone)]
pub struct CourseViewService {
    courses: Arc<dyn CourseRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    course_progress: Arc<dyn CourseProgressRepository>,
    video_progress: Arc<dyn VideoProgressRepository>,
}

impl CourseViewService {
    #[must_use]
    pub fn new(
        courses: Arc<dyn CourseRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        course_progress: Arc<dyn CourseProgressRepository>,
        video_progress: Arc<dyn VideoProgressRepository>,
    ) -> Self {
        Self {
            courses,
            enrollments,
            course_progress,
            video_progress,
        }
    }

    /// Every active enrollment of the user with its progress, oldest first.
    ///
    /// Enrollments whose course is missing from the catalog, or whose stored
    /// content no longer decodes, are skipped.
    ///
    /// # Errors
    ///
    /// Returns `CourseViewError::Storage` on repository failures.
    pub async fn list_enrolled_courses(
        &self,
        user_id: UserId,
    ) -> Result<Vec<EnrolledCourse>, CourseViewError> {
        let enrollments = self.enrollments.list_active_enrollments(user_id).await?;

        let mut out = Vec::with_capacity(enrollments.len());
        for enrollment in &enrollments {
            let course = match self.courses.get_course(enrollment.course_id).await {
                Ok(Some(course)) => course,
                Ok(None) => {
                    warn!(
                        user_id = %user_id,
                        course_id = %enrollment.course_id,
                        enrollment_id = %enrollment.id,
                        "enrolled course missing from catalog; skipping"
                    );
                    continue;
                }
                Err(StorageError::Serialization(reason)) => {
                    warn!(
                        user_id = %user_id,
                        course_id = %enrollment.course_id,
                        enrollment_id = %enrollment.id,
                        %reason,
                        "enrolled course content unreadable; skipping"
                    );
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            out.push(self.assemble(user_id, &course, enrollment).await?);
        }
        Ok(out)
    }

    /// One enrolled course with its progress.
    ///
    /// # Errors
    ///
    /// Returns `CourseViewError::NotEnrolled` without an active enrollment,
    /// `CourseViewError::CourseNotFound` if the catalog has no such course,
    /// and `CourseViewError::Storage` on repository failures.
    pub async fn get_enrolled_course(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<EnrolledCourse, CourseViewError> {
        let enrollment = self
            .enrollments
            .find_active_enrollment(user_id, course_id)
            .await?
            .ok_or(CourseViewError::NotEnrolled { user_id, course_id })?;
        let course = self
            .courses
            .get_course(course_id)
            .await?
            .ok_or(CourseViewError::CourseNotFound(course_id))?;

        self.assemble(user_id, &course, &enrollment).await
    }

    async fn assemble(
        &self,
        user_id: UserId,
        course: &Course,
        enrollment: &Enrollment,
    ) -> Result<EnrolledCourse, CourseViewError> {
        let video_ids: Vec<VideoId> = course.videos().map(|v| v.id()).collect();
        let records = self
            .video_progress
            .list_video_progress(user_id, &video_ids)
            .await?;
        let stored = self
            .course_progress
            .get_course_progress(user_id, course.id())
            .await?;

        Ok(EnrolledCourse {
            course_id: course.id(),
            title: course.title().to_owned(),
            enrollment: EnrollmentSummary::from(enrollment),
            progress: compute_course_progress(course, &records),
            progress_updated_at: stored.map(|p| p.updated_at),
        })
    }
}
