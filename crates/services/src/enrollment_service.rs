use std::sync::Arc;

use tracing::info;

use learn_core::model::{CourseId, Enrollment, EnrollmentStatus, UserId};
use storage::repository::{CourseProgressRepository, CourseRepository, EnrollmentRepository};

use crate::Clock;
use crate::error::EnrollmentError;
use crate::progress_service::ensure_course_progress;

/// Creates and ends enrollments.
#[derive(Clone)]
pub struct EnrollmentService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    course_progress: Arc<dyn CourseProgressRepository>,
}

impl EnrollmentService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        course_progress: Arc<dyn CourseProgressRepository>,
    ) -> Self {
        Self {
            clock,
            courses,
            enrollments,
            course_progress,
        }
    }

    /// Enroll a user in a course. Enrolling again returns the existing
    /// enrollment unchanged.
    ///
    /// Either way the course progress record exists afterwards, so readers
    /// never see an enrollment without one.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::CourseNotFound` if the catalog has no such
    /// course, or `EnrollmentError::Storage` if persistence fails.
    pub async fn enroll(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Enrollment, EnrollmentError> {
        if self.courses.get_course(course_id).await?.is_none() {
            return Err(EnrollmentError::CourseNotFound(course_id));
        }

        let now = self.clock.now();
        let enrollment = match self
            .enrollments
            .find_active_enrollment(user_id, course_id)
            .await?
        {
            Some(existing) => existing,
            None => {
                let created = self
                    .enrollments
                    .create_active_enrollment(user_id, course_id, now)
                    .await?;
                info!(
                    user_id = %user_id,
                    course_id = %course_id,
                    enrollment_id = %created.id,
                    "enrolled"
                );
                created
            }
        };

        ensure_course_progress(self.course_progress.as_ref(), user_id, course_id, now).await?;
        Ok(enrollment)
    }

    /// # Errors
    ///
    /// Returns `EnrollmentError::Storage` on repository failures.
    pub async fn is_enrolled(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<bool, EnrollmentError> {
        Ok(self
            .enrollments
            .find_active_enrollment(user_id, course_id)
            .await?
            .is_some())
    }

    /// End the active enrollment. Progress records are kept, so enrolling
    /// again picks up where the user left off.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::NotEnrolled` if there is no active enrollment,
    /// or `EnrollmentError::Storage` if persistence fails.
    pub async fn cancel_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Enrollment, EnrollmentError> {
        let active = self
            .enrollments
            .find_active_enrollment(user_id, course_id)
            .await?
            .ok_or(EnrollmentError::NotEnrolled { user_id, course_id })?;

        let cancelled = self
            .enrollments
            .set_enrollment_status(active.id, EnrollmentStatus::Cancelled)
            .await?;
        info!(
            user_id = %user_id,
            course_id = %course_id,
            enrollment_id = %cancelled.id,
            "enrollment cancelled"
        );
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use learn_core::model::{Course, Section, SectionId, Video, VideoId};
    use learn_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    const USER: UserId = UserId::new(5);
    const COURSE: CourseId = CourseId::new(3);

    async fn service() -> (InMemoryRepository, EnrollmentService) {
        let repo = InMemoryRepository::new();
        let video = Video::new(VideoId::new(1), "Intro", 30).unwrap();
        let section = Section::new(SectionId::new(1), "Start", vec![video]).unwrap();
        repo.upsert_course(&Course::new(COURSE, "Course", vec![section]).unwrap())
            .await
            .unwrap();

        let service = EnrollmentService::new(
            fixed_clock(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        );
        (repo, service)
    }

    #[tokio::test]
    async fn enroll_creates_blank_progress() {
        let (repo, service) = service().await;

        let enrollment = service.enroll(USER, COURSE).await.unwrap();

        assert!(enrollment.is_active());
        let progress = repo.get_course_progress(USER, COURSE).await.unwrap().unwrap();
        assert_eq!(progress.progress, 0.0);
        assert!(!progress.completed);
        assert!(service.is_enrolled(USER, COURSE).await.unwrap());
    }

    #[tokio::test]
    async fn enroll_unknown_course_fails() {
        let (repo, service) = service().await;

        let err = service.enroll(USER, CourseId::new(99)).await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(
            repo.count_active_enrollments(USER, CourseId::new(99)).unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn cancel_then_reenroll_reuses_progress() {
        let (repo, service) = service().await;
        let first = service.enroll(USER, COURSE).await.unwrap();

        let cancelled = service.cancel_enrollment(USER, COURSE).await.unwrap();
        assert_eq!(cancelled.id, first.id);
        assert_eq!(cancelled.status, EnrollmentStatus::Cancelled);
        assert!(!service.is_enrolled(USER, COURSE).await.unwrap());

        let second = service.enroll(USER, COURSE).await.unwrap();
        assert_ne!(second.id, first.id);
        assert_eq!(repo.count_course_progress(USER, COURSE).unwrap(), 1);
    }

    #[tokio::test]
    async fn cancel_without_enrollment_is_not_found() {
        let (_repo, service) = service().await;

        let err = service.cancel_enrollment(USER, COURSE).await.unwrap_err();

        assert!(matches!(err, EnrollmentError::NotEnrolled { .. }));
    }
}
