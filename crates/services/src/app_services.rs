use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::course_view_service::CourseViewService;
use crate::enrollment_service::EnrollmentService;
use crate::error::AppServicesError;
use crate::progress_service::ProgressService;

/// Assembles the learner-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    enrollments: Arc<EnrollmentService>,
    progress: Arc<ProgressService>,
    course_views: Arc<CourseViewService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock))
    }

    /// Wire services over an already-built storage bundle.
    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock) -> Self {
        let enrollments = Arc::new(EnrollmentService::new(
            clock,
            Arc::clone(&storage.courses),
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.course_progress),
        ));
        let progress = Arc::new(ProgressService::new(
            clock,
            Arc::clone(&storage.courses),
            Arc::clone(&storage.course_progress),
            Arc::clone(&storage.video_progress),
        ));
        let course_views = Arc::new(CourseViewService::new(
            Arc::clone(&storage.courses),
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.course_progress),
            Arc::clone(&storage.video_progress),
        ));

        Self {
            enrollments,
            progress,
            course_views,
        }
    }

    #[must_use]
    pub fn enrollments(&self) -> Arc<EnrollmentService> {
        Arc::clone(&self.enrollments)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn course_views(&self) -> Arc<CourseViewService> {
        Arc::clone(&self.course_views)
    }
}
