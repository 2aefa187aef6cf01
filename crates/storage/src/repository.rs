use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learn_core::model::{
    Course, CourseId, CourseProgress, CourseProgressId, Enrollment, EnrollmentId,
    EnrollmentStatus, UserId, VideoId, VideoProgress, VideoProgressId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Values written by a single playback report.
///
/// `course_id` and `course_progress_id` are only used when the record is
/// created; an existing record keeps the ones it was created with.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoProgressWrite {
    pub user_id: UserId,
    pub video_id: VideoId,
    pub course_id: CourseId,
    pub course_progress_id: CourseProgressId,
    pub progress: f64,
    pub last_position: f64,
    pub watched: bool,
    pub recorded_at: DateTime<Utc>,
}

/// Read access to course content, plus the authoring-side upsert used by
/// seeding and tests.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Persist a course and replace its section/video structure.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError>;

    /// Fetch a course with its ordered sections and videos.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures. A missing course is `Ok(None)`.
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError>;
}

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn find_active_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError>;

    /// Create an active enrollment unless one already exists.
    ///
    /// Returns whichever active enrollment exists once the call completes, so
    /// racing callers all observe the same record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn create_active_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
        enrolled_at: DateTime<Utc>,
    ) -> Result<Enrollment, StorageError>;

    /// Active enrollments of a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_active_enrollments(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Enrollment>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the enrollment does not exist.
    async fn set_enrollment_status(
        &self,
        id: EnrollmentId,
        status: EnrollmentStatus,
    ) -> Result<Enrollment, StorageError>;
}

#[async_trait]
pub trait CourseProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<CourseProgress>, StorageError>;

    /// Return the record for `(user_id, course_id)`, creating a blank one
    /// (`progress = 0`, `completed = false`) if none exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_or_create_course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
        now: DateTime<Utc>,
    ) -> Result<CourseProgress, StorageError>;

    /// Overwrite the aggregate values of an existing record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist.
    async fn update_course_progress(
        &self,
        id: CourseProgressId,
        progress: f64,
        completed: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<CourseProgress, StorageError>;
}

#[async_trait]
pub trait VideoProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_video_progress(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<Option<VideoProgress>, StorageError>;

    /// Create or update the record for `(write.user_id, write.video_id)`.
    ///
    /// On update only `progress`, `last_position`, `watched` and `updated_at`
    /// change.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn upsert_video_progress(
        &self,
        write: &VideoProgressWrite,
    ) -> Result<VideoProgress, StorageError>;

    /// Records of `user_id` for any of `video_ids`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_video_progress(
        &self,
        user_id: UserId,
        video_ids: &[VideoId],
    ) -> Result<Vec<VideoProgress>, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct Tables {
    courses: HashMap<CourseId, Course>,
    enrollments: HashMap<EnrollmentId, Enrollment>,
    course_progress: HashMap<CourseProgressId, CourseProgress>,
    video_progress: HashMap<VideoProgressId, VideoProgress>,
    next_id: u64,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Every operation runs inside one critical section, so the uniqueness rules
/// hold exactly as they would under database constraints.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.tables
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Number of active enrollments for the pair.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store is poisoned.
    pub fn count_active_enrollments(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<usize, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .enrollments
            .values()
            .filter(|e| e.user_id == user_id && e.course_id == course_id && e.is_active())
            .count())
    }

    /// Number of course-progress records for the pair.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store is poisoned.
    pub fn count_course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<usize, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .course_progress
            .values()
            .filter(|p| p.user_id == user_id && p.course_id == course_id)
            .count())
    }

    /// Number of video-progress records for the pair.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store is poisoned.
    pub fn count_video_progress(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<usize, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .video_progress
            .values()
            .filter(|p| p.user_id == user_id && p.video_id == video_id)
            .count())
    }
}

fn active_enrollment(tables: &Tables, user_id: UserId, course_id: CourseId) -> Option<&Enrollment> {
    tables
        .enrollments
        .values()
        .find(|e| e.user_id == user_id && e.course_id == course_id && e.is_active())
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.courses.insert(course.id(), course.clone());
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.courses.get(&id).cloned())
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryRepository {
    async fn find_active_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let guard = self.lock()?;
        Ok(active_enrollment(&guard, user_id, course_id).cloned())
    }

    async fn create_active_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
        enrolled_at: DateTime<Utc>,
    ) -> Result<Enrollment, StorageError> {
        let mut guard = self.lock()?;
        if let Some(existing) = active_enrollment(&guard, user_id, course_id) {
            return Ok(existing.clone());
        }

        let enrollment = Enrollment {
            id: EnrollmentId::new(guard.next_id()),
            user_id,
            course_id,
            status: EnrollmentStatus::Active,
            enrolled_at,
        };
        guard.enrollments.insert(enrollment.id, enrollment.clone());
        Ok(enrollment)
    }

    async fn list_active_enrollments(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Enrollment>, StorageError> {
        let guard = self.lock()?;
        let mut found: Vec<Enrollment> = guard
            .enrollments
            .values()
            .filter(|e| e.user_id == user_id && e.is_active())
            .cloned()
            .collect();
        found.sort_by(|a, b| a.enrolled_at.cmp(&b.enrolled_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn set_enrollment_status(
        &self,
        id: EnrollmentId,
        status: EnrollmentStatus,
    ) -> Result<Enrollment, StorageError> {
        let mut guard = self.lock()?;
        let current = guard.enrollments.get(&id).ok_or(StorageError::NotFound)?;
        if status == EnrollmentStatus::Active
            && current.status != EnrollmentStatus::Active
            && active_enrollment(&guard, current.user_id, current.course_id).is_some()
        {
            return Err(StorageError::Conflict);
        }

        let enrollment = guard.enrollments.get_mut(&id).ok_or(StorageError::NotFound)?;
        enrollment.status = status;
        Ok(enrollment.clone())
    }
}

#[async_trait]
impl CourseProgressRepository for InMemoryRepository {
    async fn get_course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<CourseProgress>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .course_progress
            .values()
            .find(|p| p.user_id == user_id && p.course_id == course_id)
            .cloned())
    }

    async fn get_or_create_course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
        now: DateTime<Utc>,
    ) -> Result<CourseProgress, StorageError> {
        let mut guard = self.lock()?;
        if let Some(existing) = guard
            .course_progress
            .values()
            .find(|p| p.user_id == user_id && p.course_id == course_id)
        {
            return Ok(existing.clone());
        }

        let record = CourseProgress {
            id: CourseProgressId::new(guard.next_id()),
            user_id,
            course_id,
            progress: 0.0,
            completed: false,
            updated_at: now,
        };
        guard.course_progress.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_course_progress(
        &self,
        id: CourseProgressId,
        progress: f64,
        completed: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<CourseProgress, StorageError> {
        let mut guard = self.lock()?;
        let record = guard
            .course_progress
            .get_mut(&id)
            .ok_or(StorageError::NotFound)?;
        record.progress = progress;
        record.completed = completed;
        record.updated_at = updated_at;
        Ok(record.clone())
    }
}

#[async_trait]
impl VideoProgressRepository for InMemoryRepository {
    async fn get_video_progress(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<Option<VideoProgress>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .video_progress
            .values()
            .find(|p| p.user_id == user_id && p.video_id == video_id)
            .cloned())
    }

    async fn upsert_video_progress(
        &self,
        write: &VideoProgressWrite,
    ) -> Result<VideoProgress, StorageError> {
        let mut guard = self.lock()?;
        if !guard.course_progress.contains_key(&write.course_progress_id) {
            return Err(StorageError::Conflict);
        }

        if let Some(existing) = guard
            .video_progress
            .values_mut()
            .find(|p| p.user_id == write.user_id && p.video_id == write.video_id)
        {
            existing.progress = write.progress;
            existing.last_position = write.last_position;
            existing.watched = write.watched;
            existing.updated_at = write.recorded_at;
            return Ok(existing.clone());
        }

        let record = VideoProgress {
            id: VideoProgressId::new(guard.next_id()),
            user_id: write.user_id,
            video_id: write.video_id,
            course_id: write.course_id,
            course_progress_id: write.course_progress_id,
            progress: write.progress,
            last_position: write.last_position,
            watched: write.watched,
            created_at: write.recorded_at,
            updated_at: write.recorded_at,
        };
        guard.video_progress.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_video_progress(
        &self,
        user_id: UserId,
        video_ids: &[VideoId],
    ) -> Result<Vec<VideoProgress>, StorageError> {
        let guard = self.lock()?;
        let mut found: Vec<VideoProgress> = guard
            .video_progress
            .values()
            .filter(|p| p.user_id == user_id && video_ids.contains(&p.video_id))
            .cloned()
            .collect();
        found.sort_by_key(|p| p.id);
        Ok(found)
    }
}

/// Bundles the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub courses: Arc<dyn CourseRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub course_progress: Arc<dyn CourseProgressRepository>,
    pub video_progress: Arc<dyn VideoProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(&InMemoryRepository::new())
    }

    /// Wrap an existing in-memory repository so callers can keep a handle to
    /// it for inspection.
    #[must_use]
    pub fn from_in_memory(repo: &InMemoryRepository) -> Self {
        Self {
            courses: Arc::new(repo.clone()),
            enrollments: Arc::new(repo.clone()),
            course_progress: Arc::new(repo.clone()),
            video_progress: Arc::new(repo.clone()),
        }
    }
}
