use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use learn_core::aggregator::{CourseProgressReport, compute_course_progress};
use learn_core::model::{
    Course, CourseId, CourseProgress, PlaybackSample, UserId, VideoId, VideoProgress,
};
use storage::repository::{
    CourseProgressRepository, CourseRepository, VideoProgressRepository, VideoProgressWrite,
};

use crate::Clock;
use crate::error::ProgressError;
use crate::locks::KeyedLocks;

/// Get-or-create the course aggregate for a user.
///
/// Shared by enrollment and progress recording; the repository enforces one
/// record per `(user_id, course_id)` so redundant calls are harmless.
pub(crate) async fn ensure_course_progress(
    repo: &dyn CourseProgressRepository,
    user_id: UserId,
    course_id: CourseId,
    now: DateTime<Utc>,
) -> Result<CourseProgress, storage::repository::StorageError> {
    repo.get_or_create_course_progress(user_id, course_id, now)
        .await
}

/// Records playback progress and keeps the course aggregate in step with it.
pub struct ProgressService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    course_progress: Arc<dyn CourseProgressRepository>,
    video_progress: Arc<dyn VideoProgressRepository>,
    writers: KeyedLocks<(UserId, CourseId)>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        course_progress: Arc<dyn CourseProgressRepository>,
        video_progress: Arc<dyn VideoProgressRepository>,
    ) -> Self {
        Self {
            clock,
            courses,
            course_progress,
            video_progress,
            writers: KeyedLocks::new(),
        }
    }

    /// Record a playback report for one video and refresh the course aggregate.
    ///
    /// The video record is upserted, then the course aggregate is recomputed
    /// from every video record of the course and written back. Writers for the
    /// same `(user_id, course_id)` are serialized so no report's contribution
    /// to the aggregate is lost; other pairs proceed in parallel.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Validation` for out-of-range input (nothing is
    /// written), `ProgressError::CourseNotFound` / `VideoNotInCourse` for
    /// unknown content, and `ProgressError::Storage` if persistence fails.
    pub async fn record_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
        video_id: VideoId,
        progress: f64,
        last_position: f64,
    ) -> Result<VideoProgress, ProgressError> {
        let sample = PlaybackSample::new(progress, last_position)?;
        let course = self.load_course(course_id).await?;
        if !course.contains_video(video_id) {
            return Err(ProgressError::VideoNotInCourse {
                video_id,
                course_id,
            });
        }

        let _writer = self.writers.lock((user_id, course_id)).await;
        let now = self.clock.now();

        let aggregate =
            ensure_course_progress(self.course_progress.as_ref(), user_id, course_id, now).await?;

        let record = self
            .video_progress
            .upsert_video_progress(&VideoProgressWrite {
                user_id,
                video_id,
                course_id,
                course_progress_id: aggregate.id,
                progress: sample.progress(),
                last_position: sample.last_position(),
                watched: sample.watched(),
                recorded_at: now,
            })
            .await?;

        let report = self.compute(&course, user_id).await?;
        self.course_progress
            .update_course_progress(aggregate.id, report.overall, report.completed, now)
            .await?;

        debug!(
            user_id = %user_id,
            course_id = %course_id,
            video_id = %video_id,
            progress = record.progress,
            watched = record.watched,
            overall = report.overall,
            completed = report.completed,
            "recorded video progress"
        );

        Ok(record)
    }

    /// Section-by-section progress of a user through a course.
    ///
    /// Always computed from the current video records, so it matches what the
    /// last completed write stored.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::CourseNotFound` for an unknown course,
    /// `ProgressError::NoProgress` if the user was never enrolled and never
    /// reported progress, and `ProgressError::Storage` on repository failures.
    pub async fn get_course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<CourseProgressReport, ProgressError> {
        let course = self.load_course(course_id).await?;
        if self
            .course_progress
            .get_course_progress(user_id, course_id)
            .await?
            .is_none()
        {
            return Err(ProgressError::NoProgress { user_id, course_id });
        }
        self.compute(&course, user_id).await
    }

    /// Get-or-create the course aggregate, `progress = 0` when new.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if persistence fails.
    pub async fn ensure_course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<CourseProgress, ProgressError> {
        let record = ensure_course_progress(
            self.course_progress.as_ref(),
            user_id,
            course_id,
            self.clock.now(),
        )
        .await?;
        Ok(record)
    }

    /// Resume point for the player; `None` if the video was never played.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` on repository failures.
    pub async fn get_video_progress(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<Option<VideoProgress>, ProgressError> {
        Ok(self
            .video_progress
            .get_video_progress(user_id, video_id)
            .await?)
    }

    async fn load_course(&self, course_id: CourseId) -> Result<Course, ProgressError> {
        self.courses
            .get_course(course_id)
            .await?
            .ok_or(ProgressError::CourseNotFound(course_id))
    }

    async fn compute(
        &self,
        course: &Course,
        user_id: UserId,
    ) -> Result<CourseProgressReport, ProgressError> {
        let video_ids: Vec<VideoId> = course.videos().map(|v| v.id()).collect();
        let records = self
            .video_progress
            .list_video_progress(user_id, &video_ids)
            .await?;
        Ok(compute_course_progress(course, &records))
    }
}
