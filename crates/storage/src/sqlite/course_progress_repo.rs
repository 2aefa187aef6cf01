use chrono::{DateTime, Utc};
use learn_core::model::{CourseId, CourseProgress, CourseProgressId, UserId};

use super::SqliteRepository;
use super::mapping::{conn, flag_to_i64, id_to_i64, map_course_progress_row};
use crate::repository::{CourseProgressRepository, StorageError};

#[async_trait::async_trait]
impl CourseProgressRepository for SqliteRepository {
    async fn get_course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<CourseProgress>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, course_id, progress, completed, updated_at
            FROM course_progress
            WHERE user_id = ?1 AND course_id = ?2
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("course_id", course_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_course_progress_row).transpose()
    }

    async fn get_or_create_course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
        now: DateTime<Utc>,
    ) -> Result<CourseProgress, StorageError> {
        sqlx::query(
            r"
            INSERT INTO course_progress (user_id, course_id, progress, completed, updated_at)
            VALUES (?1, ?2, 0, 0, ?3)
            ON CONFLICT(user_id, course_id) DO NOTHING
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("course_id", course_id.value())?)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        self.get_course_progress(user_id, course_id)
            .await?
            .ok_or(StorageError::NotFound)
    }

    async fn update_course_progress(
        &self,
        id: CourseProgressId,
        progress: f64,
        completed: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<CourseProgress, StorageError> {
        let progress_id = id_to_i64("course_progress_id", id.value())?;
        let res = sqlx::query(
            r"
            UPDATE course_progress
            SET progress = ?1, completed = ?2, updated_at = ?3
            WHERE id = ?4
            ",
        )
        .bind(progress)
        .bind(flag_to_i64(completed))
        .bind(updated_at)
        .bind(progress_id)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        let row = sqlx::query(
            r"
            SELECT id, user_id, course_id, progress, completed, updated_at
            FROM course_progress
            WHERE id = ?1
            ",
        )
        .bind(progress_id)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;
        map_course_progress_row(&row)
    }
}
