use learn_core::model::{UserId, VideoId, VideoProgress};

use super::SqliteRepository;
use super::mapping::{conn, flag_to_i64, id_to_i64, map_video_progress_row};
use crate::repository::{StorageError, VideoProgressRepository, VideoProgressWrite};

const VIDEO_PROGRESS_COLUMNS: &str = "id, user_id, video_id, course_id, course_progress_id, \
     progress, last_position, watched, created_at, updated_at";

#[async_trait::async_trait]
impl VideoProgressRepository for SqliteRepository {
    async fn get_video_progress(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<Option<VideoProgress>, StorageError> {
        let sql = format!(
            "SELECT {VIDEO_PROGRESS_COLUMNS} FROM video_progress
             WHERE user_id = ?1 AND video_id = ?2"
        );
        let row = sqlx::query(&sql)
            .bind(id_to_i64("user_id", user_id.value())?)
            .bind(id_to_i64("video_id", video_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_video_progress_row).transpose()
    }

    async fn upsert_video_progress(
        &self,
        write: &VideoProgressWrite,
    ) -> Result<VideoProgress, StorageError> {
        sqlx::query(
            r"
            INSERT INTO video_progress (
                user_id, video_id, course_id, course_progress_id,
                progress, last_position, watched, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            ON CONFLICT(user_id, video_id) DO UPDATE SET
                progress = excluded.progress,
                last_position = excluded.last_position,
                watched = excluded.watched,
                updated_at = excluded.updated_at
            ",
        )
        .bind(id_to_i64("user_id", write.user_id.value())?)
        .bind(id_to_i64("video_id", write.video_id.value())?)
        .bind(id_to_i64("course_id", write.course_id.value())?)
        .bind(id_to_i64(
            "course_progress_id",
            write.course_progress_id.value(),
        )?)
        .bind(write.progress)
        .bind(write.last_position)
        .bind(flag_to_i64(write.watched))
        .bind(write.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e
                .as_database_error()
                .is_some_and(|db| db.is_foreign_key_violation())
            {
                StorageError::Conflict
            } else {
                conn(e)
            }
        })?;

        self.get_video_progress(write.user_id, write.video_id)
            .await?
            .ok_or(StorageError::NotFound)
    }

    async fn list_video_progress(
        &self,
        user_id: UserId,
        video_ids: &[VideoId],
    ) -> Result<Vec<VideoProgress>, StorageError> {
        if video_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!(
            "SELECT {VIDEO_PROGRESS_COLUMNS} FROM video_progress
             WHERE user_id = ?1 AND video_id IN ("
        );
        for i in 0..video_ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 2).to_string());
        }
        sql.push_str(") ORDER BY id ASC");

        let mut query = sqlx::query(&sql).bind(id_to_i64("user_id", user_id.value())?);
        for video_id in video_ids {
            query = query.bind(id_to_i64("video_id", video_id.value())?);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;
        rows.iter().map(map_video_progress_row).collect()
    }
}
