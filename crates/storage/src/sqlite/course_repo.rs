use learn_core::model::{Course, CourseId, Section, SectionId, Video, VideoId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, id_from_i64, id_to_i64, ser};
use crate::repository::{CourseRepository, StorageError};

fn position(index: usize) -> Result<i64, StorageError> {
    i64::try_from(index).map_err(|_| StorageError::Serialization("position overflow".into()))
}

#[async_trait::async_trait]
impl CourseRepository for SqliteRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        let course_id = id_to_i64("course_id", course.id().value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO courses (id, title)
            VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET title = excluded.title
            ",
        )
        .bind(course_id)
        .bind(course.title())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        // Videos go with their sections via ON DELETE CASCADE.
        sqlx::query("DELETE FROM sections WHERE course_id = ?1")
            .bind(course_id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (section_pos, section) in course.sections().iter().enumerate() {
            let section_id = id_to_i64("section_id", section.id().value())?;
            sqlx::query(
                r"
                INSERT INTO sections (id, course_id, position, name)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(section_id)
            .bind(course_id)
            .bind(position(section_pos)?)
            .bind(section.name())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

            for (video_pos, video) in section.videos().iter().enumerate() {
                sqlx::query(
                    r"
                    INSERT INTO videos (id, section_id, position, title, duration_secs)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ",
                )
                .bind(id_to_i64("video_id", video.id().value())?)
                .bind(section_id)
                .bind(position(video_pos)?)
                .bind(video.title())
                .bind(i64::from(video.duration_secs()))
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
            }
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let course_id = id_to_i64("course_id", id.value())?;

        let Some(course_row) = sqlx::query("SELECT id, title FROM courses WHERE id = ?1")
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
        else {
            return Ok(None);
        };
        let title: String = course_row.try_get("title").map_err(ser)?;

        let section_rows = sqlx::query(
            r"
            SELECT id, name
            FROM sections
            WHERE course_id = ?1
            ORDER BY position ASC, id ASC
            ",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let video_rows = sqlx::query(
            r"
            SELECT v.id, v.section_id, v.title, v.duration_secs
            FROM videos v
            JOIN sections s ON s.id = v.section_id
            WHERE s.course_id = ?1
            ORDER BY s.position ASC, v.position ASC, v.id ASC
            ",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut sections = Vec::with_capacity(section_rows.len());
        for row in &section_rows {
            let section_id = id_from_i64("section_id", row.try_get::<i64, _>("id").map_err(ser)?)?;

            let mut videos = Vec::new();
            for video_row in &video_rows {
                let owner = id_from_i64(
                    "section_id",
                    video_row.try_get::<i64, _>("section_id").map_err(ser)?,
                )?;
                if owner != section_id {
                    continue;
                }
                let duration = u32::try_from(
                    video_row.try_get::<i64, _>("duration_secs").map_err(ser)?,
                )
                .map_err(|_| StorageError::Serialization("duration_secs overflow".into()))?;
                videos.push(
                    Video::new(
                        VideoId::new(id_from_i64(
                            "video_id",
                            video_row.try_get::<i64, _>("id").map_err(ser)?,
                        )?),
                        video_row.try_get::<String, _>("title").map_err(ser)?,
                        duration,
                    )
                    .map_err(ser)?,
                );
            }

            sections.push(
                Section::new(
                    SectionId::new(section_id),
                    row.try_get::<String, _>("name").map_err(ser)?,
                    videos,
                )
                .map_err(ser)?,
            );
        }

        Course::new(id, title, sections).map(Some).map_err(ser)
    }
}
