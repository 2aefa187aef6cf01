use chrono::{DateTime, Utc};
use learn_core::model::{CourseId, Enrollment, EnrollmentId, EnrollmentStatus, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_enrollment_row};
use crate::repository::{EnrollmentRepository, StorageError};

const ENROLLMENT_COLUMNS: &str = "id, user_id, course_id, status, enrolled_at";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

#[async_trait::async_trait]
impl EnrollmentRepository for SqliteRepository {
    async fn find_active_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let sql = format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments
             WHERE user_id = ?1 AND course_id = ?2 AND status = 'active'"
        );
        let row = sqlx::query(&sql)
            .bind(id_to_i64("user_id", user_id.value())?)
            .bind(id_to_i64("course_id", course_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_enrollment_row).transpose()
    }

    async fn create_active_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
        enrolled_at: DateTime<Utc>,
    ) -> Result<Enrollment, StorageError> {
        // The partial unique index on active enrollments turns a concurrent
        // duplicate into a no-op; both callers then read the surviving row.
        sqlx::query(
            r"
            INSERT INTO enrollments (user_id, course_id, status, enrolled_at)
            VALUES (?1, ?2, 'active', ?3)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("course_id", course_id.value())?)
        .bind(enrolled_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        self.find_active_enrollment(user_id, course_id)
            .await?
            .ok_or(StorageError::Conflict)
    }

    async fn list_active_enrollments(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Enrollment>, StorageError> {
        let sql = format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments
             WHERE user_id = ?1 AND status = 'active'
             ORDER BY enrolled_at ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(id_to_i64("user_id", user_id.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_enrollment_row).collect()
    }

    async fn set_enrollment_status(
        &self,
        id: EnrollmentId,
        status: EnrollmentStatus,
    ) -> Result<Enrollment, StorageError> {
        let enrollment_id = id_to_i64("enrollment_id", id.value())?;
        let res = sqlx::query("UPDATE enrollments SET status = ?1 WHERE id = ?2")
            .bind(status.as_str())
            .bind(enrollment_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StorageError::Conflict
                } else {
                    conn(e)
                }
            })?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        let sql = format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(enrollment_id)
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?;
        map_enrollment_row(&row)
    }
}
