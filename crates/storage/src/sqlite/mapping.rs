use learn_core::model::{
    CourseId, CourseProgress, CourseProgressId, Enrollment, EnrollmentId, EnrollmentStatus,
    UserId, VideoId, VideoProgress, VideoProgressId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn id_from_i64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn get_id(row: &SqliteRow, field: &'static str) -> Result<u64, StorageError> {
    id_from_i64(field, row.try_get::<i64, _>(field).map_err(ser)?)
}

fn get_flag(row: &SqliteRow, field: &'static str) -> Result<bool, StorageError> {
    match row.try_get::<i64, _>(field).map_err(ser)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StorageError::Serialization(format!(
            "invalid {field} flag: {other}"
        ))),
    }
}

pub(crate) fn flag_to_i64(flag: bool) -> i64 {
    i64::from(flag)
}

pub(crate) fn map_enrollment_row(row: &SqliteRow) -> Result<Enrollment, StorageError> {
    let status: String = row.try_get("status").map_err(ser)?;
    Ok(Enrollment {
        id: EnrollmentId::new(get_id(row, "id")?),
        user_id: UserId::new(get_id(row, "user_id")?),
        course_id: CourseId::new(get_id(row, "course_id")?),
        status: EnrollmentStatus::parse(&status).map_err(ser)?,
        enrolled_at: row.try_get("enrolled_at").map_err(ser)?,
    })
}

pub(crate) fn map_course_progress_row(row: &SqliteRow) -> Result<CourseProgress, StorageError> {
    Ok(CourseProgress {
        id: CourseProgressId::new(get_id(row, "id")?),
        user_id: UserId::new(get_id(row, "user_id")?),
        course_id: CourseId::new(get_id(row, "course_id")?),
        progress: row.try_get("progress").map_err(ser)?,
        completed: get_flag(row, "completed")?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_video_progress_row(row: &SqliteRow) -> Result<VideoProgress, StorageError> {
    Ok(VideoProgress {
        id: VideoProgressId::new(get_id(row, "id")?),
        user_id: UserId::new(get_id(row, "user_id")?),
        video_id: VideoId::new(get_id(row, "video_id")?),
        course_id: CourseId::new(get_id(row, "course_id")?),
        course_progress_id: CourseProgressId::new(get_id(row, "course_progress_id")?),
        progress: row.try_get("progress").map_err(ser)?,
        last_position: row.try_get("last_position").map_err(ser)?,
        watched: get_flag(row, "watched")?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}
