use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Version 1: course content, enrollments and progress tables.
///
/// Content tables (`courses`, `sections`, `videos`) stand in for the catalog
/// owned by content authoring. Progress tables reference content ids without
/// foreign keys; a restructured course keeps its learners' records.
const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS courses (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS sections (
            id INTEGER PRIMARY KEY,
            course_id INTEGER NOT NULL,
            position INTEGER NOT NULL CHECK (position >= 0),
            name TEXT NOT NULL,
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS videos (
            id INTEGER PRIMARY KEY,
            section_id INTEGER NOT NULL,
            position INTEGER NOT NULL CHECK (position >= 0),
            title TEXT NOT NULL,
            duration_secs INTEGER NOT NULL CHECK (duration_secs >= 0),
            FOREIGN KEY (section_id) REFERENCES sections(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS enrollments (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('active', 'cancelled')),
            enrolled_at TEXT NOT NULL
        );
    ",
    r"
        CREATE UNIQUE INDEX IF NOT EXISTS ux_enrollments_active_user_course
            ON enrollments (user_id, course_id)
            WHERE status = 'active';
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_enrollments_user_status
            ON enrollments (user_id, status, enrolled_at);
    ",
    r"
        CREATE TABLE IF NOT EXISTS course_progress (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            progress REAL NOT NULL CHECK (progress >= 0 AND progress <= 100),
            completed INTEGER NOT NULL CHECK (completed IN (0, 1)),
            updated_at TEXT NOT NULL,
            UNIQUE (user_id, course_id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS video_progress (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            video_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            course_progress_id INTEGER NOT NULL,
            progress REAL NOT NULL CHECK (progress >= 0 AND progress <= 100),
            last_position REAL NOT NULL CHECK (last_position >= 0),
            watched INTEGER NOT NULL CHECK (watched IN (0, 1)),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (user_id, video_id),
            FOREIGN KEY (course_progress_id) REFERENCES course_progress(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_video_progress_course_progress
            ON video_progress (course_progress_id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_sections_course_position
            ON sections (course_id, position);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_videos_section_position
            ON videos (section_id, position);
    ",
];

/// Applies pending schema versions, each inside its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    for (version, statements) in [(1_i64, SCHEMA_V1)] {
        if is_applied(pool, version).await? {
            continue;
        }

        let mut tx = pool.begin().await?;
        for statement in statements {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(version)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
