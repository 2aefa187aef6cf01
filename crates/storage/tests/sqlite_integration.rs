use chrono::Duration;
use learn_core::model::{
    Course, CourseId, CourseProgressId, EnrollmentStatus, Section, SectionId, UserId, Video,
    VideoId,
};
use learn_core::time::fixed_now;
use storage::repository::{
    CourseProgressRepository, CourseRepository, EnrollmentRepository, StorageError,
    VideoProgressRepository, VideoProgressWrite,
};
use storage::sqlite::SqliteRepository;

async fn repo(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn sample_course(id: u64) -> Course {
    let intro = Section::new(
        SectionId::new(id * 10 + 1),
        "Intro",
        vec![
            Video::new(VideoId::new(id * 100 + 1), "Welcome", 120).unwrap(),
            Video::new(VideoId::new(id * 100 + 2), "Setup", 300).unwrap(),
        ],
    )
    .unwrap();
    let deep = Section::new(
        SectionId::new(id * 10 + 2),
        "Deep dive",
        vec![Video::new(VideoId::new(id * 100 + 3), "Ownership", 900).unwrap()],
    )
    .unwrap();
    Course::new(CourseId::new(id), "Rust", vec![intro, deep]).unwrap()
}

fn write(video_id: u64, course_progress_id: CourseProgressId, progress: f64) -> VideoProgressWrite {
    VideoProgressWrite {
        user_id: UserId::new(1),
        video_id: VideoId::new(video_id),
        course_id: CourseId::new(1),
        course_progress_id,
        progress,
        last_position: progress * 2.0,
        watched: progress >= 90.0,
        recorded_at: fixed_now(),
    }
}

#[tokio::test]
async fn course_structure_round_trips_in_order() {
    let repo = repo("memdb_course_structure").await;
    let course = sample_course(1);
    repo.upsert_course(&course).await.unwrap();

    let fetched = repo.get_course(course.id()).await.unwrap();
    assert_eq!(fetched, Some(course));
    assert_eq!(repo.get_course(CourseId::new(404)).await.unwrap(), None);
}

#[tokio::test]
async fn course_upsert_replaces_structure() {
    let repo = repo("memdb_course_replace").await;
    repo.upsert_course(&sample_course(2)).await.unwrap();

    let only = Section::new(
        SectionId::new(29),
        "Only",
        vec![Video::new(VideoId::new(299), "Recap", 60).unwrap()],
    )
    .unwrap();
    let reshaped = Course::new(CourseId::new(2), "Rust, revised", vec![only]).unwrap();
    repo.upsert_course(&reshaped).await.unwrap();

    let fetched = repo.get_course(CourseId::new(2)).await.unwrap().unwrap();
    assert_eq!(fetched.title(), "Rust, revised");
    assert_eq!(fetched.video_count(), 1);
}

#[tokio::test]
async fn active_enrollment_is_unique_per_user_and_course() {
    let repo = repo("memdb_enrollments").await;
    let user = UserId::new(1);
    let course = CourseId::new(1);

    let first = repo
        .create_active_enrollment(user, course, fixed_now())
        .await
        .unwrap();
    let again = repo
        .create_active_enrollment(user, course, fixed_now() + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(first, again);

    let cancelled = repo
        .set_enrollment_status(first.id, EnrollmentStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.status, EnrollmentStatus::Cancelled);
    assert!(repo.find_active_enrollment(user, course).await.unwrap().is_none());

    let renewed = repo
        .create_active_enrollment(user, course, fixed_now() + Duration::days(1))
        .await
        .unwrap();
    assert_ne!(renewed.id, first.id);

    let err = repo
        .set_enrollment_status(first.id, EnrollmentStatus::Active)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let listed = repo.list_active_enrollments(user).await.unwrap();
    assert_eq!(listed, vec![renewed]);
}

#[tokio::test]
async fn course_progress_get_or_create_is_idempotent() {
    let repo = repo("memdb_course_progress").await;
    let user = UserId::new(1);
    let course = CourseId::new(1);

    let created = repo
        .get_or_create_course_progress(user, course, fixed_now())
        .await
        .unwrap();
    assert_eq!(created.progress, 0.0);
    assert!(!created.completed);

    let again = repo
        .get_or_create_course_progress(user, course, fixed_now() + Duration::hours(2))
        .await
        .unwrap();
    assert_eq!(again, created);

    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM course_progress WHERE user_id = 1 AND course_id = 1",
    )
    .fetch_one(repo.pool())
    .await
    .unwrap();
    assert_eq!(count, 1);

    let updated = repo
        .update_course_progress(created.id, 62.5, false, fixed_now() + Duration::hours(3))
        .await
        .unwrap();
    assert_eq!(updated.progress, 62.5);
    assert_eq!(updated.updated_at, fixed_now() + Duration::hours(3));

    let missing = repo
        .update_course_progress(CourseProgressId::new(9_999), 1.0, false, fixed_now())
        .await
        .unwrap_err();
    assert!(matches!(missing, StorageError::NotFound));
}

#[tokio::test]
async fn video_progress_upserts_in_place() {
    let repo = repo("memdb_video_progress").await;
    let cp = repo
        .get_or_create_course_progress(UserId::new(1), CourseId::new(1), fixed_now())
        .await
        .unwrap();

    let first = repo.upsert_video_progress(&write(101, cp.id, 30.0)).await.unwrap();
    assert!(!first.watched);

    let mut later = write(101, cp.id, 92.0);
    later.recorded_at = fixed_now() + Duration::minutes(10);
    let second = repo.upsert_video_progress(&later).await.unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.created_at, first.created_at);
    assert_eq!(second.updated_at, later.recorded_at);
    assert_eq!(second.last_position, 184.0);
    assert!(second.watched);

    repo.upsert_video_progress(&write(102, cp.id, 10.0)).await.unwrap();
    let listed = repo
        .list_video_progress(
            UserId::new(1),
            &[VideoId::new(101), VideoId::new(102), VideoId::new(103)],
        )
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert!(
        repo.list_video_progress(UserId::new(1), &[])
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn video_progress_requires_course_progress() {
    let repo = repo("memdb_video_progress_fk").await;
    let err = repo
        .upsert_video_progress(&write(101, CourseProgressId::new(77), 30.0))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
}

#[tokio::test]
async fn connect_creates_missing_database_file() {
    let path = std::env::temp_dir().join(format!("learn-storage-{}.sqlite3", std::process::id()));
    let _ = std::fs::remove_file(&path);

    let repo = SqliteRepository::connect(&format!("sqlite://{}", path.display()))
        .await
        .unwrap();
    repo.migrate().await.unwrap();
    assert!(path.exists());

    repo.pool().close().await;
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
}

#[tokio::test]
async fn unreadable_course_content_is_a_serialization_error() {
    let repo = repo("memdb_corrupt_course").await;
    repo.upsert_course(&sample_course(1)).await.unwrap();

    sqlx::query("UPDATE sections SET name = '' WHERE course_id = 1")
        .execute(repo.pool())
        .await
        .unwrap();

    let err = repo.get_course(CourseId::new(1)).await.unwrap_err();
    assert!(matches!(err, StorageError::Serialization(_)));
}
