use learn_core::model::{Course, CourseId, Section, SectionId, UserId, Video, VideoId};
use learn_core::time::fixed_clock;
use services::AppServices;
use storage::repository::{CourseProgressRepository, CourseRepository, Storage};
use storage::sqlite::SqliteRepository;

const USER: UserId = UserId::new(1);

async fn repo(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

/// Two sections: one video, then two videos. Video ids are `id * 100 + n`.
fn course(id: u64) -> Course {
    let video = |n: u64| Video::new(VideoId::new(id * 100 + n), format!("Video {n}"), 300).unwrap();
    let first = Section::new(SectionId::new(id * 10 + 1), "Basics", vec![video(1)]).unwrap();
    let second =
        Section::new(SectionId::new(id * 10 + 2), "Practice", vec![video(2), video(3)]).unwrap();
    Course::new(CourseId::new(id), format!("Course {id}"), vec![first, second]).unwrap()
}

async fn app(repo: &SqliteRepository, courses: &[Course]) -> AppServices {
    for c in courses {
        repo.upsert_course(c).await.unwrap();
    }
    AppServices::from_storage(&Storage::from_sqlite(repo), fixed_clock())
}

#[tokio::test]
async fn recorded_progress_lands_in_stored_aggregate() {
    let repo = repo("memdb_flow_aggregate").await;
    let c = course(1);
    let app = app(&repo, &[c.clone()]).await;
    app.enrollments().enroll(USER, c.id()).await.unwrap();

    app.progress()
        .record_progress(USER, c.id(), VideoId::new(101), 100.0, 300.0)
        .await
        .unwrap();
    app.progress()
        .record_progress(USER, c.id(), VideoId::new(102), 50.0, 150.0)
        .await
        .unwrap();

    let stored = repo.get_course_progress(USER, c.id()).await.unwrap().unwrap();
    assert_eq!(stored.progress, 62.5);
    assert!(!stored.completed);

    let view = app
        .course_views()
        .get_enrolled_course(USER, c.id())
        .await
        .unwrap();
    assert_eq!(view.progress.overall, stored.progress);
    assert_eq!(view.progress.completed, stored.completed);
    assert_eq!(view.progress_updated_at, Some(stored.updated_at));

    for n in 2..=3 {
        app.progress()
            .record_progress(USER, c.id(), VideoId::new(100 + n), 100.0, 300.0)
            .await
            .unwrap();
    }
    let stored = repo.get_course_progress(USER, c.id()).await.unwrap().unwrap();
    assert_eq!(stored.progress, 100.0);
    assert!(stored.completed);
}

#[tokio::test]
async fn listing_skips_course_with_unreadable_content() {
    let repo = repo("memdb_flow_corrupt_listing").await;
    let healthy = course(1);
    let broken = course(2);
    let app = app(&repo, &[healthy.clone(), broken.clone()]).await;
    app.enrollments().enroll(USER, healthy.id()).await.unwrap();
    app.enrollments().enroll(USER, broken.id()).await.unwrap();

    sqlx::query("UPDATE sections SET name = '' WHERE course_id = 2")
        .execute(repo.pool())
        .await
        .unwrap();

    let listed = app.course_views().list_enrolled_courses(USER).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].course_id, healthy.id());

    let err = app
        .course_views()
        .get_enrolled_course(USER, broken.id())
        .await
        .unwrap_err();
    assert!(!err.is_not_found());
}
