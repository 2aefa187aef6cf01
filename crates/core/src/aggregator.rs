//! Roll-up of per-video progress into section and course progress.
//!
//! This is the only place aggregation rules live. The write path (persisting
//! the course aggregate after each playback report) and every read path
//! (progress detail, enrolled-course listings) go through
//! [`compute_course_progress`], so they always agree.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{
    Course, CourseId, FULL_PROGRESS, SectionId, VideoId, VideoProgress,
};

//
// ─── REPORT SHAPES ─────────────────────────────────────────────────────────────
//

/// Progress of one video as seen by the learner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoProgressView {
    pub video_id: VideoId,
    pub title: String,
    pub duration_secs: u32,
    pub progress: f64,
    pub last_position: f64,
    pub watched: bool,
}

/// Mean progress of a section's videos.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionProgress {
    pub section_id: SectionId,
    pub name: String,
    pub progress: f64,
    pub videos: Vec<VideoProgressView>,
}

/// Full progress breakdown of a course for one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseProgressReport {
    pub course_id: CourseId,
    pub overall: f64,
    pub completed: bool,
    pub sections: Vec<SectionProgress>,
}

//
// ─── AGGREGATION ───────────────────────────────────────────────────────────────
//

/// Computes section and course progress from a user's video records.
///
/// - A video with no record counts as 0 progress, position 0, not watched.
/// - Section progress is the mean of its videos' progress; an empty section is 0.
/// - Overall progress is the mean of section progress values, so every section
///   weighs the same regardless of how many videos it holds. No sections is 0.
/// - The course is completed when it has at least one section and every
///   section is at 100.
///
/// Records for videos outside the course's current structure are ignored.
#[must_use]
pub fn compute_course_progress(course: &Course, records: &[VideoProgress]) -> CourseProgressReport {
    let by_video: HashMap<VideoId, &VideoProgress> =
        records.iter().map(|r| (r.video_id, r)).collect();

    let sections: Vec<SectionProgress> = course
        .sections()
        .iter()
        .map(|section| {
            let videos: Vec<VideoProgressView> = section
                .videos()
                .iter()
                .map(|video| {
                    let record = by_video.get(&video.id());
                    VideoProgressView {
                        video_id: video.id(),
                        title: video.title().to_owned(),
                        duration_secs: video.duration_secs(),
                        progress: record.map_or(0.0, |r| r.progress),
                        last_position: record.map_or(0.0, |r| r.last_position),
                        watched: record.is_some_and(|r| r.watched),
                    }
                })
                .collect();

            SectionProgress {
                section_id: section.id(),
                name: section.name().to_owned(),
                progress: mean(videos.iter().map(|v| v.progress)),
                videos,
            }
        })
        .collect();

    let overall = mean(sections.iter().map(|s| s.progress));
    let completed = !sections.is_empty() && sections.iter().all(|s| s.progress >= FULL_PROGRESS);

    CourseProgressReport {
        course_id: course.id(),
        overall,
        completed,
        sections,
    }
}

/// Arithmetic mean; 0 for an empty sequence.
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0_u32), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / f64::from(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CourseProgressId, Section, UserId, Video, VideoProgressId, is_watched,
    };
    use crate::time::fixed_now;

    fn video(id: u64) -> Video {
        Video::new(VideoId::new(id), format!("Video {id}"), 300).unwrap()
    }

    fn section(id: u64, video_ids: &[u64]) -> Section {
        Section::new(
            SectionId::new(id),
            format!("Section {id}"),
            video_ids.iter().copied().map(video).collect(),
        )
        .unwrap()
    }

    fn course(sections: Vec<Section>) -> Course {
        Course::new(CourseId::new(1), "Rust for Learners", sections).unwrap()
    }

    fn record(video_id: u64, progress: f64) -> VideoProgress {
        VideoProgress {
            id: VideoProgressId::new(video_id),
            user_id: UserId::new(1),
            video_id: VideoId::new(video_id),
            course_id: CourseId::new(1),
            course_progress_id: CourseProgressId::new(1),
            progress,
            last_position: progress * 3.0,
            watched: is_watched(progress),
            created_at: fixed_now(),
            updated_at: fixed_now(),
        }
    }

    #[test]
    fn one_of_two_videos_done_is_half() {
        let course = course(vec![section(1, &[1, 2])]);
        let report = compute_course_progress(&course, &[record(1, 100.0)]);

        assert_eq!(report.sections[0].progress, 50.0);
        assert_eq!(report.overall, 50.0);
        assert!(!report.completed);
    }

    #[test]
    fn all_videos_done_completes_course() {
        let course = course(vec![section(1, &[1, 2])]);
        let report = compute_course_progress(&course, &[record(1, 100.0), record(2, 100.0)]);

        assert_eq!(report.sections[0].progress, 100.0);
        assert_eq!(report.overall, 100.0);
        assert!(report.completed);
    }

    #[test]
    fn sections_weigh_equally_regardless_of_size() {
        let course = course(vec![section(1, &[1]), section(2, &[2, 3, 4])]);
        let report = compute_course_progress(&course, &[record(1, 100.0)]);

        assert_eq!(report.sections[0].progress, 100.0);
        assert_eq!(report.sections[1].progress, 0.0);
        assert_eq!(report.overall, 50.0);
        assert!(!report.completed);
    }

    #[test]
    fn course_without_sections_is_zero_and_not_completed() {
        let course = course(Vec::new());
        let report = compute_course_progress(&course, &[]);

        assert_eq!(report.overall, 0.0);
        assert!(!report.completed);
        assert!(report.sections.is_empty());
    }

    #[test]
    fn empty_section_is_zero_and_blocks_completion() {
        let course = course(vec![section(1, &[1]), section(2, &[])]);
        let report = compute_course_progress(&course, &[record(1, 100.0)]);

        assert_eq!(report.sections[1].progress, 0.0);
        assert!(!report.sections[1].progress.is_nan());
        assert_eq!(report.overall, 50.0);
        assert!(!report.completed);
    }

    #[test]
    fn watched_but_not_full_does_not_complete() {
        let course = course(vec![section(1, &[1])]);
        let report = compute_course_progress(&course, &[record(1, 95.0)]);

        assert!(report.sections[0].videos[0].watched);
        assert_eq!(report.overall, 95.0);
        assert!(!report.completed);
    }

    #[test]
    fn untouched_videos_default_to_zero() {
        let course = course(vec![section(1, &[1, 2])]);
        let report = compute_course_progress(&course, &[record(2, 40.0)]);

        let first = &report.sections[0].videos[0];
        assert_eq!(first.progress, 0.0);
        assert_eq!(first.last_position, 0.0);
        assert!(!first.watched);

        let second = &report.sections[0].videos[1];
        assert_eq!(second.progress, 40.0);
        assert_eq!(second.last_position, 120.0);
    }

    #[test]
    fn records_for_removed_videos_are_ignored() {
        let course = course(vec![section(1, &[1])]);
        let report = compute_course_progress(&course, &[record(1, 20.0), record(99, 100.0)]);

        assert_eq!(report.overall, 20.0);
    }

    #[test]
    fn same_inputs_same_report() {
        let course = course(vec![section(1, &[1, 2]), section(2, &[3])]);
        let records = [record(1, 33.0), record(3, 71.0)];

        assert_eq!(
            compute_course_progress(&course, &records),
            compute_course_progress(&course, &records)
        );
    }
}
