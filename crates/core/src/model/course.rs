use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, SectionId, VideoId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course title cannot be empty")]
    EmptyTitle,

    #[error("section name cannot be empty")]
    EmptySectionName,

    #[error("video title cannot be empty")]
    EmptyVideoTitle,

    #[error("section {0} appears more than once in the course")]
    DuplicateSection(SectionId),

    #[error("video {0} appears more than once in the course")]
    DuplicateVideo(VideoId),
}

//
// ─── VIDEO ─────────────────────────────────────────────────────────────────────
//

/// A playable video. `duration_secs` is static catalog metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    id: VideoId,
    title: String,
    duration_secs: u32,
}

impl Video {
    /// # Errors
    ///
    /// Returns `CourseError::EmptyVideoTitle` if the title is blank.
    pub fn new(
        id: VideoId,
        title: impl Into<String>,
        duration_secs: u32,
    ) -> Result<Self, CourseError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CourseError::EmptyVideoTitle);
        }
        Ok(Self {
            id,
            title,
            duration_secs,
        })
    }

    #[must_use]
    pub fn id(&self) -> VideoId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }
}

//
// ─── SECTION ───────────────────────────────────────────────────────────────────
//

/// An ordered group of videos inside a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    id: SectionId,
    name: String,
    videos: Vec<Video>,
}

impl Section {
    /// # Errors
    ///
    /// Returns `CourseError::EmptySectionName` if the name is blank.
    pub fn new(
        id: SectionId,
        name: impl Into<String>,
        videos: Vec<Video>,
    ) -> Result<Self, CourseError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CourseError::EmptySectionName);
        }
        Ok(Self { id, name, videos })
    }

    #[must_use]
    pub fn id(&self) -> SectionId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Videos in playback order.
    #[must_use]
    pub fn videos(&self) -> &[Video] {
        &self.videos
    }
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// Read-only content structure of a course: ordered sections of ordered videos.
///
/// Owned by the content-authoring side. Progress tracking only reads it, and
/// always against its current shape, so videos added or removed later are
/// reflected by the next aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    id: CourseId,
    title: String,
    sections: Vec<Section>,
}

impl Course {
    /// Creates a course, rejecting blank titles and repeated section/video ids.
    ///
    /// # Errors
    ///
    /// Returns `CourseError` if validation fails.
    pub fn new(
        id: CourseId,
        title: impl Into<String>,
        sections: Vec<Section>,
    ) -> Result<Self, CourseError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CourseError::EmptyTitle);
        }

        let mut section_ids = HashSet::new();
        let mut video_ids = HashSet::new();
        for section in &sections {
            if !section_ids.insert(section.id()) {
                return Err(CourseError::DuplicateSection(section.id()));
            }
            for video in section.videos() {
                if !video_ids.insert(video.id()) {
                    return Err(CourseError::DuplicateVideo(video.id()));
                }
            }
        }

        Ok(Self {
            id,
            title,
            sections,
        })
    }

    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// All videos of the course, section by section.
    pub fn videos(&self) -> impl Iterator<Item = &Video> {
        self.sections.iter().flat_map(|s| s.videos.iter())
    }

    #[must_use]
    pub fn contains_video(&self, video_id: VideoId) -> bool {
        self.videos().any(|v| v.id() == video_id)
    }

    #[must_use]
    pub fn video_count(&self) -> usize {
        self.sections.iter().map(|s| s.videos.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(id: u64) -> Video {
        Video::new(VideoId::new(id), format!("Video {id}"), 60).unwrap()
    }

    #[test]
    fn rejects_blank_title() {
        let err = Course::new(CourseId::new(1), "  ", Vec::new()).unwrap_err();
        assert_eq!(err, CourseError::EmptyTitle);
    }

    #[test]
    fn rejects_video_shared_between_sections() {
        let a = Section::new(SectionId::new(1), "A", vec![video(1)]).unwrap();
        let b = Section::new(SectionId::new(2), "B", vec![video(1)]).unwrap();
        let err = Course::new(CourseId::new(1), "Course", vec![a, b]).unwrap_err();
        assert_eq!(err, CourseError::DuplicateVideo(VideoId::new(1)));
    }

    #[test]
    fn rejects_repeated_section() {
        let a = Section::new(SectionId::new(1), "A", Vec::new()).unwrap();
        let err = Course::new(CourseId::new(1), "Course", vec![a.clone(), a]).unwrap_err();
        assert_eq!(err, CourseError::DuplicateSection(SectionId::new(1)));
    }

    #[test]
    fn walks_videos_in_order() {
        let a = Section::new(SectionId::new(1), "A", vec![video(1), video(2)]).unwrap();
        let b = Section::new(SectionId::new(2), "B", vec![video(3)]).unwrap();
        let course = Course::new(CourseId::new(1), "Course", vec![a, b]).unwrap();

        let ids: Vec<u64> = course.videos().map(|v| v.id().value()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(course.video_count(), 3);
        assert!(course.contains_video(VideoId::new(3)));
        assert!(!course.contains_video(VideoId::new(4)));
    }
}
