mod course;
mod enrollment;
mod ids;
mod progress;

pub use ids::{
    CourseId, CourseProgressId, EnrollmentId, ParseIdError, SectionId, UserId, VideoId,
    VideoProgressId,
};

pub use course::{Course, CourseError, Section, Video};
pub use enrollment::{Enrollment, EnrollmentError, EnrollmentStatus};
pub use progress::{
    CourseProgress, FULL_PROGRESS, PlaybackSample, ProgressValidationError, VideoProgress,
    WATCHED_THRESHOLD, is_watched,
};
