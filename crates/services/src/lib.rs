#![forbid(unsafe_code)]

pub mod app_services;
pub mod course_view_service;
pub mod enrollment_service;
pub mod error;
pub mod locks;
pub mod progress_service;

pub use learn_core::Clock;

pub use app_services::AppServices;
pub use course_view_service::{CourseViewService, EnrolledCourse, EnrollmentSummary};
pub use enrollment_service::EnrollmentService;
pub use error::{AppServicesError, CourseViewError, EnrollmentError, ProgressError};
pub use progress_service::ProgressService;
