use std::fmt;

use learn_core::model::{Course, CourseId, Section, SectionId, Video, VideoId};
use storage::repository::Storage;

const DEFAULT_DB_URL: &str = "sqlite://dev.sqlite3";

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    course_id: CourseId,
    title: String,
    sections: u32,
    videos_per_section: u32,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidCourseId { raw: String },
    InvalidCount { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidCourseId { raw } => write!(f, "invalid --course-id value: {raw}"),
            ArgsError::InvalidCount { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_count(flag: &'static str, raw: String) -> Result<u32, ArgsError> {
    raw.parse::<u32>()
        .map_err(|_| ArgsError::InvalidCount { flag, raw })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("LEARN_DB_URL").unwrap_or_else(|_| DEFAULT_DB_URL.into());
        let mut course_id = CourseId::new(1);
        let mut title = "Rust in Practice".to_string();
        let mut sections = 3;
        let mut videos_per_section = 4;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--course-id" => {
                    let value = require_value(&mut args, "--course-id")?;
                    course_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidCourseId { raw: value.clone() })?;
                }
                "--title" => {
                    title = require_value(&mut args, "--title")?;
                }
                "--sections" => {
                    let value = require_value(&mut args, "--sections")?;
                    sections = parse_count("--sections", value)?;
                }
                "--videos" => {
                    let value = require_value(&mut args, "--videos")?;
                    videos_per_section = parse_count("--videos", value)?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            course_id,
            title,
            sections,
            videos_per_section,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>     SQLite URL (default: {DEFAULT_DB_URL})");
    eprintln!("  --course-id <id>      Course id to upsert (default: 1)");
    eprintln!("  --title <text>        Course title (default: Rust in Practice)");
    eprintln!("  --sections <n>        Number of sections (default: 3)");
    eprintln!("  --videos <n>          Videos per section (default: 4)");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LEARN_DB_URL");
}

/// Section and video ids are derived from the course id so several seeded
/// courses can share one database.
fn build_course(args: &Args) -> Result<Course, Box<dyn std::error::Error>> {
    let base = args.course_id.value() * 10_000;
    let mut sections = Vec::new();
    for s in 1..=u64::from(args.sections) {
        let mut videos = Vec::new();
        for v in 1..=u64::from(args.videos_per_section) {
            let duration = 240 + u32::try_from((s * 7 + v * 13) % 600)?;
            videos.push(Video::new(
                VideoId::new(base + s * 100 + v),
                format!("Lesson {s}.{v}"),
                duration,
            )?);
        }
        sections.push(Section::new(
            SectionId::new(base + s),
            format!("Part {s}"),
            videos,
        )?);
    }
    Ok(Course::new(args.course_id, args.title.clone(), sections)?)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let course = build_course(&args)?;
    let storage = Storage::sqlite(&args.db_url).await?;
    storage.courses.upsert_course(&course).await?;

    println!(
        "Seeded course {} ({} sections, {} videos) into {}",
        course.id(),
        course.sections().len(),
        course.video_count(),
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
