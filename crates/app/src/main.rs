use std::fmt;
use std::str::FromStr;

use learn_core::model::{CourseId, UserId, VideoId};
use serde::Serialize;
use services::{AppServices, Clock};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidValue { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required for this command"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidValue { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
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

fn parse_value<T: FromStr>(value: String, flag: &'static str) -> Result<T, ArgsError> {
    value
        .parse()
        .map_err(|_| ArgsError::InvalidValue { flag, raw: value.clone() })
}

fn required<T>(value: Option<T>, flag: &'static str) -> Result<T, ArgsError> {
    value.ok_or(ArgsError::MissingFlag { flag })
}

const DEFAULT_DB_URL: &str = "sqlite://dev.sqlite3";

fn usage() -> String {
    format!(
        "Usage:
  cargo run -p app -- enroll   --user <id> --course <id>
  cargo run -p app -- cancel   --user <id> --course <id>
  cargo run -p app -- record   --user <id> --course <id> --video <id> --progress <0-100> [--position <secs>]
  cargo run -p app -- progress --user <id> --course <id>
  cargo run -p app -- resume   --user <id> --video <id>
  cargo run -p app -- courses  --user <id>
  cargo run -p app -- course   --user <id> --course <id>

Every command also accepts --db <sqlite_url> (default {DEFAULT_DB_URL}).

Environment:
  LEARN_DB_URL, LEARN_USER_ID, LEARN_LOG"
    )
}

fn print_usage() {
    eprintln!("{}", usage());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Enroll,
    Cancel,
    Record,
    Progress,
    Resume,
    Courses,
    Course,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "enroll" => Some(Self::Enroll),
            "cancel" => Some(Self::Cancel),
            "record" => Some(Self::Record),
            "progress" => Some(Self::Progress),
            "resume" => Some(Self::Resume),
            "courses" => Some(Self::Courses),
            "course" => Some(Self::Course),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    user_id: Option<UserId>,
    course_id: Option<CourseId>,
    video_id: Option<VideoId>,
    progress: Option<f64>,
    position: Option<f64>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url: std::env::var("LEARN_DB_URL")
                .ok()
                .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url),
            user_id: std::env::var("LEARN_USER_ID")
                .ok()
                .and_then(|value| value.parse().ok()),
            course_id: None,
            video_id: None,
            progress: None,
            position: None,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    let value = require_value(args, "--user")?;
                    parsed.user_id = Some(parse_value(value, "--user")?);
                }
                "--course" => {
                    let value = require_value(args, "--course")?;
                    parsed.course_id = Some(parse_value(value, "--course")?);
                }
                "--video" => {
                    let value = require_value(args, "--video")?;
                    parsed.video_id = Some(parse_value(value, "--video")?);
                }
                "--progress" => {
                    let value = require_value(args, "--progress")?;
                    parsed.progress = Some(parse_value(value, "--progress")?);
                }
                "--position" => {
                    let value = require_value(args, "--position")?;
                    parsed.position = Some(parse_value(value, "--position")?);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    fn user(&self) -> Result<UserId, ArgsError> {
        required(self.user_id, "--user")
    }

    fn course(&self) -> Result<CourseId, ArgsError> {
        required(self.course_id, "--course")
    }

    fn video(&self) -> Result<VideoId, ArgsError> {
        required(self.video_id, "--video")
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim();
    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LEARN_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Err(
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "missing subcommand").into(),
            );
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            ArgsError::UnknownArg(first.clone())
        })?,
    };

    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&args.db_url)?;
    debug!(db_url = %args.db_url, command = ?cmd, "opening database");
    let app = AppServices::new_sqlite(&args.db_url, Clock::system()).await?;

    match cmd {
        Command::Enroll => {
            let enrollment = app.enrollments().enroll(args.user()?, args.course()?).await?;
            print_json(&enrollment)
        }
        Command::Cancel => {
            let enrollment = app
                .enrollments()
                .cancel_enrollment(args.user()?, args.course()?)
                .await?;
            print_json(&enrollment)
        }
        Command::Record => {
            let record = app
                .progress()
                .record_progress(
                    args.user()?,
                    args.course()?,
                    args.video()?,
                    required(args.progress, "--progress")?,
                    args.position.unwrap_or(0.0),
                )
                .await?;
            print_json(&record)
        }
        Command::Progress => {
            let report = app
                .progress()
                .get_course_progress(args.user()?, args.course()?)
                .await?;
            print_json(&report)
        }
        Command::Resume => {
            let resume = app
                .progress()
                .get_video_progress(args.user()?, args.video()?)
                .await?;
            print_json(&resume)
        }
        Command::Courses => {
            let courses = app
                .course_views()
                .list_enrolled_courses(args.user()?)
                .await?;
            print_json(&courses)
        }
        Command::Course => {
            let course = app
                .course_views()
                .get_enrolled_course(args.user()?, args.course()?)
                .await?;
            print_json(&course)
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
