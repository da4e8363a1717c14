mod report;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use assess_core::analysis::{AnalysisKind, AnalysisResult};
use assess_core::model::{AssignmentId, StudentId, Submission, SubmissionId, TaskId};
use assess_core::practice::PracticeDifficulty;
use serde::Serialize;
use services::{AppServices, Clock, PracticeService, TracingNotifier};
use storage::repository::AnalysisResultRepository;
use tracing_subscriber::EnvFilter;

use report::{EvaluationView, RoadmapView, RunView, TaskToggleView};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArg { what: &'static str },
    UnknownArg(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDifficulty { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArg { what } => write!(f, "missing {what}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDifficulty { raw } => {
                write!(f, "invalid --difficulty value: {raw} (easy, medium, hard)")
            }
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

const DEFAULT_DB_URL: &str = "sqlite://assess.sqlite3";

fn usage() -> String {
    format!(
        "Usage:
  cargo run -p app -- submit   <submission.json> [--db <sqlite_url>] [--no-wait]
  cargo run -p app -- evaluate <submission.json> [--db <sqlite_url>]
  cargo run -p app -- practice --submission <id> --assignment <id>
                               [--difficulty easy|medium|hard] [--count <n>] [--db <sqlite_url>]
  cargo run -p app -- roadmap  [--student <id>] [--toggle <task_id>]... [--refresh] [--db <sqlite_url>]
  cargo run -p app -- history  --submission <id> [--db <sqlite_url>]

Defaults:
  --db {DEFAULT_DB_URL}
  --difficulty medium, --count 10

Environment:
  ASSESS_DB_URL, ASSESS_STUDENT_ID
  ASSESS_API_BASE_URL, ASSESS_API_TOKEN, ASSESS_REQUEST_TIMEOUT_SECS
  ASSESS_STAGE_TIMEOUT_SECS, ASSESS_GRACE_SUCCESS_MS, ASSESS_GRACE_FAILURE_MS
  RUST_LOG (default: info)"
    )
}

fn print_usage() {
    eprintln!("{}", usage());
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Submit { file: PathBuf, wait: bool },
    Evaluate { file: PathBuf },
    Practice {
        submission: SubmissionId,
        assignment: AssignmentId,
        difficulty: PracticeDifficulty,
        count: u32,
    },
    Roadmap {
        student: StudentId,
        toggles: Vec<TaskId>,
        refresh: bool,
    },
    History { submission: SubmissionId },
}

#[derive(Debug)]
struct Args {
    db_url: String,
    command: Command,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let Some(name) = args.next() else {
            return Ok(None);
        };
        if matches!(name.as_str(), "--help" | "-h") {
            return Ok(None);
        }

        let mut db_url = std::env::var("ASSESS_DB_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
        let mut student = std::env::var("ASSESS_STUDENT_ID").ok().map(StudentId::new);
        let mut file: Option<PathBuf> = None;
        let mut submission: Option<SubmissionId> = None;
        let mut assignment: Option<AssignmentId> = None;
        let mut difficulty = PracticeDifficulty::default();
        let mut count: u32 = 10;
        let mut toggles = Vec::new();
        let mut refresh = false;
        let mut wait = true;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--student" => student = Some(StudentId::new(require_value(&mut args, "--student")?)),
                "--submission" => {
                    submission = Some(SubmissionId::new(require_value(&mut args, "--submission")?));
                }
                "--assignment" => {
                    assignment = Some(AssignmentId::new(require_value(&mut args, "--assignment")?));
                }
                "--difficulty" => {
                    let value = require_value(&mut args, "--difficulty")?;
                    difficulty = PracticeDifficulty::parse(&value)
                        .ok_or(ArgsError::InvalidDifficulty { raw: value })?;
                }
                "--count" => {
                    let value = require_value(&mut args, "--count")?;
                    count = value.parse().map_err(|_| ArgsError::InvalidNumber {
                        flag: "--count",
                        raw: value.clone(),
                    })?;
                }
                "--toggle" => toggles.push(TaskId::new(require_value(&mut args, "--toggle")?)),
                "--refresh" => refresh = true,
                "--no-wait" => wait = false,
                "--help" | "-h" => return Ok(None),
                other if !other.starts_with("--") && file.is_none() => file = Some(PathBuf::from(other)),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let command = match name.as_str() {
            "submit" => Command::Submit {
                file: file.ok_or(ArgsError::MissingArg { what: "<submission.json>" })?,
                wait,
            },
            "evaluate" => Command::Evaluate {
                file: file.ok_or(ArgsError::MissingArg { what: "<submission.json>" })?,
            },
            "practice" => Command::Practice {
                submission: submission.ok_or(ArgsError::MissingArg { what: "--submission" })?,
                assignment: assignment.ok_or(ArgsError::MissingArg { what: "--assignment" })?,
                difficulty,
                count,
            },
            "roadmap" => Command::Roadmap {
                student: student.ok_or(ArgsError::MissingArg { what: "--student" })?,
                toggles,
                refresh,
            },
            "history" => Command::History {
                submission: submission.ok_or(ArgsError::MissingArg { what: "--submission" })?,
            },
            _ => return Err(ArgsError::UnknownArg(name)),
        };

        Ok(Some(Self { db_url, command }))
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
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

fn read_submission(file: &PathBuf) -> Result<Submission, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(file)?;
    Ok(serde_json::from_str(&raw)?)
}

fn print_json(value: &impl Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing() {
    // stdout carries JSON output, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let parsed = match Args::parse(std::env::args().skip(1)) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(err) => {
            eprintln!("{err}");
            print_usage();
            return Err(err.into());
        }
    };

    prepare_sqlite_file(&parsed.db_url)?;
    let app = AppServices::new_sqlite(&parsed.db_url, Clock::default(), Arc::new(TracingNotifier)).await?;
    tracing::debug!(db = %parsed.db_url, "storage ready");

    match parsed.command {
        Command::Submit { file, wait } => {
            let submission = read_submission(&file)?;
            let orchestrator = app.orchestrator();
            let run = orchestrator.process(submission).await;
            print_json(&RunView::new(&run))?;
            if wait {
                orchestrator.await_continuation(&run).await;
            }
            Ok(())
        }
        Command::Evaluate { file } => {
            let submission = read_submission(&file)?;
            let outcome = app.improvement().evaluate(&submission).await?;
            print_json(&EvaluationView::new(&outcome))
        }
        Command::Practice {
            submission,
            assignment,
            difficulty,
            count,
        } => {
            let latest = app
                .storage()
                .results
                .latest_result(&submission, AnalysisKind::Recommendation)
                .await?;
            let Some(AnalysisResult::Recommendation(recommendation)) = latest else {
                return Err(format!("no recommendation recorded for submission {submission}").into());
            };
            let request = PracticeService::request_for(&recommendation, assignment, difficulty, count)?;
            let set = app.practice().generate(&submission, request).await?;
            print_json(&set)
        }
        Command::Roadmap {
            student,
            toggles,
            refresh,
        } => {
            let tracker = app.roadmap(student).await?;
            if refresh {
                tracker.refresh().await?;
            }
            let mut applied: Vec<TaskToggleView> = Vec::with_capacity(toggles.len());
            for task in &toggles {
                applied.push(tracker.toggle_task(task).await?.into());
            }
            let progress = tracker.snapshot()?;
            print_json(&RoadmapView::new(&progress, &applied))
        }
        Command::History { submission } => {
            let results = app.storage().results.list_results(&submission).await?;
            print_json(&results)
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

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Option<Args>, ArgsError> {
        Args::parse(args.iter().map(|a| (*a).to_owned()))
    }

    #[test]
    fn parses_practice_flags() {
        let args = parse(&[
            "practice",
            "--submission",
            "42",
            "--assignment",
            "asg",
            "--difficulty",
            "hard",
            "--count",
            "7",
            "--db",
            "sqlite::memory:",
        ])
        .unwrap()
        .unwrap();

        assert_eq!(args.db_url, "sqlite::memory:");
        assert_eq!(
            args.command,
            Command::Practice {
                submission: SubmissionId::new("42"),
                assignment: AssignmentId::new("asg"),
                difficulty: PracticeDifficulty::Hard,
                count: 7,
            }
        );
    }

    #[test]
    fn submit_takes_a_positional_file() {
        let args = parse(&["submit", "quiz.json", "--no-wait", "--db", "sqlite::memory:"])
            .unwrap()
            .unwrap();
        assert_eq!(
            args.command,
            Command::Submit {
                file: PathBuf::from("quiz.json"),
                wait: false,
            }
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            parse(&["practice", "--count", "many"]),
            Err(ArgsError::InvalidNumber { flag: "--count", .. })
        ));
        assert!(matches!(
            parse(&["evaluate", "--db", "sqlite::memory:"]),
            Err(ArgsError::MissingArg { .. })
        ));
        assert!(matches!(parse(&["grade"]), Err(ArgsError::UnknownArg(_))));
        assert!(matches!(parse(&["history", "--submission"]), Err(ArgsError::MissingValue { .. })));
        assert!(parse(&[]).unwrap().is_none());
    }

    #[test]
    fn usage_shows_the_real_default_database() {
        assert!(usage().contains("--db sqlite://assess.sqlite3"));
        assert_eq!(normalize_sqlite_url(DEFAULT_DB_URL.into()), DEFAULT_DB_URL);
    }

    #[test]
    fn normalizes_relative_sqlite_paths() {
        let url = normalize_sqlite_url("sqlite:data/assess.sqlite3".into());
        assert!(url.starts_with("sqlite:///") || url.starts_with("sqlite://"));
        assert!(url.ends_with("data/assess.sqlite3"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }
}
