//! Shared error types for the services crate.

use std::time::Duration;

use thiserror::Error;

use assess_core::model::{SubmissionId, TaskId};
use assess_core::practice::PracticeValidationError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors from remote analysis and progress endpoints.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("remote analysis is not configured")]
    Disabled,
    #[error("request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("backend reported failure: {0}")]
    Unsuccessful(String),
    #[error("response is missing `{0}`")]
    MissingField(&'static str),
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// A remote call that ran on its own task under a deadline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StageCallError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("no response within {}s", .0.as_secs())]
    TimedOut(Duration),
    #[error("call task failed: {0}")]
    Join(String),
}

/// Errors while reading configuration from the environment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{key} is not a valid URL: {raw}")]
    InvalidUrl { key: &'static str, raw: String },
    #[error("{key} must be a non-negative integer, got {raw}")]
    InvalidNumber { key: &'static str, raw: String },
}

/// Errors emitted by `ImprovementService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EvaluationError {
    #[error("submission {0} is already being evaluated")]
    InFlight(SubmissionId),
    #[error("submission has no questions to evaluate")]
    NoData,
}

/// Errors emitted by `PracticeService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PracticeError {
    #[error(transparent)]
    Validation(#[from] PracticeValidationError),
    #[error("no weak topics available for practice")]
    NoWeakTopics,
    #[error(transparent)]
    Remote(#[from] StageCallError),
}

/// Errors emitted by `RoadmapProgressTracker`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RoadmapServiceError {
    #[error("no roadmap is available for this student")]
    Unavailable,
    #[error("task {0} is not part of the roadmap")]
    UnknownTask(TaskId),
    #[error("roadmap state lock poisoned")]
    Poisoned,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
