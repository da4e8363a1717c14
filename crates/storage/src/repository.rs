use async_trait::async_trait;
use assess_core::analysis::{AnalysisKind, AnalysisResult};
use assess_core::model::{ResultId, StudentId, SubmissionId, TaskId};
use assess_core::reconcile::TopicStatistics;
use assess_core::roadmap::{Roadmap, RoadmapProgress};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Cached topic statistics together with when they were fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedStatistics {
    pub statistics: TopicStatistics,
    pub fetched_at: DateTime<Utc>,
}

/// Append-only history of analysis results, grouped by submission.
#[async_trait]
pub trait AnalysisResultRepository: Send + Sync {
    /// Append a result to the history of `submission_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a result with the same id exists.
    async fn append_result(
        &self,
        submission_id: &SubmissionId,
        result: &AnalysisResult,
        created_at: DateTime<Utc>,
    ) -> Result<i64, StorageError>;

    /// Results for a submission, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on persistence failures.
    async fn list_results(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<Vec<AnalysisResult>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no result has this id.
    async fn get_result(&self, result_id: &ResultId) -> Result<AnalysisResult, StorageError>;

    /// Most recently appended result of `kind` for a submission.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on persistence failures.
    async fn latest_result(
        &self,
        submission_id: &SubmissionId,
        kind: AnalysisKind,
    ) -> Result<Option<AnalysisResult>, StorageError>;
}

/// Local copy of the backend's per-student topic statistics.
#[async_trait]
pub trait TopicStatisticsRepository: Send + Sync {
    /// Replace the cached statistics of a student.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on persistence failures.
    async fn cache_statistics(
        &self,
        student_id: &StudentId,
        statistics: &TopicStatistics,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on persistence failures.
    async fn cached_statistics(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<CachedStatistics>, StorageError>;
}

/// Local, authoritative-for-the-session copy of a student's roadmap.
#[async_trait]
pub trait RoadmapRepository: Send + Sync {
    /// Store a roadmap tree, discarding previously stored per-task overrides.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on persistence failures.
    async fn save_roadmap(
        &self,
        student_id: &StudentId,
        roadmap: &Roadmap,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Load the roadmap with stored completion overrides applied.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on persistence or decoding failures.
    async fn load_roadmap(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<RoadmapProgress>, StorageError>;

    /// Record one task's completion state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on persistence failures.
    async fn set_task_completed(
        &self,
        student_id: &StudentId,
        task_id: &TaskId,
        completed: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
struct StoredResult {
    submission_id: SubmissionId,
    result: AnalysisResult,
}

#[derive(Debug, Clone, Default)]
struct StoredRoadmap {
    roadmap: Roadmap,
    overrides: Vec<(TaskId, bool)>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    results: Arc<Mutex<Vec<StoredResult>>>,
    statistics: Arc<Mutex<HashMap<StudentId, CachedStatistics>>>,
    roadmaps: Arc<Mutex<HashMap<StudentId, StoredRoadmap>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl AnalysisResultRepository for InMemoryRepository {
    async fn append_result(
        &self,
        submission_id: &SubmissionId,
        result: &AnalysisResult,
        _created_at: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let mut guard = self.results.lock().map_err(poisoned)?;
        if guard.iter().any(|r| r.result.result_id() == result.result_id()) {
            return Err(StorageError::Conflict);
        }
        guard.push(StoredResult {
            submission_id: submission_id.clone(),
            result: result.clone(),
        });
        i64::try_from(guard.len()).map_err(|_| StorageError::Serialization("row id overflow".into()))
    }

    async fn list_results(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<Vec<AnalysisResult>, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        Ok(guard
            .iter()
            .filter(|r| &r.submission_id == submission_id)
            .map(|r| r.result.clone())
            .collect())
    }

    async fn get_result(&self, result_id: &ResultId) -> Result<AnalysisResult, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        guard
            .iter()
            .find(|r| r.result.result_id() == result_id)
            .map(|r| r.result.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn latest_result(
        &self,
        submission_id: &SubmissionId,
        kind: AnalysisKind,
    ) -> Result<Option<AnalysisResult>, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        Ok(guard
            .iter()
            .rev()
            .find(|r| &r.submission_id == submission_id && r.result.kind() == kind)
            .map(|r| r.result.clone()))
    }
}

#[async_trait]
impl TopicStatisticsRepository for InMemoryRepository {
    async fn cache_statistics(
        &self,
        student_id: &StudentId,
        statistics: &TopicStatistics,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.statistics.lock().map_err(poisoned)?;
        guard.insert(
            student_id.clone(),
            CachedStatistics {
                statistics: statistics.clone(),
                fetched_at,
            },
        );
        Ok(())
    }

    async fn cached_statistics(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<CachedStatistics>, StorageError> {
        let guard = self.statistics.lock().map_err(poisoned)?;
        Ok(guard.get(student_id).cloned())
    }
}

#[async_trait]
impl RoadmapRepository for InMemoryRepository {
    async fn save_roadmap(
        &self,
        student_id: &StudentId,
        roadmap: &Roadmap,
        _updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.roadmaps.lock().map_err(poisoned)?;
        guard.insert(
            student_id.clone(),
            StoredRoadmap {
                roadmap: roadmap.clone(),
                overrides: Vec::new(),
            },
        );
        Ok(())
    }

    async fn load_roadmap(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<RoadmapProgress>, StorageError> {
        let guard = self.roadmaps.lock().map_err(poisoned)?;
        Ok(guard.get(student_id).map(|stored| {
            let mut progress = RoadmapProgress::new(stored.roadmap.clone());
            for (task_id, completed) in &stored.overrides {
                progress.set_completed(task_id, *completed);
            }
            progress
        }))
    }

    async fn set_task_completed(
        &self,
        student_id: &StudentId,
        task_id: &TaskId,
        completed: bool,
        _updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.roadmaps.lock().map_err(poisoned)?;
        let stored = guard.get_mut(student_id).ok_or(StorageError::NotFound)?;
        stored.overrides.retain(|(id, _)| id != task_id);
        stored.overrides.push((task_id.clone(), completed));
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub results: Arc<dyn AnalysisResultRepository>,
    pub statistics: Arc<dyn TopicStatisticsRepository>,
    pub roadmaps: Arc<dyn RoadmapRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            results: Arc::new(repo.clone()),
            statistics: Arc::new(repo.clone()),
            roadmaps: Arc::new(repo),
        }
    }
}
