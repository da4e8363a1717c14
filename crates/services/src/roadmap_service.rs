use std::sync::{Arc, Mutex, MutexGuard};

use assess_core::Clock;
use assess_core::model::{StudentId, TaskId};
use assess_core::roadmap::RoadmapProgress;
use storage::repository::RoadmapRepository;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::error::RoadmapServiceError;
use crate::gateway::ProgressGateway;
use crate::notifier::Notifier;

/// Result of one toggle, after the local state changed.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskToggle {
    pub task_id: TaskId,
    pub completed: bool,
    pub completion_percentage: f64,
    /// The backend accepted the change. A failed sync keeps the local value.
    pub synced: bool,
}

/// Roadmap completion for one student.
///
/// Toggles apply locally first and are then pushed to the backend best-effort;
/// a failed push is reported but never reverted.
///
/// Writes are serialized so the stored copy and the backend see toggles in the
/// same order as the in-memory state.
pub struct RoadmapProgressTracker {
    student_id: StudentId,
    progress: Mutex<RoadmapProgress>,
    writes: AsyncMutex<()>,
    repository: Arc<dyn RoadmapRepository>,
    remote: Arc<dyn ProgressGateway>,
    notifier: Arc<dyn Notifier>,
    clock: Clock,
}

impl RoadmapProgressTracker {
    /// Load the roadmap, preferring the local copy and falling back to the backend.
    ///
    /// # Errors
    ///
    /// Returns `RoadmapServiceError::Unavailable` if neither source has one, or
    /// `RoadmapServiceError::Storage` if the local copy cannot be read or written.
    pub async fn load(
        student_id: StudentId,
        repository: Arc<dyn RoadmapRepository>,
        remote: Arc<dyn ProgressGateway>,
        notifier: Arc<dyn Notifier>,
        clock: Clock,
    ) -> Result<Self, RoadmapServiceError> {
        let progress = if let Some(progress) = repository.load_roadmap(&student_id).await? {
            progress
        } else {
            let roadmap = remote.fetch_roadmap(&student_id).await.map_err(|err| {
                warn!(student = %student_id, error = %err, "roadmap fetch failed");
                RoadmapServiceError::Unavailable
            })?;
            repository.save_roadmap(&student_id, &roadmap, clock.now()).await?;
            RoadmapProgress::new(roadmap)
        };

        Ok(Self {
            student_id,
            progress: Mutex::new(progress),
            writes: AsyncMutex::new(()),
            repository,
            remote,
            notifier,
            clock,
        })
    }

    /// Replace the local copy with the backend's tree.
    ///
    /// # Errors
    ///
    /// Returns `RoadmapServiceError::Unavailable` if the fetch fails.
    pub async fn refresh(&self) -> Result<(), RoadmapServiceError> {
        let _writes = self.writes.lock().await;
        let roadmap = self.remote.fetch_roadmap(&self.student_id).await.map_err(|err| {
            warn!(student = %self.student_id, error = %err, "roadmap refresh failed");
            RoadmapServiceError::Unavailable
        })?;
        self.repository
            .save_roadmap(&self.student_id, &roadmap, self.clock.now())
            .await?;
        *self.lock()? = RoadmapProgress::new(roadmap);
        Ok(())
    }

    #[must_use]
    pub fn student_id(&self) -> &StudentId {
        &self.student_id
    }

    /// Copy of the current state.
    ///
    /// # Errors
    ///
    /// Returns `RoadmapServiceError::Poisoned` if a writer panicked.
    pub fn snapshot(&self) -> Result<RoadmapProgress, RoadmapServiceError> {
        Ok(self.lock()?.clone())
    }

    /// # Errors
    ///
    /// Returns `RoadmapServiceError::Poisoned` if a writer panicked.
    pub fn completion_percentage(&self) -> Result<f64, RoadmapServiceError> {
        Ok(self.lock()?.completion_percentage())
    }

    /// Flip one task, persist it locally, then sync it remotely.
    ///
    /// # Errors
    ///
    /// Returns `RoadmapServiceError::UnknownTask` for an id outside the
    /// roadmap. Persistence and sync failures are logged, not returned.
    pub async fn toggle_task(&self, task_id: &TaskId) -> Result<TaskToggle, RoadmapServiceError> {
        // held until the backend has been told, so a later toggle cannot overtake
        let _writes = self.writes.lock().await;
        let (completed, completion_percentage) = {
            let mut progress = self.lock()?;
            if !progress.roadmap().contains_task(task_id) {
                return Err(RoadmapServiceError::UnknownTask(task_id.clone()));
            }
            let completed = progress.toggle_task(task_id);
            (completed, progress.completion_percentage())
        };

        if let Err(err) = self
            .repository
            .set_task_completed(&self.student_id, task_id, completed, self.clock.now())
            .await
        {
            warn!(task = %task_id, error = %err, "could not persist task completion");
        }

        let synced = match self
            .remote
            .update_task_completion(&self.student_id, task_id, completed)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                warn!(task = %task_id, error = %err, "task completion not synced");
                self.notifier
                    .warning("Progress saved on this device; it will not appear elsewhere yet");
                false
            }
        };
        info!(task = %task_id, completed, completion_percentage, synced, "task toggled");

        Ok(TaskToggle {
            task_id: task_id.clone(),
            completed,
            completion_percentage,
            synced,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, RoadmapProgress>, RoadmapServiceError> {
        self.progress
            .lock()
            .map_err(|_| RoadmapServiceError::Poisoned)
    }
}
