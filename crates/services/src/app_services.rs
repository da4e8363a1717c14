use std::sync::Arc;

use assess_core::model::StudentId;
use storage::repository::Storage;

use crate::Clock;
use crate::config::OrchestratorPolicy;
use crate::error::{AppServicesError, RoadmapServiceError};
use crate::evaluation_service::ImprovementService;
use crate::gateway::{AnalysisGateway, HttpGateway, ProgressGateway};
use crate::notifier::Notifier;
use crate::orchestrator::StageOrchestrator;
use crate::practice_service::PracticeService;
use crate::roadmap_service::RoadmapProgressTracker;

/// Assembles app-facing services over one storage backend and gateway pair.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    progress: Arc<dyn ProgressGateway>,
    notifier: Arc<dyn Notifier>,
    clock: Clock,
    orchestrator: Arc<StageOrchestrator>,
    improvement: Arc<ImprovementService>,
    practice: Arc<PracticeService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and the HTTP gateway from env.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage or gateway configuration fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let gateway = Arc::new(HttpGateway::from_env()?);
        let policy = OrchestratorPolicy::from_env()?;
        Ok(Self::new(storage, gateway.clone(), gateway, notifier, policy, clock))
    }

    #[must_use]
    pub fn new(
        storage: Storage,
        analysis: Arc<dyn AnalysisGateway>,
        progress: Arc<dyn ProgressGateway>,
        notifier: Arc<dyn Notifier>,
        policy: OrchestratorPolicy,
        clock: Clock,
    ) -> Self {
        let orchestrator = Arc::new(StageOrchestrator::new(
            Arc::clone(&analysis),
            Arc::clone(&storage.results),
            Arc::clone(&notifier),
            policy.clone(),
            clock,
        ));
        let improvement = Arc::new(ImprovementService::new(
            Arc::clone(&analysis),
            Arc::clone(&progress),
            Arc::clone(&storage.statistics),
            Arc::clone(&storage.results),
            Arc::clone(&notifier),
            policy.clone(),
            clock,
        ));
        let practice = Arc::new(PracticeService::new(
            analysis,
            Arc::clone(&storage.results),
            Arc::clone(&notifier),
            policy,
            clock,
        ));

        Self {
            storage,
            progress,
            notifier,
            clock,
            orchestrator,
            improvement,
            practice,
        }
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn orchestrator(&self) -> Arc<StageOrchestrator> {
        Arc::clone(&self.orchestrator)
    }

    #[must_use]
    pub fn improvement(&self) -> Arc<ImprovementService> {
        Arc::clone(&self.improvement)
    }

    #[must_use]
    pub fn practice(&self) -> Arc<PracticeService> {
        Arc::clone(&self.practice)
    }

    /// Load the roadmap tracker for a student.
    ///
    /// # Errors
    ///
    /// Returns `RoadmapServiceError` if no roadmap is available.
    pub async fn roadmap(&self, student_id: StudentId) -> Result<RoadmapProgressTracker, RoadmapServiceError> {
        RoadmapProgressTracker::load(
            student_id,
            Arc::clone(&self.storage.roadmaps),
            Arc::clone(&self.progress),
            Arc::clone(&self.notifier),
            self.clock,
        )
        .await
    }
}
