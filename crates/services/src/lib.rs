#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod evaluation_service;
pub mod gateway;
pub mod notifier;
pub mod orchestrator;
pub mod practice_service;
pub mod roadmap_service;

pub use assess_core::Clock;

pub use app_services::AppServices;
pub use config::{GatewayConfig, OrchestratorPolicy};
pub use error::{
    AppServicesError, ConfigError, EvaluationError, GatewayError, PracticeError,
    RoadmapServiceError, StageCallError,
};
pub use evaluation_service::{ImprovementOutcome, ImprovementService, StatisticsSource};
pub use gateway::{AnalysisGateway, HttpGateway, ProgressGateway};
pub use notifier::{CollectingNotifier, Notice, NoticeLevel, Notifier, TracingNotifier};
pub use orchestrator::{StageOrchestrator, StageOutcome, StageState, SubmissionRun};
pub use practice_service::PracticeService;
pub use roadmap_service::{RoadmapProgressTracker, TaskToggle};
