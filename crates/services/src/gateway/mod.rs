//! Seams to the remote analysis backend.
//!
//! Everything behind these traits may be slow, flaky or disabled; callers
//! treat every error as a degraded stage rather than a hard failure.

mod http;
pub mod wire;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use assess_core::analysis::{FeedbackAnalysis, PracticeSet, RecommendationAnalysis};
use assess_core::improvement::ImprovementRecord;
use assess_core::model::{StudentId, SubmissionId, TaskId};
use assess_core::practice::PracticeRequest;
use assess_core::reconcile::TopicStatistics;
use assess_core::roadmap::Roadmap;

use crate::error::{GatewayError, StageCallError};

pub use http::HttpGateway;
pub use wire::{FeedbackRequest, ImprovementRequest, RecommendationRequest};

/// The four analysis stages.
#[async_trait]
pub trait AnalysisGateway: Send + Sync {
    /// Stage 1: per-question feedback.
    async fn request_feedback(&self, request: &FeedbackRequest) -> Result<FeedbackAnalysis, GatewayError>;

    /// Stage 2: weak topics and study advice, built from stage-1 output.
    async fn request_recommendation(
        &self,
        request: &RecommendationRequest,
    ) -> Result<RecommendationAnalysis, GatewayError>;

    /// Stage 3: a targeted practice quiz.
    async fn generate_practice(&self, request: &PracticeRequest) -> Result<PracticeSet, GatewayError>;

    /// Stage 4: before/after comparison per topic.
    async fn evaluate_improvement(
        &self,
        request: &ImprovementRequest,
    ) -> Result<ImprovementRecord, GatewayError>;
}

/// Student-level progress kept by the backend.
#[async_trait]
pub trait ProgressGateway: Send + Sync {
    async fn topic_statistics(&self, student_id: &StudentId) -> Result<TopicStatistics, GatewayError>;

    /// Tell the backend the submission's evaluation finished, so its topic
    /// statistics can absorb it.
    async fn mark_submission_evaluated(&self, submission_id: &SubmissionId) -> Result<(), GatewayError>;

    async fn fetch_roadmap(&self, student_id: &StudentId) -> Result<Roadmap, GatewayError>;

    async fn update_task_completion(
        &self,
        student_id: &StudentId,
        task_id: &TaskId,
        completed: bool,
    ) -> Result<(), GatewayError>;
}

/// Run a remote call on its own task and wait at most `deadline` for it.
///
/// On timeout the join handle is dropped, which detaches the task: the
/// in-flight request keeps running and its late result is discarded.
///
/// # Errors
///
/// Returns `StageCallError` for gateway errors, timeouts and task failures.
pub async fn call_detached<T, Fut>(deadline: Duration, call: Fut) -> Result<T, StageCallError>
where
    T: Send + 'static,
    Fut: Future<Output = Result<T, GatewayError>> + Send + 'static,
{
    let handle = tokio::spawn(call);
    match tokio::time::timeout(deadline, handle).await {
        Ok(Ok(result)) => result.map_err(StageCallError::from),
        Ok(Err(join)) => Err(StageCallError::Join(join.to_string())),
        Err(_) => Err(StageCallError::TimedOut(deadline)),
    }
}
