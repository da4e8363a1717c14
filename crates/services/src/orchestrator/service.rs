use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use assess_core::Clock;
use assess_core::analysis::{AnalysisResult, FeedbackAnalysis, RecommendationAnalysis};
use assess_core::grading::{LocalGrading, grade_submission};
use assess_core::model::Submission;
use chrono::{DateTime, Utc};
use storage::repository::AnalysisResultRepository;
use tracing::{debug, info, warn};

use super::state::{StageEvent, StageOutcome, StageState};
use crate::config::OrchestratorPolicy;
use crate::error::GatewayError;
use crate::gateway::{AnalysisGateway, FeedbackRequest, RecommendationRequest, call_detached};
use crate::notifier::Notifier;

/// Everything known about one submission as it moves through the pipeline.
#[derive(Debug, Clone)]
pub struct SubmissionRun {
    submission: Submission,
    started_at: DateTime<Utc>,
    state: StageState,
    history: Vec<StageState>,
    grading: LocalGrading,
    feedback: StageOutcome<FeedbackAnalysis>,
    recommendation: StageOutcome<RecommendationAnalysis>,
}

impl SubmissionRun {
    #[must_use]
    pub fn submission(&self) -> &Submission {
        &self.submission
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn state(&self) -> StageState {
        self.state
    }

    /// Every state visited, in order, starting with `Grading`.
    #[must_use]
    pub fn history(&self) -> &[StageState] {
        &self.history
    }

    #[must_use]
    pub fn grading(&self) -> &LocalGrading {
        &self.grading
    }

    #[must_use]
    pub fn feedback(&self) -> &StageOutcome<FeedbackAnalysis> {
        &self.feedback
    }

    #[must_use]
    pub fn recommendation(&self) -> &StageOutcome<RecommendationAnalysis> {
        &self.recommendation
    }

    fn advance(&mut self, event: StageEvent) {
        match self.state.apply(event) {
            Ok(next) => {
                debug!(submission = %self.submission.id, from = %self.state, to = %next, "stage transition");
                self.state = next;
                self.history.push(next);
            }
            Err(err) => warn!(submission = %self.submission.id, error = %err, "ignored stage event"),
        }
    }
}

/// Drives grading and the two automatic analysis stages for a submission.
///
/// Stage failures never escape: they are logged, surfaced as a notice, and
/// recorded as a degraded outcome on the run.
pub struct StageOrchestrator {
    analysis: Arc<dyn AnalysisGateway>,
    results: Arc<dyn AnalysisResultRepository>,
    notifier: Arc<dyn Notifier>,
    policy: OrchestratorPolicy,
    clock: Clock,
}

impl StageOrchestrator {
    #[must_use]
    pub fn new(
        analysis: Arc<dyn AnalysisGateway>,
        results: Arc<dyn AnalysisResultRepository>,
        notifier: Arc<dyn Notifier>,
        policy: OrchestratorPolicy,
        clock: Clock,
    ) -> Self {
        Self {
            analysis,
            results,
            notifier,
            policy,
            clock,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &OrchestratorPolicy {
        &self.policy
    }

    /// Grade, request feedback, request recommendations, finalize.
    pub async fn process(&self, submission: Submission) -> SubmissionRun {
        let mut run = self.grade(submission);
        self.run_feedback(&mut run).await;
        self.run_recommendation(&mut run).await;
        self.finalize(&mut run);
        run
    }

    /// Grade locally. Results are available immediately, before any remote call.
    #[must_use]
    pub fn grade(&self, submission: Submission) -> SubmissionRun {
        let grading = grade_submission(&submission);
        info!(
            submission = %submission.id,
            correct = grading.correct_count(),
            total = grading.questions.len(),
            "graded locally"
        );
        let mut run = SubmissionRun {
            submission,
            started_at: self.clock.now(),
            state: StageState::Grading,
            history: vec![StageState::Grading],
            grading,
            feedback: StageOutcome::Pending,
            recommendation: StageOutcome::Pending,
        };
        run.advance(StageEvent::Graded);
        run
    }

    /// Stage 1. On success, explanations replace the local placeholders.
    pub async fn run_feedback(&self, run: &mut SubmissionRun) {
        if run.state != StageState::Stage1Pending {
            return;
        }
        let request = FeedbackRequest::from_submission(&run.submission);
        let outcome = self
            .call_stage("feedback", move |gateway| async move {
                gateway.request_feedback(&request).await
            })
            .await;

        match outcome {
            Ok(feedback) => {
                let matched = run.grading.apply_feedback(&run.submission, &feedback);
                debug!(submission = %run.submission.id, matched, "applied remote explanations");
                self.persist(run, AnalysisResult::Feedback(feedback.clone())).await;
                run.feedback = StageOutcome::Completed(feedback);
                run.advance(StageEvent::FeedbackSucceeded);
                self.notifier.info("Detailed feedback is ready");
            }
            Err(reason) => {
                run.feedback = StageOutcome::Degraded(reason);
                run.recommendation = StageOutcome::Skipped;
                run.advance(StageEvent::FeedbackFailed);
                self.notifier
                    .warning("Detailed feedback is unavailable; showing local results");
            }
        }
    }

    /// Stage 2. Only runs after a successful stage 1.
    pub async fn run_recommendation(&self, run: &mut SubmissionRun) {
        let Some(feedback) = run.feedback.completed().cloned() else {
            return;
        };
        if run.state != StageState::Stage1Done {
            return;
        }
        run.advance(StageEvent::RecommendationRequested);

        let request = RecommendationRequest::new(run.submission.id.clone(), feedback);
        let outcome = self
            .call_stage("recommendation", move |gateway| async move {
                gateway.request_recommendation(&request).await
            })
            .await;

        match outcome {
            Ok(recommendation) => {
                self.persist(run, AnalysisResult::Recommendation(recommendation.clone()))
                    .await;
                run.recommendation = StageOutcome::Completed(recommendation);
                run.advance(StageEvent::RecommendationSucceeded);
                self.notifier.success("Study recommendations are ready");
            }
            Err(reason) => {
                run.recommendation = StageOutcome::Degraded(reason);
                run.advance(StageEvent::RecommendationFailed);
                self.notifier.warning("Study recommendations are unavailable");
            }
        }
    }

    /// Finalize the run and return the grace window before continuing.
    pub fn finalize(&self, run: &mut SubmissionRun) -> Duration {
        run.advance(StageEvent::Finalize);
        let grace = run
            .state
            .grace_window(&self.policy)
            .unwrap_or(self.policy.failure_grace);
        info!(submission = %run.submission.id, state = %run.state, grace = ?grace, "submission finalized");
        grace
    }

    /// Wait out the grace window of a finalized run.
    pub async fn await_continuation(&self, run: &SubmissionRun) {
        if let Some(grace) = run.state.grace_window(&self.policy) {
            tokio::time::sleep(grace).await;
        }
    }

    async fn call_stage<T, F, Fut>(&self, stage: &'static str, call: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn AnalysisGateway>) -> Fut,
        Fut: Future<Output = Result<T, GatewayError>> + Send + 'static,
    {
        call_detached(self.policy.stage_timeout, call(Arc::clone(&self.analysis)))
            .await
            .map_err(|err| {
                warn!(stage, error = %err, "analysis stage degraded");
                err.to_string()
            })
    }

    async fn persist(&self, run: &SubmissionRun, result: AnalysisResult) {
        if let Err(err) = self
            .results
            .append_result(&run.submission.id, &result, self.clock.now())
            .await
        {
            warn!(
                submission = %run.submission.id,
                kind = result.kind().as_str(),
                error = %err,
                "could not cache analysis result"
            );
        }
    }
}
