use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use assess_core::Clock;
use assess_core::accuracy::aggregate;
use assess_core::analysis::AnalysisResult;
use assess_core::improvement::{ImprovementRecord, evaluate_reconciled};
use assess_core::model::{StudentId, Submission, SubmissionId};
use assess_core::reconcile::{ReconciledAccuracy, TopicStatistics, reconcile};
use storage::repository::{AnalysisResultRepository, TopicStatisticsRepository};
use tracing::{info, warn};

use crate::config::OrchestratorPolicy;
use crate::error::EvaluationError;
use crate::gateway::{AnalysisGateway, ImprovementRequest, ProgressGateway, call_detached};
use crate::notifier::Notifier;

/// Where the historical statistics used for a comparison came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatisticsSource {
    Remote,
    Cache,
    /// Neither source was available; every topic compares against zero.
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImprovementOutcome {
    pub record: ImprovementRecord,
    pub reconciled: ReconciledAccuracy,
    pub statistics_source: StatisticsSource,
    /// Whether the backend acknowledged the submission as evaluated.
    pub marked_evaluated: bool,
}

/// Stage 4: compare a submission against the student's history.
///
/// Remote evaluation is preferred; any failure falls back to the same
/// computation done locally.
pub struct ImprovementService {
    analysis: Arc<dyn AnalysisGateway>,
    progress: Arc<dyn ProgressGateway>,
    statistics: Arc<dyn TopicStatisticsRepository>,
    results: Arc<dyn AnalysisResultRepository>,
    notifier: Arc<dyn Notifier>,
    policy: OrchestratorPolicy,
    clock: Clock,
    in_flight: Mutex<HashSet<SubmissionId>>,
}

impl ImprovementService {
    #[must_use]
    pub fn new(
        analysis: Arc<dyn AnalysisGateway>,
        progress: Arc<dyn ProgressGateway>,
        statistics: Arc<dyn TopicStatisticsRepository>,
        results: Arc<dyn AnalysisResultRepository>,
        notifier: Arc<dyn Notifier>,
        policy: OrchestratorPolicy,
        clock: Clock,
    ) -> Self {
        Self {
            analysis,
            progress,
            statistics,
            results,
            notifier,
            policy,
            clock,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Fetch topic statistics, refreshing the local cache on success.
    ///
    /// Falls back to the cached copy, then to an empty map.
    pub async fn load_statistics(&self, student_id: &StudentId) -> (TopicStatistics, StatisticsSource) {
        match self.progress.topic_statistics(student_id).await {
            Ok(statistics) => {
                if let Err(err) = self
                    .statistics
                    .cache_statistics(student_id, &statistics, self.clock.now())
                    .await
                {
                    warn!(student = %student_id, error = %err, "could not cache topic statistics");
                }
                (statistics, StatisticsSource::Remote)
            }
            Err(err) => {
                warn!(student = %student_id, error = %err, "topic statistics unavailable, trying cache");
                match self.statistics.cached_statistics(student_id).await {
                    Ok(Some(cached)) => (cached.statistics, StatisticsSource::Cache),
                    Ok(None) => (TopicStatistics::new(), StatisticsSource::Empty),
                    Err(err) => {
                        warn!(student = %student_id, error = %err, "statistics cache unreadable");
                        (TopicStatistics::new(), StatisticsSource::Empty)
                    }
                }
            }
        }
    }

    /// Evaluate improvement for a submission and record the result.
    ///
    /// # Errors
    ///
    /// Returns `EvaluationError::InFlight` if the same submission is already
    /// being evaluated, or `EvaluationError::NoData` if it has no questions.
    /// Unanswered questions count as wrong, so a blank quiz evaluates at 0%.
    pub async fn evaluate(&self, submission: &Submission) -> Result<ImprovementOutcome, EvaluationError> {
        let _guard = InFlightGuard::acquire(&self.in_flight, &submission.id)?;

        let snapshot = aggregate(&submission.answers());
        if snapshot.is_empty() {
            return Err(EvaluationError::NoData);
        }
        let (history, statistics_source) = self.load_statistics(&submission.student_id).await;
        let reconciled = reconcile(&snapshot, &history);

        let request = ImprovementRequest::new(submission, &reconciled);
        let analysis = Arc::clone(&self.analysis);
        let remote = call_detached(self.policy.stage_timeout, async move {
            analysis.evaluate_improvement(&request).await
        })
        .await;

        let record = match remote {
            Ok(record) => record,
            Err(err) => {
                warn!(submission = %submission.id, error = %err, "remote evaluation failed, computing locally");
                self.notifier
                    .warning("Progress was evaluated offline; details may be limited");
                evaluate_reconciled(&reconciled).with_subject(submission.subject.clone())
            }
        };

        let marked_evaluated = match self.progress.mark_submission_evaluated(&submission.id).await {
            Ok(()) => true,
            Err(err) => {
                warn!(submission = %submission.id, error = %err, "could not mark submission evaluated");
                false
            }
        };

        if let Err(err) = self
            .results
            .append_result(
                &submission.id,
                &AnalysisResult::Improvement(record.clone()),
                self.clock.now(),
            )
            .await
        {
            warn!(submission = %submission.id, error = %err, "could not cache improvement result");
        }

        if record.is_breakthrough() {
            self.notifier.success(&format!(
                "Breakthrough! Overall accuracy up {:.1} points",
                record.overall_improvement.improvement
            ));
        }
        info!(
            submission = %submission.id,
            source = ?record.source,
            improvement = record.overall_improvement.improvement,
            "improvement evaluated"
        );

        Ok(ImprovementOutcome {
            record,
            reconciled,
            statistics_source,
            marked_evaluated,
        })
    }
}

struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<SubmissionId>>,
    id: SubmissionId,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<SubmissionId>>, id: &SubmissionId) -> Result<Self, EvaluationError> {
        let mut guard = set.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if !guard.insert(id.clone()) {
            return Err(EvaluationError::InFlight(id.clone()));
        }
        Ok(Self { set, id: id.clone() })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut guard = self.set.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.remove(&self.id);
    }
}
