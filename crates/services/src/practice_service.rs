use std::sync::Arc;

use assess_core::Clock;
use assess_core::analysis::{AnalysisResult, PracticeSet, RecommendationAnalysis};
use assess_core::model::{AssignmentId, SubmissionId};
use assess_core::practice::{PracticeDifficulty, PracticeRequest};
use storage::repository::AnalysisResultRepository;
use tracing::{info, warn};

use crate::config::OrchestratorPolicy;
use crate::error::PracticeError;
use crate::gateway::{AnalysisGateway, call_detached};
use crate::notifier::Notifier;

/// Stage 3: targeted practice quizzes, generated on demand.
pub struct PracticeService {
    analysis: Arc<dyn AnalysisGateway>,
    results: Arc<dyn AnalysisResultRepository>,
    notifier: Arc<dyn Notifier>,
    policy: OrchestratorPolicy,
    clock: Clock,
}

impl PracticeService {
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

    /// Build a request from the weak topics of a stage-2 result.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::NoWeakTopics` if nothing practicable remains.
    pub fn request_for(
        recommendation: &RecommendationAnalysis,
        assignment_id: AssignmentId,
        difficulty: PracticeDifficulty,
        num_questions: u32,
    ) -> Result<PracticeRequest, PracticeError> {
        let topics = recommendation.practicable_topics();
        if topics.is_empty() {
            return Err(PracticeError::NoWeakTopics);
        }
        Ok(PracticeRequest {
            assignment_id,
            subject: recommendation.subject.clone(),
            topics,
            difficulty,
            num_questions,
        })
    }

    /// Validate, generate remotely, and append the set to the submission history.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Validation` before any network call for a bad
    /// request, or `PracticeError::Remote` if generation fails.
    pub async fn generate(
        &self,
        submission_id: &SubmissionId,
        request: PracticeRequest,
    ) -> Result<PracticeSet, PracticeError> {
        if let Err(err) = request.validate() {
            self.notifier.warning(&format!("Cannot generate practice: {err}"));
            return Err(err.into());
        }

        let analysis = Arc::clone(&self.analysis);
        let set = match call_detached(self.policy.stage_timeout, async move {
            analysis.generate_practice(&request).await
        })
        .await
        {
            Ok(set) => set,
            Err(err) => {
                warn!(submission = %submission_id, error = %err, "practice generation failed");
                self.notifier.warning("Practice questions could not be generated");
                return Err(err.into());
            }
        };

        if let Err(err) = self
            .results
            .append_result(submission_id, &AnalysisResult::Practice(set.clone()), self.clock.now())
            .await
        {
            warn!(submission = %submission_id, error = %err, "could not cache practice set");
        }
        info!(submission = %submission_id, questions = set.questions.len(), "practice generated");
        self.notifier.success("Practice questions are ready");
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assess_core::analysis::{StudyRecommendation, WeakTopic};
    use assess_core::model::ResultId;

    fn recommendation(topics: &[&str]) -> RecommendationAnalysis {
        RecommendationAnalysis {
            result_id: ResultId::new("rec"),
            subject: "Chemistry".into(),
            overall_advice: String::new(),
            weak_topics: topics
                .iter()
                .map(|t| WeakTopic {
                    topic: (*t).into(),
                    percentage: 30.0,
                    recommendation: StudyRecommendation::default(),
                })
                .collect(),
        }
    }

    #[test]
    fn request_uses_practicable_weak_topics() {
        let request = PracticeService::request_for(
            &recommendation(&["Stoichiometry", "Unknown"]),
            AssignmentId::new("as-9"),
            PracticeDifficulty::Hard,
            8,
        )
        .unwrap();
        assert_eq!(request.topics, vec!["Stoichiometry"]);
        assert_eq!(request.subject, "Chemistry");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn request_requires_some_weak_topic() {
        let err = PracticeService::request_for(
            &recommendation(&["Không xác định"]),
            AssignmentId::new("as-9"),
            PracticeDifficulty::Easy,
            5,
        )
        .unwrap_err();
        assert!(matches!(err, PracticeError::NoWeakTopics));
    }
}
