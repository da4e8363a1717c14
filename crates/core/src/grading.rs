use serde::Serialize;

use crate::accuracy::{AccuracyReport, ratio};
use crate::analysis::FeedbackAnalysis;
use crate::model::{OptionId, QuestionId, Submission};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplanationSource {
    /// Placeholder written during local grading.
    Local,
    /// Replaced by stage-1 feedback.
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedQuestion {
    pub question_id: QuestionId,
    pub topic: String,
    pub chosen_option_id: Option<OptionId>,
    pub is_correct: bool,
    pub explanation: String,
    pub explanation_source: ExplanationSource,
}

/// Locally computed grading of a submission.
///
/// Correctness here is authoritative: remote feedback may replace explanations
/// but never flips a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalGrading {
    pub questions: Vec<GradedQuestion>,
    pub report: AccuracyReport,
}

impl LocalGrading {
    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.questions.iter().filter(|q| q.is_correct).count()
    }

    /// Accuracy over every question, unanswered ones counting as wrong.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let total = u32::try_from(self.questions.len()).unwrap_or(u32::MAX);
        let correct = u32::try_from(self.correct_count()).unwrap_or(u32::MAX);
        ratio(correct, total)
    }

    /// Copy stage-1 explanations onto matching questions. Returns how many matched.
    pub fn apply_feedback(&mut self, submission: &Submission, feedback: &FeedbackAnalysis) -> usize {
        let mut matched = 0;
        for graded in &mut self.questions {
            let Some(question) = submission.question(&graded.question_id) else {
                continue;
            };
            let Some(item) = feedback.find_for(question) else {
                continue;
            };
            if item.explanation.trim().is_empty() {
                continue;
            }
            graded.explanation.clone_from(&item.explanation);
            graded.explanation_source = ExplanationSource::Remote;
            matched += 1;
        }
        matched
    }
}

/// Grade every question of a submission without any remote call.
#[must_use]
pub fn grade_submission(submission: &Submission) -> LocalGrading {
    let questions = submission
        .questions
        .iter()
        .map(|question| {
            let chosen = submission.choice_for(&question.id).cloned();
            let is_correct = chosen.as_ref() == Some(&question.correct_option_id);
            let correct_text = question
                .option_text(&question.correct_option_id)
                .unwrap_or("?");
            let explanation = match (&chosen, is_correct) {
                (_, true) => "Correct.".to_owned(),
                (Some(_), false) => format!("Incorrect. Correct answer: {correct_text}"),
                (None, false) => format!("Not answered. Correct answer: {correct_text}"),
            };
            GradedQuestion {
                question_id: question.id.clone(),
                topic: question.topic().to_owned(),
                chosen_option_id: chosen,
                is_correct,
                explanation,
                explanation_source: ExplanationSource::Local,
            }
        })
        .collect();

    LocalGrading {
        questions,
        report: AccuracyReport::from_answers(&submission.answers()),
    }
}
