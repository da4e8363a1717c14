//! Request and response bodies exchanged with the analysis backend.
//!
//! Responses are decoded leniently: the backend may wrap a payload in a
//! `{ success, data, message }` envelope or return it bare, and most fields
//! are optional on the wire.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use assess_core::analysis::{
    FeedbackAnalysis, FeedbackItem, FeedbackSummary, PracticeQuestion, PracticeSet,
    RecommendationAnalysis, WeakTopic,
};
use assess_core::improvement::{ImprovementRecord, OverallImprovement, RecordSource, TopicImprovement};
use assess_core::model::{AssessmentId, AssignmentId, ResultId, StudentId, Submission, SubmissionId, TaskId};
use assess_core::reconcile::{ReconciledAccuracy, TopicStatistics};
use assess_core::roadmap::Phase;

use crate::error::GatewayError;

//
// ─── ENVELOPE ──────────────────────────────────────────────────────────────────
//

/// Strip a `{ success, data, message }` envelope if present.
///
/// # Errors
///
/// Returns `GatewayError::Unsuccessful` when the envelope reports failure.
pub fn unwrap_envelope(body: Value) -> Result<Value, GatewayError> {
    let Value::Object(mut map) = body else {
        return Ok(body);
    };
    let Some(success) = map.get("success").and_then(Value::as_bool) else {
        return Ok(Value::Object(map));
    };
    if !success {
        let message = map
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("request was not successful")
            .to_owned();
        return Err(GatewayError::Unsuccessful(message));
    }
    match map.remove("data") {
        Some(data) => Ok(data),
        None => Ok(Value::Object(map)),
    }
}

/// Unwrap the envelope and decode the payload.
///
/// # Errors
///
/// Returns `GatewayError::Unsuccessful` or `GatewayError::Decode`.
pub fn decode<T: DeserializeOwned>(body: Value) -> Result<T, GatewayError> {
    let payload = unwrap_envelope(body)?;
    serde_json::from_value(payload).map_err(|err| GatewayError::Decode(err.to_string()))
}

//
// ─── STAGE 1 ───────────────────────────────────────────────────────────────────
//

/// One graded question as sent for feedback. Option indices are 1-based; `0`
/// means the option could not be found (or the question was not answered).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackQuestion {
    pub question_id: String,
    pub question: String,
    pub topic: String,
    pub difficulty_level: Option<String>,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub student_answer: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub submission_id: SubmissionId,
    pub assessment_id: AssessmentId,
    pub student_id: StudentId,
    pub student_name: String,
    pub subject: String,
    pub questions: Vec<FeedbackQuestion>,
}

impl FeedbackRequest {
    #[must_use]
    pub fn from_submission(submission: &Submission) -> Self {
        let questions = submission
            .questions
            .iter()
            .map(|q| {
                let student_answer = submission
                    .choice_for(&q.id)
                    .and_then(|chosen| q.option_position(chosen))
                    .unwrap_or(0);
                FeedbackQuestion {
                    question_id: q.id.as_str().to_owned(),
                    question: q.text.clone(),
                    topic: q.topic().to_owned(),
                    difficulty_level: q.difficulty_level.clone(),
                    options: q.options.iter().map(|o| o.text.clone()).collect(),
                    correct_answer: q.option_position(&q.correct_option_id).unwrap_or(0),
                    student_answer,
                }
            })
            .collect();

        Self {
            submission_id: submission.id.clone(),
            assessment_id: submission.assessment_id.clone(),
            student_id: submission.student_id.clone(),
            student_name: submission.student_name.clone(),
            subject: submission.subject.clone(),
            questions,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    #[serde(default)]
    pub result_id: Option<ResultId>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub feedback: Option<Vec<FeedbackItem>>,
    #[serde(default)]
    pub summary: Option<FeedbackSummary>,
}

impl FeedbackResponse {
    /// # Errors
    ///
    /// Returns `GatewayError::MissingField` when no feedback list came back.
    pub fn into_analysis(self, subject: &str) -> Result<FeedbackAnalysis, GatewayError> {
        let feedback = self.feedback.ok_or(GatewayError::MissingField("feedback"))?;
        Ok(FeedbackAnalysis {
            result_id: self.result_id.unwrap_or_else(ResultId::generate),
            subject: non_empty_or(self.subject, subject),
            feedback,
            summary: self.summary,
        })
    }
}

//
// ─── STAGE 2 ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRequest {
    pub submission_id: SubmissionId,
    pub subject: String,
    pub feedback_result_id: ResultId,
    pub feedback_data: FeedbackAnalysis,
}

impl RecommendationRequest {
    #[must_use]
    pub fn new(submission_id: SubmissionId, feedback: FeedbackAnalysis) -> Self {
        Self {
            submission_id,
            subject: feedback.subject.clone(),
            feedback_result_id: feedback.result_id.clone(),
            feedback_data: feedback,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResponse {
    #[serde(default)]
    pub result_id: Option<ResultId>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub overall_advice: Option<String>,
    #[serde(default)]
    pub weak_topics: Option<Vec<WeakTopic>>,
}

impl RecommendationResponse {
    /// # Errors
    ///
    /// Returns `GatewayError::MissingField` when neither advice nor weak topics came back.
    pub fn into_analysis(self, subject: &str) -> Result<RecommendationAnalysis, GatewayError> {
        if self.overall_advice.is_none() && self.weak_topics.is_none() {
            return Err(GatewayError::MissingField("weakTopics"));
        }
        Ok(RecommendationAnalysis {
            result_id: self.result_id.unwrap_or_else(ResultId::generate),
            subject: non_empty_or(self.subject, subject),
            overall_advice: self.overall_advice.unwrap_or_default(),
            weak_topics: self.weak_topics.unwrap_or_default(),
        })
    }
}

//
// ─── STAGE 3 ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeResponse {
    #[serde(default)]
    pub result_id: Option<ResultId>,
    #[serde(default)]
    pub questions: Option<Vec<PracticeQuestion>>,
}

impl PracticeResponse {
    /// # Errors
    ///
    /// Returns `GatewayError::MissingField` when no question list came back.
    pub fn into_set(self, subject: &str, assignment_id: &AssignmentId) -> Result<PracticeSet, GatewayError> {
        let questions = self.questions.ok_or(GatewayError::MissingField("questions"))?;
        Ok(PracticeSet {
            result_id: self.result_id.unwrap_or_else(ResultId::generate),
            subject: subject.to_owned(),
            assignment_id: assignment_id.clone(),
            questions,
        })
    }
}

//
// ─── STAGE 4 ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicAccuracy {
    pub topic: String,
    pub accuracy: f64,
}

/// Previous and new accuracies (both in `[0, 1]`) for one submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImprovementRequest {
    pub submission_id: SubmissionId,
    pub student_id: StudentId,
    pub subject: String,
    pub previous_results: Vec<TopicAccuracy>,
    pub new_results: Vec<TopicAccuracy>,
}

impl ImprovementRequest {
    #[must_use]
    pub fn new(submission: &Submission, reconciled: &ReconciledAccuracy) -> Self {
        let mut previous_results = Vec::with_capacity(reconciled.new.len());
        let mut new_results = Vec::with_capacity(reconciled.new.len());
        for (topic, previous, new) in reconciled.pairs() {
            previous_results.push(TopicAccuracy { topic: topic.to_owned(), accuracy: previous });
            new_results.push(TopicAccuracy { topic: topic.to_owned(), accuracy: new });
        }
        Self {
            submission_id: submission.id.clone(),
            student_id: submission.student_id.clone(),
            subject: submission.subject.clone(),
            previous_results,
            new_results,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImprovementResponse {
    #[serde(default)]
    pub result_id: Option<ResultId>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, alias = "topicImprovements")]
    pub topics: Option<Vec<TopicImprovement>>,
    #[serde(default)]
    pub overall_improvement: Option<OverallImprovement>,
    #[serde(default)]
    pub next_action: Option<String>,
}

impl ImprovementResponse {
    /// A missing overall block is recomputed from the topic rows.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::MissingField` when no topic rows came back.
    pub fn into_record(self, subject: &str) -> Result<ImprovementRecord, GatewayError> {
        let topics = self.topics.ok_or(GatewayError::MissingField("topics"))?;
        let overall_improvement = self
            .overall_improvement
            .unwrap_or_else(|| OverallImprovement::from_topics(&topics));
        Ok(ImprovementRecord {
            result_id: self.result_id.unwrap_or_else(ResultId::generate),
            subject: non_empty_or(self.subject, subject),
            topics,
            overall_improvement,
            next_action: self.next_action.filter(|a| !a.trim().is_empty()),
            source: RecordSource::Remote,
        })
    }
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

/// Topic statistics arrive either as a `{topic: accuracy}` map or as a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StatisticsBody {
    Wrapped {
        #[serde(alias = "topicStatistics")]
        statistics: HashMap<String, f64>,
    },
    Map(HashMap<String, f64>),
    List(Vec<TopicAccuracy>),
}

/// Accuracies must already be in `[0, 1]`. A body on another scale is rejected
/// whole so the caller falls back to its cache instead of storing a wrong baseline.
impl TryFrom<StatisticsBody> for TopicStatistics {
    type Error = GatewayError;

    fn try_from(body: StatisticsBody) -> Result<Self, Self::Error> {
        let rows: Vec<(String, f64)> = match body {
            StatisticsBody::Wrapped { statistics } | StatisticsBody::Map(statistics) => {
                statistics.into_iter().collect()
            }
            StatisticsBody::List(rows) => rows.into_iter().map(|r| (r.topic, r.accuracy)).collect(),
        };
        if let Some((topic, accuracy)) = rows
            .iter()
            .find(|(_, accuracy)| !(0.0..=1.0).contains(accuracy))
        {
            warn!(%topic, accuracy, "topic statistics out of range");
            return Err(GatewayError::Decode(format!(
                "accuracy {accuracy} for topic {topic:?} is outside [0, 1]"
            )));
        }
        Ok(rows.into_iter().collect())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapResponse {
    #[serde(default)]
    pub phases: Option<Vec<Phase>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompletionUpdate {
    pub task_id: TaskId,
    pub completed: bool,
}

fn non_empty_or(value: Option<String>, fallback: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| fallback.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assess_core::improvement::Direction;
    use assess_core::model::{AnswerOption, Choice, Question};
    use serde_json::json;

    #[test]
    fn envelope_is_optional() {
        let bare = json!({"feedback": []});
        assert_eq!(unwrap_envelope(bare.clone()).unwrap(), bare);

        let wrapped = json!({"success": true, "data": {"feedback": []}, "message": "ok"});
        assert_eq!(unwrap_envelope(wrapped).unwrap(), json!({"feedback": []}));

        let failed = json!({"success": false, "message": "quota exceeded"});
        assert!(matches!(
            unwrap_envelope(failed),
            Err(GatewayError::Unsuccessful(msg)) if msg == "quota exceeded"
        ));
    }

    #[test]
    fn feedback_payload_uses_one_based_positions() {
        let submission = Submission {
            id: "s1".into(),
            assessment_id: 12_u64.into(),
            student_id: "st".into(),
            student_name: "Lan".into(),
            subject: "Math".into(),
            questions: vec![
                Question {
                    id: "q1".into(),
                    text: "2+2?".into(),
                    topic: None,
                    difficulty_level: Some("easy".into()),
                    options: vec![
                        AnswerOption { id: "a".into(), text: "3".into() },
                        AnswerOption { id: "b".into(), text: "4".into() },
                    ],
                    correct_option_id: "b".into(),
                },
                Question {
                    id: "q2".into(),
                    text: "1+1?".into(),
                    topic: Some("Arithmetic".into()),
                    difficulty_level: None,
                    options: vec![AnswerOption { id: "a".into(), text: "2".into() }],
                    correct_option_id: "a".into(),
                },
            ],
            choices: vec![Choice { question_id: "q1".into(), chosen_option_id: "a".into() }],
        };

        let request = FeedbackRequest::from_submission(&submission);
        assert_eq!(request.questions[0].correct_answer, 2);
        assert_eq!(request.questions[0].student_answer, 1);
        assert_eq!(request.questions[0].topic, "Unknown");
        assert_eq!(request.questions[1].student_answer, 0);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["assessmentId"], "12");
        assert_eq!(json["questions"][0]["correctAnswer"], 2);
    }

    #[test]
    fn feedback_response_fills_missing_ids() {
        let response: FeedbackResponse = decode(json!({
            "success": true,
            "data": {"feedback": [{"questionId": 7, "isCorrect": true}]}
        }))
        .unwrap();
        let analysis = response.into_analysis("Math").unwrap();
        assert!(analysis.result_id.is_local());
        assert_eq!(analysis.subject, "Math");
        assert_eq!(analysis.feedback[0].question_id.as_ref().unwrap().as_str(), "7");

        let empty: FeedbackResponse = decode(json!({})).unwrap();
        assert!(matches!(
            empty.into_analysis("Math"),
            Err(GatewayError::MissingField("feedback"))
        ));
    }

    #[test]
    fn improvement_response_recomputes_missing_overall() {
        let response: ImprovementResponse = decode(json!({
            "resultId": 41,
            "topics": [
                {"topic": "A", "previousAccuracy": 20.0, "newAccuracy": 60.0,
                 "improvement": 40.0, "status": "Tiến bộ rõ rệt"}
            ]
        }))
        .unwrap();
        let record = response.into_record("Math").unwrap();
        assert_eq!(record.result_id.as_str(), "41");
        assert_eq!(record.source, RecordSource::Remote);
        assert_eq!(record.overall_improvement.direction, Direction::Improving);
        assert!(record.is_breakthrough());
    }

    #[test]
    fn statistics_accept_map_list_and_wrapper() {
        let from_map: StatisticsBody = decode(json!({"Algebra": 0.5})).unwrap();
        let from_list: StatisticsBody = decode(json!([{"topic": "Algebra", "accuracy": 0.5}])).unwrap();
        let wrapped: StatisticsBody = decode(json!({"success": true, "data": {"statistics": {"Algebra": 0.5}}})).unwrap();

        for body in [from_map, from_list, wrapped] {
            let stats = TopicStatistics::try_from(body).unwrap();
            assert_eq!(stats.get("Algebra"), Some(0.5));
        }
    }

    #[test]
    fn percentage_scaled_statistics_are_rejected() {
        let body: StatisticsBody = decode(json!({"Algebra": 65.0, "Geometry": 0.4})).unwrap();
        assert!(matches!(
            TopicStatistics::try_from(body),
            Err(GatewayError::Decode(msg)) if msg.contains("Algebra")
        ));

        let negative: StatisticsBody = decode(json!([{"topic": "Algebra", "accuracy": -0.1}])).unwrap();
        assert!(TopicStatistics::try_from(negative).is_err());

        let edges: StatisticsBody = decode(json!({"Algebra": 0.0, "Geometry": 1.0})).unwrap();
        assert_eq!(TopicStatistics::try_from(edges).unwrap().len(), 2);
    }
}
