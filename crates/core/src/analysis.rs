//! Results produced by the four analysis stages.
//!
//! Results are created once (remotely, or locally as a fallback) and never
//! mutated afterwards; the history of a submission is append-only.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::accuracy::ratio;
use crate::improvement::ImprovementRecord;
use crate::model::{AssignmentId, Question, QuestionId, ResultId, UNKNOWN_TOPIC, is_unknown_topic};

//
// ─── STAGE 1: FEEDBACK ─────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackItem {
    #[serde(default)]
    pub question_id: Option<QuestionId>,
    /// Question text echoed back by the backend, used when ids do not line up.
    #[serde(default)]
    pub question: Option<String>,
    pub is_correct: bool,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub difficulty_level: Option<String>,
}

impl FeedbackItem {
    #[must_use]
    pub fn topic(&self) -> &str {
        match self.topic.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => UNKNOWN_TOPIC,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicBreakdown {
    pub topic: String,
    pub correct: u32,
    pub total: u32,
    pub accuracy_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackSummary {
    pub total_questions: u32,
    pub correct_count: u32,
    pub accuracy_percentage: f64,
    #[serde(default, alias = "topic_breakdown")]
    pub topic_breakdown: Option<Vec<TopicBreakdown>>,
}

impl FeedbackSummary {
    /// Summarize a list of feedback items, including a topic breakdown.
    #[must_use]
    pub fn from_items(items: &[FeedbackItem]) -> Self {
        let total = u32::try_from(items.len()).unwrap_or(u32::MAX);
        let correct = u32::try_from(items.iter().filter(|i| i.is_correct).count()).unwrap_or(u32::MAX);
        Self {
            total_questions: total,
            correct_count: correct,
            accuracy_percentage: ratio(correct, total) * 100.0,
            topic_breakdown: Some(breakdown_from_items(items)),
        }
    }
}

fn breakdown_from_items(items: &[FeedbackItem]) -> Vec<TopicBreakdown> {
    let mut counts: IndexMap<&str, (u32, u32)> = IndexMap::new();
    for item in items {
        let entry = counts.entry(item.topic()).or_insert((0, 0));
        entry.1 = entry.1.saturating_add(1);
        if item.is_correct {
            entry.0 = entry.0.saturating_add(1);
        }
    }
    counts
        .into_iter()
        .map(|(topic, (correct, total))| TopicBreakdown {
            topic: topic.to_owned(),
            correct,
            total,
            accuracy_percentage: ratio(correct, total) * 100.0,
        })
        .collect()
}

/// Per-question feedback for one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackAnalysis {
    pub result_id: ResultId,
    pub subject: String,
    pub feedback: Vec<FeedbackItem>,
    #[serde(default)]
    pub summary: Option<FeedbackSummary>,
}

impl FeedbackAnalysis {
    /// Topic breakdown as reported, or recomputed from the feedback list.
    ///
    /// Returns `None` when neither is available.
    #[must_use]
    pub fn topic_breakdown(&self) -> Option<Vec<TopicBreakdown>> {
        if let Some(given) = self
            .summary
            .as_ref()
            .and_then(|s| s.topic_breakdown.as_ref())
        {
            return Some(given.clone());
        }
        if self.feedback.is_empty() {
            return None;
        }
        Some(breakdown_from_items(&self.feedback))
    }

    /// Feedback item for `question`: exact id first, then normalized question text.
    ///
    /// When several items match, the first one wins.
    #[must_use]
    pub fn find_for(&self, question: &Question) -> Option<&FeedbackItem> {
        self.feedback
            .iter()
            .find(|item| item.question_id.as_ref() == Some(&question.id))
            .or_else(|| {
                let wanted = normalize_text(&question.text);
                if wanted.is_empty() {
                    return None;
                }
                self.feedback.iter().find(|item| {
                    item.question
                        .as_deref()
                        .is_some_and(|text| normalize_text(text) == wanted)
                })
            })
    }
}

/// Lowercase, trim and collapse internal whitespace.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

//
// ─── STAGE 2: RECOMMENDATION ───────────────────────────────────────────────────
//

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyRecommendation {
    #[serde(default)]
    pub study_focus: Option<String>,
    #[serde(default)]
    pub practice_suggestion: Option<String>,
    #[serde(default)]
    pub resource_hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeakTopic {
    pub topic: String,
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub recommendation: StudyRecommendation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationAnalysis {
    pub result_id: ResultId,
    pub subject: String,
    #[serde(default)]
    pub overall_advice: String,
    #[serde(default)]
    pub weak_topics: Vec<WeakTopic>,
}

impl RecommendationAnalysis {
    /// Weak topic names usable for practice generation, sentinels removed.
    #[must_use]
    pub fn practicable_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = Vec::new();
        for weak in &self.weak_topics {
            if !is_unknown_topic(&weak.topic) && !topics.contains(&weak.topic) {
                topics.push(weak.topic.clone());
            }
        }
        topics
    }
}

//
// ─── STAGE 3: PRACTICE ─────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeQuestion {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: Option<usize>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSet {
    pub result_id: ResultId,
    pub subject: String,
    pub assignment_id: AssignmentId,
    pub questions: Vec<PracticeQuestion>,
}

//
// ─── TAGGED RESULT ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Feedback,
    Recommendation,
    Practice,
    Improvement,
}

impl AnalysisKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Feedback => "feedback",
            Self::Recommendation => "recommendation",
            Self::Practice => "practice",
            Self::Improvement => "improvement",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "feedback" => Some(Self::Feedback),
            "recommendation" => Some(Self::Recommendation),
            "practice" => Some(Self::Practice),
            "improvement" => Some(Self::Improvement),
            _ => None,
        }
    }
}

/// Output of one analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum AnalysisResult {
    Feedback(FeedbackAnalysis),
    Recommendation(RecommendationAnalysis),
    Practice(PracticeSet),
    Improvement(ImprovementRecord),
}

impl AnalysisResult {
    #[must_use]
    pub fn kind(&self) -> AnalysisKind {
        match self {
            Self::Feedback(_) => AnalysisKind::Feedback,
            Self::Recommendation(_) => AnalysisKind::Recommendation,
            Self::Practice(_) => AnalysisKind::Practice,
            Self::Improvement(_) => AnalysisKind::Improvement,
        }
    }

    #[must_use]
    pub fn result_id(&self) -> &ResultId {
        match self {
            Self::Feedback(r) => &r.result_id,
            Self::Recommendation(r) => &r.result_id,
            Self::Practice(r) => &r.result_id,
            Self::Improvement(r) => &r.result_id,
        }
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        match self {
            Self::Feedback(r) => &r.subject,
            Self::Recommendation(r) => &r.subject,
            Self::Practice(r) => &r.subject,
            Self::Improvement(r) => &r.subject,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnswerOption;

    fn item(id: Option<&str>, text: Option<&str>, correct: bool, topic: &str) -> FeedbackItem {
        FeedbackItem {
            question_id: id.map(QuestionId::new),
            question: text.map(str::to_owned),
            is_correct: correct,
            explanation: format!("explains {topic}"),
            topic: Some(topic.to_owned()),
            difficulty_level: None,
        }
    }

    fn analysis(feedback: Vec<FeedbackItem>, summary: Option<FeedbackSummary>) -> FeedbackAnalysis {
        FeedbackAnalysis {
            result_id: ResultId::new("r1"),
            subject: "Math".into(),
            feedback,
            summary,
        }
    }

    fn question(id: &str, text: &str) -> Question {
        Question {
            id: QuestionId::new(id),
            text: text.into(),
            topic: None,
            difficulty_level: None,
            options: vec![AnswerOption { id: "a".into(), text: "A".into() }],
            correct_option_id: "a".into(),
        }
    }

    #[test]
    fn breakdown_is_recomputed_when_missing() {
        let fa = analysis(
            vec![
                item(Some("1"), None, true, "Algebra"),
                item(Some("2"), None, false, "Algebra"),
                item(Some("3"), None, true, "Geometry"),
            ],
            Some(FeedbackSummary {
                total_questions: 3,
                correct_count: 2,
                accuracy_percentage: 66.7,
                topic_breakdown: None,
            }),
        );

        let breakdown = fa.topic_breakdown().unwrap();
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].topic, "Algebra");
        assert_eq!((breakdown[0].correct, breakdown[0].total), (1, 2));
        assert!((breakdown[0].accuracy_percentage - 50.0).abs() < 1e-9);
    }

    #[test]
    fn reported_breakdown_wins_and_empty_feedback_is_no_data() {
        let reported = vec![TopicBreakdown {
            topic: "Sets".into(),
            correct: 4,
            total: 5,
            accuracy_percentage: 80.0,
        }];
        let fa = analysis(
            vec![item(Some("1"), None, false, "Algebra")],
            Some(FeedbackSummary {
                total_questions: 1,
                correct_count: 0,
                accuracy_percentage: 0.0,
                topic_breakdown: Some(reported.clone()),
            }),
        );
        assert_eq!(fa.topic_breakdown(), Some(reported));
        assert_eq!(analysis(Vec::new(), None).topic_breakdown(), None);
    }

    #[test]
    fn matching_prefers_id_then_normalized_text() {
        let fa = analysis(
            vec![
                item(Some("99"), Some("What is  2+2?"), true, "A"),
                item(Some("7"), Some("Other"), false, "B"),
                item(None, Some("what is 2+2?"), false, "C"),
            ],
            None,
        );

        let by_id = fa.find_for(&question("7", "What is 2+2?")).unwrap();
        assert_eq!(by_id.topic(), "B");

        let by_text = fa.find_for(&question("1", "  WHAT IS 2+2? ")).unwrap();
        assert_eq!(by_text.topic(), "A", "first textual match wins");

        assert!(fa.find_for(&question("5", "Unrelated")).is_none());
        assert!(fa.find_for(&question("5", "   ")).is_none());
    }

    #[test]
    fn summary_from_items() {
        let summary = FeedbackSummary::from_items(&[
            item(None, None, true, "A"),
            item(None, None, false, "B"),
            item(None, None, true, "A"),
            item(None, None, true, "B"),
        ]);
        assert_eq!(summary.total_questions, 4);
        assert_eq!(summary.correct_count, 3);
        assert!((summary.accuracy_percentage - 75.0).abs() < 1e-9);
        assert_eq!(summary.topic_breakdown.unwrap().len(), 2);
    }

    #[test]
    fn practicable_topics_drop_sentinels_and_duplicates() {
        let rec = RecommendationAnalysis {
            result_id: ResultId::new("r2"),
            subject: "Math".into(),
            overall_advice: String::new(),
            weak_topics: ["Algebra", "Không xác định", "Unknown", "Algebra", "Sets"]
                .into_iter()
                .map(|t| WeakTopic {
                    topic: t.into(),
                    percentage: 20.0,
                    recommendation: StudyRecommendation::default(),
                })
                .collect(),
        };
        assert_eq!(rec.practicable_topics(), vec!["Algebra", "Sets"]);
    }

    #[test]
    fn tagged_result_exposes_id_subject_and_kind() {
        let result = AnalysisResult::Feedback(analysis(Vec::new(), None));
        assert_eq!(result.kind(), AnalysisKind::Feedback);
        assert_eq!(result.result_id().as_str(), "r1");
        assert_eq!(result.subject(), "Math");

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["kind"], "feedback");
        let back: AnalysisResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
        assert_eq!(AnalysisKind::parse("practice"), Some(AnalysisKind::Practice));
    }

    #[test]
    fn summary_accepts_snake_case_breakdown() {
        let json = r#"{"totalQuestions":1,"correctCount":1,"accuracyPercentage":100.0,
            "topic_breakdown":[{"topic":"A","correct":1,"total":1,"accuracyPercentage":100.0}]}"#;
        let summary: FeedbackSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.topic_breakdown.unwrap()[0].topic, "A");
    }
}
