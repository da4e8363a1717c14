use serde::{Deserialize, Serialize};

use crate::model::ids::{AssessmentId, OptionId, QuestionId, StudentId, SubmissionId};

/// Bucket used for answers whose question carries no topic.
pub const UNKNOWN_TOPIC: &str = "Unknown";

/// Localized form of [`UNKNOWN_TOPIC`] emitted by the analysis backend.
pub const UNKNOWN_TOPIC_LOCALIZED: &str = "Không xác định";

/// Bucket used for answers whose question carries no difficulty level.
pub const UNKNOWN_DIFFICULTY: &str = "Unknown";

/// Returns true for the unattributed-topic sentinels (and blank names).
#[must_use]
pub fn is_unknown_topic(topic: &str) -> bool {
    let trimmed = topic.trim();
    trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case(UNKNOWN_TOPIC)
        || trimmed == UNKNOWN_TOPIC_LOCALIZED
}

fn bucket_or<'a>(value: Option<&'a str>, fallback: &'a str) -> &'a str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => fallback,
    }
}

//
// ─── ANSWER ────────────────────────────────────────────────────────────────────
//

/// A student's response to one question. Correctness is derived, never
/// stored; a question left blank has no chosen option and counts as wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: QuestionId,
    #[serde(default)]
    pub topic_name: Option<String>,
    #[serde(default)]
    pub difficulty_level: Option<String>,
    #[serde(default)]
    pub chosen_option_id: Option<OptionId>,
    pub correct_option_id: OptionId,
}

impl Answer {
    #[must_use]
    pub fn new(
        question_id: impl Into<QuestionId>,
        topic_name: Option<&str>,
        chosen_option_id: impl Into<OptionId>,
        correct_option_id: impl Into<OptionId>,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            topic_name: topic_name.map(str::to_owned),
            difficulty_level: None,
            chosen_option_id: Some(chosen_option_id.into()),
            correct_option_id: correct_option_id.into(),
        }
    }

    #[must_use]
    pub fn unanswered(
        question_id: impl Into<QuestionId>,
        topic_name: Option<&str>,
        correct_option_id: impl Into<OptionId>,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            topic_name: topic_name.map(str::to_owned),
            difficulty_level: None,
            chosen_option_id: None,
            correct_option_id: correct_option_id.into(),
        }
    }

    #[must_use]
    pub fn with_difficulty(mut self, level: &str) -> Self {
        self.difficulty_level = Some(level.to_owned());
        self
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.chosen_option_id.as_ref() == Some(&self.correct_option_id)
    }

    /// Topic bucket for this answer, falling back to [`UNKNOWN_TOPIC`].
    #[must_use]
    pub fn topic(&self) -> &str {
        bucket_or(self.topic_name.as_deref(), UNKNOWN_TOPIC)
    }

    /// Difficulty bucket for this answer, falling back to [`UNKNOWN_DIFFICULTY`].
    #[must_use]
    pub fn difficulty(&self) -> &str {
        bucket_or(self.difficulty_level.as_deref(), UNKNOWN_DIFFICULTY)
    }
}

//
// ─── QUESTIONS & SUBMISSIONS ───────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: OptionId,
    pub text: String,
}

/// A multiple-choice question as presented to the student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub difficulty_level: Option<String>,
    pub options: Vec<AnswerOption>,
    pub correct_option_id: OptionId,
}

impl Question {
    #[must_use]
    pub fn topic(&self) -> &str {
        bucket_or(self.topic.as_deref(), UNKNOWN_TOPIC)
    }

    /// 1-based position of `option` among this question's options.
    #[must_use]
    pub fn option_position(&self, option: &OptionId) -> Option<usize> {
        self.options
            .iter()
            .position(|o| &o.id == option)
            .map(|idx| idx + 1)
    }

    #[must_use]
    pub fn option_text(&self, option: &OptionId) -> Option<&str> {
        self.options
            .iter()
            .find(|o| &o.id == option)
            .map(|o| o.text.as_str())
    }
}

/// The option a student picked for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub question_id: QuestionId,
    pub chosen_option_id: OptionId,
}

/// Everything the client holds about one submitted attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: SubmissionId,
    pub assessment_id: AssessmentId,
    pub student_id: StudentId,
    #[serde(default)]
    pub student_name: String,
    pub subject: String,
    pub questions: Vec<Question>,
    pub choices: Vec<Choice>,
}

impl Submission {
    #[must_use]
    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| &q.id == id)
    }

    #[must_use]
    pub fn choice_for(&self, id: &QuestionId) -> Option<&OptionId> {
        self.choices
            .iter()
            .find(|c| &c.question_id == id)
            .map(|c| &c.chosen_option_id)
    }

    /// One answer per question, in question order.
    ///
    /// Unanswered questions are included with no chosen option. Choices that
    /// reference a question not in this submission are ignored.
    #[must_use]
    pub fn answers(&self) -> Vec<Answer> {
        self.questions
            .iter()
            .map(|question| Answer {
                question_id: question.id.clone(),
                topic_name: question.topic.clone(),
                difficulty_level: question.difficulty_level.clone(),
                chosen_option_id: self.choice_for(&question.id).cloned(),
                correct_option_id: question.correct_option_id.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, topic: Option<&str>) -> Question {
        Question {
            id: QuestionId::new(id),
            text: format!("Question {id}"),
            topic: topic.map(str::to_owned),
            difficulty_level: Some("easy".into()),
            options: vec![
                AnswerOption { id: "a".into(), text: "A".into() },
                AnswerOption { id: "b".into(), text: "B".into() },
                AnswerOption { id: "c".into(), text: "C".into() },
            ],
            correct_option_id: "b".into(),
        }
    }

    #[test]
    fn correctness_is_derived_from_option_ids() {
        assert!(Answer::new("1", Some("Algebra"), "x", "x").is_correct());
        assert!(!Answer::new("1", Some("Algebra"), "x", "y").is_correct());
        assert!(!Answer::unanswered("1", Some("Algebra"), "x").is_correct());
    }

    #[test]
    fn missing_or_blank_topic_falls_back_to_unknown() {
        assert_eq!(Answer::new("1", None, "a", "a").topic(), UNKNOWN_TOPIC);
        assert_eq!(Answer::new("1", Some("  "), "a", "a").topic(), UNKNOWN_TOPIC);
        assert_eq!(Answer::new("1", Some("Geometry"), "a", "a").topic(), "Geometry");
        assert_eq!(Answer::new("1", None, "a", "a").difficulty(), UNKNOWN_DIFFICULTY);
    }

    #[test]
    fn unknown_topic_sentinels() {
        assert!(is_unknown_topic("Unknown"));
        assert!(is_unknown_topic("unknown "));
        assert!(is_unknown_topic("Không xác định"));
        assert!(is_unknown_topic(""));
        assert!(!is_unknown_topic("Calculus"));
    }

    #[test]
    fn option_positions_are_one_based() {
        let q = question("1", None);
        assert_eq!(q.option_position(&"a".into()), Some(1));
        assert_eq!(q.option_position(&"c".into()), Some(3));
        assert_eq!(q.option_position(&"z".into()), None);
    }

    #[test]
    fn answers_join_choices_with_questions() {
        let submission = Submission {
            id: "s1".into(),
            assessment_id: "as1".into(),
            student_id: "st1".into(),
            student_name: "Lan".into(),
            subject: "Math".into(),
            questions: vec![
                question("1", Some("Algebra")),
                question("2", None),
                question("3", Some("Geometry")),
            ],
            choices: vec![
                Choice { question_id: "2".into(), chosen_option_id: "b".into() },
                Choice { question_id: "1".into(), chosen_option_id: "a".into() },
                Choice { question_id: "missing".into(), chosen_option_id: "a".into() },
            ],
        };

        let answers = submission.answers();
        assert_eq!(answers.len(), 3);
        assert_eq!(answers[0].topic(), "Algebra");
        assert!(!answers[0].is_correct());
        assert_eq!(answers[1].question_id, QuestionId::new("2"));
        assert!(answers[1].is_correct());
        assert_eq!(answers[2].topic(), "Geometry");
        assert_eq!(answers[2].chosen_option_id, None);
        assert!(!answers[2].is_correct());
    }
}
