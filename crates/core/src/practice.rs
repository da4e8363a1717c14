use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{AssignmentId, is_unknown_topic};

/// Upper bound accepted for a generated quiz.
pub const MAX_PRACTICE_QUESTIONS: u32 = 50;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PracticeValidationError {
    #[error("no topics selected for practice")]
    NoTopics,
    #[error("cannot generate practice for an unattributed topic: {0:?}")]
    UnknownTopic(String),
    #[error("question count must be between 1 and {max}, got {provided}")]
    InvalidQuestionCount { provided: u32, max: u32 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PracticeDifficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl PracticeDifficulty {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }
}

/// Request for a targeted practice quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeRequest {
    pub assignment_id: AssignmentId,
    pub subject: String,
    pub topics: Vec<String>,
    pub difficulty: PracticeDifficulty,
    pub num_questions: u32,
}

impl PracticeRequest {
    /// Check the request before it reaches the network.
    ///
    /// # Errors
    ///
    /// Returns `PracticeValidationError` for an empty topic list, a sentinel
    /// "unknown" topic, or a question count outside `1..=MAX_PRACTICE_QUESTIONS`.
    pub fn validate(&self) -> Result<(), PracticeValidationError> {
        if self.topics.is_empty() {
            return Err(PracticeValidationError::NoTopics);
        }
        if let Some(topic) = self.topics.iter().find(|t| is_unknown_topic(t)) {
            return Err(PracticeValidationError::UnknownTopic(topic.clone()));
        }
        if !(1..=MAX_PRACTICE_QUESTIONS).contains(&self.num_questions) {
            return Err(PracticeValidationError::InvalidQuestionCount {
                provided: self.num_questions,
                max: MAX_PRACTICE_QUESTIONS,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(topics: &[&str], num_questions: u32) -> PracticeRequest {
        PracticeRequest {
            assignment_id: AssignmentId::new("a1"),
            subject: "Math".into(),
            topics: topics.iter().map(|t| (*t).to_owned()).collect(),
            difficulty: PracticeDifficulty::default(),
            num_questions,
        }
    }

    #[test]
    fn accepts_named_topics() {
        assert!(request(&["Algebra", "Sets"], 10).validate().is_ok());
    }

    #[test]
    fn rejects_sentinel_topics() {
        let err = request(&["Algebra", "Không xác định"], 5).validate().unwrap_err();
        assert_eq!(err, PracticeValidationError::UnknownTopic("Không xác định".into()));
        assert!(matches!(
            request(&["Unknown"], 5).validate(),
            Err(PracticeValidationError::UnknownTopic(_))
        ));
    }

    #[test]
    fn rejects_empty_topics_and_bad_counts() {
        assert_eq!(request(&[], 5).validate(), Err(PracticeValidationError::NoTopics));
        assert!(matches!(
            request(&["Algebra"], 0).validate(),
            Err(PracticeValidationError::InvalidQuestionCount { provided: 0, .. })
        ));
        assert!(request(&["Algebra"], MAX_PRACTICE_QUESTIONS + 1).validate().is_err());
    }

    #[test]
    fn parses_difficulty() {
        assert_eq!(PracticeDifficulty::parse(" Hard "), Some(PracticeDifficulty::Hard));
        assert_eq!(PracticeDifficulty::parse("extreme"), None);
    }
}
