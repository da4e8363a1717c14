mod answer;
mod ids;

pub use answer::{
    Answer, AnswerOption, Choice, Question, Submission, UNKNOWN_DIFFICULTY, UNKNOWN_TOPIC,
    UNKNOWN_TOPIC_LOCALIZED, is_unknown_topic,
};
pub use ids::{
    AssessmentId, AssignmentId, OptionId, QuestionId, ResultId, StudentId, SubmissionId, TaskId,
};
